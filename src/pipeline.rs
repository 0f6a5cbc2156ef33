//! Reasoning pipeline capability and the chat-completions adapter.
//!
//! The [`ReasoningPipeline`] trait is the seam between the retry controller
//! and whatever actually produces answers. Failures come back as data, not
//! as errors thrown through the call stack: [`PipelineFailure`] carries the
//! classification the controller's state machine runs on.
//!
//! [`AssistantPipeline`] is the production implementation: retrieve the
//! top-k most similar statute sections from the collection, compose a
//! grounded prompt, and call an OpenAI-compatible chat-completions endpoint
//! (Groq by default).

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AssistantConfig;
use crate::embedding::Embedder;
use crate::models::ScoredSection;
use crate::search;
use crate::store::SectionStore;

/// A classified failure from a pipeline invocation.
///
/// `RateLimited` is transient and retried by the controller; the other two
/// are fatal and end the run on first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineFailure {
    /// The provider throttled the request. The message may carry a
    /// suggested retry delay (see [`crate::wait_hint`]).
    RateLimited { message: String },
    /// A required configuration value (e.g. an API key variable) is absent.
    ConfigurationMissing { key: String },
    /// Anything else: network failures, unexpected status codes, bad
    /// payloads. `kind` is a short category label for reporting.
    Unexpected { kind: String, message: String },
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineFailure::RateLimited { message } => write!(f, "rate limited: {}", message),
            PipelineFailure::ConfigurationMissing { key } => {
                write!(f, "missing configuration: {}", key)
            }
            PipelineFailure::Unexpected { kind, message } => {
                write!(f, "unexpected failure ({}): {}", kind, message)
            }
        }
    }
}

/// Capability trait for the reasoning pipeline the controller drives.
///
/// One invocation takes the user's natural-language input and returns
/// either an answer or a classified failure.
#[async_trait]
pub trait ReasoningPipeline: Send + Sync {
    async fn run(&self, user_input: &str) -> Result<String, PipelineFailure>;
}

/// Production pipeline: semantic retrieval + chat completion.
pub struct AssistantPipeline {
    config: AssistantConfig,
    collection: String,
    store: Box<dyn SectionStore>,
    embedder: Box<dyn Embedder>,
    client: reqwest::Client,
}

impl AssistantPipeline {
    pub fn new(
        config: AssistantConfig,
        collection: String,
        store: Box<dyn SectionStore>,
        embedder: Box<dyn Embedder>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            collection,
            store,
            embedder,
            client,
        })
    }

    /// Fetch the sections most relevant to the question.
    ///
    /// An empty or absent collection is not a failure — the pipeline
    /// answers from general knowledge with an empty context block.
    async fn retrieve_context(&self, question: &str) -> anyhow::Result<Vec<ScoredSection>> {
        search::retrieve(
            self.store.as_ref(),
            self.embedder.as_ref(),
            &self.collection,
            question,
            self.config.top_k as i64,
        )
        .await
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: String,
}

const SYSTEM_PROMPT: &str = "You are a legal assistant. Answer the user's question using the \
statute sections provided as context. Cite sections by their number and never invent sections \
that are not in the context.";

fn build_user_message(question: &str, sections: &[ScoredSection]) -> String {
    let mut msg = String::from("Statute sections:\n\n");
    if sections.is_empty() {
        msg.push_str("(no indexed sections matched this question)\n");
    } else {
        for s in sections {
            msg.push_str(&s.content);
            msg.push_str("\n\n---\n\n");
        }
    }
    msg.push_str("Question: ");
    msg.push_str(question);
    msg
}

#[async_trait]
impl ReasoningPipeline for AssistantPipeline {
    async fn run(&self, user_input: &str) -> Result<String, PipelineFailure> {
        let api_key = std::env::var(&self.config.api_key_env).map_err(|_| {
            PipelineFailure::ConfigurationMissing {
                key: self.config.api_key_env.clone(),
            }
        })?;

        let sections =
            self.retrieve_context(user_input)
                .await
                .map_err(|e| PipelineFailure::Unexpected {
                    kind: "retrieval".to_string(),
                    message: format!("{:#}", e),
                })?;

        let user_message = build_user_message(user_input, &sections);
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineFailure::Unexpected {
                kind: "network".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineFailure::RateLimited { message });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PipelineFailure::Unexpected {
                kind: format!("http {}", status.as_u16()),
                message,
            });
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| PipelineFailure::Unexpected {
                    kind: "response".to_string(),
                    message: e.to_string(),
                })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| PipelineFailure::Unexpected {
                kind: "response".to_string(),
                message: "chat response contained no choices".to_string(),
            })
    }
}
