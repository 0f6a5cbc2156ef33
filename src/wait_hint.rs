//! Provider wait-hint extraction.
//!
//! Rate-limit responses from the chat provider embed a suggested retry
//! delay in prose, e.g. `"... Please try again in 2m59.56s. ..."`. The
//! accepted grammar is `try again in <minutes>m<seconds>s` anywhere in the
//! message, where minutes is an integer and seconds may be fractional;
//! the first occurrence wins.
//!
//! The message format is an unstable external contract, so a mismatch
//! yields no hint rather than an error — callers fall back to their
//! default backoff policy.

use std::sync::OnceLock;

use regex::Regex;

fn hint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"try again in (\d+)m(\d+(?:\.\d+)?)s").expect("hint pattern is valid")
    })
}

/// Extract the provider-suggested wait from an error message, in seconds.
///
/// Returns `None` when the message carries no recognizable hint.
pub fn parse_wait_hint(message: &str) -> Option<f64> {
    let caps = hint_pattern().captures(message)?;
    let minutes: f64 = caps[1].parse().ok()?;
    let seconds: f64 = caps[2].parse().ok()?;
    Some(minutes * 60.0 + seconds)
}
