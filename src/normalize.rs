//! Section normalization.
//!
//! Pure transformation from raw corpus records to the canonical indexed
//! form: one document per record with a non-empty section identifier, in
//! input order, with optional fields defaulted to empty strings. No I/O,
//! no failure modes — the loader has already validated the record shape.

use crate::models::{NormalizedDocument, SectionMetadata, SourceRecord};

/// Normalize an ordered sequence of records into indexable documents.
///
/// Records with an empty section identifier cannot be keyed in the
/// collection and are dropped here.
pub fn normalize_records(records: &[SourceRecord]) -> Vec<NormalizedDocument> {
    records
        .iter()
        .filter(|r| !r.section.is_empty())
        .map(normalize)
        .collect()
}

fn normalize(record: &SourceRecord) -> NormalizedDocument {
    NormalizedDocument {
        content: format!(
            "Section {}: {}\n\n{}",
            record.section, record.section_title, record.section_desc
        ),
        metadata: SectionMetadata {
            chapter: record.chapter.clone().unwrap_or_default(),
            chapter_title: record.chapter_title.clone().unwrap_or_default(),
            section: record.section.clone(),
            section_title: record.section_title.clone(),
        },
    }
}
