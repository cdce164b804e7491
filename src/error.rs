//! Structured error types for the Folio engine.
//!
//! Each boundary gets its own enum: estimation problems degrade layout and
//! never escape packing, config edits fail on unknown sections, exports fail
//! with a human-readable reason, persistence failures are retried. The
//! crate-level [`FolioError`] wraps them for the CLI and the WASM bindings.

use thiserror::Error;

use crate::model::SectionId;

/// The unified error type returned by the top-level Folio API.
#[derive(Debug, Error)]
pub enum FolioError {
    /// JSON input failed to parse as a valid job or config.
    #[error("Failed to parse input: {source}{}", hint_suffix(.hint))]
    ParseError {
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for FolioError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the report job schema. \
                 Check field names and types."
                    .to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        FolioError::ParseError { source: e, hint }
    }
}

/// Why a section could not be estimated. Packing turns these into
/// zero-height sections plus a diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimateError {
    #[error("section '{0}' has an unknown kind and was laid out as empty")]
    UnknownKind(SectionId),
    #[error("section '{section}' has no {expected} data and was laid out as empty")]
    MissingData {
        section: SectionId,
        expected: &'static str,
    },
}

/// Rejected config store edits.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("unknown section '{0}'")]
    UnknownSection(SectionId),
    #[error("column count must be at least 1 (section '{0}')")]
    InvalidColumns(SectionId),
    #[error("orphan guard must be at least 1")]
    InvalidOrphanGuard,
}

/// A page map that violates one of its structural invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("page {index} is numbered {number}")]
    PageNumbering { index: usize, number: usize },
    #[error("totalPages is {declared} but the map holds {actual} pages")]
    PageCount { declared: usize, actual: usize },
    #[error("cover page must be page 1 with no placements")]
    CoverPage,
    #[error("section '{section}' has {count} first placements")]
    FirstPlacement { section: SectionId, count: usize },
    #[error("section '{section}' rows are not conserved: expected {expected} at {at}")]
    RowGap {
        section: SectionId,
        expected: usize,
        at: usize,
    },
    #[error("section '{section}' ends at row {end} of {rows}")]
    RowCount {
        section: SectionId,
        end: usize,
        rows: usize,
    },
}

/// The two renderers disagreed about the same page map.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("renderers disagree on page count: {left} vs {right}")]
    PageCountMismatch { left: usize, right: usize },
    #[error("renderers disagree on page {page}")]
    PageMismatch { page: usize },
}

/// Typed export failures, each with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    #[error("export cancelled after {pages_written} of {total_pages} pages")]
    Cancelled {
        pages_written: usize,
        total_pages: usize,
    },
    #[error("export exceeded its deadline")]
    TimedOut,
    #[error("export produced an empty document: {0}")]
    EmptyDocument(String),
}

/// A failed load or save against the config sink.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage rejected the record: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: FolioError = serde_json::from_str::<serde_json::Value>("{ \"a\": 1, }")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("Failed to parse input"));
        assert!(msg.contains("Hint: Check for trailing commas"));
    }

    #[test]
    fn export_error_is_human_readable() {
        let err = ExportError::Cancelled {
            pages_written: 2,
            total_pages: 5,
        };
        assert_eq!(err.to_string(), "export cancelled after 2 of 5 pages");
    }
}
