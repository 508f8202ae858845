use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, editing or writing chapter metadata.
#[derive(Error, Debug)]
pub enum ChapterError {
    /// Time text could not be parsed.
    #[error("Malformed time value {text:?}: {reason}")]
    Format { text: String, reason: String },

    /// Marker XML is not a well-formed document.
    #[error("Malformed marker XML: {0}")]
    Syntax(String),

    /// A timestamp field was set outside its domain.
    #[error("{field} out of range: {value}")]
    Range { field: &'static str, value: String },

    /// The table of contents references a chapter frame that does not exist.
    #[error("Table of contents {toc:?} references missing chapter frame {id:?}")]
    Integrity { toc: String, id: String },

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unreadable audio file {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing frames failed; the file on disk still holds its previous frames.
    #[error("Failed to persist chapter frames: {0}")]
    Persistence(String),

    #[error("Chapter index {index} out of bounds (len {len})")]
    InvalidIndex { index: usize, len: usize },

    #[error("Chapters have not been loaded")]
    NotLoaded,
}

impl ChapterError {
    pub(crate) fn format(text: &str, reason: impl Into<String>) -> Self {
        Self::Format {
            text: text.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn range(field: &'static str, value: impl ToString) -> Self {
        Self::Range {
            field,
            value: value.to_string(),
        }
    }
}

pub type ChapterResult<T> = Result<T, ChapterError>;
