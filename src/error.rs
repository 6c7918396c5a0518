//! Error types for sequence parsing and frame decoding
//!
//! Parse errors skip the offending entry, decode errors fail a single frame.
//! Neither aborts a listing or playback as a whole.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning file names or frame lists into sequences
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Frame list starts with a minus sign
    #[error("negative frame number in '{0}'")]
    NegativeFrame(String),

    /// Frame number does not fit the supported range
    #[error("frame number out of range in '{0}' (max {max})", max = crate::entities::sequence::MAX_FRAME)]
    FrameOutOfRange(String),

    /// Frame list is syntactically invalid ("1--3", "a-b", ...)
    #[error("invalid frame list '{0}'")]
    InvalidFrameList(String),

    /// Wildcard / printf / glob pattern could not be resolved
    #[error("invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// Pattern resolved, but nothing on disk matched it
    #[error("no files match '{0}'")]
    NoMatch(String),
}

impl ParseError {
    pub fn pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised by codecs while reading a frame.
///
/// Cloneable so one failure can be handed to every coalesced requester.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error reading {}: {reason}", path.display())]
    Io { path: PathBuf, reason: String },

    #[error("image error: {0}")]
    Image(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Frame number is not part of the sequence being read
    #[error("frame {0} is not in the sequence")]
    NoSuchFrame(i64),

    /// Codec panicked while decoding; the worker survived
    #[error("decoder panicked: {0}")]
    Panicked(String),

    /// Decode job was dropped before producing a result (pool shut down)
    #[error("decode of frame {0} was cancelled")]
    Cancelled(i64),
}

impl DecodeError {
    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io {
                path,
                reason: err.to_string(),
            }
        }
    }
}

/// Top-level error for file-system facing operations
#[derive(Error, Debug)]
pub enum SeqError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SeqResult<T> = Result<T, SeqError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let decode = DecodeError::io("/tmp/x.0001.exr", &err);
        assert_eq!(decode, DecodeError::NotFound(PathBuf::from("/tmp/x.0001.exr")));
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ParseError::NegativeFrame("-5-10".into()).to_string(),
            "negative frame number in '-5-10'"
        );
        assert!(ParseError::FrameOutOfRange("99999999999".into())
            .to_string()
            .contains("out of range"));
    }
}
