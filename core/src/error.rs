use crate::document::ParseError;
use crate::query::QuerySyntaxError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = IrError> = std::result::Result<T, E>;

/// Every failure the library can report.
///
/// `Parse` and `QuerySyntax` are recoverable: the offending document or query
/// is skipped and the batch continues. Everything else aborts the operation.
#[derive(Debug, Error)]
pub enum IrError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    QuerySyntax(#[from] QuerySyntaxError),

    #[error("index codec error on {}: {source}", path.display())]
    Codec {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("invalid metadata in {}: {source}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupt index: {0}")]
    CorruptIndex(String),
}

impl IrError {
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        IrError::Io { path: path.as_ref().to_path_buf(), source }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        IrError::Configuration(msg.into())
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, IrError::Parse(_) | IrError::QuerySyntax(_))
    }
}
