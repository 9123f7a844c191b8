// ABOUTME: Error types for the revelation application
// ABOUTME: One variant per failure the installer, resolver, builder and server can report

use std::path::PathBuf;
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum RevelationError {
    #[error("Failed to download {url}: {message}")]
    Download {
        url: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Unsupported archive format: {0:?} is neither a gzip tarball nor a zip file")]
    UnsupportedFormat(PathBuf),

    #[error("Archive entry {entry:?} would be extracted outside of {destination:?}")]
    PathTraversal { entry: String, destination: PathBuf },

    #[error("Install error: {message}")]
    Install {
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    #[error("Unable to load configuration file {path:?}: {source}")]
    ConfigLoad {
        path: PathBuf,
        #[source]
        source: BoxedCause,
    },

    #[error("Presentation file not found: {0:?}")]
    PresentationNotFound(PathBuf),

    #[error("Style is not a css file or does not exist: {0:?}")]
    StyleInvalid(PathBuf),

    #[error("{0:?} already exists")]
    OutputConflict(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Server error: {0}")]
    Server(String),
}

impl RevelationError {
    pub(crate) fn download(url: &str, message: impl Into<String>) -> Self {
        RevelationError::Download {
            url: url.to_string(),
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn install<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        RevelationError::Install {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<reqwest::Error> for RevelationError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        RevelationError::Download {
            url,
            message,
            source: Some(Box::new(err)),
        }
    }
}

impl From<zip::result::ZipError> for RevelationError {
    fn from(err: zip::result::ZipError) -> Self {
        RevelationError::install(format!("ZIP extraction failed: {}", err), err)
    }
}

impl From<notify::Error> for RevelationError {
    fn from(err: notify::Error) -> Self {
        RevelationError::Watch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RevelationError>;
