use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExportError>;

/// Everything that can stop an analysis or export run.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Malformed audio or settings, reported before any frame work starts.
    #[error("invalid input: {0}")]
    Input(String),
    /// A surface or image buffer could not be allocated.
    #[error("resource allocation failed: {0}")]
    Resource(String),
    #[error("frame serialization failed: {0}")]
    Image(#[from] image::ImageError),
    /// The external encoder rejected the job.
    #[error("encoder failed: {0}")]
    Encoder(String),
    #[error("archive failed: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The caller asked the run to stop. Not a failure.
    #[error("export cancelled")]
    Cancelled,
}

impl ExportError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
