use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        source: serde_json::Error,
    },
    #[error("repository has no master ref")]
    NoMasterRef,
    #[error("no {document_type} document with uid {uid:?}")]
    NotFound { document_type: String, uid: String },
}

impl CmsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CmsError::NotFound { .. })
    }
}
