use std::path::PathBuf;

/// All errors that can occur in ugcads.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid ugc type: \"{0}\" — expected one of {allowed}", allowed = crate::types::UgcType::ALL_NAMES.join(", "))]
    InvalidUgcType(String),

    #[error("invalid URL (must start with http:// or https://): {0}")]
    InvalidUrl(String),

    #[error("media retrieval failed: {0}")]
    Retrieval(String),

    #[cfg(feature = "download")]
    #[error("yt-dlp not found — install with: pip install yt-dlp")]
    YtDlpNotFound,

    #[error("audio transcoding failed: {0}")]
    Transcode(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("transcript is empty")]
    EmptyTranscript,

    #[error("model error: {0}")]
    Model(String),

    #[error("model not found: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("model download failed: {0}")]
    ModelDownload(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("unsupported language: \"{0}\"")]
    UnsupportedLanguage(String),

    #[error("invalid CTA pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("dataset is locked by another writer: {path} (remove it if no ingest is running)")]
    DatasetLocked { path: PathBuf },

    #[error("id space exhausted: {0} has no successor")]
    IdSpaceExhausted(String),

    #[error("dataset not found: {path}")]
    DatasetNotFound { path: PathBuf },

    #[error("no record matches {0}")]
    RecordNotFound(String),

    #[error("more than one record matches, narrow it down with --id: {}", .0.join(", "))]
    AmbiguousRecord(Vec<String>),

    #[error("whisper error: {0}")]
    Whisper(#[from] whisper_rs::WhisperError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_ugc_type() {
        let e = Error::InvalidUgcType("meme".into());
        let msg = e.to_string();
        assert!(msg.contains("meme"));
        assert!(msg.contains("testimonial"));
        assert!(msg.contains("product_haul"));
    }

    #[test]
    fn test_error_display_dataset_locked() {
        let e = Error::DatasetLocked {
            path: PathBuf::from("/tmp/ads.jsonl.lock"),
        };
        assert!(e.to_string().contains("/tmp/ads.jsonl.lock"));
    }

    #[test]
    fn test_error_display_ambiguous() {
        let e = Error::AmbiguousRecord(vec!["br_001".into(), "br_004".into()]);
        assert!(e.to_string().contains("br_001, br_004"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
        assert!(e.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let e: Error = json_err.into();
        assert!(matches!(e, Error::Json(_)));
    }

    #[test]
    fn test_error_from_regex() {
        let re_err = regex::Regex::new("(unclosed").unwrap_err();
        let e: Error = re_err.into();
        assert!(matches!(e, Error::InvalidPattern(_)));
    }
}
