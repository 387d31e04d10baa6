//! Short-form video ad ingestion — URL in, structured record out.
//!
//! **ugcads** downloads an ad (via yt-dlp), extracts 16 kHz mono audio (via ffmpeg),
//! transcribes it (via whisper.cpp), picks the hook and call-to-action lines with
//! locale-tuned heuristics, and appends the result to an append-only JSON Lines dataset.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> ugcads::Result<()> {
//! use ugcads::{IngestOptions, IngestRequest};
//!
//! let request = IngestRequest::new("https://www.instagram.com/reel/abc", "review")
//!     .brand("Acme")
//!     .terms_ok(true);
//! let summary = ugcads::ingest_url(&request, IngestOptions::default()).await?;
//! println!("{}", summary.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! The pipeline's collaborators are traits ([`MediaRetriever`], [`Transcoder`],
//! [`TranscriptionService`], [`AdRepository`]); build an [`Ingestor`] directly to
//! swap any of them.

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod error;
#[cfg(feature = "download")]
pub mod media;
pub mod model;
pub mod pipeline;
pub mod text;
pub mod transcribe;
pub mod types;
pub mod validate;

pub use config::{Heuristics, IngestOptions, Language, Model, TranscribeOptions};
pub use dataset::{AdRepository, JsonlDataset};
pub use error::{Error, Result};
pub use pipeline::{Ingestor, MediaRetriever, RetrievedMedia, Transcoder, TranscriptionService};
pub use types::{parse_consent, AdId, AdRecord, IngestRequest, IngestSummary, Platform, UgcType};
pub use validate::Validator;

/// Ingest one URL with the stock collaborators: yt-dlp, ffmpeg, whisper.cpp and
/// the JSON Lines dataset at `options.dataset_path`.
#[cfg(feature = "download")]
pub async fn ingest_url(request: &IngestRequest, options: IngestOptions) -> Result<IngestSummary> {
    let ingestor = Ingestor::new(
        media::YtDlpRetriever,
        media::FfmpegTranscoder,
        transcribe::WhisperTranscriber::new(options.transcribe.clone()),
        JsonlDataset::new(&options.dataset_path),
        options,
    );
    let record = ingestor.ingest(request).await?;
    Ok(IngestSummary::ok(&record))
}
