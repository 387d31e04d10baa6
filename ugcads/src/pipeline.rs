//! The ingest pipeline: retrieve → transcode → transcribe → derive → allocate → append.
//!
//! External collaborators sit behind traits so the orchestration can be driven
//! by any downloader, transcoder, speech-to-text engine or record store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::IngestOptions;
use crate::dataset::AdRepository;
use crate::error::{Error, Result};
use crate::text::{extract_cta, extract_hook, normalize};
use crate::types::{AdRecord, IngestRequest, Platform, UgcType};

/// A downloaded video and the metadata that came with it.
#[derive(Debug, Clone)]
pub struct RetrievedMedia {
    pub video_path: PathBuf,
    pub duration_sec: Option<u64>,
    pub description: Option<String>,
}

/// Fetches the video behind a URL into `work_dir`.
#[async_trait]
pub trait MediaRetriever: Send + Sync {
    async fn retrieve(&self, url: &str, work_dir: &Path) -> Result<RetrievedMedia>;
}

/// Turns a video into 16kHz mono PCM audio inside `work_dir`.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn to_pcm(&self, video: &Path, work_dir: &Path) -> Result<PathBuf>;
}

/// Speech to text.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<String>;
}

/// Reject anything that isn't an http(s) URL. Surrounding whitespace counts
/// against it; callers trim first if they want leniency.
pub fn validate_url(url: &str) -> Result<()> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(Error::InvalidUrl(url.to_string()))
    }
}

/// Scratch directory for one run, removed with everything in it when dropped.
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Create a unique directory under the system temp dir so concurrent
    /// runs (even within the same process) don't collide.
    pub fn create() -> Result<Self> {
        static SEQ: AtomicU64 = AtomicU64::new(0);

        let path = std::env::temp_dir().join(format!(
            "ugcads-{}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to clean up work dir");
            }
        }
    }
}

/// Sequences the collaborators for one ingest run.
pub struct Ingestor<R> {
    retriever: Box<dyn MediaRetriever>,
    transcoder: Box<dyn Transcoder>,
    transcriber: Box<dyn TranscriptionService>,
    repository: R,
    options: IngestOptions,
}

impl<R: AdRepository> Ingestor<R> {
    pub fn new(
        retriever: impl MediaRetriever + 'static,
        transcoder: impl Transcoder + 'static,
        transcriber: impl TranscriptionService + 'static,
        repository: R,
        options: IngestOptions,
    ) -> Self {
        Self {
            retriever: Box::new(retriever),
            transcoder: Box::new(transcoder),
            transcriber: Box::new(transcriber),
            repository,
            options,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Ingest one URL. Either a complete record is appended, or nothing is.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<AdRecord> {
        let ugc_type: UgcType = request.ugc_type.parse()?;
        let url = request.url.trim();
        validate_url(url)?;

        let work_dir = WorkDir::create()?;
        let (script, media) = self.transcribe_url(url, work_dir.path()).await?;

        let hook_text = extract_hook(&script, &self.options.heuristics);
        let cta_text = extract_cta(&script, &self.options.heuristics);
        let caption = normalize(media.description.as_deref().unwrap_or_default());
        let platform = Platform::from_url(url);

        let _lock = self.repository.lock()?;
        let id = self.repository.next_id()?;

        let record = AdRecord {
            id,
            platform,
            brand: normalize(&request.brand),
            category: normalize(&request.category),
            language: self.options.locale.clone(),
            ugc_type,
            video_url: url.to_string(),
            hook_text,
            cta_text,
            caption_text: (!caption.is_empty()).then_some(caption),
            script_text: script,
            duration_sec: media.duration_sec,
            aspect_ratio: self.options.aspect_ratio.clone(),
            terms_ok: request.terms_ok,
            notes: format!(
                "auto-ingest via ugcads {}",
                Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        };

        self.repository.append(&record)?;
        info!(id = %record.id, %platform, "ingest complete");

        Ok(record)
    }

    /// Retrieval, transcoding and transcription, each short-circuiting on failure.
    async fn transcribe_url(&self, url: &str, work_dir: &Path) -> Result<(String, RetrievedMedia)> {
        let media = self.retriever.retrieve(url, work_dir).await?;
        if !media.video_path.is_file() {
            return Err(Error::Retrieval(format!(
                "no playable file at {}",
                media.video_path.display()
            )));
        }

        let audio = self.transcoder.to_pcm(&media.video_path, work_dir).await?;
        let script = normalize(&self.transcriber.transcribe(&audio).await?);
        if script.is_empty() {
            return Err(Error::EmptyTranscript);
        }

        info!(chars = script.len(), "transcript ready");
        Ok((script, media))
    }
}
