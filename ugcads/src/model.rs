use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::{Model, TranscribeOptions};
use crate::error::{Error, Result};

const HUGGINGFACE_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Anything smaller is an error page, not a model.
const MIN_MODEL_BYTES: u64 = 1_000_000;

/// Local cache of ggml whisper models, filled from HuggingFace on first use.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn for_options(options: &TranscribeOptions) -> Self {
        Self::new(options.resolve_cache_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where a stock model lives once cached. Custom models are used in place.
    pub fn local_path(&self, model: &Model) -> PathBuf {
        match model {
            Model::Custom(path) => path.clone(),
            stock => self.dir.join(stock.filename()),
        }
    }

    /// Download location for a stock model; `None` for custom files.
    pub fn remote_url(model: &Model) -> Option<String> {
        match model {
            Model::Custom(_) => None,
            stock => Some(format!("{HUGGINGFACE_BASE}/{}", stock.filename())),
        }
    }

    /// Path to a usable model file, downloading the stock model if it isn't cached.
    pub async fn resolve(&self, model: &Model) -> Result<PathBuf> {
        let path = self.local_path(model);
        if path.is_file() {
            info!(model = model.name(), path = %path.display(), "using cached model");
            return Ok(path);
        }

        let Some(url) = Self::remote_url(model) else {
            return Err(Error::ModelNotFound { path });
        };

        std::fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Model(format!("failed to create cache dir {}: {e}", self.dir.display()))
        })?;

        info!(model = model.name(), %url, "fetching model");
        fetch(&url, &path).await?;
        Ok(path)
    }
}

/// A `.part` file that is deleted unless it is promoted to its final name.
struct PartialDownload {
    path: PathBuf,
    file: Option<File>,
    promoted: bool,
}

impl PartialDownload {
    fn create(dest: &Path) -> Result<Self> {
        let path = dest.with_extension("bin.part");
        let file = File::create(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            promoted: false,
        })
    }

    fn write(&mut self, chunk: &[u8]) -> Result<()> {
        match self.file.as_mut() {
            Some(file) => Ok(file.write_all(chunk)?),
            None => Err(Error::ModelDownload("download already finished".into())),
        }
    }

    /// Flush, check the size and rename into place. Returns the byte count.
    fn promote(mut self, dest: &Path) -> Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        let size = std::fs::metadata(&self.path)?.len();
        if size < MIN_MODEL_BYTES {
            return Err(Error::ModelDownload(format!(
                "downloaded file too small ({size} bytes) — likely an error page"
            )));
        }

        std::fs::rename(&self.path, dest)?;
        self.promoted = true;
        Ok(size)
    }
}

impl Drop for PartialDownload {
    fn drop(&mut self) {
        self.file.take();
        if self.promoted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove partial download");
        }
    }
}

fn progress_bar(total: u64, dest: &Path) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!(
        "Fetching {}",
        dest.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));
    pb
}

async fn fetch(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::Client::new()
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::ModelDownload(format!("HTTP error: {e}")))?;

    let expected = response.content_length();
    let pb = progress_bar(expected.unwrap_or(0), dest);

    let mut part = PartialDownload::create(dest)?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        part.write(&chunk)?;
        pb.inc(chunk.len() as u64);
    }

    let size = part.promote(dest)?;
    pb.finish_with_message("Model ready");

    if let Some(expected) = expected.filter(|&n| n != size) {
        warn!(expected, actual = size, "model size differs from Content-Length");
    }

    info!(path = %dest.display(), size, "model saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ugcads_test_models_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_local_path_and_remote_url() {
        let store = ModelStore::new("/cache/models");
        assert_eq!(store.local_path(&Model::Small), PathBuf::from("/cache/models/ggml-small.bin"));
        assert_eq!(
            ModelStore::remote_url(&Model::LargeV3Turbo).unwrap(),
            format!("{HUGGINGFACE_BASE}/ggml-large-v3-turbo.bin")
        );

        let custom = Model::Custom(PathBuf::from("/opt/pt.ggml"));
        assert_eq!(store.local_path(&custom), PathBuf::from("/opt/pt.ggml"));
        assert!(ModelStore::remote_url(&custom).is_none());
    }

    #[test]
    fn test_store_follows_options_cache_dir() {
        let options = TranscribeOptions::new().cache_dir(PathBuf::from("/tmp/ugcads-models"));
        assert_eq!(ModelStore::for_options(&options).dir(), Path::new("/tmp/ugcads-models"));
    }

    #[tokio::test]
    async fn test_resolve_custom_exists() {
        let dir = scratch("custom");
        let path = dir.join("pt.ggml");
        fs::write(&path, b"fake model data").unwrap();

        let store = ModelStore::new("/unused");
        assert_eq!(store.resolve(&Model::Custom(path.clone())).await.unwrap(), path);

        fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_resolve_custom_not_found() {
        let store = ModelStore::new("/unused");
        let model = Model::Custom(PathBuf::from("/nonexistent/model.bin"));
        assert!(matches!(store.resolve(&model).await, Err(Error::ModelNotFound { .. })));
    }

    #[tokio::test]
    async fn test_resolve_uses_cache() {
        let dir = scratch("cached");
        let cached = dir.join("ggml-small.bin");
        fs::write(&cached, b"fake cached model").unwrap();

        let store = ModelStore::new(&dir);
        assert_eq!(store.resolve(&Model::Small).await.unwrap(), cached);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_abandoned_download_leaves_no_part_file() {
        let dir = scratch("abandoned");
        let dest = dir.join("ggml-tiny.bin");

        let mut part = PartialDownload::create(&dest).unwrap();
        part.write(b"half a model").unwrap();
        let part_path = part.path.clone();
        assert!(part_path.exists());
        drop(part);

        assert!(!part_path.exists());
        assert!(!dest.exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_undersized_download_is_rejected() {
        let dir = scratch("undersized");
        let dest = dir.join("ggml-tiny.bin");

        let mut part = PartialDownload::create(&dest).unwrap();
        part.write(b"<html>404</html>").unwrap();
        assert!(matches!(part.promote(&dest), Err(Error::ModelDownload(_))));

        assert!(!dest.exists());
        assert!(!dir.join("ggml-tiny.bin.part").exists());
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_promote_moves_into_place() {
        let dir = scratch("promote");
        let dest = dir.join("ggml-tiny.bin");

        let mut part = PartialDownload::create(&dest).unwrap();
        part.write(&vec![0u8; MIN_MODEL_BYTES as usize]).unwrap();
        assert_eq!(part.promote(&dest).unwrap(), MIN_MODEL_BYTES);

        assert!(dest.is_file());
        assert!(!dir.join("ggml-tiny.bin.part").exists());
        fs::remove_dir_all(&dir).ok();
    }
}
