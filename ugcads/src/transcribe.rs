use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::{Language, TranscribeOptions};
use crate::error::{Error, Result};
use crate::model::ModelStore;
use crate::pipeline::TranscriptionService;
use crate::text::normalize;

/// Sample rate whisper.cpp expects.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Transcription backed by a local whisper.cpp model.
pub struct WhisperTranscriber {
    options: TranscribeOptions,
}

impl WhisperTranscriber {
    pub fn new(options: TranscribeOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl TranscriptionService for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String> {
        let model_path = ModelStore::for_options(&self.options)
            .resolve(&self.options.model)
            .await?;

        let samples = read_pcm(audio)?;
        transcribe_samples(&samples, &model_path, &self.options)
    }
}

/// Read raw 16-bit little-endian mono PCM into f32 samples in [-1.0, 1.0].
pub(crate) fn read_pcm(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::Transcription(format!("cannot read audio {}: {e}", path.display())))?;
    Ok(pcm_to_samples(&bytes))
}

fn pcm_to_samples(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

/// Run whisper over 16kHz mono samples and return the normalized transcript.
fn transcribe_samples(
    samples: &[f32],
    model_path: &Path,
    options: &TranscribeOptions,
) -> Result<String> {
    if samples.is_empty() {
        return Err(Error::Transcription("audio contains no samples".into()));
    }

    info!(model = %model_path.display(), "loading whisper model");

    let mut ctx_params = WhisperContextParameters::new();
    ctx_params.use_gpu(options.gpu);

    let ctx = WhisperContext::new_with_params(
        model_path
            .to_str()
            .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
        ctx_params,
    )?;

    let mut state = ctx.create_state()?;

    let mut params = match options.beam_size {
        Some(beam_size) => FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: beam_size as i32,
            patience: -1.0,
        }),
        None => FullParams::new(SamplingStrategy::Greedy { best_of: 5 }),
    };

    match &options.language {
        Language::Auto => params.set_detect_language(true),
        Language::Code(code) => params.set_language(Some(code)),
    }

    if let Some(n) = options.n_threads {
        params.set_n_threads(n as i32);
    }

    // Keep whisper.cpp quiet on stderr
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;
    info!(duration_secs = format!("{duration:.1}"), "running transcription");
    state.full(params, samples)?;

    let num_segments = state.full_n_segments();
    debug!(num_segments, "transcription complete");

    let mut text = String::new();
    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| Error::Transcription(format!("segment {i} not found")))?;
        let piece = segment
            .to_str_lossy()
            .map_err(|e| Error::Transcription(format!("segment text error: {e}")))?;
        text.push_str(&piece);
        text.push(' ');
    }

    Ok(normalize(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_samples() {
        let bytes = [0x00, 0x00, 0xff, 0x7f, 0x00, 0x80, 0x00, 0x40];
        let samples = pcm_to_samples(&bytes);
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 32767.0 / 32768.0).abs() < 1e-6);
        assert_eq!(samples[2], -1.0);
        assert_eq!(samples[3], 0.5);
    }

    #[test]
    fn test_pcm_to_samples_ignores_trailing_odd_byte() {
        assert_eq!(pcm_to_samples(&[0x00, 0x40, 0x01]).len(), 1);
    }

    #[test]
    fn test_samples_in_valid_range() {
        let bytes: Vec<u8> = (0..=u16::MAX).step_by(257).flat_map(u16::to_le_bytes).collect();
        for s in pcm_to_samples(&bytes) {
            assert!((-1.0..=1.0).contains(&s), "sample {s} out of range");
        }
    }

    #[test]
    fn test_read_pcm_missing_file() {
        let result = read_pcm(Path::new("/nonexistent/audio.pcm"));
        assert!(matches!(result, Err(Error::Transcription(_))));
    }

    #[test]
    fn test_transcribe_empty_samples() {
        let result = transcribe_samples(&[], Path::new("/unused"), &TranscribeOptions::default());
        assert!(matches!(result, Err(Error::Transcription(_))));
    }
}
