use std::fmt;
use std::path::PathBuf;

use regex::Regex;

use crate::error::{Error, Result};

/// Locale tag stamped on every record when none is given.
pub const DEFAULT_LOCALE: &str = "pt-BR";

/// Aspect ratio stamped on every record when none is given.
pub const DEFAULT_ASPECT_RATIO: &str = "9:16";

/// Dataset location when none is given, relative to the working directory.
pub const DEFAULT_DATASET_PATH: &str = "data/ads.jsonl";

/// Call-to-action phrasings for Brazilian Portuguese ads, in priority order.
pub const PT_BR_CTA_PATTERNS: &[&str] = &[
    r"\b(comente|comenta)\b.*\b(quero|planilha|me manda|eu quero)\b",
    r"\blink\s+na\s+bio\b",
    r"\bbaixe\b|\bbaixa\b|\bdownload\b",
    r"\buse\b.*\bcupom\b",
    r"\barrasta?\b|\bdesliza(r)?\b",
    r"\bse inscreva\b|\bassine\b|\bcadastre-se\b",
    r"\bprimeira compra\b",
];

/// A validated whisper language.
///
/// Accepts short codes ("pt", "en"), full names ("portuguese") or a locale
/// tag ("pt-BR"), which is reduced to its primary subtag.
#[derive(Debug, Clone, PartialEq)]
pub enum Language {
    /// Auto-detect language from audio.
    Auto,
    /// A validated language code as whisper expects it.
    Code(String),
}

impl Language {
    /// Create a language from a code or full name, validating against whisper.cpp.
    pub fn new(lang: &str) -> Result<Self> {
        let lower = lang.trim().to_lowercase();
        if lower == "auto" {
            return Ok(Language::Auto);
        }

        match whisper_rs::get_lang_id(&lower) {
            Some(id) => {
                let code = whisper_rs::get_lang_str(id).unwrap_or(&lower).to_string();
                Ok(Language::Code(code))
            }
            None => Err(Error::UnsupportedLanguage(lang.to_string())),
        }
    }

    /// Derive the transcription language from a locale tag like "pt-BR".
    pub fn from_locale(locale: &str) -> Result<Self> {
        let primary = locale.split(['-', '_']).next().unwrap_or_default();
        Self::new(primary).map_err(|_| Error::UnsupportedLanguage(locale.to_string()))
    }

    /// Short language code, or None for Auto.
    pub fn code(&self) -> Option<&str> {
        match self {
            Language::Auto => None,
            Language::Code(code) => Some(code),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Auto => write!(f, "auto"),
            Language::Code(code) => write!(f, "{code}"),
        }
    }
}

/// Whisper model sizes.
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Tiny,
    Base,
    Small,
    Medium,
    LargeV2,
    LargeV3,
    LargeV3Turbo,
    /// User-provided .ggml file path.
    Custom(PathBuf),
}

impl Model {
    /// Model filename as used by HuggingFace / whisper.cpp.
    pub fn filename(&self) -> String {
        match self {
            Model::Custom(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom-model".into()),
            other => format!("ggml-{}.bin", other.name()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Model::Tiny => "tiny",
            Model::Base => "base",
            Model::Small => "small",
            Model::Medium => "medium",
            Model::LargeV2 => "large-v2",
            Model::LargeV3 => "large-v3",
            Model::LargeV3Turbo => "large-v3-turbo",
            Model::Custom(_) => "custom",
        }
    }

    /// Parse a model name (e.g. CLI argument). Unknown names are treated as
    /// a path to a local model file when that file exists.
    pub fn parse_name(s: &str) -> Option<Self> {
        match s {
            "tiny" => Some(Model::Tiny),
            "base" => Some(Model::Base),
            "small" => Some(Model::Small),
            "medium" => Some(Model::Medium),
            "large-v2" => Some(Model::LargeV2),
            "large-v3" => Some(Model::LargeV3),
            "large-v3-turbo" => Some(Model::LargeV3Turbo),
            other => {
                let path = PathBuf::from(other);
                path.exists().then_some(Model::Custom(path))
            }
        }
    }
}

/// Options for the whisper transcription backend.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub model: Model,
    pub language: Language,
    pub n_threads: Option<u32>,
    pub gpu: bool,
    pub beam_size: Option<u32>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            model: Model::Small,
            language: Language::Code("pt".into()),
            n_threads: None,
            gpu: true,
            beam_size: None,
            cache_dir: None,
        }
    }
}

impl TranscribeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: Model) -> Self {
        self.model = model;
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn n_threads(mut self, n: u32) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidOption("thread count must be at least 1".into()));
        }
        self.n_threads = Some(n);
        Ok(self)
    }

    pub fn gpu(mut self, enabled: bool) -> Self {
        self.gpu = enabled;
        self
    }

    pub fn beam_size(mut self, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidOption("beam size must be at least 1".into()));
        }
        self.beam_size = Some(size);
        Ok(self)
    }

    pub fn cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Resolve the model cache directory, defaulting to ~/.cache/ugcads/models.
    pub fn resolve_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("ugcads")
                .join("models")
        })
    }
}

/// Tunable text heuristics for hook and CTA detection.
///
/// Patterns are matched against lowercased text, in list order.
#[derive(Debug, Clone)]
pub struct Heuristics {
    pub cta_patterns: Vec<Regex>,
    /// A hook candidate must have at most this many whitespace-separated words.
    pub hook_max_words: usize,
    /// How many leading sentences are considered as hook candidates.
    pub hook_lookahead: usize,
}

impl Heuristics {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let cta_patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            cta_patterns,
            hook_max_words: 14,
            hook_lookahead: 3,
        })
    }

    /// The Brazilian Portuguese pattern library.
    pub fn pt_br() -> Self {
        Self::new(PT_BR_CTA_PATTERNS).expect("valid built-in patterns")
    }

    pub fn hook_max_words(mut self, n: usize) -> Self {
        self.hook_max_words = n;
        self
    }

    pub fn hook_lookahead(mut self, n: usize) -> Self {
        self.hook_lookahead = n;
        self
    }
}

impl Default for Heuristics {
    fn default() -> Self {
        Self::pt_br()
    }
}

/// Options for one pipeline instance.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub locale: String,
    pub aspect_ratio: String,
    pub dataset_path: PathBuf,
    pub transcribe: TranscribeOptions,
    pub heuristics: Heuristics,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.into(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.into(),
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            transcribe: TranscribeOptions::default(),
            heuristics: Heuristics::default(),
        }
    }
}

impl IngestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the locale tag and derive the transcription language from it.
    pub fn locale(mut self, locale: &str) -> Result<Self> {
        self.transcribe.language = Language::from_locale(locale)?;
        self.locale = locale.to_string();
        Ok(self)
    }

    pub fn aspect_ratio(mut self, aspect_ratio: impl Into<String>) -> Self {
        self.aspect_ratio = aspect_ratio.into();
        self
    }

    pub fn dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = path.into();
        self
    }

    pub fn transcribe(mut self, transcribe: TranscribeOptions) -> Self {
        self.transcribe = transcribe;
        self
    }

    pub fn heuristics(mut self, heuristics: Heuristics) -> Self {
        self.heuristics = heuristics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pt_br_patterns_compile() {
        let h = Heuristics::new(PT_BR_CTA_PATTERNS).unwrap();
        assert_eq!(h.cta_patterns.len(), PT_BR_CTA_PATTERNS.len());
        assert_eq!(Heuristics::pt_br().cta_patterns.len(), PT_BR_CTA_PATTERNS.len());
    }

    #[test]
    fn test_heuristics_defaults() {
        let h = Heuristics::default();
        assert_eq!(h.hook_max_words, 14);
        assert_eq!(h.hook_lookahead, 3);
    }

    #[test]
    fn test_heuristics_rejects_bad_pattern() {
        let result = Heuristics::new(&["(unclosed"]);
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_model_filename() {
        assert_eq!(Model::Small.filename(), "ggml-small.bin");
        assert_eq!(Model::LargeV3Turbo.filename(), "ggml-large-v3-turbo.bin");
        assert_eq!(
            Model::Custom(PathBuf::from("/models/my.bin")).filename(),
            "my.bin"
        );
    }

    #[test]
    fn test_model_parse_name() {
        assert_eq!(Model::parse_name("small"), Some(Model::Small));
        assert_eq!(Model::parse_name("large-v3"), Some(Model::LargeV3));
        assert_eq!(Model::parse_name("/nonexistent/model.bin"), None);
    }

    #[test]
    fn test_language_from_locale() {
        assert_eq!(Language::from_locale("pt-BR").unwrap(), Language::Code("pt".into()));
        assert_eq!(Language::from_locale("en_US").unwrap(), Language::Code("en".into()));
        assert!(matches!(
            Language::from_locale("xx-YY"),
            Err(Error::UnsupportedLanguage(tag)) if tag == "xx-YY"
        ));
    }

    #[test]
    fn test_language_full_name() {
        assert_eq!(Language::new("Portuguese").unwrap().code(), Some("pt"));
        assert_eq!(Language::new("auto").unwrap(), Language::Auto);
    }

    #[test]
    fn test_options_defaults() {
        let opts = IngestOptions::default();
        assert_eq!(opts.locale, "pt-BR");
        assert_eq!(opts.aspect_ratio, "9:16");
        assert_eq!(opts.dataset_path, PathBuf::from("data/ads.jsonl"));
        assert_eq!(opts.transcribe.model, Model::Small);
    }

    #[test]
    fn test_options_locale_updates_language() {
        let opts = IngestOptions::new().locale("en-US").unwrap();
        assert_eq!(opts.locale, "en-US");
        assert_eq!(opts.transcribe.language.code(), Some("en"));
    }

    #[test]
    fn test_transcribe_options_rejects_zero() {
        assert!(matches!(
            TranscribeOptions::new().n_threads(0),
            Err(Error::InvalidOption(_))
        ));
        assert!(matches!(
            TranscribeOptions::new().beam_size(0),
            Err(Error::InvalidOption(_))
        ));
        assert_eq!(TranscribeOptions::new().beam_size(5).unwrap().beam_size, Some(5));
    }

    #[test]
    fn test_resolve_cache_dir_override() {
        let opts = TranscribeOptions::new().cache_dir(PathBuf::from("/tmp/models"));
        assert_eq!(opts.resolve_cache_dir(), PathBuf::from("/tmp/models"));
    }
}
