use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Dataset record identifier, rendered as `br_NNN` (zero-padded to at least 3 digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AdId(u64);

impl AdId {
    pub const PREFIX: &'static str = "br_";

    /// The identifier handed out for an empty dataset.
    pub const FIRST: AdId = AdId(1);

    pub fn new(n: u64) -> Self {
        AdId(n)
    }

    pub fn number(&self) -> u64 {
        self.0
    }

    /// The following identifier, or `None` once the numeric range is used up.
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add(1).map(AdId)
    }

    /// Whether `s` has the `br_<digits>` shape, regardless of magnitude.
    pub fn is_well_formed(s: &str) -> bool {
        s.strip_prefix(Self::PREFIX)
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
    }

    /// Parse the strict `br_<digits>` shape. Anything else, or a number too
    /// large to represent, yields `None`.
    pub fn parse(s: &str) -> Option<Self> {
        if !Self::is_well_formed(s) {
            return None;
        }
        s[Self::PREFIX.len()..].parse().ok().map(AdId)
    }
}

impl fmt::Display for AdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", Self::PREFIX, self.0)
    }
}

impl From<AdId> for String {
    fn from(id: AdId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for AdId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        AdId::parse(&s).ok_or_else(|| format!("malformed id: {s}"))
    }
}

/// Where an ad was published, derived from its URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Reels,
    Tiktok,
    Shorts,
    Linkedin,
    Other,
}

impl Platform {
    pub const ALL_NAMES: [&'static str; 5] = ["reels", "tiktok", "shorts", "linkedin", "other"];

    /// Classify a URL by substring rules, first match wins:
    /// tiktok, instagram → reels, youtube/youtu.be → shorts, linkedin.
    pub fn from_url(url: &str) -> Self {
        let u = url.to_lowercase();
        if u.contains("tiktok.com") {
            Platform::Tiktok
        } else if u.contains("instagram.com") {
            Platform::Reels
        } else if u.contains("youtube.com") || u.contains("youtu.be") {
            Platform::Shorts
        } else if u.contains("linkedin.com") {
            Platform::Linkedin
        } else {
            Platform::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Platform::Reels => "reels",
            Platform::Tiktok => "tiktok",
            Platform::Shorts => "shorts",
            Platform::Linkedin => "linkedin",
            Platform::Other => "other",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed vocabulary describing the content style of an ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UgcType {
    Testimonial,
    Unboxing,
    BeforeAfter,
    Review,
    Tutorial,
    Qna,
    Offer,
    Educational,
    Trend,
    ProductHaul,
}

impl UgcType {
    pub const ALL_NAMES: [&'static str; 10] = [
        "testimonial",
        "unboxing",
        "before_after",
        "review",
        "tutorial",
        "qna",
        "offer",
        "educational",
        "trend",
        "product_haul",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UgcType::Testimonial => "testimonial",
            UgcType::Unboxing => "unboxing",
            UgcType::BeforeAfter => "before_after",
            UgcType::Review => "review",
            UgcType::Tutorial => "tutorial",
            UgcType::Qna => "qna",
            UgcType::Offer => "offer",
            UgcType::Educational => "educational",
            UgcType::Trend => "trend",
            UgcType::ProductHaul => "product_haul",
        }
    }
}

impl FromStr for UgcType {
    type Err = Error;

    /// Exact, case-sensitive match against the closed set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testimonial" => Ok(UgcType::Testimonial),
            "unboxing" => Ok(UgcType::Unboxing),
            "before_after" => Ok(UgcType::BeforeAfter),
            "review" => Ok(UgcType::Review),
            "tutorial" => Ok(UgcType::Tutorial),
            "qna" => Ok(UgcType::Qna),
            "offer" => Ok(UgcType::Offer),
            "educational" => Ok(UgcType::Educational),
            "trend" => Ok(UgcType::Trend),
            "product_haul" => Ok(UgcType::ProductHaul),
            _ => Err(Error::InvalidUgcType(s.to_string())),
        }
    }
}

impl fmt::Display for UgcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interpret a consent flag. Only "1", "true", "yes" and "y" (any case) are truthy.
pub fn parse_consent(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "y"
    )
}

/// One ingested ad: a single line of the dataset. Field order is the on-disk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdRecord {
    pub id: AdId,
    pub platform: Platform,
    pub brand: String,
    pub category: String,
    pub language: String,
    pub ugc_type: UgcType,
    pub video_url: String,
    pub hook_text: String,
    pub cta_text: String,
    pub caption_text: Option<String>,
    pub script_text: String,
    pub duration_sec: Option<u64>,
    pub aspect_ratio: String,
    pub terms_ok: bool,
    pub notes: String,
}

impl AdRecord {
    /// Format as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Caller-supplied inputs for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub url: String,
    pub ugc_type: String,
    pub brand: String,
    pub category: String,
    pub terms_ok: bool,
}

impl IngestRequest {
    pub fn new(url: impl Into<String>, ugc_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ugc_type: ugc_type.into(),
            brand: String::new(),
            category: String::new(),
            terms_ok: false,
        }
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn terms_ok(mut self, ok: bool) -> Self {
        self.terms_ok = ok;
        self
    }
}

/// What a successful ingest reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub status: String,
    pub id: AdId,
    pub platform: Platform,
    pub hook_text: String,
    pub cta_text: String,
}

impl IngestSummary {
    pub fn ok(record: &AdRecord) -> Self {
        Self {
            status: "ok".into(),
            id: record.id,
            platform: record.platform,
            hook_text: record.hook_text.clone(),
            cta_text: record.cta_text.clone(),
        }
    }

    /// Format as a single JSON line.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
