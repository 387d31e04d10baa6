//! Dataset acceptance checks.
//!
//! Every line is checked independently and every defect is reported; the
//! dataset passes only when no line has any.

use std::collections::HashSet;
use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::config::DEFAULT_LOCALE;
use crate::dataset::JsonlDataset;
use crate::error::Result;
use crate::types::{Platform, UgcType};

/// Fields every record must carry.
pub const REQUIRED_FIELDS: [&str; 9] = [
    "id",
    "platform",
    "language",
    "ugc_type",
    "hook_text",
    "cta_text",
    "script_text",
    "video_url",
    "terms_ok",
];

/// A single defect found on a dataset line.
#[derive(Debug, Clone, PartialEq)]
pub enum Defect {
    InvalidJson(String),
    MissingFields(Vec<String>),
    EmptyId,
    DuplicateId(String),
    InvalidPlatform(Value),
    InvalidLanguage(Value),
    InvalidUgcType(Value),
    InvalidUrl,
    TermsNotAccepted,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Defect::InvalidJson(e) => write!(f, "invalid json: {e}"),
            Defect::MissingFields(fields) => write!(f, "missing fields: {}", fields.join(", ")),
            Defect::EmptyId => write!(f, "empty id"),
            Defect::DuplicateId(id) => write!(f, "duplicate id: {id}"),
            Defect::InvalidPlatform(v) => write!(f, "invalid platform: {v}"),
            Defect::InvalidLanguage(v) => write!(f, "invalid language: {v}"),
            Defect::InvalidUgcType(v) => write!(f, "invalid ugc_type: {v}"),
            Defect::InvalidUrl => write!(f, "invalid video_url"),
            Defect::TermsNotAccepted => write!(f, "terms_ok must be true"),
        }
    }
}

/// A defect and the 1-based line it was found on.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub line: usize,
    pub defect: Defect,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[L{}] {}", self.line, self.defect)
    }
}

#[derive(Debug, Default)]
pub struct Report {
    /// Non-blank lines examined.
    pub records: usize,
    pub issues: Vec<Issue>,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Closed sets a record is checked against.
#[derive(Debug, Clone)]
pub struct Validator {
    languages: HashSet<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new([DEFAULT_LOCALE])
    }
}

impl Validator {
    pub fn new<I, S>(languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            languages: languages.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate the dataset file. A missing file is an error, not a report.
    pub fn validate_file(&self, path: &Path) -> Result<Report> {
        let file = JsonlDataset::new(path).open_existing()?;
        self.validate(BufReader::new(file))
    }

    pub fn validate<R: BufRead>(&self, reader: R) -> Result<Report> {
        let mut report = Report::default();
        let mut seen = HashSet::new();

        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            report.records += 1;

            for defect in self.check_line(line, &mut seen) {
                report.issues.push(Issue {
                    line: i + 1,
                    defect,
                });
            }
        }

        Ok(report)
    }

    fn check_line(&self, line: &str, seen: &mut HashSet<String>) -> Vec<Defect> {
        let ad: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => return vec![Defect::InvalidJson(e.to_string())],
        };
        let Some(obj) = ad.as_object() else {
            return vec![Defect::InvalidJson("not an object".into())];
        };

        let mut defects = Vec::new();
        let field = |name: &str| obj.get(name).cloned().unwrap_or(Value::Null);

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !obj.contains_key(**f))
            .map(|f| f.to_string())
            .collect();
        if !missing.is_empty() {
            defects.push(Defect::MissingFields(missing));
        }

        match obj.get("id") {
            None | Some(Value::Null) => defects.push(Defect::EmptyId),
            Some(Value::String(s)) if s.is_empty() => defects.push(Defect::EmptyId),
            Some(id) => {
                let key = id.as_str().map_or_else(|| id.to_string(), str::to_string);
                if !seen.insert(key.clone()) {
                    defects.push(Defect::DuplicateId(key));
                }
            }
        }

        let platform = field("platform");
        if !one_of(&platform, |s| Platform::ALL_NAMES.iter().any(|n| *n == s)) {
            defects.push(Defect::InvalidPlatform(platform));
        }

        let language = field("language");
        if !one_of(&language, |s| self.languages.contains(s)) {
            defects.push(Defect::InvalidLanguage(language));
        }

        let ugc_type = field("ugc_type");
        if !one_of(&ugc_type, |s| UgcType::ALL_NAMES.iter().any(|n| *n == s)) {
            defects.push(Defect::InvalidUgcType(ugc_type));
        }

        let url_ok = obj
            .get("video_url")
            .and_then(Value::as_str)
            .is_some_and(|u| u.starts_with("http://") || u.starts_with("https://"));
        if !url_ok {
            defects.push(Defect::InvalidUrl);
        }

        if obj.get("terms_ok") != Some(&Value::Bool(true)) {
            defects.push(Defect::TermsNotAccepted);
        }

        defects
    }
}

fn one_of(value: &Value, allowed: impl Fn(&str) -> bool) -> bool {
    value.as_str().is_some_and(allowed)
}
