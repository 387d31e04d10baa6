use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::{AdId, AdRecord};

/// Storage for ingested records.
///
/// `lock` guards the read-allocate-append sequence so that `next_id` and the
/// following `append` see the same dataset.
pub trait AdRepository {
    type Guard;

    /// Take exclusive write access until the guard is dropped.
    fn lock(&self) -> Result<Self::Guard>;

    /// The identifier the next appended record should carry.
    fn next_id(&self) -> Result<AdId>;

    /// Durably append one record.
    fn append(&self, record: &AdRecord) -> Result<()>;
}

/// Compute the next identifier from dataset lines.
///
/// Blank lines, lines that aren't JSON objects and ids not shaped like
/// `br_<digits>` are skipped. A well-formed id too large to have a successor
/// fails with [`Error::IdSpaceExhausted`] rather than reusing a lower number.
pub fn next_id_from_lines<R: BufRead>(reader: R) -> Result<AdId> {
    let mut max: Option<AdId> = None;
    let mut oversized: Option<String> = None;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = i + 1, error = %e, "skipping malformed dataset line");
                continue;
            }
        };

        let raw = value.get("id").and_then(Value::as_str).unwrap_or_default();
        match AdId::parse(raw) {
            Some(id) => max = max.max(Some(id)),
            None if AdId::is_well_formed(raw) => {
                warn!(line = i + 1, id = raw, "id exceeds the allocatable range");
                oversized.get_or_insert_with(|| raw.to_string());
            }
            None => debug!(line = i + 1, id = raw, "ignoring non-conforming id"),
        }
    }

    if let Some(raw) = oversized {
        return Err(Error::IdSpaceExhausted(raw));
    }
    match max {
        None => Ok(AdId::FIRST),
        Some(id) => id
            .next()
            .ok_or_else(|| Error::IdSpaceExhausted(id.to_string())),
    }
}

/// Append-only JSON Lines file, one [`AdRecord`] per line.
#[derive(Debug, Clone)]
pub struct JsonlDataset {
    path: PathBuf,
}

impl JsonlDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Every line that parses as a complete record, in file order.
    pub fn records(&self) -> Result<Vec<AdRecord>> {
        let file = self.open_existing()?;
        let mut records = Vec::new();

        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AdRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = i + 1, error = %e, "skipping unreadable record"),
            }
        }

        Ok(records)
    }

    /// Find the record with this exact id.
    pub fn find_by_id(&self, id: &str) -> Result<AdRecord> {
        self.records()?
            .into_iter()
            .find(|r| r.id.to_string() == id)
            .ok_or_else(|| Error::RecordNotFound(format!("id {id}")))
    }

    /// Find the single record whose URL contains `needle`.
    pub fn find_by_url(&self, needle: &str) -> Result<AdRecord> {
        let mut matches: Vec<AdRecord> = self
            .records()?
            .into_iter()
            .filter(|r| r.video_url.contains(needle))
            .collect();

        match matches.len() {
            0 => Err(Error::RecordNotFound(format!("url containing '{needle}'"))),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::AmbiguousRecord(
                matches.iter().map(|r| r.id.to_string()).collect(),
            )),
        }
    }

    pub(crate) fn open_existing(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DatasetNotFound {
                    path: self.path.clone(),
                }
            } else {
                Error::Io(e)
            }
        })
    }
}

impl AdRepository for JsonlDataset {
    type Guard = DatasetLock;

    fn lock(&self) -> Result<DatasetLock> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        DatasetLock::acquire(self.lock_path())
    }

    fn next_id(&self) -> Result<AdId> {
        match File::open(&self.path) {
            Ok(file) => next_id_from_lines(BufReader::new(file)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AdId::FIRST),
            Err(e) => Err(e.into()),
        }
    }

    fn append(&self, record: &AdRecord) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        info!(id = %record.id, path = %self.path.display(), "record appended");
        Ok(())
    }
}

/// Exclusive writer lock held as a sidecar file; removed when dropped.
#[derive(Debug)]
pub struct DatasetLock {
    path: PathBuf,
}

impl DatasetLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())?;
                debug!(path = %path.display(), "dataset lock acquired");
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::DatasetLocked { path })
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for DatasetLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release dataset lock");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{Platform, UgcType};
    use std::fs;
    use std::io::Cursor;

    pub(crate) fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ugcads_test_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub(crate) fn sample_record(id: u64) -> AdRecord {
        AdRecord {
            id: AdId::new(id),
            platform: Platform::Reels,
            brand: "Café Lá".into(),
            category: "casa".into(),
            language: "pt-BR".into(),
            ugc_type: UgcType::Review,
            video_url: format!("https://instagram.com/reel/{id}"),
            hook_text: "Olha essa caneca!".into(),
            cta_text: "Comente QUERO e te mando o link.".into(),
            caption_text: None,
            script_text: "Olha essa caneca! Comente QUERO e te mando o link.".into(),
            duration_sec: Some(27),
            aspect_ratio: "9:16".into(),
            terms_ok: true,
            notes: "test".into(),
        }
    }

    #[test]
    fn test_next_id_empty_input() {
        assert_eq!(next_id_from_lines(Cursor::new("")).unwrap(), AdId::new(1));
    }

    #[test]
    fn test_next_id_takes_max_not_last() {
        let data = "{\"id\":\"br_003\"}\n{\"id\":\"br_010\"}\n{\"id\":\"br_007\"}\n";
        assert_eq!(next_id_from_lines(Cursor::new(data)).unwrap().to_string(), "br_011");
    }

    #[test]
    fn test_next_id_skips_malformed() {
        let data = concat!(
            "{\"id\":\"br_002\"}\n",
            "not json at all\n",
            "\n",
            "   \n",
            "{\"id\":\"ad_900\"}\n",
            "{\"id\":\"br_9x\"}\n",
            "{\"id\":900}\n",
            "{\"no_id\":true}\n",
            "[\"br_500\"]\n",
        );
        assert_eq!(next_id_from_lines(Cursor::new(data)).unwrap().to_string(), "br_003");
    }

    #[test]
    fn test_next_id_only_malformed_starts_at_one() {
        let data = "garbage\n{\"id\":\"x\"}\n";
        assert_eq!(next_id_from_lines(Cursor::new(data)).unwrap().to_string(), "br_001");
    }

    #[test]
    fn test_next_id_grows_past_three_digits() {
        let data = "{\"id\":\"br_999\"}\n";
        assert_eq!(next_id_from_lines(Cursor::new(data)).unwrap().to_string(), "br_1000");
    }

    #[test]
    fn test_next_id_at_numeric_limit_is_an_error() {
        let data = format!("{{\"id\":\"br_001\"}}\n{{\"id\":\"br_{}\"}}\n", u64::MAX);
        match next_id_from_lines(Cursor::new(data)) {
            Err(Error::IdSpaceExhausted(id)) => assert_eq!(id, format!("br_{}", u64::MAX)),
            other => panic!("expected exhausted id space, got {other:?}"),
        }
    }

    #[test]
    fn test_next_id_never_goes_below_oversized_id() {
        let data = "{\"id\":\"br_005\"}\n{\"id\":\"br_99999999999999999999999\"}\n";
        assert!(matches!(
            next_id_from_lines(Cursor::new(data)),
            Err(Error::IdSpaceExhausted(_))
        ));
    }

    #[test]
    fn test_next_id_just_below_limit() {
        let data = format!("{{\"id\":\"br_{}\"}}\n", u64::MAX - 1);
        assert_eq!(next_id_from_lines(Cursor::new(data)).unwrap(), AdId::new(u64::MAX));
    }

    #[test]
    fn test_next_id_missing_file() {
        let dataset = JsonlDataset::new("/nonexistent/ugcads/ads.jsonl");
        assert_eq!(dataset.next_id().unwrap(), AdId::FIRST);
    }

    #[test]
    fn test_append_then_read_last_line_round_trips() {
        let dir = scratch_dir("round_trip");
        let dataset = JsonlDataset::new(dir.join("nested").join("ads.jsonl"));

        let first = sample_record(1);
        let mut second = sample_record(2);
        second.caption_text = Some("Promoção relâmpago ☕".into());
        second.duration_sec = None;

        dataset.append(&first).unwrap();
        dataset.append(&second).unwrap();

        let content = fs::read_to_string(dataset.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        let last: AdRecord = serde_json::from_str(content.lines().last().unwrap()).unwrap();
        assert_eq!(last, second);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_append_keeps_unicode_unescaped() {
        let dir = scratch_dir("unicode");
        let dataset = JsonlDataset::new(dir.join("ads.jsonl"));
        dataset.append(&sample_record(1)).unwrap();

        let content = fs::read_to_string(dataset.path()).unwrap();
        assert!(content.contains("Café Lá"));
        assert!(!content.contains("\\u"));
        assert!(content.ends_with('\n'));
        assert!(content.starts_with("{\"id\":\"br_001\",\"platform\":\"reels\""));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_append_never_rewrites_existing_lines() {
        let dir = scratch_dir("append_only");
        let path = dir.join("ads.jsonl");
        fs::write(&path, "legacy line kept as is\n").unwrap();

        let dataset = JsonlDataset::new(&path);
        assert_eq!(dataset.next_id().unwrap(), AdId::FIRST);
        dataset.append(&sample_record(1)).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("legacy line kept as is\n"));
        assert_eq!(dataset.next_id().unwrap().to_string(), "br_002");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_lock_is_exclusive_and_released() {
        let dir = scratch_dir("lock");
        let dataset = JsonlDataset::new(dir.join("data").join("ads.jsonl"));

        let guard = dataset.lock().unwrap();
        assert!(matches!(dataset.lock(), Err(Error::DatasetLocked { .. })));
        drop(guard);

        assert!(!dir.join("data").join("ads.jsonl.lock").exists());
        assert!(dataset.lock().is_ok());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_find_by_id_and_url() {
        let dir = scratch_dir("find");
        let dataset = JsonlDataset::new(dir.join("ads.jsonl"));
        for n in 1..=3 {
            dataset.append(&sample_record(n)).unwrap();
        }

        assert_eq!(dataset.find_by_id("br_002").unwrap().id, AdId::new(2));
        assert!(matches!(dataset.find_by_id("br_009"), Err(Error::RecordNotFound(_))));

        assert_eq!(dataset.find_by_url("reel/3").unwrap().id, AdId::new(3));
        match dataset.find_by_url("instagram.com") {
            Err(Error::AmbiguousRecord(ids)) => assert_eq!(ids, ["br_001", "br_002", "br_003"]),
            other => panic!("expected ambiguity, got {other:?}"),
        }

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_records_missing_file() {
        let dataset = JsonlDataset::new("/nonexistent/ugcads/ads.jsonl");
        assert!(matches!(dataset.records(), Err(Error::DatasetNotFound { .. })));
    }
}
