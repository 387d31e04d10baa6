use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::dataset::JsonlDataset;
use crate::error::Result;

/// How often a (case-folded) hook appears in the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCount {
    pub hook: String,
    pub count: usize,
}

/// Rank hooks by frequency, most common first; ties keep first-seen order.
pub fn top_hooks<R: BufRead>(reader: R, limit: usize) -> Result<Vec<HookCount>> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<HookCount> = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let ad: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = i + 1, error = %e, "skipping malformed dataset line");
                continue;
            }
        };

        let hook = ad
            .get("hook_text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        if hook.is_empty() {
            continue;
        }

        match index.get(&hook) {
            Some(&slot) => counts[slot].count += 1,
            None => {
                index.insert(hook.clone(), counts.len());
                counts.push(HookCount { hook, count: 1 });
            }
        }
    }

    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    Ok(counts)
}

/// [`top_hooks`] over a dataset file.
pub fn top_hooks_in_file(path: &Path, limit: usize) -> Result<Vec<HookCount>> {
    let file = JsonlDataset::new(path).open_existing()?;
    top_hooks(BufReader::new(file), limit)
}
