//! Transcript text heuristics: normalization, sentence splitting, hook and CTA detection.

use crate::config::Heuristics;

/// Trim and collapse every whitespace run to a single space.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into sentences after `.`, `!` or `?` when followed by whitespace.
///
/// Every sentence is normalized and empty ones are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let text = text.trim();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let Some(&(next_i, next_c)) = chars.peek() else {
            break;
        };
        if next_c.is_whitespace() {
            push_sentence(&mut sentences, &text[start..next_i]);
            start = next_i;
        }
    }
    push_sentence(&mut sentences, &text[start..]);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let s = normalize(raw);
    if !s.is_empty() {
        sentences.push(s);
    }
}

/// Pick the opening line most likely to be the hook.
///
/// The first of the leading `hook_lookahead` sentences with at most
/// `hook_max_words` words, otherwise the very first sentence.
pub fn extract_hook(script: &str, heuristics: &Heuristics) -> String {
    let sentences = split_sentences(script);
    let Some(first) = sentences.first() else {
        return String::new();
    };

    sentences
        .iter()
        .take(heuristics.hook_lookahead)
        .find(|s| s.split_whitespace().count() <= heuristics.hook_max_words)
        .unwrap_or(first)
        .clone()
}

/// Pick the line most likely to be the call to action.
///
/// Patterns are tried in order against the lowercased script. For the first
/// pattern that matches, the last sentence also matching it wins. A pattern
/// that only matches across sentence boundaries is skipped. Without any
/// match the final sentence is returned.
pub fn extract_cta(script: &str, heuristics: &Heuristics) -> String {
    let sentences = split_sentences(script);
    let lowered = script.to_lowercase();

    for pattern in &heuristics.cta_patterns {
        if !pattern.is_match(&lowered) {
            continue;
        }
        if let Some(hit) = sentences
            .iter()
            .rev()
            .find(|s| pattern.is_match(&s.to_lowercase()))
        {
            return hit.clone();
        }
    }

    sentences.last().cloned().unwrap_or_default()
}
