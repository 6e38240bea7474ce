//! Word lists are configuration, not code: both lists ship with compiled-in
//! defaults and can be replaced by a one-word-per-line file at startup.

use std::fs;
use std::path::Path;

use anyhow::Context;

/// Default blocklist for the keyword fallback scan.
const DEFAULT_BLOCKLIST: &[&str] = &["fuck", "shit", "bastard", "bitch", "ass"];

/// Default list for the cheap boundary pre-filter. Kept short: anything it
/// misses is still caught by moderation proper.
const DEFAULT_PREFILTER: &[&str] = &["fuck", "shit"];

/// Fallback-scan blocklist, from `path` if given, defaults otherwise.
pub fn blocklist(path: Option<&Path>) -> anyhow::Result<Vec<String>> {
    load(path, DEFAULT_BLOCKLIST)
}

/// Pre-filter list, from `path` if given, defaults otherwise.
pub fn prefilter(path: Option<&Path>) -> anyhow::Result<Vec<String>> {
    load(path, DEFAULT_PREFILTER)
}

fn load(path: Option<&Path>, defaults: &[&str]) -> anyhow::Result<Vec<String>> {
    let Some(path) = path else {
        return Ok(defaults.iter().map(|w| w.to_string()).collect());
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading word list {}", path.display()))?;

    let words: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_lowercase)
        .collect();

    anyhow::ensure!(!words.is_empty(), "word list {} is empty", path.display());
    Ok(words)
}
