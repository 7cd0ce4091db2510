//! Input resolution: read source abstracts from a local file or a URL.
//!
//! Two layouts are accepted, whichever way the abstracts were collected:
//!
//! - a JSON array of strings (`["abstract one", "abstract two"]`)
//! - plain text with one abstract per block, blocks separated by a blank line
//!
//! The texts are returned as found. Cleaning happens later so the batch
//! statistics can report how many sources were dropped.

use crate::config::QuizConfig;
use crate::error::QuizError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info};

static RE_BLANK_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").unwrap());

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read the abstracts behind `input`, a local path or an HTTP(S) URL.
///
/// Downloads are bounded by `config.download_timeout_secs`.
pub async fn load_sources(input: &str, config: &QuizConfig) -> Result<Vec<String>, QuizError> {
    let content = if is_url(input) {
        download_text(input, config.download_timeout_secs).await?
    } else {
        read_local(input).await?
    };
    let sources = parse_sources(&content);
    debug!("Loaded {} source block(s) from {}", sources.len(), input);
    Ok(sources)
}

/// Split file content into individual abstracts.
///
/// A top-level JSON array of strings is taken as-is; anything else is
/// split on blank lines. Blocks that are only whitespace are skipped.
pub fn parse_sources(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return list;
        }
    }
    RE_BLANK_LINE
        .split(trimmed)
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(str::to_string)
        .collect()
}

async fn read_local(path_str: &str) -> Result<String, QuizError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(QuizError::InputNotFound { path })
        }
        Err(e) => Err(QuizError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

async fn download_text(url: &str, timeout_secs: u64) -> Result<String, QuizError> {
    info!("Downloading sources from: {}", url);

    let failed = |reason: String| QuizError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!("timed out after {timeout_secs}s"))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    response.text().await.map_err(|e| failed(e.to_string()))
}
