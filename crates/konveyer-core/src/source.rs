//! Job sources: where the ordered list of URLs to process comes from.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::info;

use crate::error::{KonveyerError, Result};
use crate::links;

/// Where a batch run gets its work items. Resolved once at startup;
/// enumeration is read-only.
#[derive(Clone, Debug)]
pub enum JobSource {
    /// UTF-8 text file, one URL per line. Blank lines and `#` comments
    /// are skipped.
    File(PathBuf),
    /// YouTube search with a bounded result count.
    Search { query: String, limit: usize },
    /// Fixed in-memory list.
    List(Vec<String>),
}

impl JobSource {
    pub fn describe(&self) -> String {
        match self {
            JobSource::File(path) => format!("file:{}", path.display()),
            JobSource::Search { query, limit } => format!("search:{query} (limit {limit})"),
            JobSource::List(urls) => format!("list:{} urls", urls.len()),
        }
    }

    /// Produce the deterministic, ordered, deduplicated URL sequence.
    pub async fn enumerate(&self) -> Result<Vec<String>> {
        let urls = match self {
            JobSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    KonveyerError::SourceUnavailable {
                        origin: path.display().to_string(),
                        reason: e.to_string(),
                    }
                })?;
                parse_links(&content)
            }
            JobSource::Search { query, limit } => search_urls(query, *limit).await?,
            JobSource::List(urls) => {
                links::dedup_preserving_order(urls.iter().map(|u| links::normalize(u)).collect())
            }
        };
        info!(source = %self.describe(), count = urls.len(), "enumerated job source");
        Ok(urls)
    }
}

/// Parse a links file: skip blanks and comments, normalize live URLs,
/// dedup preserving order.
pub fn parse_links(content: &str) -> Vec<String> {
    let urls = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(links::normalize)
        .collect();
    links::dedup_preserving_order(urls)
}

/// Resolve a search query to watch URLs via yt-dlp's `ytsearchN:` scheme.
async fn search_urls(query: &str, limit: usize) -> Result<Vec<String>> {
    let target = format!("ytsearch{limit}:{query}");
    let output = Command::new("yt-dlp")
        .arg(&target)
        .arg("--flat-playlist")
        .arg("--print")
        .arg("id")
        .arg("--no-warnings")
        .output()
        .await
        .map_err(|e| KonveyerError::SourceUnavailable {
            origin: format!("search:{query}"),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(KonveyerError::SourceUnavailable {
            origin: format!("search:{query}"),
            reason: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let urls = stdout
        .lines()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://www.youtube.com/watch?v={id}"))
        .collect();
    Ok(links::dedup_preserving_order(urls))
}
