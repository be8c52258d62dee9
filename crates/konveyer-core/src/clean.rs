//! Links-file maintenance: probe and clean a links file, or rewrite live
//! URLs to their watch form.

use std::path::Path;
use std::time::Duration;

use tokio::fs;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{KonveyerError, Result};
use crate::links;
use crate::pipeline;
use crate::source;

/// Classification of one probed link.
#[derive(Debug, Clone)]
pub struct LinkVerdict {
    pub url: String,
    pub ok: bool,
    pub reason: String,
}

/// Probe a single URL via a metadata fetch and classify the failure modes
/// that commonly poison batch runs.
pub async fn classify_link(url: &str) -> LinkVerdict {
    if !links::is_youtube_url(url) {
        return LinkVerdict {
            url: url.to_string(),
            ok: false,
            reason: "not a recognized YouTube URL".to_string(),
        };
    }
    match pipeline::fetch_metadata(url).await {
        Ok(metadata) => LinkVerdict {
            url: url.to_string(),
            ok: true,
            reason: metadata.title,
        },
        Err(err) => {
            let text = err.to_string();
            let reason = if text.contains("live event will begin") {
                "future live event".to_string()
            } else if text.contains("Private video") {
                "private video".to_string()
            } else if text.contains("Video unavailable") {
                "video unavailable".to_string()
            } else {
                text
            };
            LinkVerdict {
                url: url.to_string(),
                ok: false,
                reason,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CleanReport {
    pub valid: Vec<String>,
    pub invalid: Vec<LinkVerdict>,
}

/// Test every link in `input` and write the survivors to `output` with a
/// provenance header. Fails with `SourceUnavailable` if no link survives.
pub async fn clean_links_file(
    input: &Path,
    output: &Path,
    probe_delay: Duration,
) -> Result<CleanReport> {
    let content =
        fs::read_to_string(input)
            .await
            .map_err(|e| KonveyerError::SourceUnavailable {
                origin: input.display().to_string(),
                reason: e.to_string(),
            })?;
    let all_links = source::parse_links(&content);

    let mut report = CleanReport::default();
    let total = all_links.len();
    for (i, url) in all_links.iter().enumerate() {
        let verdict = classify_link(url).await;
        if verdict.ok {
            info!(url = url.as_str(), title = verdict.reason.as_str(), "link ok");
            report.valid.push(url.clone());
        } else {
            warn!(url = url.as_str(), reason = verdict.reason.as_str(), "link rejected");
            report.invalid.push(verdict);
        }
        if !probe_delay.is_zero() && i + 1 < total {
            sleep(probe_delay).await;
        }
    }

    if report.valid.is_empty() {
        return Err(KonveyerError::SourceUnavailable {
            origin: input.display().to_string(),
            reason: "no valid links found".to_string(),
        });
    }

    let mut cleaned = String::new();
    cleaned.push_str("# Clean YouTube links (tested and verified)\n");
    cleaned.push_str(&format!("# Generated from {}\n", input.display()));
    cleaned.push_str(&format!("# Valid links: {}/{}\n\n", report.valid.len(), total));
    for url in &report.valid {
        cleaned.push_str(url);
        cleaned.push('\n');
    }
    fs::write(output, cleaned).await?;

    Ok(report)
}

/// Rewrite every live URL in `input` to the watch form and write the result
/// to `output`. Comments and blank lines are preserved. Returns the number
/// of converted URLs.
pub async fn convert_links_file(input: &Path, output: &Path) -> Result<usize> {
    let content =
        fs::read_to_string(input)
            .await
            .map_err(|e| KonveyerError::SourceUnavailable {
                origin: input.display().to_string(),
                reason: e.to_string(),
            })?;

    let mut converted = 0usize;
    let mut out = String::new();
    out.push_str("# Converted YouTube URLs (live URLs changed to video URLs)\n");
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        let rewritten = links::convert_live_url(trimmed);
        if rewritten != trimmed {
            converted += 1;
        }
        out.push_str(&rewritten);
        out.push('\n');
    }
    fs::write(output, out).await?;

    info!(converted, output = %output.display(), "converted links file");
    Ok(converted)
}
