use crate::summary::RunSummary;
use crate::types::{RunState, Transcript, VideoSummary};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format transcript segments with timestamps
pub fn format_transcript_with_timestamps(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|seg| format!("[{}] {}", format_timestamp(seg.start), seg.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a run summary as a human-readable report: counts, success rate,
/// and every failed URL with its error classification.
pub fn format_run_summary_readable(summary: &RunSummary) -> String {
    let mut output = String::new();

    let state = match summary.state {
        RunState::Completed => "completed",
        RunState::Aborted => "aborted",
        RunState::Running => "running",
        RunState::Idle => "idle",
    };
    output.push_str(&format!("Run {} ({})\n\n", summary.run_id, state));
    output.push_str(&format!("Succeeded: {}\n", summary.succeeded));
    output.push_str(&format!("Failed:    {}\n", summary.failed));
    output.push_str(&format!("Skipped:   {}\n", summary.skipped));

    let attempted = summary.succeeded + summary.failed;
    if attempted > 0 {
        output.push_str(&format!(
            "Success rate: {:.1}%\n",
            summary.succeeded as f64 / attempted as f64 * 100.0
        ));
    }

    let failed: Vec<_> = summary.failed_items().collect();
    if !failed.is_empty() {
        output.push_str("\nFailed items:\n");
        for result in failed {
            let class = result
                .error_class
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            output.push_str(&format!("  [{}] {} - {}", result.index, result.url, class));
            if let Some(detail) = &result.detail {
                output.push_str(&format!(": {}", detail));
            }
            output.push('\n');
        }
    }

    output
}

/// Format a video summary as human-readable markdown
pub fn format_video_summary_readable(summary: &VideoSummary) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", summary.title));
    output.push_str(&format!(
        "**Duration:** {:.0} minutes | **Language:** {}\n\n",
        summary.duration_minutes, summary.language
    ));

    output.push_str("## Summary\n\n");
    output.push_str(&summary.summary);
    output.push_str("\n\n");

    output.push_str("## Topics\n\n");
    for topic in &summary.topics {
        output.push_str(&format!("• {}\n", topic));
    }
    output.push('\n');

    output.push_str("## Key Takeaways\n\n");
    for (i, takeaway) in summary.key_takeaways.iter().enumerate() {
        output.push_str(&format!("{}. {}\n", i + 1, takeaway));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use crate::summary::RunAggregator;
    use crate::types::{ProcessingResult, Segment};
    use uuid::Uuid;

    #[test]
    fn timestamps_format_as_mm_ss() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(65.4), "01:05");
        assert_eq!(format_timestamp(600.0), "10:00");
    }

    #[test]
    fn transcript_lines_carry_timestamps() {
        let transcript = Transcript {
            text: "a b".into(),
            segments: vec![
                Segment {
                    start: 0.0,
                    end: 1.0,
                    text: " a ".into(),
                },
                Segment {
                    start: 61.0,
                    end: 62.0,
                    text: "b".into(),
                },
            ],
            language: "en".into(),
        };
        assert_eq!(
            format_transcript_with_timestamps(&transcript),
            "[00:00] a\n[01:01] b"
        );
    }

    #[test]
    fn run_summary_lists_failures_with_class() {
        let mut agg = RunAggregator::new(Uuid::new_v4());
        agg.record(ProcessingResult::succeeded(
            0,
            "https://www.youtube.com/watch?v=ok",
            Vec::new(),
        ));
        agg.record(ProcessingResult::failed(
            1,
            "https://www.youtube.com/watch?v=bad",
            ErrorClass::InvalidInput,
            "not a recognized YouTube URL",
        ));
        let rendered = format_run_summary_readable(&agg.finalize(RunState::Completed));

        assert!(rendered.contains("Succeeded: 1"));
        assert!(rendered.contains("Failed:    1"));
        assert!(rendered.contains("Success rate: 50.0%"));
        assert!(rendered.contains("invalid input"));
        assert!(rendered.contains("watch?v=bad"));
    }
}
