//! YouTube URL recognition and normalization.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

// Accepted URL shapes: watch pages, short links, live streams, shorts.
static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([\w-]+)",
        r"^(?:https?://)?(?:www\.)?youtu\.be/([\w-]+)",
        r"^(?:https?://)?(?:www\.)?youtube\.com/live/([\w-]+)",
        r"^(?:https?://)?(?:www\.)?youtube\.com/shorts/([\w-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

static LIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"youtube\.com/live/([\w-]+)").expect("static pattern"));

/// Whether the string is a recognizable YouTube URL.
pub fn is_youtube_url(url: &str) -> bool {
    let url = url.trim();
    URL_PATTERNS.iter().any(|re| re.is_match(url))
}

/// Extract the video identifier, used for deterministic artifact names.
pub fn video_id(url: &str) -> Option<String> {
    let url = url.trim();
    URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .map(|caps| caps[1].to_string())
}

/// Rewrite a `youtube.com/live/<id>` URL to the plain watch form. Live
/// streams usually become regular videos once they finish; the watch URL
/// works for both. Non-live URLs pass through unchanged.
pub fn convert_live_url(url: &str) -> String {
    match LIVE_RE.captures(url) {
        Some(caps) => format!("https://www.youtube.com/watch?v={}", &caps[1]),
        None => url.to_string(),
    }
}

/// Trim and rewrite live URLs to their watch form.
pub fn normalize(url: &str) -> String {
    convert_live_url(url.trim())
}

/// Remove duplicates while preserving first-seen order.
pub fn dedup_preserving_order(links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|link| seen.insert(link.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_all_accepted_shapes() {
        for url in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtube.com/live/R8yzlsqFKvQ?feature=share",
            "https://www.youtube.com/shorts/abc-123_XY",
            "youtube.com/watch?v=dQw4w9WgXcQ",
        ] {
            assert!(is_youtube_url(url), "should accept {url}");
        }
    }

    #[test]
    fn rejects_non_youtube_input() {
        for url in [
            "https://vimeo.com/12345",
            "not a url",
            "",
            "https://www.youtube.com/playlist?list=PL123",
        ] {
            assert!(!is_youtube_url(url), "should reject {url}");
        }
    }

    #[test]
    fn extracts_video_id_from_each_shape() {
        assert_eq!(
            video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            video_id("https://youtu.be/abc_-123").as_deref(),
            Some("abc_-123")
        );
        assert_eq!(
            video_id("https://youtube.com/live/R8yzlsqFKvQ?feature=share").as_deref(),
            Some("R8yzlsqFKvQ")
        );
        assert!(video_id("https://example.com/watch?v=x").is_none());
    }

    #[test]
    fn converts_live_urls_and_leaves_others_alone() {
        assert_eq!(
            convert_live_url("https://youtube.com/live/R8yzlsqFKvQ?feature=share"),
            "https://www.youtube.com/watch?v=R8yzlsqFKvQ"
        );
        let watch = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(convert_live_url(watch), watch);
    }

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let links = vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
            "c".to_string(),
            "b".to_string(),
        ];
        assert_eq!(dedup_preserving_order(links), vec!["a", "b", "c"]);
    }
}
