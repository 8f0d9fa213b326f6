//! Text normalization for topic names, keyword lists, and post URLs.

use std::collections::BTreeMap;

/// Normalize a topic name into its registry key.
///
/// Lowercases, drops every character that is neither a word character
/// (alphanumeric or `_`) nor whitespace, collapses whitespace runs into a
/// single space, and trims. Inputs that contain no word characters
/// normalize to an empty string.
#[must_use]
pub fn normalize_topic_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a comma-separated field into trimmed, non-empty tokens.
#[must_use]
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Union two comma-separated token lists.
///
/// Tokens are compared case-insensitively; the first spelling seen wins.
/// Output is sorted case-insensitively and joined with `", "` so the stored
/// value does not depend on which caller merged first.
#[must_use]
pub fn merge_csv_tokens(existing: &str, incoming: &str) -> String {
    let mut tokens: BTreeMap<String, String> = BTreeMap::new();
    for token in split_csv(existing).into_iter().chain(split_csv(incoming)) {
        tokens.entry(token.to_lowercase()).or_insert(token);
    }
    tokens.into_values().collect::<Vec<_>>().join(", ")
}

/// Canonical form of a post URL used as the global dedup key.
///
/// Returns `None` for blank or non-http(s) URLs. Strips the fragment and any
/// `utm_*` tracking parameters; everything else is kept verbatim.
#[must_use]
pub fn canonicalize_post_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return None;
    }

    let without_fragment = trimmed.split('#').next().unwrap_or(trimmed);
    let (base, query) = match without_fragment.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (without_fragment, None),
    };

    let kept: Vec<&str> = query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty() && !pair.starts_with("utm_"))
                .collect()
        })
        .unwrap_or_default();

    let url = if kept.is_empty() {
        base.to_string()
    } else {
        format!("{base}?{}", kept.join("&"))
    };

    if url.len() <= "https://".len() {
        return None;
    }
    Some(url)
}

/// Render a list of error strings for display: the first `max` joined with
/// `"; "`, followed by `"...and N more"` when the list was truncated.
#[must_use]
pub fn summarize_errors(errors: &[String], max: usize) -> String {
    if errors.len() <= max {
        return errors.join("; ");
    }
    let shown = errors[..max].join("; ");
    let rest = errors.len() - max;
    if shown.is_empty() {
        format!("...and {rest} more")
    } else {
        format!("{shown}; ...and {rest} more")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_punctuation_and_spacing() {
        assert_eq!(normalize_topic_name("AI Technology"), "ai technology");
        assert_eq!(normalize_topic_name("  AI   TECHNOLOGY "), "ai technology");
        assert_eq!(normalize_topic_name("Elon Musk!"), "elon musk");
        assert_eq!(normalize_topic_name("Rock & Roll"), "rock roll");
    }

    #[test]
    fn hyphen_is_removed_not_replaced() {
        // Punctuation is deleted, so hyphenated words fuse.
        assert_eq!(normalize_topic_name("ai-technology"), "aitechnology");
    }

    #[test]
    fn keeps_underscores_digits_and_unicode_letters() {
        assert_eq!(normalize_topic_name("Web_3 Café"), "web_3 café");
    }

    #[test]
    fn empty_and_punctuation_only_normalize_to_empty() {
        assert_eq!(normalize_topic_name(""), "");
        assert_eq!(normalize_topic_name("   \t\n"), "");
        assert_eq!(normalize_topic_name("?!...--"), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "AI Technology",
            "  Mixed\tCASE  input!! ",
            "été — hiver",
            "a__b  c",
            "",
        ] {
            let once = normalize_topic_name(input);
            assert_eq!(normalize_topic_name(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" tesla, ,spacex ,"), vec!["tesla", "spacex"]);
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn merge_unions_tokens_case_insensitively() {
        assert_eq!(merge_csv_tokens("tesla", "spacex"), "spacex, tesla");
        assert_eq!(merge_csv_tokens("Tesla, spacex", "tesla"), "spacex, Tesla");
        assert_eq!(merge_csv_tokens("", "neuralink"), "neuralink");
        assert_eq!(merge_csv_tokens("a, b", ""), "a, b");
    }

    #[test]
    fn merge_is_order_independent() {
        assert_eq!(
            merge_csv_tokens("tesla", "spacex"),
            merge_csv_tokens("spacex", "tesla")
        );
    }

    #[test]
    fn merge_does_not_treat_substrings_as_present() {
        assert_eq!(merge_csv_tokens("photography", "photo"), "photo, photography");
    }

    #[test]
    fn canonicalize_strips_fragment_and_tracking() {
        assert_eq!(
            canonicalize_post_url(" https://example.com/a?utm_source=x&id=3#top ").as_deref(),
            Some("https://example.com/a?id=3")
        );
        assert_eq!(
            canonicalize_post_url("https://example.com/a?utm_medium=rss").as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn canonicalize_rejects_blank_and_non_http() {
        assert_eq!(canonicalize_post_url(""), None);
        assert_eq!(canonicalize_post_url("   "), None);
        assert_eq!(canonicalize_post_url("ftp://example.com/file"), None);
        assert_eq!(canonicalize_post_url("https://"), None);
    }

    #[test]
    fn summarize_errors_truncates_with_count() {
        let errors: Vec<String> = (1..=5).map(|i| format!("e{i}")).collect();
        assert_eq!(summarize_errors(&errors, 3), "e1; e2; e3; ...and 2 more");
        assert_eq!(summarize_errors(&errors[..2], 3), "e1; e2");
        assert_eq!(summarize_errors(&errors, 0), "...and 5 more");
    }
}
