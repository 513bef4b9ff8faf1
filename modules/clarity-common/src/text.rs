use std::sync::LazyLock;

use regex::Regex;

/// Summaries shorter than this are treated as placeholders.
pub const MIN_SUMMARY_CHARS: usize = 160;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Neutral baseline summary placeholder").unwrap());

/// Hostname of `url` without a leading `www.`. `None` for unparsable URLs.
pub fn outlet_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Canonical outlet key used by the outlet views: the first host label of a
/// domain, lowercased. `"www.Reuters.com"` becomes `"reuters"`.
pub fn canonical_outlet(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);
    domain.split('.').next().unwrap_or("").to_string()
}

/// Truncate to `max` characters, appending `marker` when anything was cut.
pub fn clamp_text(text: &str, max: usize, marker: &str) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", &text[..cut], marker),
    }
}

/// Truncate to `max` characters with no marker.
pub fn take_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        None => text,
        Some((cut, _)) => &text[..cut],
    }
}

/// Whether a digest summary is missing or low quality and should be
/// regenerated from the source article.
pub fn is_placeholder_summary(summary: Option<&str>) -> bool {
    let Some(summary) = summary else {
        return true;
    };
    let trimmed = summary.trim();
    trimmed.is_empty()
        || PLACEHOLDER_RE.is_match(trimmed)
        || trimmed.chars().count() < MIN_SUMMARY_CHARS
}

/// First line of a summary, used as a story title.
pub fn first_line(text: &str) -> &str {
    text.split('\n').next().unwrap_or("")
}
