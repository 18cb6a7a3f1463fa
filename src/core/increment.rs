// String helpers for page titles and slugs

use once_cell::sync::Lazy;
use regex::Regex;

static NON_SLUG_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_.]+").expect("static slug pattern"));

static VALID_SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("static slug pattern"));

/// Add or bump a trailing `separator + integer` suffix.
///
/// `"Foo"` becomes `"Foo 2"` and `"Foo 2"` becomes `"Foo 3"` with `" "` and
/// `first = 2`. A suffix too large to increment is treated as plain text and
/// a fresh suffix is appended.
pub fn increment_string(value: &str, separator: &str, first: u64) -> String {
    if !separator.is_empty() {
        if let Some((base, suffix)) = value.rsplit_once(separator) {
            let numeric = !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit());
            if !base.is_empty() && numeric {
                if let Some(next) = suffix.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
                    return format!("{}{}{}", base, separator, next);
                }
            }
        }
    }
    format!("{}{}{}", value, separator, first)
}

/// Derive a URL-safe slug from a page title
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    VALID_SLUG.is_match(slug)
}
