//! Request URL construction

use regex::Regex;
use std::sync::LazyLock;

/// Matches a file extension right before the query, the fragment or the end
static EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.([0-9a-z]+)(?:[?#]|$)").expect("extension pattern is valid")
});

/// Join `path` onto `end_point`
///
/// Exactly one trailing slash is removed from the end point and one leading
/// slash from the path. With `mock_data` set, `.json` is appended unless the
/// joined URL already carries an extension.
pub fn build_url(end_point: &str, path: &str, mock_data: bool) -> String {
    let base = end_point.strip_suffix('/').unwrap_or(end_point);
    let path = path.strip_prefix('/').unwrap_or(path);
    let mut url = format!("{base}/{path}");

    if mock_data && !has_extension(&url) {
        url.push_str(".json");
    }

    url
}

/// Whether the URL ends in something that looks like a file extension
pub fn has_extension(url: &str) -> bool {
    EXTENSION.is_match(url)
}
