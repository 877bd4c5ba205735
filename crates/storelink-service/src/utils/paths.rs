//! Helpers for virtual storage paths.
//!
//! Virtual paths always use `/` as separator, are absolute, and never contain `.` or `..`
//! segments once cleaned.

/// Normalizes a virtual path.
///
/// * `\` is treated as a separator,
/// * the result always starts with `/` and never ends with one (except for the root itself),
/// * empty and `.` segments are dropped,
/// * `..` pops the previous segment, but never escapes the root.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }

    let mut cleaned = String::with_capacity(path.len() + 1);
    for segment in &segments {
        cleaned.push('/');
        cleaned.push_str(segment);
    }
    if cleaned.is_empty() {
        cleaned.push('/');
    }
    cleaned
}

/// Whether both paths refer to the same location once cleaned.
pub fn path_equal(a: &str, b: &str) -> bool {
    clean_path(a) == clean_path(b)
}

/// Joins `path` onto `base` and cleans the result.
pub fn join(base: &str, path: &str) -> String {
    clean_path(&format!("{base}/{path}"))
}

/// Splits a cleaned path into its parent directory and its final segment.
///
/// The root splits into `("/", "")`.
pub fn split(path: &str) -> (String, String) {
    let path = clean_path(path);
    match path.rfind('/') {
        Some(0) => ("/".to_owned(), path[1..].to_owned()),
        Some(idx) => (path[..idx].to_owned(), path[idx + 1..].to_owned()),
        None => ("/".to_owned(), path),
    }
}

/// Returns `path` relative to `mount_path` if it lies inside that mount.
///
/// The result is itself an absolute path inside the mount.
pub fn strip_mount<'a>(mount_path: &str, path: &'a str) -> Option<&'a str> {
    if mount_path == "/" {
        return Some(path);
    }
    match path.strip_prefix(mount_path)? {
        "" => Some("/"),
        rest if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}
