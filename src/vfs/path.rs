//! Path cleaning shared by every source
//!
//! Logical paths are slash separated and rooted at the source root. A cleaned
//! path has no leading or trailing slash, no `.` components, and `..` can
//! never climb above the root. The root itself cleans to the empty string.

/// Clean a logical path.
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Join a directory and a child name into a cleaned path.
pub fn join(dir: &str, name: &str) -> String {
    clean(&format!("{}/{}", dir, name))
}

/// Components of a cleaned path (empty for the root).
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Last component of a path, or the empty string for the root.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}
