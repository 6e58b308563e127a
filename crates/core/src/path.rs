//! Helpers for slash-separated repository paths.

const ILLEGAL_PATH_CHARS: &[char] = &['[', ']', '*', '|', '"'];

/// Describe why `path` is not a well-formed absolute repository path, or
/// return `None` when it is.
pub fn path_problem(path: &str) -> Option<String> {
    if path.is_empty() {
        return Some("path must not be empty".to_owned());
    }
    if !path.starts_with('/') {
        return Some(format!("path '{}' must be absolute", path));
    }
    if path == "/" {
        return None;
    }
    if path.ends_with('/') {
        return Some(format!("path '{}' must not end with '/'", path));
    }
    if let Some(c) = path
        .chars()
        .find(|c| c.is_control() || ILLEGAL_PATH_CHARS.contains(c))
    {
        return Some(format!("path '{}' contains illegal character {:?}", path, c));
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Some(format!("path '{}' contains an empty segment", path)),
            "." | ".." => {
                return Some(format!(
                    "path '{}' contains a relative segment '{}'",
                    path, segment
                ))
            }
            _ => {}
        }
    }
    None
}

/// True if `path` is `root` itself or lies beneath it.
pub fn is_within(path: &str, root: &str) -> bool {
    if root == "/" {
        return path.starts_with('/');
    }
    path == root
        || (path.starts_with(root) && path.as_bytes().get(root.len()) == Some(&b'/'))
}

/// Parent of an absolute path; `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/"),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Rebase `path` from under `from` to under `to`. `path` must be within `from`.
pub fn rebase(path: &str, from: &str, to: &str) -> String {
    let suffix = &path[from.len()..];
    if to == "/" {
        if suffix.is_empty() {
            "/".to_owned()
        } else {
            suffix.to_owned()
        }
    } else {
        format!("{}{}", to, suffix)
    }
}
