//! ZNode path helpers.
//!
//! Paths are absolute, `/`-separated strings. These functions are purely
//! textual: none of them talk to ZooKeeper.

/// The root of the ZNode namespace.
pub const ROOT: &str = "/";

/// The path segment separator.
pub const SEPARATOR: char = '/';

/// Length of the counter ZooKeeper appends to sequential node names (`%010d`).
pub const SEQUENTIAL_SUFFIX_LEN: usize = 10;

/// Return the parent of `path`, obtained by stripping its last segment.
///
/// The parent of a top-level node (and of the root itself) is the root.
/// A trailing separator denotes an empty last segment, so the parent of
/// `/seq/` is `/seq`.
pub fn parent(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

/// List the ancestors of `path`, shallowest first, excluding the root.
///
/// These are the nodes that must exist before `path` can be created.
///
/// ```
/// use hemmer_provider_zookeeper::path::ancestors;
///
/// assert_eq!(ancestors("/a/b/c"), vec!["/a", "/a/b"]);
/// assert_eq!(ancestors("/seq/"), vec!["/seq"]);
/// assert!(ancestors("/top").is_empty());
/// ```
pub fn ancestors(path: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut current = parent(path);
    while current != ROOT {
        paths.push(current.to_string());
        current = parent(current);
    }

    // Each ancestor is a strict prefix of the next one down, so ordering by
    // length puts every parent before its children.
    paths.sort_by_key(String::len);
    paths
}

/// Join a child name onto its parent path.
pub fn join_child(parent: &str, child: &str) -> String {
    if parent == ROOT {
        format!("{}{}", ROOT, child)
    } else {
        format!("{}{}{}", parent, SEPARATOR, child)
    }
}

/// Whether `path` starts at the root.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Strip the sequential counter from the path of a sequential node,
/// recovering the prefix it was created with.
///
/// The input is assumed to follow ZooKeeper's sequential naming; the last
/// [`SEQUENTIAL_SUFFIX_LEN`] characters are removed without checking that
/// they are digits. Shorter inputs yield an empty string.
///
/// ```
/// use hemmer_provider_zookeeper::path::remove_sequential_suffix;
///
/// assert_eq!(remove_sequential_suffix("/queue/job-0000000042"), "/queue/job-");
/// assert_eq!(remove_sequential_suffix("/queue/0000000042"), "/queue/");
/// ```
pub fn remove_sequential_suffix(path: &str) -> &str {
    let cut = path.len().saturating_sub(SEQUENTIAL_SUFFIX_LEN);
    // Sequential suffixes are ASCII digits, so a valid input always has a
    // char boundary here.
    path.get(..cut).unwrap_or_default()
}
