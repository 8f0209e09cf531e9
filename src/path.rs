//! Slash-agnostic virtual path utilities.
//!
//! Virtual paths in the tree use `/`, but `\` is accepted on input and
//! canonicalized away. Leading and trailing separators are tolerated.

/// True for either path separator.
pub fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Splits a path into its non-empty segments.
///
/// `"a//b\\c/"` yields `["a", "b", "c"]`.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split(is_separator).filter(|s| !s.is_empty())
}

/// Joins two path fragments with exactly one `/` at the boundary.
pub fn concat_path(base: &str, child: &str) -> String {
    let base = base.trim_end_matches(is_separator);
    let child = child.trim_start_matches(is_separator);
    if base.is_empty() {
        return child.to_owned();
    }
    if child.is_empty() {
        return base.to_owned();
    }
    let mut joined = String::with_capacity(base.len() + 1 + child.len());
    joined.push_str(base);
    joined.push('/');
    joined.push_str(child);
    joined
}

/// The last segment of a path, or the path itself if it has no separators.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    match trimmed.rfind(is_separator) {
        Some(at) => &trimmed[at + 1..],
        None => trimmed,
    }
}

/// Everything before the last segment, or `None` at the root.
pub fn parent_path(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches(is_separator);
    trimmed
        .rfind(is_separator)
        .map(|at| trimmed[..at].trim_end_matches(is_separator))
}

/// The name with its final `.ext` removed, if it has one.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(at) => &name[..at],
    }
}

/// Resolves a relative path against a base, honoring `.` and `..`.
///
/// `..` that would climb above the base's root yields `None`.
pub fn relative_path(base: &str, relative: &str) -> Option<String> {
    let mut segments: Vec<&str> = split_path(base).collect();
    for seg in split_path(relative) {
        match seg {
            "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Name equality with configurable case sensitivity.
pub fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_skips_empty_segments() {
        let got: Vec<&str> = split_path("/a//b\\c/").collect();
        assert_eq!(got, ["a", "b", "c"]);
        assert_eq!(split_path("").count(), 0);
        assert_eq!(split_path("///").count(), 0);
    }

    #[test]
    fn concat_collapses_one_boundary() {
        assert_eq!(concat_path("a/b", "c"), "a/b/c");
        assert_eq!(concat_path("a/b/", "/c"), "a/b/c");
        assert_eq!(concat_path("", "c"), "c");
        assert_eq!(concat_path("a", ""), "a");
    }

    #[test]
    fn file_name_and_parent() {
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(file_name("c.txt"), "c.txt");
        assert_eq!(file_name("a/b/"), "b");
        assert_eq!(parent_path("a/b/c"), Some("a/b"));
        assert_eq!(parent_path("c"), None);
    }

    #[test]
    fn relative_rejects_escape() {
        assert_eq!(relative_path("a/b", "../c").as_deref(), Some("a/c"));
        assert_eq!(relative_path("a", "./x").as_deref(), Some("a/x"));
        assert_eq!(relative_path("", ".."), None);
        assert_eq!(relative_path("a", "../../x"), None);
    }

    #[test]
    fn extension_stripping() {
        assert_eq!(strip_extension("foo.gz"), "foo");
        assert_eq!(strip_extension("foo"), "foo");
        assert_eq!(strip_extension(".hidden"), ".hidden");
    }
}
