//! Slash-separated path handling and the default glob walk.
//!
//! Filesystem paths are relative and slash-separated on every platform:
//!
//! | Path | Valid | Why |
//! |------|-------|-----|
//! | `.` | yes | the root |
//! | `a/b.txt` | yes | |
//! | `a/b.txt?checksum=ff` | yes | query is not part of the path |
//! | `/a` | no | leading slash |
//! | `a/` | no | empty element |
//! | `a/../b` | no | `..` element |
//! | `./a` | no | `.` element |
//!
//! Glob patterns follow `path.Match`: `*` matches any run of non-separator
//! characters, `?` one non-separator character, `[...]` a character class
//! (`[!...]` or `[^...]` negated), and `\` escapes the next character.

use globset::{GlobBuilder, GlobMatcher};

use crate::{FileSystem, FsError};

/// Returns `true` if `name` is a valid filesystem path.
///
/// Anything after the first `?` is a query and is not checked.
///
/// ```rust
/// use layerfs::path::valid_path;
///
/// assert!(valid_path("."));
/// assert!(valid_path("dir/file.json?checksum=00ff"));
/// assert!(!valid_path("/etc/passwd"));
/// assert!(!valid_path("a/../../b"));
/// ```
pub fn valid_path(name: &str) -> bool {
    let path = name.split_once('?').map_or(name, |(path, _)| path);
    if path == "." {
        return true;
    }
    path.split('/')
        .all(|elem| !elem.is_empty() && elem != "." && elem != "..")
}

/// Validate `name`, reporting [`FsError::InvalidPath`] for `operation`.
pub fn check_path(operation: &'static str, name: &str) -> Result<(), FsError> {
    if valid_path(name) {
        Ok(())
    } else {
        Err(FsError::InvalidPath {
            path: name.to_string(),
            operation,
        })
    }
}

/// Returns `true` if `pattern` is a well-formed glob pattern.
pub fn valid_pattern(pattern: &str) -> bool {
    matcher(pattern).is_ok()
}

/// Validate `pattern`, reporting [`FsError::BadPattern`] for `operation`.
pub fn check_pattern(operation: &'static str, pattern: &str) -> Result<(), FsError> {
    matcher(pattern).map(|_| ()).map_err(|_| FsError::BadPattern {
        pattern: pattern.to_string(),
        operation,
    })
}

fn matcher(pattern: &str) -> Result<GlobMatcher, globset::Error> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
}

/// Returns `true` if `pattern` contains glob metacharacters.
pub fn has_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '\\'])
}

/// Lexically clean a slash-separated path.
///
/// Collapses repeated slashes, drops `.` elements, resolves `..` against the
/// preceding element and returns `.` for an empty result. A rooted path stays
/// rooted and `..` never climbs above its root.
///
/// ```rust
/// use layerfs::path::clean;
///
/// assert_eq!(clean("a//b/./c/.."), "a/b");
/// assert_eq!(clean(""), ".");
/// assert_eq!(clean("/../a"), "/a");
/// assert_eq!(clean("../a"), "../a");
/// ```
pub fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for elem in path.split('/') {
        match elem {
            "" | "." => {}
            ".." => match out.last() {
                Some(last) if *last != ".." => {
                    out.pop();
                }
                _ if !rooted => out.push(".."),
                _ => {}
            },
            elem => out.push(elem),
        }
    }
    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Join two path elements and clean the result.
///
/// An empty element is ignored; joining two empty elements yields an empty
/// string.
pub fn join(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, true) => String::new(),
        (true, false) => clean(name),
        (false, true) => clean(dir),
        (false, false) => clean(&format!("{dir}/{name}")),
    }
}

/// Split after the final slash into a directory (with trailing slash) and a
/// file name.
///
/// ```rust
/// use layerfs::path::split;
///
/// assert_eq!(split("a/b/c.txt"), ("a/b/", "c.txt"));
/// assert_eq!(split("c.txt"), ("", "c.txt"));
/// ```
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}

/// Prefix a (possibly query-carrying) name with a directory.
pub(crate) fn prefix(dir: &str, name: &str) -> String {
    if dir == "." {
        return name.to_string();
    }
    let (path, query) = match name.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (name, None),
    };
    let joined = if path == "." {
        dir.to_string()
    } else {
        format!("{dir}/{path}")
    };
    match query {
        Some(query) => format!("{joined}?{query}"),
        None => joined,
    }
}

/// Final element of a (possibly query-carrying) name.
pub(crate) fn base_name(name: &str) -> &str {
    let path = name.split_once('?').map_or(name, |(path, _)| path);
    path.rsplit('/').next().unwrap_or(path)
}

// Bounds the recursion on patterns with metacharacters in many directory
// elements.
const MAX_GLOB_DEPTH: usize = 10_000;

/// Glob over any filesystem using its `stat` and `read_dir`.
///
/// This is the walk behind [`FileSystem::glob`]'s default. Directories that
/// fail to list are skipped. Matches are returned sorted.
///
/// # Errors
///
/// - [`FsError::BadPattern`] if the pattern is malformed
pub fn glob<F: FileSystem + ?Sized>(fs: &F, pattern: &str) -> Result<Vec<String>, FsError> {
    let mut matches = glob_depth(fs, pattern, 0)?;
    matches.sort();
    matches.dedup();
    Ok(matches)
}

fn glob_depth<F: FileSystem + ?Sized>(
    fs: &F,
    pattern: &str,
    depth: usize,
) -> Result<Vec<String>, FsError> {
    let bad_pattern = || FsError::BadPattern {
        pattern: pattern.to_string(),
        operation: "glob",
    };
    if depth > MAX_GLOB_DEPTH {
        return Err(bad_pattern());
    }
    check_pattern("glob", pattern)?;
    if !has_meta(pattern) {
        return Ok(match fs.stat(pattern) {
            Ok(_) => vec![pattern.to_string()],
            Err(_) => Vec::new(),
        });
    }

    let (dir, file) = split(pattern);
    let dir = match dir {
        "" => ".",
        dir => &dir[..dir.len() - 1],
    };
    let file = matcher(file).map_err(|_| bad_pattern())?;

    if !has_meta(dir) {
        return Ok(glob_dir(fs, dir, &file));
    }
    if dir == pattern {
        return Err(bad_pattern());
    }
    let mut matches = Vec::new();
    for dir in glob_depth(fs, dir, depth + 1)? {
        matches.extend(glob_dir(fs, &dir, &file));
    }
    Ok(matches)
}

fn glob_dir<F: FileSystem + ?Sized>(fs: &F, dir: &str, file: &GlobMatcher) -> Vec<String> {
    let Ok(entries) = fs.read_dir(dir) else {
        return Vec::new();
    };
    entries
        .into_iter()
        .filter(|entry| file.is_match(&entry.name))
        .map(|entry| prefix(dir, &entry.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFs;

    fn fixture() -> MemoryFs {
        MemoryFs::new()
            .with_file("a.txt", "a")
            .with_file("b.json", "b")
            .with_file("dir/c.txt", "c")
            .with_file("dir/d.md", "d")
            .with_file("dir/sub/e.txt", "e")
            .with_file("other/f.txt", "f")
    }

    #[test]
    fn valid_path_cases() {
        for ok in [".", "a", "a/b", "a/b.txt?x=1", "a?x=/y", "..a", "a.b/c"] {
            assert!(valid_path(ok), "{ok} should be valid");
        }
        for bad in ["", "/", "/a", "a/", "a//b", "./a", "a/.", "..", "a/../b", "?x"] {
            assert!(!valid_path(bad), "{bad} should be invalid");
        }
    }

    #[test]
    fn check_path_reports_operation() {
        let err = check_path("open", "/a").unwrap_err();
        assert!(matches!(err, FsError::InvalidPath { operation: "open", .. }));
    }

    #[test]
    fn check_pattern_rejects_unclosed_class() {
        assert!(valid_pattern("*.txt"));
        assert!(valid_pattern("[abc]?"));
        assert!(!valid_pattern("[abc"));
        assert!(matches!(
            check_pattern("glob", "a/[b"),
            Err(FsError::BadPattern { .. })
        ));
    }

    #[test]
    fn clean_cases() {
        assert_eq!(clean("a/b/../c"), "a/c");
        assert_eq!(clean("./"), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("a/.."), ".");
        assert_eq!(clean("../../a"), "../../a");
        assert_eq!(clean("a/b/"), "a/b");
    }

    #[test]
    fn join_cases() {
        assert_eq!(join(".", "a"), "a");
        assert_eq!(join("a", "b/../c"), "a/c");
        assert_eq!(join("", ""), "");
        assert_eq!(join("a", ""), "a");
    }

    #[test]
    fn prefix_keeps_query() {
        assert_eq!(prefix(".", "a?x=1"), "a?x=1");
        assert_eq!(prefix("dir", "a?x=1"), "dir/a?x=1");
        assert_eq!(prefix("dir", "."), "dir");
        assert_eq!(prefix("dir", ".?x"), "dir?x");
    }

    #[test]
    fn base_name_ignores_query() {
        assert_eq!(base_name("a/b.json?x=1/2"), "b.json");
        assert_eq!(base_name("."), ".");
    }

    #[test]
    fn has_meta_detects_metacharacters() {
        assert!(has_meta("*.txt"));
        assert!(has_meta("a[bc]"));
        assert!(!has_meta("dir/file.txt"));
    }

    #[test]
    fn glob_top_level() {
        let fs = fixture();
        assert_eq!(glob(&fs, "*.txt").unwrap(), vec!["a.txt"]);
        assert_eq!(glob(&fs, "?.*").unwrap(), vec!["a.txt", "b.json"]);
    }

    #[test]
    fn glob_in_directory() {
        let fs = fixture();
        assert_eq!(glob(&fs, "dir/*").unwrap(), vec!["dir/c.txt", "dir/d.md", "dir/sub"]);
    }

    #[test]
    fn glob_star_does_not_cross_separator() {
        let fs = fixture();
        assert_eq!(glob(&fs, "*/*.txt").unwrap(), vec!["dir/c.txt", "other/f.txt"]);
        assert!(glob(&fs, "*.md").unwrap().is_empty());
    }

    #[test]
    fn glob_without_meta_uses_stat() {
        let fs = fixture();
        assert_eq!(glob(&fs, "dir/sub/e.txt").unwrap(), vec!["dir/sub/e.txt"]);
        assert!(glob(&fs, "missing.txt").unwrap().is_empty());
    }

    #[test]
    fn glob_bad_pattern() {
        let fs = fixture();
        assert!(matches!(glob(&fs, "[a"), Err(FsError::BadPattern { .. })));
    }

    #[test]
    fn glob_character_class() {
        let fs = fixture();
        assert_eq!(glob(&fs, "[ab].*").unwrap(), vec!["a.txt", "b.json"]);
        assert_eq!(glob(&fs, "[!a].*").unwrap(), vec!["b.json"]);
    }
}
