//! Field paths: segment model, string parsing, and pattern matchers.
//!
//! A path is a sequence of segments addressing a location in the nested
//! value tree. Each segment is either an object key or an array index.
//! Two string spellings parse to the same path: bracket form
//! (`list[0].name`) and dotted form (`list.0.name`).

use crate::{FormResult, PredicateFn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single segment in a field path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Object key access: `{"key": value}`
    Key(String),
    /// Array index access: `[index]`
    Index(usize),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Returns true if this is a key segment.
    #[inline]
    pub fn is_key(&self) -> bool {
        matches!(self, Seg::Key(_))
    }

    /// Returns true if this is an index segment.
    #[inline]
    pub fn is_index(&self) -> bool {
        matches!(self, Seg::Index(_))
    }

    /// Get the key if this is a key segment.
    #[inline]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Seg::Key(k) => Some(k),
            Seg::Index(_) => None,
        }
    }

    /// Get the index if this is an index segment.
    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Key(_) => None,
            Seg::Index(i) => Some(*i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A complete path into the value tree.
///
/// Paths are ordered segment sequences. The empty path denotes "no
/// field" and is never stored in any registry.
///
/// # Examples
///
/// ```
/// use formic::Path;
///
/// let path = Path::new().key("list").index(0).key("name");
/// assert_eq!(path.to_string(), "list[0].name");
/// assert_eq!(Path::parse("list.0.name"), path);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path.
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Parse a path string in dotted or bracket form.
    ///
    /// Numeric-looking segments become array indices, so
    /// `"list[0].name"` and `"list.0.name"` parse identically.
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut buf = String::new();
        let mut chars = input.chars().peekable();

        let flush = |buf: &mut String, segments: &mut Vec<Seg>| {
            if buf.is_empty() {
                return;
            }
            let seg = match buf.parse::<usize>() {
                Ok(i) => Seg::Index(i),
                Err(_) => Seg::Key(std::mem::take(buf)),
            };
            buf.clear();
            segments.push(seg);
        };

        while let Some(c) = chars.next() {
            match c {
                '.' => flush(&mut buf, &mut segments),
                '[' => {
                    flush(&mut buf, &mut segments);
                    let mut inner = String::new();
                    for c in chars.by_ref() {
                        if c == ']' {
                            break;
                        }
                        inner.push(c);
                    }
                    match inner.parse::<usize>() {
                        Ok(i) => segments.push(Seg::Index(i)),
                        Err(_) if !inner.is_empty() => segments.push(Seg::Key(inner)),
                        Err(_) => {}
                    }
                }
                _ => buf.push(c),
            }
        }
        flush(&mut buf, &mut segments);

        Self(segments)
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment onto the path (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Pop the last segment from the path.
    #[inline]
    pub fn pop(&mut self) -> Option<Seg> {
        self.0.pop()
    }

    /// Get the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Check if this path is empty ("no field").
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of segments in this path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the last segment.
    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Join this path with another path.
    #[inline]
    pub fn join(&self, other: &Path) -> Path {
        let mut result = self.clone();
        result.0.extend(other.0.iter().cloned());
        result
    }

    /// Append a segment and return a new path (non-mutating).
    #[inline]
    pub fn with_segment(&self, seg: Seg) -> Path {
        let mut result = self.clone();
        result.0.push(seg);
        result
    }

    /// Get the parent path (path without the last segment).
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            let mut p = self.clone();
            p.pop();
            Some(p)
        }
    }

    /// Check if this path starts with another path.
    #[inline]
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Strip a prefix, returning the remainder.
    #[inline]
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if self.starts_with(prefix) {
            Some(Path(self.0[prefix.len()..].to_vec()))
        } else {
            None
        }
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Seg::Key(k) if i == 0 => write!(f, "{k}")?,
                Seg::Key(k) => write!(f, ".{k}")?,
                Seg::Index(n) if i == 0 => write!(f, "{n}")?,
                Seg::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl From<String> for Path {
    fn from(s: String) -> Self {
        Path::parse(&s)
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Construct a `Path` from a sequence of segments.
///
/// # Examples
///
/// ```
/// use formic::path;
///
/// // String literals become Key segments, numbers become Index segments
/// let p = path!("list", 0, "name");
/// assert_eq!(p.to_string(), "list[0].name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::new()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::new();
        $(
            p.push($crate::Seg::from($seg));
        )+
        p
    }};
}

/// A compiled dependency/match pattern over stringified paths.
///
/// A pattern is a literal string (exact match), a regular expression
/// (tested against the stringified path), or a predicate receiving the
/// candidate path plus the full mounted-path list for context.
#[derive(Clone)]
pub enum PathPattern {
    /// Exact string equality against the stringified path.
    Exact(String),
    /// Regular expression tested against the stringified path.
    Regex(Regex),
    /// Arbitrary predicate `(path, all_paths) -> bool`.
    Predicate(PredicateFn),
}

impl PathPattern {
    /// Exact-match pattern.
    #[inline]
    pub fn exact(path: impl Into<String>) -> Self {
        PathPattern::Exact(path.into())
    }

    /// Regular-expression pattern.
    #[inline]
    pub fn regex(re: Regex) -> Self {
        PathPattern::Regex(re)
    }

    /// Compile a regular-expression pattern from its source string.
    pub fn regex_str(pattern: &str) -> FormResult<Self> {
        Ok(PathPattern::Regex(Regex::new(pattern)?))
    }

    /// Predicate pattern.
    #[inline]
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str, &[String]) -> bool + Send + Sync + 'static,
    {
        PathPattern::Predicate(std::sync::Arc::new(f))
    }

    /// Test this pattern against a stringified path, with the full
    /// mounted-path list available to predicates.
    pub fn matches(&self, path: &str, all_paths: &[String]) -> bool {
        match self {
            PathPattern::Exact(p) => p == path,
            PathPattern::Regex(re) => re.is_match(path),
            PathPattern::Predicate(f) => f(path, all_paths),
        }
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => f.debug_tuple("Exact").field(p).finish(),
            PathPattern::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            PathPattern::Predicate(_) => f.debug_tuple("Predicate").field(&"<fn>").finish(),
        }
    }
}

impl From<&str> for PathPattern {
    fn from(s: &str) -> Self {
        PathPattern::Exact(s.to_owned())
    }
}

impl From<String> for PathPattern {
    fn from(s: String) -> Self {
        PathPattern::Exact(s)
    }
}

impl From<Regex> for PathPattern {
    fn from(re: Regex) -> Self {
        PathPattern::Regex(re)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bracket_form() {
        let p = Path::parse("list[0].name");
        assert_eq!(
            p.segments(),
            &[Seg::key("list"), Seg::index(0), Seg::key("name")]
        );
    }

    #[test]
    fn test_parse_dotted_form() {
        assert_eq!(Path::parse("list.0.name"), Path::parse("list[0].name"));
    }

    #[test]
    fn test_parse_empty() {
        assert!(Path::parse("").is_empty());
    }

    #[test]
    fn test_display() {
        let p = Path::new().key("list").index(2).key("a");
        assert_eq!(p.to_string(), "list[2].a");
    }

    #[test]
    fn test_round_trip() {
        for s in ["list[0].name", "list.0.name", "a.b.c", "x[1][2]", "a"] {
            let parsed = Path::parse(s);
            assert_eq!(Path::parse(&parsed.to_string()), parsed, "input: {s}");
        }
    }

    #[test]
    fn test_normalized_forms_agree() {
        assert_eq!(
            Path::parse("list[0].name").to_string(),
            Path::parse("list.0.name").to_string()
        );
    }

    #[test]
    fn test_path_macro() {
        let p = path!("list", 0, "name");
        assert_eq!(p.len(), 3);
        assert_eq!(p[1], Seg::Index(0));
    }

    #[test]
    fn test_parent_and_prefix() {
        let p = path!("list", 0, "name");
        let parent = p.parent().unwrap();
        assert_eq!(parent, path!("list", 0));
        assert!(p.starts_with(&parent));
        assert_eq!(p.strip_prefix(&parent).unwrap(), path!("name"));
    }

    #[test]
    fn test_pattern_exact() {
        let pat = PathPattern::exact("a.b");
        assert!(pat.matches("a.b", &[]));
        assert!(!pat.matches("a.c", &[]));
    }

    #[test]
    fn test_pattern_regex() {
        let pat = PathPattern::regex(Regex::new(r"^list\[\d+\]\.name$").unwrap());
        assert!(pat.matches("list[3].name", &[]));
        assert!(!pat.matches("list.name", &[]));
    }

    #[test]
    fn test_pattern_regex_str() {
        let pat = PathPattern::regex_str(r"^user\.").unwrap();
        assert!(pat.matches("user.name", &[]));
        assert!(!pat.matches("account.name", &[]));

        let err = PathPattern::regex_str("(").unwrap_err();
        assert!(matches!(err, crate::FormError::InvalidPattern(_)));
    }

    #[test]
    fn test_pattern_predicate() {
        let pat = PathPattern::predicate(|path, all| all.iter().any(|p| p == path));
        let all = vec!["a".to_string(), "b".to_string()];
        assert!(pat.matches("a", &all));
        assert!(!pat.matches("c", &all));
    }

    #[test]
    fn test_serde() {
        let p = path!("list", 0, "name");
        let json = serde_json::to_string(&p).unwrap();
        let parsed: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(p, parsed);
    }
}
