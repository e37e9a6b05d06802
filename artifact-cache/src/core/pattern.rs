use super::error::Result;
use globset::{GlobBuilder, GlobMatcher};

/// Characters that start a glob construct
const META_CHARS: &[char] = &['*', '?', '[', '{', '\\'];

/// Compiled glob mask over stored paths
///
/// `*` and `?` never cross a `/`, `**` does.
#[derive(Debug, Clone)]
pub struct GlobMask {
    matcher: GlobMatcher,
    prefix: String,
}

impl GlobMask {
    pub fn new(pattern: &str) -> Result<Self> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();

        let prefix = match pattern.find(META_CHARS) {
            Some(idx) => pattern[..idx].to_string(),
            None => pattern.to_string(),
        };

        Ok(Self { matcher, prefix })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.matcher.is_match(path)
    }

    /// Literal text every matching path starts with
    pub fn literal_prefix(&self) -> &str {
        &self.prefix
    }

    pub fn pattern(&self) -> &str {
        self.matcher.glob().glob()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_star_stays_in_segment() {
        let mask = GlobMask::new("*.html").unwrap();
        assert!(mask.is_match("a.html"));
        assert!(!mask.is_match("dir/c.html"));
        assert!(!mask.is_match("b.txt"));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let mask = GlobMask::new("**/*.html").unwrap();
        assert!(mask.is_match("a.html"));
        assert!(mask.is_match("dir/c.html"));
        assert!(mask.is_match("dir/sub/d.html"));
        assert!(!mask.is_match("dir/e.txt"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let mask = GlobMask::new("posts/202[0-4]/?.md").unwrap();
        assert!(mask.is_match("posts/2023/a.md"));
        assert!(!mask.is_match("posts/2025/a.md"));
        assert!(!mask.is_match("posts/2023/ab.md"));
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(GlobMask::new("posts/**/*.md").unwrap().literal_prefix(), "posts/");
        assert_eq!(GlobMask::new("*.html").unwrap().literal_prefix(), "");
        assert_eq!(GlobMask::new("index.html").unwrap().literal_prefix(), "index.html");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(GlobMask::new("posts/[a-").is_err());
    }
}
