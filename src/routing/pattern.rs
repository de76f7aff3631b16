//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Compile `users/{id}/posts` style templates into segment matchers
//! - Match normalized request paths against a compiled template
//!
//! # Design Decisions
//! - `{name}` matches exactly one non-empty segment
//! - `{name+}` matches one or more segments and must be the last segment
//! - Literal segments are compared exactly (case-sensitive)
//! - A placeholder must span the whole segment; `v{n}` is a literal
//! - One trailing `/` on the request path is tolerated
//! - No regex: matching is a single pass over the segments

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    Greedy(String),
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Compile a template. A leading `/` is ignored.
    pub fn compile(pattern: &str) -> Self {
        let trimmed = pattern.strip_prefix('/').unwrap_or(pattern);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);

        let mut segments: Vec<Segment> = Vec::new();
        if !trimmed.is_empty() {
            for part in trimmed.split('/') {
                segments.push(parse_segment(part));
            }
        }

        // A greedy placeholder anywhere but last can only be a literal.
        let last = segments.len().saturating_sub(1);
        for (i, segment) in segments.iter_mut().enumerate() {
            if i != last {
                if let Segment::Greedy(name) = segment {
                    *segment = Segment::Literal(format!("{{{name}+}}"));
                }
            }
        }

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The template as declared.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a request path (query string already removed).
    pub fn matches(&self, path: &str) -> bool {
        let path = path.strip_prefix('/').unwrap_or(path);
        let path = path.strip_suffix('/').unwrap_or(path);

        if path.is_empty() {
            return self.segments.is_empty();
        }

        let mut parts = path.split('/');
        for segment in &self.segments {
            match segment {
                Segment::Greedy(_) => {
                    let rest: Vec<&str> = parts.by_ref().collect();
                    return !rest.is_empty() && rest.iter().all(|part| !part.is_empty());
                }
                Segment::Param => match parts.next() {
                    Some(part) if !part.is_empty() => {}
                    _ => return false,
                },
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part == literal => {}
                    _ => return false,
                },
            }
        }
        parts.next().is_none()
    }
}

fn parse_segment(part: &str) -> Segment {
    match part
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
    {
        Some(name) if is_param_name(name.trim_end_matches('+')) => {
            if let Some(name) = name.strip_suffix('+') {
                Segment::Greedy(name.to_string())
            } else {
                Segment::Param
            }
        }
        _ => Segment::Literal(part.to_string()),
    }
}

fn is_param_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_matches_one_segment() {
        let template = PathTemplate::compile("bears/{bearId}");
        assert!(template.matches("bears/00"));
        assert!(template.matches("/bears/00"));
        assert!(template.matches("bears/00/"));
        assert!(!template.matches("bears"));
        assert!(!template.matches("bears/"));
        assert!(!template.matches("bears/00/claws"));
        assert!(!template.matches("bearsx/00"));
    }

    #[test]
    fn literals_match_exactly() {
        let template = PathTemplate::compile("users/{id}/posts");
        assert!(template.matches("users/7/posts"));
        assert!(!template.matches("users/7/Posts"));
        assert!(!template.matches("users/7/postsx"));
        assert!(!template.matches("users//posts"));
    }

    #[test]
    fn leading_slash_in_template_is_ignored() {
        let template = PathTemplate::compile("/kittens/{kittenId}");
        assert!(template.matches("kittens/11"));
        assert_eq!(template.as_str(), "/kittens/{kittenId}");
    }

    #[test]
    fn partial_segment_braces_are_literal() {
        let template = PathTemplate::compile("files/v{n}");
        assert!(template.matches("files/v{n}"));
        assert!(!template.matches("files/v2"));
        assert!(!template.matches("files/{n}"));
    }

    #[test]
    fn greedy_placeholder_takes_the_rest() {
        let template = PathTemplate::compile("static/{proxy+}");
        assert!(template.matches("static/a"));
        assert!(template.matches("static/a/b/c"));
        assert!(!template.matches("static"));
        assert!(!template.matches("static/a//b"));
        assert!(!template.matches("/static/"));
    }

    #[test]
    fn greedy_placeholder_not_last_is_literal() {
        let template = PathTemplate::compile("{proxy+}/tail");
        assert!(!template.matches("a/tail"));
        assert!(template.matches("{proxy+}/tail"));
    }

    #[test]
    fn empty_template_matches_root() {
        let template = PathTemplate::compile("/");
        assert!(template.matches("/"));
        assert!(template.matches(""));
        assert!(!template.matches("/anything"));
    }
}
