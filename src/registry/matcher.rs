use std::collections::HashMap;

use regex::Regex;

/// Matches request paths against one route pattern.
///
/// Segments written `{name}` or `:name` capture one path segment each;
/// everything else must match literally.
#[derive(Debug, Clone)]
pub enum PathMatcher {
    Static(String),
    Pattern { regex: Regex, names: Vec<String> },
}

impl PathMatcher {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut names = Vec::new();
        let mut source = String::from("^");

        for segment in pattern.split('/').filter(|s| !s.is_empty()) {
            source.push('/');
            match variable_name(segment) {
                Some(name) => {
                    names.push(name.to_string());
                    source.push_str("([^/]+)");
                }
                None => source.push_str(&regex::escape(segment)),
            }
        }

        if names.is_empty() {
            return Ok(PathMatcher::Static(pattern.to_string()));
        }
        source.push('$');
        Ok(PathMatcher::Pattern {
            regex: Regex::new(&source)?,
            names,
        })
    }

    /// Captured variables when `path` matches.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        match self {
            PathMatcher::Static(pattern) => (pattern == path).then(HashMap::new),
            PathMatcher::Pattern { regex, names } => {
                let captures = regex.captures(path)?;
                Some(
                    names
                        .iter()
                        .enumerate()
                        .filter_map(|(i, name)| {
                            captures.get(i + 1).map(|m| (name.clone(), decode(m.as_str())))
                        })
                        .collect(),
                )
            }
        }
    }
}

fn variable_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .or_else(|| segment.strip_prefix(':'))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

/// Percent-decodes a captured segment; `+` stays literal.
fn decode(raw: &str) -> String {
    let escaped = format!("v={}", raw.replace('+', "%2B"));
    url::form_urlencoded::parse(escaped.as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_pattern() {
        let matcher = PathMatcher::compile("/health").unwrap();
        assert!(matches!(matcher, PathMatcher::Static(_)));
        assert_eq!(matcher.matches("/health"), Some(HashMap::new()));
        assert_eq!(matcher.matches("/health/x"), None);
    }

    #[test]
    fn test_variables_in_both_syntaxes() {
        let matcher = PathMatcher::compile("/users/{id}/posts/:post").unwrap();
        let vars = matcher.matches("/users/42/posts/hello%20world").unwrap();
        assert_eq!(vars["id"], "42");
        assert_eq!(vars["post"], "hello world");
        assert_eq!(matcher.matches("/users/42/posts"), None);
        assert_eq!(matcher.matches("/users/4/2/posts/x"), None);
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let matcher = PathMatcher::compile("/files/{name}.json").unwrap();
        assert!(matches!(matcher, PathMatcher::Static(_)));

        let matcher = PathMatcher::compile("/v1.0/{id}").unwrap();
        assert!(matcher.matches("/v1.0/7").is_some());
        assert!(matcher.matches("/v100/7").is_none());
    }
}
