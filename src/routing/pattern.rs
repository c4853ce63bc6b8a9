//! Path pattern module
//!
//! Patterns are literal segments, `:named` parameters, and an optional
//! trailing `*` wildcard: `/c/:short_name`, `/assets/*`.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
    /// Trailing `*`: matches any remainder, bound under the `*` key.
    wildcard: bool,
}

#[derive(Debug, Clone)]
enum PatternSegment {
    Literal(String),
    Param(String),
}

impl PathPattern {
    /// Parse a pattern, rejecting malformed parameter and wildcard
    /// placement at registration time.
    pub fn parse(raw: &str) -> Result<Self, String> {
        if !raw.starts_with('/') {
            return Err("pattern must start with '/'".to_string());
        }

        let parts: Vec<&str> = raw[1..].split('/').collect();
        let mut segments = Vec::new();
        let mut wildcard = false;

        for (index, part) in parts.iter().enumerate() {
            if wildcard {
                return Err("'*' is only allowed as the final segment".to_string());
            }
            if *part == "*" {
                if index != parts.len() - 1 {
                    return Err("'*' is only allowed as the final segment".to_string());
                }
                wildcard = true;
            } else if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err("parameter segment must be named".to_string());
                }
                segments.push(PatternSegment::Param(name.to_string()));
            } else {
                segments.push(PatternSegment::Literal((*part).to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            wildcard,
        })
    }

    /// Match a request path, binding named parameters on success.
    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        let path = path.strip_prefix('/')?;
        let parts: Vec<&str> = path.split('/').collect();

        if self.wildcard {
            if parts.len() < self.segments.len() {
                return None;
            }
        } else if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts.iter()) {
            match segment {
                PatternSegment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                PatternSegment::Param(name) => {
                    params.insert(name.clone(), (*part).to_string());
                }
            }
        }

        if self.wildcard {
            let remainder = parts[self.segments.len()..].join("/");
            params.insert("*".to_string(), remainder);
        }

        Some(params)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_match() {
        let pattern = PathPattern::parse("/signin").expect("parses");
        assert!(pattern.matches("/signin").is_some());
        assert!(pattern.matches("/signin/extra").is_none());
        assert!(pattern.matches("/signup").is_none());
    }

    #[test]
    fn root_match() {
        let pattern = PathPattern::parse("/").expect("parses");
        assert!(pattern.matches("/").is_some());
        assert!(pattern.matches("/anything").is_none());
    }

    #[test]
    fn named_parameter_binds() {
        let pattern = PathPattern::parse("/c/:short_name").expect("parses");
        let params = pattern.matches("/c/algebra101").expect("matches");
        assert_eq!(params.get("short_name").map(String::as_str), Some("algebra101"));
        assert!(pattern.matches("/c").is_none());
        assert!(pattern.matches("/c/a/b").is_none());
    }

    #[test]
    fn wildcard_binds_remainder() {
        let pattern = PathPattern::parse("/assets/*").expect("parses");
        let params = pattern.matches("/assets/js/app.js").expect("matches");
        assert_eq!(params.get("*").map(String::as_str), Some("js/app.js"));
        assert!(pattern.matches("/images/logo.png").is_none());
    }

    #[test]
    fn wildcard_must_be_last() {
        assert!(PathPattern::parse("/assets/*/js").is_err());
    }

    #[test]
    fn unnamed_parameter_rejected() {
        assert!(PathPattern::parse("/c/:").is_err());
    }

    #[test]
    fn pattern_must_be_rooted() {
        assert!(PathPattern::parse("signin").is_err());
    }
}
