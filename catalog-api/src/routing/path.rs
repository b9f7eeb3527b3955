//! Path normalisation and route patterns

use super::Params;

/// Strip trailing slashes (except on `/`) and collapse repeated separators
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `:name`, matches exactly one path segment
    Param(String),
}

/// Compiled route pattern such as `/api/v1/products/:slug`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    pub fn compile(pattern: &str) -> Self {
        let raw = normalize_path(pattern);
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(s.to_string()),
            })
            .collect();

        Self { raw, segments }
    }

    /// Normalised pattern text
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern has no placeholders
    pub fn is_static(&self) -> bool {
        self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
    }

    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Match a normalised path, capturing placeholder segments left to right
    pub fn captures(&self, path: &str) -> Option<Params> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = Params::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.push(name, part),
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/items/"), "/items");
        assert_eq!(normalize_path("//items///42//"), "/items/42");
        assert_eq!(normalize_path("items"), "/items");
    }

    #[test]
    fn test_static_pattern() {
        let p = RoutePattern::compile("/api/v1/products/");
        assert!(p.is_static());
        assert_eq!(p.as_str(), "/api/v1/products");
        assert_eq!(p.captures("/api/v1/products").map(|c| c.len()), Some(0));
    }

    #[test]
    fn test_captures_in_order() {
        let p = RoutePattern::compile("/shops/:shop/items/:item");
        assert!(!p.is_static());
        assert_eq!(p.param_names(), vec!["shop", "item"]);

        let params = p.captures("/shops/north/items/42").unwrap();
        assert_eq!(params.values(), &["north".to_string(), "42".to_string()]);
        assert_eq!(params.named("item"), Some("42"));
    }

    #[test]
    fn test_placeholder_matches_single_segment_only() {
        let p = RoutePattern::compile("/items/:id");
        assert!(p.captures("/items").is_none());
        assert!(p.captures("/items/1/extra").is_none());
        assert!(p.captures("/other/1").is_none());
    }
}
