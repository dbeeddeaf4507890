//! URL template compilation.
//!
//! A template mixes literal text with typed placeholders written
//! `<type:name>`, e.g. `/topics/<int:topic_id>/files/<path:rest>`.
//! Compiling one yields:
//!
//! - a capture matcher with one named group per placeholder, used to pull
//!   typed values out of a path once its route has been picked;
//! - an adapted fragment where every group is non-capturing, safe to splice
//!   into the route table's combined matcher;
//! - the ordered placeholder names and types.
//!
//! | Type     | Matches                          | Value         |
//! |----------|----------------------------------|---------------|
//! | `int`    | `[0-9]+`                         | JSON integer  |
//! | `string` | `[^/]+` (one segment)            | JSON string   |
//! | `path`   | `.+` (greedy, may contain `/`)   | JSON string   |
//!
//! Every problem with a template is reported by [`compile`], so routes fail
//! at registration rather than on the first request.

use crate::{Error, PathParams};
use regex::Regex;
use serde_json::Value;
use std::fmt;

/// Placeholder type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderType {
    Int,
    String,
    Path,
}

impl PlaceholderType {
    /// Look a tag up in the fixed type registry.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(PlaceholderType::Int),
            "string" => Some(PlaceholderType::String),
            "path" => Some(PlaceholderType::Path),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            PlaceholderType::Int => "int",
            PlaceholderType::String => "string",
            PlaceholderType::Path => "path",
        }
    }

    /// Regex character class a value of this type must match.
    pub fn pattern(&self) -> &'static str {
        match self {
            PlaceholderType::Int => "[0-9]+",
            PlaceholderType::String => "[^/]+",
            PlaceholderType::Path => ".+",
        }
    }

    /// Convert matched text into a typed value.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        match self {
            PlaceholderType::Int => raw
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| format!("'{}' is not a valid integer: {}", raw, e)),
            PlaceholderType::String | PlaceholderType::Path => Ok(Value::String(raw.to_string())),
        }
    }
}

impl fmt::Display for PlaceholderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A compiled URL template.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    template: String,
    capture: Regex,
    adapted: String,
    params: Vec<(String, PlaceholderType)>,
}

impl CompiledTemplate {
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Anchored matcher with one named group per placeholder.
    pub fn capture_matcher(&self) -> &Regex {
        &self.capture
    }

    /// Unanchored, capture-free fragment for the combined matcher.
    pub fn adapted_pattern(&self) -> &str {
        &self.adapted
    }

    /// Placeholder names and types, in template order.
    pub fn param_types(&self) -> &[(String, PlaceholderType)] {
        &self.params
    }

    /// Match `path` and convert every captured placeholder.
    ///
    /// Returns `Ok(None)` when the path does not fit the template.
    pub fn extract(&self, path: &str) -> Result<Option<PathParams>, Error> {
        let Some(captures) = self.capture.captures(path) else {
            return Ok(None);
        };

        let mut params = PathParams::with_capacity(self.params.len());
        for (name, kind) in &self.params {
            let raw = captures
                .name(name)
                .map(|m| m.as_str())
                .unwrap_or_default();
            let value = kind.parse(raw).map_err(|reason| Error::InvalidParameter {
                name: name.clone(),
                reason,
            })?;
            params.insert(name.clone(), value);
        }
        Ok(Some(params))
    }
}

#[derive(Clone, Copy)]
enum State {
    Literal,
    Type,
    Name,
}

/// Compile a URL template.
pub fn compile(template: &str) -> Result<CompiledTemplate, Error> {
    let invalid = |reason: String| Error::InvalidRoute {
        template: template.to_string(),
        reason,
    };

    let mut capture = String::from("^");
    let mut adapted = String::new();
    let mut params: Vec<(String, PlaceholderType)> = Vec::new();

    let mut state = State::Literal;
    let mut literal = String::new();
    let mut type_tag = String::new();
    let mut name = String::new();

    for (offset, c) in template.char_indices() {
        match state {
            State::Literal => match c {
                '<' => {
                    let escaped = regex::escape(&literal);
                    capture.push_str(&escaped);
                    adapted.push_str(&escaped);
                    literal.clear();
                    state = State::Type;
                }
                '>' => return Err(invalid(format!("unmatched '>' at offset {}", offset))),
                _ => literal.push(c),
            },
            State::Type => match c {
                ':' => {
                    if type_tag.is_empty() {
                        return Err(invalid(format!("missing type at offset {}", offset)));
                    }
                    state = State::Name;
                }
                '<' => return Err(invalid(format!("nested '<' at offset {}", offset))),
                '>' => {
                    return Err(invalid(format!(
                        "placeholder `<{}>` has no name, expected `<type:name>`",
                        type_tag
                    )));
                }
                _ => type_tag.push(c),
            },
            State::Name => match c {
                '>' => {
                    let kind = PlaceholderType::from_tag(&type_tag)
                        .ok_or_else(|| invalid(format!("unknown type `{}`", type_tag)))?;
                    if !is_identifier(&name) {
                        return Err(invalid(format!("invalid parameter name `{}`", name)));
                    }
                    if params.iter().any(|(existing, _)| *existing == name) {
                        return Err(invalid(format!("duplicate parameter name `{}`", name)));
                    }

                    capture.push_str(&format!("(?P<{}>{})", name, kind.pattern()));
                    adapted.push_str(&format!("(?:{})", kind.pattern()));
                    params.push((std::mem::take(&mut name), kind));
                    type_tag.clear();
                    state = State::Literal;
                }
                '<' => return Err(invalid(format!("nested '<' at offset {}", offset))),
                ':' => return Err(invalid(format!("unexpected ':' at offset {}", offset))),
                _ => name.push(c),
            },
        }
    }

    if !matches!(state, State::Literal) {
        return Err(invalid("unterminated placeholder".to_string()));
    }

    let escaped = regex::escape(&literal);
    capture.push_str(&escaped);
    adapted.push_str(&escaped);
    capture.push('$');

    let capture = Regex::new(&capture).map_err(|e| invalid(e.to_string()))?;

    Ok(CompiledTemplate {
        template: template.to_string(),
        capture,
        adapted,
        params,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_template() {
        let compiled = compile("/todos").unwrap();
        assert_eq!(compiled.adapted_pattern(), "/todos");
        assert!(compiled.param_types().is_empty());
        assert!(compiled.extract("/todos").unwrap().is_some());
        assert!(compiled.extract("/todos/1").unwrap().is_none());
    }

    #[test]
    fn test_int_placeholder() {
        let compiled = compile("/topics/<int:topic_id>").unwrap();
        assert_eq!(compiled.adapted_pattern(), "/topics/(?:[0-9]+)");
        assert_eq!(
            compiled.param_types(),
            &[("topic_id".to_string(), PlaceholderType::Int)]
        );

        let params = compiled.extract("/topics/42").unwrap().unwrap();
        assert_eq!(params["topic_id"], json!(42));
        assert!(params["topic_id"].is_i64());

        assert!(compiled.extract("/topics/abc").unwrap().is_none());
    }

    #[test]
    fn test_string_placeholder_stops_at_slash() {
        let compiled = compile("/users/<string:name>").unwrap();
        let params = compiled.extract("/users/alice").unwrap().unwrap();
        assert_eq!(params["name"], json!("alice"));
        assert!(compiled.extract("/users/alice/posts").unwrap().is_none());
    }

    #[test]
    fn test_path_placeholder_is_greedy() {
        let compiled = compile("/items/<path:rest>").unwrap();
        let params = compiled.extract("/items/a/b/c.txt").unwrap().unwrap();
        assert_eq!(params["rest"], json!("a/b/c.txt"));
    }

    #[test]
    fn test_multiple_placeholders() {
        let compiled = compile("/users/<int:user_id>/posts/<string:slug>").unwrap();
        let params = compiled.extract("/users/7/posts/hello-world").unwrap().unwrap();
        assert_eq!(params["user_id"], json!(7));
        assert_eq!(params["slug"], json!("hello-world"));
    }

    #[test]
    fn test_literal_text_is_escaped() {
        let compiled = compile("/files/report.pdf").unwrap();
        assert!(compiled.extract("/files/report.pdf").unwrap().is_some());
        assert!(compiled.extract("/files/reportXpdf").unwrap().is_none());

        let compiled = compile("/v1+/<int:id>").unwrap();
        assert!(compiled.extract("/v1+/3").unwrap().is_some());
        assert!(compiled.extract("/v11/3").unwrap().is_none());
    }

    #[test]
    fn test_colon_in_literal_text() {
        let compiled = compile("/time/12:30").unwrap();
        assert!(compiled.extract("/time/12:30").unwrap().is_some());
    }

    #[test]
    fn test_int_overflow_is_invalid_parameter() {
        let compiled = compile("/n/<int:n>").unwrap();
        let err = compiled.extract("/n/99999999999999999999999").unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref name, .. } if name == "n"));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = compile("/x/<uuid:id>").unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { ref reason, .. } if reason.contains("uuid")));
    }

    #[test]
    fn test_malformed_brackets_rejected() {
        for template in [
            "/x/<int:id",
            "/x/int:id>",
            "/x/<int:<int:id>>",
            "/x/<int>",
            "/x/<:id>",
            "/x/<int:>",
            "/x/<int:a:b>",
            "/x/<int:bad-name>",
        ] {
            assert!(
                matches!(compile(template), Err(Error::InvalidRoute { .. })),
                "{} should not compile",
                template
            );
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = compile("/<int:id>/<string:id>").unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}
