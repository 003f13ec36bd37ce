//! Post metadata headers.
//!
//! A header is a fenced block at the very top of a post:
//!
//! ```text
//! ---                    +++
//! title: Hello           title = "Hello"
//! date: 2024-03-01       date = 2024-03-01
//! ---                    +++
//! ```
//!
//! Extraction is pluggable through [`HeaderExtractor`]; the default chain
//! tries YAML then TOML.

use crate::tsx::Value;
use serde_json::{Map, Value as Json};

/// Metadata extracted from a post header. Fields are free-form; the common
/// ones have accessors and a missing field is simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter(Map<String, Json>);

impl Frontmatter {
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Json::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.get("description").and_then(Json::as_str)
    }

    pub fn date(&self) -> Option<&str> {
        self.get("date").and_then(Json::as_str)
    }

    /// Template value: a plain object with the header's fields.
    pub fn to_value(&self) -> Value {
        Value::from_json(&Json::Object(self.0.clone()))
    }
}

impl From<Map<String, Json>> for Frontmatter {
    fn from(map: Map<String, Json>) -> Self {
        Self(map)
    }
}

/// One header syntax.
pub trait HeaderExtractor: Send + Sync {
    /// Opening and closing fence line.
    fn fence(&self) -> &'static str;

    /// Parse the text between the fences into a mapping.
    fn parse(&self, header: &str) -> Result<Map<String, Json>, String>;
}

pub struct YamlHeader;

impl HeaderExtractor for YamlHeader {
    fn fence(&self) -> &'static str {
        "---"
    }

    fn parse(&self, header: &str) -> Result<Map<String, Json>, String> {
        match serde_yaml_ng::from_str::<Json>(header).map_err(|e| e.to_string())? {
            Json::Object(map) => Ok(map),
            Json::Null => Ok(Map::new()),
            other => Err(format!("expected a mapping, found {}", json_kind(&other))),
        }
    }
}

pub struct TomlHeader;

impl HeaderExtractor for TomlHeader {
    fn fence(&self) -> &'static str {
        "+++"
    }

    fn parse(&self, header: &str) -> Result<Map<String, Json>, String> {
        let table: toml::Table = toml::from_str(header).map_err(|e| e.message().to_owned())?;
        Ok(table
            .into_iter()
            .map(|(key, value)| (key, toml_to_json(value)))
            .collect())
    }
}

pub static DEFAULT_EXTRACTORS: &[&dyn HeaderExtractor] = &[&YamlHeader, &TomlHeader];

/// A detached header: the metadata and where the body starts.
#[derive(Debug, Default)]
pub struct Extracted {
    pub frontmatter: Frontmatter,
    /// Byte offset of the body in the original source.
    pub body_start: usize,
}

/// Split `source` into metadata and body. A source without a recognised
/// opening fence has empty metadata and starts its body at offset 0.
pub fn extract(source: &str, extractors: &[&dyn HeaderExtractor]) -> Result<Extracted, String> {
    let start = source.strip_prefix('\u{feff}').map_or(0, |_| '\u{feff}'.len_utf8());
    let text = &source[start..];

    for extractor in extractors {
        let fence = extractor.fence();
        let Some(first) = fence_line(text, 0, fence) else {
            continue;
        };

        let mut offset = first;
        while offset < text.len() {
            if let Some(end) = fence_line(text, offset, fence) {
                let header = &text[first..offset];
                let map = if header.trim().is_empty() {
                    Map::new()
                } else {
                    extractor.parse(header)?
                };
                return Ok(Extracted {
                    frontmatter: map.into(),
                    body_start: start + end,
                });
            }
            offset = text[offset..]
                .find('\n')
                .map_or(text.len(), |i| offset + i + 1);
        }
        return Err(format!("missing closing `{fence}`"));
    }

    Ok(Extracted {
        frontmatter: Frontmatter::default(),
        body_start: start,
    })
}

/// If the line at `offset` is exactly `fence`, return the offset just past it.
fn fence_line(text: &str, offset: usize, fence: &str) -> Option<usize> {
    let rest = &text[offset..];
    let line_end = rest.find('\n').map_or(rest.len(), |i| i + 1);
    let line = rest[..line_end].trim_end_matches(['\n', '\r']);
    (line.trim_end() == fence).then_some(offset + line_end)
}

fn toml_to_json(value: toml::Value) -> Json {
    match value {
        toml::Value::String(s) => Json::String(s),
        toml::Value::Integer(i) => Json::from(i),
        toml::Value::Float(f) => Json::from(f),
        toml::Value::Boolean(b) => Json::Bool(b),
        toml::Value::Datetime(dt) => Json::String(dt.to_string()),
        toml::Value::Array(items) => Json::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Json::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, toml_to_json(value)))
                .collect(),
        ),
    }
}

const fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "a list",
        Json::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_header() {
        let source = "---\ntitle: Hello\ndescription: First post\ndate: 2024-03-01\n---\n# Body\n";
        let extracted = extract(source, DEFAULT_EXTRACTORS).unwrap();

        let fm = &extracted.frontmatter;
        assert_eq!(fm.title(), Some("Hello"));
        assert_eq!(fm.description(), Some("First post"));
        assert_eq!(fm.date(), Some("2024-03-01"));
        assert_eq!(&source[extracted.body_start..], "# Body\n");
    }

    #[test]
    fn test_toml_header() {
        let source = "+++\ntitle = \"Hello\"\ndate = 2024-03-01\ntags = [\"a\", \"b\"]\n+++\nbody";
        let extracted = extract(source, DEFAULT_EXTRACTORS).unwrap();

        let fm = &extracted.frontmatter;
        assert_eq!(fm.title(), Some("Hello"));
        assert_eq!(fm.date(), Some("2024-03-01"));
        assert_eq!(fm.get("tags"), Some(&serde_json::json!(["a", "b"])));
        assert_eq!(&source[extracted.body_start..], "body");
    }

    #[test]
    fn test_no_header() {
        let source = "# Just content\n\n---\n";
        let extracted = extract(source, DEFAULT_EXTRACTORS).unwrap();
        assert_eq!(extracted.frontmatter, Frontmatter::default());
        assert_eq!(extracted.body_start, 0);
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let extracted = extract("---\ntitle: Only a title\n---\n", DEFAULT_EXTRACTORS).unwrap();
        assert_eq!(extracted.frontmatter.description(), None);
        assert_eq!(extracted.frontmatter.date(), None);

        let empty = extract("---\n---\nbody", DEFAULT_EXTRACTORS).unwrap();
        assert_eq!(empty.frontmatter, Frontmatter::default());
    }

    #[test]
    fn test_invalid_headers() {
        assert!(extract("---\n- a\n- b\n---\n", DEFAULT_EXTRACTORS)
            .unwrap_err()
            .contains("mapping"));
        assert!(extract("---\ntitle: x\n", DEFAULT_EXTRACTORS)
            .unwrap_err()
            .contains("closing"));
        assert!(extract("+++\ntitle = \n+++\n", DEFAULT_EXTRACTORS).is_err());
    }

    #[test]
    fn test_crlf_fences() {
        let source = "---\r\ntitle: Windows\r\n---\r\nbody";
        let extracted = extract(source, DEFAULT_EXTRACTORS).unwrap();
        assert_eq!(extracted.frontmatter.title(), Some("Windows"));
        assert_eq!(&source[extracted.body_start..], "body");
    }

    #[test]
    fn test_to_value() {
        let extracted = extract("---\ntitle: Hi\n---\n", DEFAULT_EXTRACTORS).unwrap();
        let value = extracted.frontmatter.to_value();
        let Value::Object(object) = value else {
            panic!("expected object");
        };
        assert_eq!(object.get("title").map(Value::to_js_string).as_deref(), Some("Hi"));
    }
}
