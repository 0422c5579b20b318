//! The `---` delimited key/value block at the top of a note.

use serde_json::Value;
use serde_yaml::Value as YamlValue;
use std::collections::BTreeMap;

use crate::error::NotesyncError;

pub type Frontmatter = BTreeMap<String, Value>;

const DELIMITER: &str = "---";

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == DELIMITER
}

/// Splits a note body into its frontmatter text (without delimiters) and the markdown that
/// follows it. The returned `usize` is the byte offset of the markdown within `body`.
///
/// A body that does not open with a delimiter line, or whose block is never closed, has no
/// frontmatter.
pub fn split_frontmatter(body: &str) -> (Option<&str>, &str, usize) {
    let mut lines = body.split_inclusive('\n');
    match lines.next() {
        Some(first) if is_delimiter(first) && first.ends_with('\n') => {}
        _ => return (None, body, 0),
    }
    let content_start = body.find('\n').map(|newline| newline + 1).unwrap_or(body.len());
    let mut offset = content_start;
    for line in lines {
        if is_delimiter(line) {
            let markdown_start = offset + line.len();
            return (
                Some(&body[content_start..offset]),
                &body[markdown_start..],
                markdown_start,
            );
        }
        offset += line.len();
    }
    (None, body, 0)
}

/// Parses frontmatter text as a flat YAML mapping. Empty text yields an empty map.
pub fn parse_frontmatter(text: &str) -> Result<Frontmatter, NotesyncError> {
    if text.trim().is_empty() {
        return Ok(Frontmatter::new());
    }
    let yaml: YamlValue = serde_yaml::from_str(text)?;
    let mapping = match yaml {
        YamlValue::Null => return Ok(Frontmatter::new()),
        YamlValue::Mapping(mapping) => mapping,
        other => {
            return Err(NotesyncError::Parse(format!(
                "frontmatter must be a key/value map, found {}",
                yaml_kind(&other)
            )))
        }
    };
    let mut frontmatter = Frontmatter::new();
    for (key, value) in mapping {
        let key = match key {
            YamlValue::String(key) => key,
            YamlValue::Number(number) => number.to_string(),
            YamlValue::Bool(flag) => flag.to_string(),
            other => {
                return Err(NotesyncError::Parse(format!(
                    "frontmatter keys must be scalars, found {}",
                    yaml_kind(&other)
                )))
            }
        };
        frontmatter.insert(key, serde_json::to_value(value)?);
    }
    Ok(frontmatter)
}

fn yaml_kind(value: &YamlValue) -> &'static str {
    match value {
        YamlValue::Null => "null",
        YamlValue::Bool(_) => "a boolean",
        YamlValue::Number(_) => "a number",
        YamlValue::String(_) => "a string",
        YamlValue::Sequence(_) => "a sequence",
        YamlValue::Mapping(_) => "a mapping",
        YamlValue::Tagged(_) => "a tagged value",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_frontmatter() {
        let body = "---\ntitle: Hello\ntags: [a, b]\n---\n# Body\n";
        let (frontmatter, markdown, offset) = split_frontmatter(body);
        assert_eq!(frontmatter, Some("title: Hello\ntags: [a, b]\n"));
        assert_eq!(markdown, "# Body\n");
        assert_eq!(&body[offset..], markdown);
    }

    #[test]
    fn test_split_without_frontmatter() {
        for body in ["# Just a note\n", "--- not a delimiter\n---\n", "---\nnever closed\n", ""] {
            let (frontmatter, markdown, offset) = split_frontmatter(body);
            assert_eq!(frontmatter, None, "{body:?}");
            assert_eq!(markdown, body);
            assert_eq!(offset, 0);
        }
    }

    #[test]
    fn test_split_crlf_and_empty_block() {
        let (frontmatter, markdown, _) = split_frontmatter("---\r\n---\r\nbody");
        assert_eq!(frontmatter, Some(""));
        assert_eq!(markdown, "body");
    }

    #[test]
    fn test_parse_frontmatter() {
        let parsed = parse_frontmatter("title: Hello\npinned: true\ncount: 3\n").unwrap();
        assert_eq!(parsed.get("title"), Some(&json!("Hello")));
        assert_eq!(parsed.get("pinned"), Some(&json!(true)));
        assert_eq!(parsed.get("count"), Some(&json!(3)));
        assert!(parse_frontmatter("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_frontmatter_is_an_error() {
        assert!(matches!(
            parse_frontmatter("title: [unclosed\n"),
            Err(NotesyncError::Parse(_))
        ));
        assert!(matches!(
            parse_frontmatter("- just\n- a list\n"),
            Err(NotesyncError::Parse(_))
        ));
    }
}
