//! Small string helpers invoked as workflow tasks.

use anyhow::{anyhow, bail, Context, Result};
use percent_encoding::percent_decode_str;
use regex::RegexBuilder;
use serde::Deserialize;
use tracing::info;

/// Decode a notification key: percent-escapes first, then `+` as space.
///
/// A `%` not followed by two hex digits is an error, as in `decodeURIComponent`.
pub fn decode_s3_key(payload: &str) -> Result<String> {
    let bytes = payload.as_bytes();
    for (index, _) in payload.match_indices('%') {
        let escape = bytes.get(index + 1..index + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            bail!("malformed percent escape at offset {} in {}", index, payload);
        }
    }

    let decoded = percent_decode_str(payload)
        .decode_utf8()
        .with_context(|| format!("key is not valid UTF-8 once decoded: {}", payload))?;
    Ok(decoded.replace('+', " "))
}

#[derive(Debug, Deserialize)]
pub struct TrimRequest {
    pub string: String,
}

pub fn trim(request: &TrimRequest) -> String {
    request.string.trim().to_string()
}

#[derive(Debug, Deserialize)]
pub struct RegexReplaceRequest {
    #[serde(default)]
    pub string: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub flags: Option<String>,
}

/// Replace `pattern` in `string`.
///
/// Flags: `g` replaces every match (otherwise the first only), `i`, `m` and `s`
/// set the matching regex options, `u` is implied.
pub fn regex_replace(request: &RegexReplaceRequest) -> Result<String> {
    let pattern = request
        .pattern
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("pattern (string) is required"))?;
    let input = request
        .string
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("string (string) is required"))?;

    let replacement = match request.replacement.as_deref() {
        Some(r) => expand_replacement(r),
        None => {
            info!("No replacement provided, defaulting to empty string");
            String::new()
        }
    };

    let mut builder = RegexBuilder::new(pattern);
    let mut global = false;
    for flag in request.flags.as_deref().unwrap_or_default().chars() {
        match flag {
            'g' => global = true,
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'u' => {}
            other => bail!("unsupported regex flag: {}", other),
        }
    }
    let regex = builder
        .build()
        .with_context(|| format!("invalid pattern: {}", pattern))?;

    let replaced = if global {
        regex.replace_all(input, replacement.as_str())
    } else {
        regex.replace(input, replacement.as_str())
    };
    Ok(replaced.into_owned())
}

/// Rewrite a JavaScript replacement pattern into `regex` syntax.
///
/// `$&` is the whole match, `$1`..`$99` are groups and `$$` is a dollar sign.
/// Group numbers are braced so `$1a` stays group 1 followed by `a`; any other
/// `$` is literal.
fn expand_replacement(replacement: &str) -> String {
    let mut expanded = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            expanded.push(c);
            continue;
        }
        match chars.peek() {
            Some('$') => {
                chars.next();
                expanded.push_str("$$");
            }
            Some('&') => {
                chars.next();
                expanded.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while group.len() < 2 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            group.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                expanded.push_str("${");
                expanded.push_str(&group);
                expanded.push('}');
            }
            _ => expanded.push_str("$$"),
        }
    }
    expanded
}

#[derive(Debug, Deserialize)]
pub struct SplitRequest {
    pub string: String,
    pub splitter: String,
}

pub fn split(request: &SplitRequest) -> Vec<String> {
    if request.splitter.is_empty() {
        return request.string.chars().map(String::from).collect();
    }
    request.string.split(&request.splitter).map(str::to_string).collect()
}

#[derive(Debug, Deserialize)]
pub struct Terminology {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TerminologiesRequest {
    #[serde(default)]
    pub terminologies: Vec<Terminology>,
}

pub fn parse_terminologies(request: &TerminologiesRequest) -> Vec<String> {
    request.terminologies.iter().map(|t| t.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn replace_request(string: &str, pattern: &str, replacement: Option<&str>, flags: Option<&str>) -> RegexReplaceRequest {
        RegexReplaceRequest {
            string: Some(string.to_string()),
            pattern: Some(pattern.to_string()),
            replacement: replacement.map(str::to_string),
            flags: flags.map(str::to_string),
        }
    }

    #[test]
    fn test_decode_s3_key() {
        assert_eq!(
            decode_s3_key("foo+bar_lemon-%28pie%29+%26+cake").unwrap(),
            "foo bar_lemon-(pie) & cake"
        );
        assert_eq!(decode_s3_key("private/us-east-1%3Aabc/x").unwrap(), "private/us-east-1:abc/x");
    }

    #[test]
    fn test_decode_s3_key_rejects_malformed_escapes() {
        assert!(decode_s3_key("100%").is_err());
        assert!(decode_s3_key("a%2").is_err());
        assert!(decode_s3_key("a%zzb").is_err());
        assert!(decode_s3_key("%E9").is_err());
    }

    #[test]
    fn test_trim() {
        assert_eq!(trim(&TrimRequest { string: "  fr \n".into() }), "fr");
    }

    #[test]
    fn test_regex_replace_first_and_global() {
        assert_eq!(regex_replace(&replace_request("a-b-c", "-", Some("+"), None)).unwrap(), "a+b-c");
        assert_eq!(regex_replace(&replace_request("a-b-c", "-", Some("+"), Some("g"))).unwrap(), "a+b+c");
    }

    #[test]
    fn test_regex_replace_flags_and_defaults() {
        assert_eq!(regex_replace(&replace_request("Hello hello", "HELLO", None, Some("gi"))).unwrap(), " ");
        assert_eq!(
            regex_replace(&replace_request("lang fr", "fr", Some("[$&]"), None)).unwrap(),
            "lang [fr]"
        );
    }

    #[test]
    fn test_regex_replace_group_references() {
        assert_eq!(
            regex_replace(&replace_request("fr.doc", r"(\w+)\.(\w+)", Some("$2a_$1"), None)).unwrap(),
            "doca_fr"
        );
        assert_eq!(regex_replace(&replace_request("5", "5", Some("$$ $x"), None)).unwrap(), "$ $x");
    }

    #[test]
    fn test_regex_replace_requires_pattern_and_string() {
        let missing_pattern = RegexReplaceRequest {
            string: Some("x".into()),
            pattern: None,
            replacement: None,
            flags: None,
        };
        assert!(regex_replace(&missing_pattern).is_err());
        assert!(regex_replace(&replace_request("", "x", None, None)).is_err());
        assert!(regex_replace(&replace_request("x", "x", None, Some("y"))).is_err());
    }

    #[test]
    fn test_split() {
        let request = SplitRequest {
            string: "private/o/j".into(),
            splitter: "/".into(),
        };
        assert_eq!(split(&request), vec!["private", "o", "j"]);
    }

    #[test]
    fn test_parse_terminologies() {
        let request: TerminologiesRequest = serde_json::from_value(json!({
            "terminologies": [{ "Name": "legal", "Arn": "arn:1" }, { "Name": "medical" }]
        }))
        .unwrap();
        assert_eq!(parse_terminologies(&request), vec!["legal", "medical"]);
    }
}
