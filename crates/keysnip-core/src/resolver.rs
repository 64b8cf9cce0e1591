//! Keyword and metafield resolution.
//!
//! Snippet content may contain two kinds of dynamic tokens:
//!
//! - keywords such as `{date}` or `{uuid}`, computed at expansion time, plus
//!   the `{cursor}` marker which is removed and remembered as a cursor offset;
//! - metafields, `{{key}}` or `{{key:default}}`, filled in by the user.
//!
//! Both are substituted in a single left-to-right pass, so a substituted
//! value is never scanned again and the cursor offset already accounts for
//! every substitution that precedes it.

use crate::models::Metafield;
use chrono::{DateTime, Local};
use rand::Rng;
use std::collections::HashMap;

/// Dynamic keywords understood inside snippet content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Clipboard,
    Timestamp,
    Date,
    DateLong,
    Time,
    Random,
    Uuid,
    Epoch,
    Cursor,
}

impl Keyword {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "clipboard" => Some(Keyword::Clipboard),
            "timestamp" => Some(Keyword::Timestamp),
            "date" => Some(Keyword::Date),
            "date-long" => Some(Keyword::DateLong),
            "time" => Some(Keyword::Time),
            "random" => Some(Keyword::Random),
            "uuid" => Some(Keyword::Uuid),
            "epoch" => Some(Keyword::Epoch),
            "cursor" => Some(Keyword::Cursor),
            _ => None,
        }
    }

    fn render(self, ctx: &KeywordContext) -> String {
        match self {
            Keyword::Clipboard => ctx.clipboard.clone().unwrap_or_default(),
            Keyword::Timestamp => ctx.now.format("%Y%m%d%H%M%S").to_string(),
            Keyword::Date => ctx.now.format("%Y-%m-%d").to_string(),
            Keyword::DateLong => ctx.now.format("%B %-d, %Y").to_string(),
            Keyword::Time => ctx.now.format("%H:%M:%S").to_string(),
            Keyword::Random => rand::thread_rng().gen_range(0..=9999u32).to_string(),
            Keyword::Uuid => uuid::Uuid::new_v4().to_string(),
            Keyword::Epoch => ctx.now.timestamp().to_string(),
            Keyword::Cursor => String::new(),
        }
    }
}

/// Inputs the keywords are computed from.
#[derive(Debug, Clone)]
pub struct KeywordContext {
    pub now: DateTime<Local>,
    pub clipboard: Option<String>,
}

impl KeywordContext {
    pub fn new(clipboard: Option<String>) -> Self {
        Self {
            now: Local::now(),
            clipboard,
        }
    }
}

/// Final text of a snippet plus where the cursor should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub text: String,
    /// Character offset of the `{cursor}` marker in `text`, if there was one.
    pub cursor_offset: Option<usize>,
}

impl ResolvedContent {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// How many positions the cursor must move left after the text is injected.
    pub fn cursor_moves_left(&self) -> usize {
        self.cursor_offset
            .map(|offset| self.char_len().saturating_sub(offset))
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Keyword(Keyword),
    Metafield {
        raw: &'a str,
        key: &'a str,
        default_value: Option<&'a str>,
    },
}

fn tokenize(content: &str) -> Vec<Token<'_>> {
    let bytes = content.as_bytes();
    let mut tokens = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some((token, end)) = parse_token(content, i) {
                if literal_start < i {
                    tokens.push(Token::Literal(&content[literal_start..i]));
                }
                tokens.push(token);
                i = end;
                literal_start = end;
                continue;
            }
        }
        i += 1;
    }

    if literal_start < content.len() {
        tokens.push(Token::Literal(&content[literal_start..]));
    }
    tokens
}

/// Parse a token starting at the `{` at byte `start`; returns it and the byte after it.
fn parse_token(content: &str, start: usize) -> Option<(Token<'_>, usize)> {
    let rest = &content[start..];

    if let Some(inner_and_tail) = rest.strip_prefix("{{") {
        let close = inner_and_tail.find("}}")?;
        let inner = &inner_and_tail[..close];
        let end = start + 2 + close + 2;
        let (key, default_value) = match inner.split_once(':') {
            Some((key, default_value)) => (key.trim(), Some(default_value)),
            None => (inner.trim(), None),
        };
        if key.is_empty() || key.contains(['{', '}', '\n']) {
            return None;
        }
        return Some((
            Token::Metafield {
                raw: &content[start..end],
                key,
                default_value,
            },
            end,
        ));
    }

    let close = rest[1..].find('}')?;
    let name = &rest[1..1 + close];
    let keyword = Keyword::from_name(name)?;
    Some((Token::Keyword(keyword), start + 1 + close + 1))
}

/// Extract the metafields of `content`, deduplicated by key in first-occurrence order.
pub fn extract_metafields(content: &str) -> Vec<Metafield> {
    let mut fields: Vec<Metafield> = Vec::new();
    for token in tokenize(content) {
        if let Token::Metafield {
            key, default_value, ..
        } = token
        {
            if !fields.iter().any(|field| field.key == key) {
                fields.push(Metafield::new(key, default_value));
            }
        }
    }
    fields
}

/// Whether `content` references the clipboard keyword.
pub fn uses_clipboard(content: &str) -> bool {
    tokenize(content)
        .iter()
        .any(|token| matches!(token, Token::Keyword(Keyword::Clipboard)))
}

/// Compute the final text of `content`.
///
/// When `values` is `None` metafield tokens are kept verbatim. Otherwise each
/// metafield takes its committed value, falling back to its default and then
/// to an empty string. Only the first `{cursor}` marker records an offset;
/// any later ones are simply removed.
pub fn resolve(
    content: &str,
    ctx: &KeywordContext,
    values: Option<&HashMap<String, String>>,
) -> ResolvedContent {
    let mut text = String::with_capacity(content.len());
    let mut char_count = 0usize;
    let mut cursor_offset = None;

    for token in tokenize(content) {
        let piece = match token {
            Token::Literal(literal) => literal.to_string(),
            Token::Keyword(Keyword::Cursor) => {
                if cursor_offset.is_none() {
                    cursor_offset = Some(char_count);
                }
                continue;
            }
            Token::Keyword(keyword) => keyword.render(ctx),
            Token::Metafield {
                raw,
                key,
                default_value,
            } => match values {
                None => raw.to_string(),
                Some(values) => values
                    .get(key)
                    .cloned()
                    .or_else(|| default_value.map(str::to_string))
                    .unwrap_or_default(),
            },
        };
        char_count += piece.chars().count();
        text.push_str(&piece);
    }

    ResolvedContent {
        text,
        cursor_offset,
    }
}

/// Fill every metafield with its default value (empty when none).
pub fn default_values(fields: &[Metafield]) -> HashMap<String, String> {
    fields
        .iter()
        .map(|field| {
            (
                field.key.clone(),
                field.default_value.clone().unwrap_or_default(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_context(clipboard: Option<&str>) -> KeywordContext {
        KeywordContext {
            now: Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 2).single().unwrap(),
            clipboard: clipboard.map(str::to_string),
        }
    }

    fn all_digits(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn test_timestamp_is_numeric() {
        let resolved = resolve("Log {timestamp}", &KeywordContext::new(None), None);
        let rest = resolved.text.strip_prefix("Log ").unwrap();
        assert!(all_digits(rest), "unexpected timestamp {:?}", rest);
        assert_eq!(resolved.cursor_offset, None);
    }

    #[test]
    fn test_date_and_time_formats() {
        let ctx = fixed_context(None);
        let resolved = resolve("{date} | {date-long} | {time}", &ctx, None);
        assert_eq!(resolved.text, "2024-03-05 | March 5, 2024 | 09:07:02");
        assert_eq!(resolve("{timestamp}", &ctx, None).text, "20240305090702");
    }

    #[test]
    fn test_epoch_random_and_uuid() {
        let ctx = fixed_context(None);
        let epoch = resolve("{epoch}", &ctx, None).text;
        assert_eq!(epoch, ctx.now.timestamp().to_string());

        let random: u32 = resolve("{random}", &ctx, None).text.parse().unwrap();
        assert!(random <= 9999);

        let id = resolve("{uuid}", &ctx, None).text;
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_clipboard_keyword() {
        let ctx = fixed_context(Some("copied"));
        assert_eq!(resolve("[{clipboard}]", &ctx, None).text, "[copied]");
        assert_eq!(resolve("[{clipboard}]", &fixed_context(None), None).text, "[]");
        assert!(uses_clipboard("x {clipboard}"));
        assert!(!uses_clipboard("x {{clipboard}}"));
    }

    #[test]
    fn test_unknown_tokens_stay_literal() {
        let ctx = fixed_context(None);
        assert_eq!(
            resolve("fn main() { {nope} }", &ctx, None).text,
            "fn main() { {nope} }"
        );
        assert_eq!(resolve("{", &ctx, None).text, "{");
        assert_eq!(resolve("{{ }}", &ctx, None).text, "{{ }}");
    }

    #[test]
    fn test_cursor_offset_accounts_for_prior_substitutions() {
        let ctx = fixed_context(None);
        let resolved = resolve("Hi {date} {cursor}!", &ctx, None);
        assert_eq!(resolved.text, "Hi 2024-03-05 !");
        assert_eq!(resolved.cursor_offset, Some(14));
        assert_eq!(resolved.cursor_moves_left(), 1);
    }

    #[test]
    fn test_only_first_cursor_is_recorded() {
        let ctx = fixed_context(None);
        let resolved = resolve("a{cursor}b{cursor}c", &ctx, None);
        assert_eq!(resolved.text, "abc");
        assert_eq!(resolved.cursor_offset, Some(1));
        assert_eq!(resolved.cursor_moves_left(), 2);
    }

    #[test]
    fn test_extract_metafields_ordered_and_deduplicated() {
        let fields = extract_metafields("Hi {{name:World}}, from {{team}}. Bye {{name}}");
        assert_eq!(
            fields,
            vec![
                Metafield::new("name", Some("World")),
                Metafield::new("team", None),
            ]
        );
    }

    #[test]
    fn test_extract_metafields_empty_when_absent() {
        assert!(extract_metafields("plain {date} text").is_empty());
    }

    #[test]
    fn test_metafield_values_and_defaults() {
        let ctx = fixed_context(None);
        let content = "Hi {{name:World}}, from {{team}}";

        let mut values = HashMap::new();
        values.insert("team".to_string(), "Platform".to_string());
        assert_eq!(
            resolve(content, &ctx, Some(&values)).text,
            "Hi World, from Platform"
        );

        let defaults = default_values(&extract_metafields(content));
        assert_eq!(resolve(content, &ctx, Some(&defaults)).text, "Hi World, from ");

        assert_eq!(resolve(content, &ctx, None).text, content);
    }

    #[test]
    fn test_metafield_values_are_not_reexpanded() {
        let ctx = fixed_context(None);
        let mut values = HashMap::new();
        values.insert("x".to_string(), "{date}{cursor}".to_string());
        let resolved = resolve("<{{x}}>{cursor}", &ctx, Some(&values));
        assert_eq!(resolved.text, "<{date}{cursor}>");
        assert_eq!(resolved.cursor_offset, Some(16));
    }

    #[test]
    fn test_non_ascii_content_offsets() {
        let ctx = fixed_context(None);
        let resolved = resolve("ñandú {cursor}é", &ctx, None);
        assert_eq!(resolved.text, "ñandú é");
        assert_eq!(resolved.cursor_offset, Some(6));
        assert_eq!(resolved.cursor_moves_left(), 1);
    }
}
