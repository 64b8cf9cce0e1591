use serde::{Deserialize, Serialize};

/// A trigger command and the content it expands to.
///
/// Snippets are immutable once handed to the matcher; an update replaces the
/// whole set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub id: String,
    pub command: String,
    pub content: String,
}

impl Snippet {
    pub fn new(
        id: impl Into<String>,
        command: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
            content: content.into(),
        }
    }

    /// Length of the command in characters, which is what gets deleted on a match.
    pub fn command_len(&self) -> usize {
        self.command.chars().count()
    }

    /// Short single-line preview of the content.
    pub fn preview(&self, max_chars: usize) -> String {
        let single_line = self.content.replace('\n', "⏎");
        if single_line.chars().count() <= max_chars {
            single_line
        } else {
            let mut truncated: String = single_line.chars().take(max_chars).collect();
            truncated.push('…');
            truncated
        }
    }
}

/// A named placeholder (`{{key}}` or `{{key:default}}`) that needs user input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Metafield {
    pub key: String,
    pub default_value: Option<String>,
}

impl Metafield {
    pub fn new(key: impl Into<String>, default_value: Option<&str>) -> Self {
        Self {
            key: key.into(),
            default_value: default_value.map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_len_counts_chars() {
        let snippet = Snippet::new("1", "café", "coffee");
        assert_eq!(snippet.command_len(), 4);
    }

    #[test]
    fn test_preview_truncates_and_flattens() {
        let snippet = Snippet::new("1", "sig", "Best,\nAlice and the whole team");
        assert_eq!(snippet.preview(8), "Best,⏎Al…");
        assert_eq!(snippet.preview(100), "Best,⏎Alice and the whole team");
    }
}
