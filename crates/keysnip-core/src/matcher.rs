//! Suffix index over the configured commands.
//!
//! Commands are inserted into a trie keyed by their characters in reverse
//! order. A query walks the buffer backwards from its last character and
//! remembers the deepest node that terminates a command, so the cost is
//! bounded by the longest command rather than by the number of commands or
//! the buffer length.
//!
//! The index is immutable once built. [`CommandMatcher`] publishes it through
//! an [`ArcSwap`], so a rebuild never exposes a half-built index and each
//! query runs against one consistent snapshot.

use crate::models::Snippet;
use crate::prefilter::SuffixPrefilter;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Node {
    children: HashMap<char, usize>,
    /// Index into `CommandIndex::snippets` of the command ending here.
    terminal: Option<usize>,
}

/// A match of a configured command at the end of the buffer.
#[derive(Debug, Clone)]
pub struct SuffixMatch {
    pub snippet: Arc<Snippet>,
    /// Number of characters the command occupies at the end of the buffer.
    pub matched_len: usize,
}

#[derive(Debug)]
pub struct CommandIndex {
    nodes: Vec<Node>,
    snippets: Vec<Arc<Snippet>>,
    prefilter: SuffixPrefilter,
    max_command_len: usize,
}

impl CommandIndex {
    pub fn empty() -> Self {
        Self::build(Vec::new())
    }

    /// Build an index over `snippets`.
    ///
    /// Snippets with an empty command are skipped. When two snippets share the
    /// same command, the one that appears later in the list wins.
    pub fn build(snippets: Vec<Snippet>) -> Self {
        let mut index = Self {
            nodes: vec![Node::default()],
            snippets: Vec::with_capacity(snippets.len()),
            prefilter: SuffixPrefilter::with_capacity(snippets.len()),
            max_command_len: 0,
        };

        for snippet in snippets {
            if snippet.command.is_empty() {
                tracing::warn!(id = %snippet.id, "Skipping snippet with empty command");
                continue;
            }
            index.insert(snippet);
        }
        index
    }

    fn insert(&mut self, snippet: Snippet) {
        let mut node = 0;
        let mut len = 0;
        for c in snippet.command.chars().rev() {
            len += 1;
            node = match self.nodes[node].children.get(&c) {
                Some(&child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.insert(c, child);
                    child
                }
            };
        }

        if let Some(previous) = self.nodes[node].terminal {
            tracing::debug!(
                command = %snippet.command,
                replaced = %self.snippets[previous].id,
                by = %snippet.id,
                "Duplicate command, later snippet wins"
            );
        }

        self.prefilter.insert(&snippet.command);
        self.max_command_len = self.max_command_len.max(len);
        self.nodes[node].terminal = Some(self.snippets.len());
        self.snippets.push(Arc::new(snippet));
    }

    /// Return the longest configured command that is a suffix of `buffer`.
    pub fn find_longest_suffix_match(&self, buffer: &str) -> Option<SuffixMatch> {
        if !self.prefilter.may_match(buffer) {
            return None;
        }

        let mut node = 0;
        let mut best: Option<(usize, usize)> = None;
        for (depth, c) in buffer.chars().rev().enumerate() {
            match self.nodes[node].children.get(&c) {
                Some(&child) => node = child,
                None => break,
            }
            if let Some(snippet_index) = self.nodes[node].terminal {
                best = Some((snippet_index, depth + 1));
            }
        }

        best.map(|(snippet_index, matched_len)| SuffixMatch {
            snippet: Arc::clone(&self.snippets[snippet_index]),
            matched_len,
        })
    }

    /// Number of distinct commands in the index.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|node| node.terminal.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_command_len(&self) -> usize {
        self.max_command_len
    }
}

/// Shared, atomically swappable command index.
#[derive(Debug)]
pub struct CommandMatcher {
    index: ArcSwap<CommandIndex>,
}

impl Default for CommandMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandMatcher {
    pub fn new() -> Self {
        Self {
            index: ArcSwap::from_pointee(CommandIndex::empty()),
        }
    }

    /// Build a fresh index from `snippets` and publish it.
    ///
    /// The build happens on the caller's thread; readers keep using the old
    /// index until the swap.
    pub fn rebuild(&self, snippets: Vec<Snippet>) {
        let index = CommandIndex::build(snippets);
        tracing::debug!(
            commands = index.len(),
            max_command_len = index.max_command_len(),
            "Command index rebuilt"
        );
        self.index.store(Arc::new(index));
    }

    pub fn find_longest_suffix_match(&self, buffer: &str) -> Option<SuffixMatch> {
        self.index.load().find_longest_suffix_match(buffer)
    }

    /// The currently published index.
    pub fn snapshot(&self) -> Arc<CommandIndex> {
        self.index.load_full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::thread;

    fn snippet(id: &str, command: &str, content: &str) -> Snippet {
        Snippet::new(id, command, content)
    }

    fn matched_id(index: &CommandIndex, buffer: &str) -> Option<String> {
        index
            .find_longest_suffix_match(buffer)
            .map(|m| m.snippet.id.clone())
    }

    #[test]
    fn test_exact_suffix_match() {
        let index = CommandIndex::build(vec![snippet("1", "btw", "by the way")]);
        let found = index.find_longest_suffix_match("hi btw").unwrap();
        assert_eq!(found.snippet.content, "by the way");
        assert_eq!(found.matched_len, 3);
        assert!(index.find_longest_suffix_match("hi bt").is_none());
        assert!(index.find_longest_suffix_match("btw ").is_none());
    }

    #[test]
    fn test_longest_match_wins() {
        let index = CommandIndex::build(vec![
            snippet("short", "test", "T"),
            snippet("long", "testing", "TESTING"),
        ]);
        assert_eq!(matched_id(&index, "this is testing").as_deref(), Some("long"));
        assert_eq!(matched_id(&index, "this is test").as_deref(), Some("short"));
    }

    #[test]
    fn test_longest_match_independent_of_insertion_order() {
        let index = CommandIndex::build(vec![
            snippet("long", "testing", "TESTING"),
            snippet("short", "ing", "I"),
        ]);
        assert_eq!(matched_id(&index, "testing").as_deref(), Some("long"));
        assert_eq!(matched_id(&index, "sing").as_deref(), Some("short"));
    }

    #[test]
    fn test_duplicate_command_last_registration_wins() {
        let index = CommandIndex::build(vec![
            snippet("first", "sig", "A"),
            snippet("second", "sig", "B"),
        ]);
        assert_eq!(matched_id(&index, "sig").as_deref(), Some("second"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_commands_are_skipped() {
        let index = CommandIndex::build(vec![snippet("empty", "", "nothing")]);
        assert!(index.is_empty());
        assert!(index.find_longest_suffix_match("anything").is_none());
    }

    #[test]
    fn test_unicode_commands() {
        let index = CommandIndex::build(vec![snippet("1", "→→", "arrows"), snippet("2", "é", "e")]);
        assert_eq!(index.find_longest_suffix_match("go →→").unwrap().matched_len, 2);
        assert_eq!(matched_id(&index, "café").as_deref(), Some("2"));
    }

    #[test]
    fn test_buffer_shorter_than_command() {
        let index = CommandIndex::build(vec![snippet("1", "address", "1 Main St")]);
        assert!(index.find_longest_suffix_match("ess").is_none());
        assert!(index.find_longest_suffix_match("").is_none());
        assert_eq!(index.max_command_len(), 7);
    }

    #[test]
    fn test_rebuild_replaces_whole_set() {
        let matcher = CommandMatcher::new();
        assert!(matcher.find_longest_suffix_match("btw").is_none());

        matcher.rebuild(vec![snippet("1", "btw", "by the way")]);
        assert!(matcher.find_longest_suffix_match("btw").is_some());

        matcher.rebuild(vec![snippet("2", "omw", "on my way")]);
        assert!(matcher.find_longest_suffix_match("btw").is_none());
        assert!(matcher.find_longest_suffix_match("omw").is_some());
    }

    #[test]
    fn test_readers_see_whole_indexes_during_rebuilds() {
        let matcher = Arc::new(CommandMatcher::new());
        let set_a = vec![snippet("a1", "aaa", "A"), snippet("a2", "zzz", "A")];
        let set_b = vec![snippet("b1", "aaa", "B"), snippet("b2", "zzz", "B")];
        matcher.rebuild(set_a.clone());

        let writer = {
            let matcher = Arc::clone(&matcher);
            thread::spawn(move || {
                for i in 0..200 {
                    let set = if i % 2 == 0 { set_b.clone() } else { set_a.clone() };
                    matcher.rebuild(set);
                }
            })
        };

        for _ in 0..2000 {
            let index = matcher.snapshot();
            let first = index.find_longest_suffix_match("aaa").unwrap();
            let second = index.find_longest_suffix_match("zzz").unwrap();
            assert_eq!(first.snippet.content, second.snippet.content);
        }
        writer.join().unwrap();
    }

    /// Longest suffix by brute force over every command.
    fn naive_longest_suffix(snippets: &[Snippet], buffer: &str) -> Option<(String, usize)> {
        let mut best: Option<(String, usize)> = None;
        for snippet in snippets {
            if snippet.command.is_empty() || !buffer.ends_with(snippet.command.as_str()) {
                continue;
            }
            let len = snippet.command_len();
            if best.as_ref().map_or(true, |(_, best_len)| len >= *best_len) {
                best = Some((snippet.id.clone(), len));
            }
        }
        best
    }

    proptest! {
        /// The index agrees with a brute-force scan for any command set and buffer.
        #[test]
        fn prop_matches_naive_scan(
            commands in prop::collection::vec("[abé→;]{0,4}", 0..12),
            buffer in "[abé→; ]{0,16}",
        ) {
            let snippets: Vec<Snippet> = commands
                .iter()
                .enumerate()
                .map(|(i, command)| snippet(&i.to_string(), command, "x"))
                .collect();
            let index = CommandIndex::build(snippets.clone());

            let found = index
                .find_longest_suffix_match(&buffer)
                .map(|m| (m.snippet.id.clone(), m.matched_len));
            prop_assert_eq!(found, naive_longest_suffix(&snippets, &buffer));
        }

        /// Every command is found at the end of any buffer it terminates.
        #[test]
        fn prop_registered_command_is_never_missed(
            commands in prop::collection::vec("[a-zé→]{1,6}", 1..40),
            prefix in "[a-z ]{0,10}",
            pick in any::<prop::sample::Index>(),
        ) {
            let snippets: Vec<Snippet> = commands
                .iter()
                .enumerate()
                .map(|(i, command)| snippet(&i.to_string(), command, "x"))
                .collect();
            let index = CommandIndex::build(snippets);

            let command = pick.get(&commands);
            let buffer = format!("{}{}", prefix, command);
            let found = index.find_longest_suffix_match(&buffer);
            prop_assert!(found.is_some_and(|m| m.matched_len >= command.chars().count()));
        }
    }
}
