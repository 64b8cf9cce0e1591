//! Bloom filter over the trailing characters of every configured command.
//!
//! Commands of one character register their only character; longer commands
//! register their last two characters. A buffer can only end with a command
//! if its own trailing unigram or bigram was registered, so a negative answer
//! is always safe to act on. A positive answer may be a false positive and
//! must be confirmed by the trie.

use bloomfilter::Bloom;
use std::fmt;

/// Target false positive rate for tail lookups (1%).
const FALSE_POSITIVE_RATE: f64 = 0.01;

/// Smallest number of entries the filter is sized for.
const MIN_ENTRIES: usize = 64;

#[derive(Hash)]
enum Tail {
    One(char),
    Two(char, char),
}

impl Tail {
    fn of_command(command: &str) -> Option<Self> {
        let mut rev = command.chars().rev();
        match (rev.next(), rev.next()) {
            (Some(last), None) => Some(Tail::One(last)),
            (Some(last), Some(prev)) => Some(Tail::Two(prev, last)),
            (None, _) => None,
        }
    }
}

pub struct SuffixPrefilter {
    bloom: Bloom<Tail>,
    entries: usize,
}

impl fmt::Debug for SuffixPrefilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuffixPrefilter")
            .field("entries", &self.entries)
            .finish()
    }
}

impl SuffixPrefilter {
    /// Size the filter for `entries` commands.
    pub fn with_capacity(entries: usize) -> Self {
        Self {
            bloom: Bloom::new_for_fp_rate(entries.max(MIN_ENTRIES), FALSE_POSITIVE_RATE),
            entries: 0,
        }
    }

    /// Register a command. Empty commands are ignored.
    pub fn insert(&mut self, command: &str) {
        if let Some(tail) = Tail::of_command(command) {
            self.bloom.set(&tail);
            self.entries += 1;
        }
    }

    /// `false` means no registered command can be a suffix of `buffer`.
    pub fn may_match(&self, buffer: &str) -> bool {
        let mut rev = buffer.chars().rev();
        let Some(last) = rev.next() else {
            return false;
        };
        if self.bloom.check(&Tail::One(last)) {
            return true;
        }
        match rev.next() {
            Some(prev) => self.bloom.check(&Tail::Two(prev, last)),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let commands = ["btw", "x", "testing", "test", "ñó", ";sig"];
        let mut filter = SuffixPrefilter::with_capacity(commands.len());
        for command in commands {
            filter.insert(command);
        }

        for command in commands {
            assert!(filter.may_match(command));
            assert!(filter.may_match(&format!("some prefix {}", command)));
        }
    }

    #[test]
    fn test_empty_buffer_never_matches() {
        let mut filter = SuffixPrefilter::with_capacity(1);
        filter.insert("a");
        assert!(!filter.may_match(""));
    }

    #[test]
    fn test_empty_command_is_not_registered() {
        let mut filter = SuffixPrefilter::with_capacity(1);
        filter.insert("");
        assert_eq!(filter.entries, 0);
    }

    #[test]
    fn test_rejects_most_unrelated_tails() {
        let mut filter = SuffixPrefilter::with_capacity(2);
        filter.insert("btw");
        filter.insert("omw");

        let rejected = ('a'..='z')
            .flat_map(|a| ('a'..='z').map(move |b| format!("{}{}", a, b)))
            .filter(|tail| !filter.may_match(tail))
            .count();
        // 676 bigrams checked twice each at a 1% target rate.
        assert!(rejected > 600, "only {} rejected", rejected);
    }
}
