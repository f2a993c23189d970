//! Single-message pattern matching.
//!
//! The searchable text of a message is its text segments (for a text message)
//! or its subtitle (for a card). Other message kinds never match.
//!
//! The `&str` entry points compile the pattern on every call and treat an
//! invalid pattern as "no match". Hot paths compile once and use the
//! `Regex` variants.

use {
    bpi_protocol::Message,
    regex::{Captures, Regex},
    tracing::{debug, warn},
};

/// Upper bound on substitution rounds for one piece of text.
pub const MAX_SUBSTITUTIONS: usize = 1000;

/// Compile `pattern`, logging a warning if it is invalid.
#[must_use]
pub fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(pattern, error = %e, "invalid message pattern, treating as no match");
            None
        },
    }
}

/// Whether `pattern` occurs anywhere in the message.
///
/// Text messages are searched as the concatenation of all their segments.
#[must_use]
pub fn check(message: &Message, pattern: &str) -> bool {
    compile(pattern).is_some_and(|re| matches(message, &re))
}

#[must_use]
pub fn matches(message: &Message, re: &Regex) -> bool {
    match message {
        Message::Text(t) => re.is_match(&t.text.concat()),
        Message::Card(c) => re.is_match(&c.subtitle),
        Message::Other(_) => false,
    }
}

/// All occurrences of `pattern` in the message, as payload strings.
///
/// Only the first text segment is searched. Each occurrence yields the whole
/// match when the pattern has no groups, the group when it has one, and every
/// participating group otherwise. Every item then has `(`, `)` and `'` trimmed
/// from both ends in that order, so `[SIP:SEND_NOW('x')]` yields `x`.
#[must_use]
pub fn extract(message: &Message, pattern: &str) -> Vec<String> {
    compile(pattern).map_or_else(Vec::new, |re| extract_with(message, &re))
}

#[must_use]
pub fn extract_with(message: &Message, re: &Regex) -> Vec<String> {
    let haystack = match message {
        Message::Text(_) => message.first_text(),
        Message::Card(c) => Some(c.subtitle.as_str()),
        Message::Other(_) => None,
    };
    let Some(haystack) = haystack else {
        return Vec::new();
    };

    let groups = re.captures_len() - 1;
    re.captures_iter(haystack)
        .flat_map(|caps| find_all_items(&caps, groups))
        .map(|item| strip_payload(&item))
        .collect()
}

fn find_all_items(caps: &Captures<'_>, groups: usize) -> Vec<String> {
    let text = |i: usize| caps.get(i).map(|m| m.as_str().to_string());
    match groups {
        0 => text(0).into_iter().collect(),
        1 => vec![text(1).unwrap_or_default()],
        n => (1..=n).filter_map(text).collect(),
    }
}

fn strip_payload(item: &str) -> String {
    item.trim_matches('(')
        .trim_matches(')')
        .trim_matches('\'')
        .to_string()
}

/// Replace `pattern` with `replacement` in the message.
///
/// Operates on the first text segment or the card subtitle. The rightmost
/// occurrence is replaced first and rounds repeat until nothing matches, a
/// round leaves the text unchanged, or after one round when `once` is set.
/// The input message is not modified.
#[must_use]
pub fn substitute(message: &Message, pattern: &str, replacement: &str, once: bool) -> Message {
    match Substitution::new(pattern) {
        Some(sub) => sub.apply(message, replacement, once),
        None => message.clone(),
    }
}

/// [`substitute`] with a pattern compiled by [`Substitution::new`].
#[must_use]
pub fn substitute_with(
    message: &Message,
    sub: &Substitution,
    replacement: &str,
    once: bool,
) -> Message {
    sub.apply(message, replacement, once)
}

/// A pattern prepared for repeated substitution.
#[derive(Debug, Clone)]
pub struct Substitution {
    pattern: String,
    re: Regex,
}

impl Substitution {
    /// Wrap `pattern` as `head + hit + tail` with a greedy head, so each round
    /// finds the rightmost occurrence. Returns `None` for an invalid pattern.
    #[must_use]
    pub fn new(pattern: &str) -> Option<Self> {
        let wrapped = format!("(?s)^(?P<bpi_head>.*)(?P<bpi_hit>{pattern})(?P<bpi_tail>.*)$");
        match Regex::new(&wrapped) {
            Ok(re) => Some(Self {
                pattern: pattern.to_string(),
                re,
            }),
            Err(e) => {
                warn!(pattern, error = %e, "invalid substitution pattern, leaving message as is");
                None
            },
        }
    }

    #[must_use]
    pub fn apply(&self, message: &Message, replacement: &str, once: bool) -> Message {
        message
            .clone()
            .map_text(|text| self.apply_text(text, |_| replacement.to_string(), once))
    }

    /// Substitute in plain text, computing each replacement from the hit.
    ///
    /// A replacement of `None` stops the rounds and keeps the text as it is.
    pub fn apply_text_with(
        &self,
        text: &str,
        mut replace: impl FnMut(&str) -> Option<String>,
        once: bool,
    ) -> String {
        let mut current = text.to_string();
        for _ in 0..MAX_SUBSTITUTIONS {
            let Some(caps) = self.re.captures(&current) else {
                return current;
            };
            let hit = caps.name("bpi_hit").map_or("", |m| m.as_str());
            if hit.is_empty() {
                return current;
            }
            let Some(replacement) = replace(hit) else {
                return current;
            };
            let head = caps.name("bpi_head").map_or("", |m| m.as_str());
            let tail = caps.name("bpi_tail").map_or("", |m| m.as_str());
            let next = format!("{head}{replacement}{tail}");
            if next == current || once {
                return next;
            }
            current = next;
        }
        warn!(
            pattern = %self.pattern,
            rounds = MAX_SUBSTITUTIONS,
            "substitution did not settle, stopping"
        );
        current
    }

    fn apply_text(&self, text: &str, mut replace: impl FnMut(&str) -> String, once: bool) -> String {
        let out = self.apply_text_with(text, |hit| Some(replace(hit)), once);
        if out != text {
            debug!(pattern = %self.pattern, "substituted pattern in message");
        }
        out
    }
}
