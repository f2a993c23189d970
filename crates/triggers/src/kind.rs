use std::{collections::HashMap, fmt, str::FromStr};

use {once_cell::sync::Lazy, regex::Regex};

// ── TriggerKind ─────────────────────────────────────────────────────────────

/// Textual markers recognized in fulfillment messages.
///
/// SIP triggers control the telephony channel; query triggers steer the
/// question-answering backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TriggerKind {
    SipHangup,
    SipHumanHandover,
    SipSendNow,
    SipTransfer,
    SipPause,
    SipPlayAudio,
    QuerySearch,
    QueryUrlFilter,
}

impl TriggerKind {
    /// All variants, in scan order.
    pub const ALL: &'static [TriggerKind] = &[
        Self::SipHangup,
        Self::SipHumanHandover,
        Self::SipSendNow,
        Self::SipTransfer,
        Self::SipPause,
        Self::SipPlayAudio,
        Self::QuerySearch,
        Self::QueryUrlFilter,
    ];

    /// The SIP subset of [`Self::ALL`].
    pub const SIP: &'static [TriggerKind] = &[
        Self::SipHangup,
        Self::SipHumanHandover,
        Self::SipSendNow,
        Self::SipTransfer,
        Self::SipPause,
        Self::SipPlayAudio,
    ];

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::SipHangup => "SIP:HANGUP",
            Self::SipHumanHandover => "SIP:HUMAN_HANDOVER",
            Self::SipSendNow => "SIP:SEND_NOW",
            Self::SipTransfer => "SIP:TRANSFER",
            Self::SipPause => "SIP:PAUSE",
            Self::SipPlayAudio => "SIP:PLAY_AUDIO",
            Self::QuerySearch => "QUERY:SEARCH",
            Self::QueryUrlFilter => "QUERY:URL_FILTER",
        }
    }

    /// Regex source for the marker. Kinds that carry an argument capture it
    /// as group 1, parentheses included.
    #[must_use]
    pub fn pattern(self) -> &'static str {
        match self {
            Self::SipHangup => r"\[SIP:HANGUP\]",
            Self::SipHumanHandover => r"\[SIP:HUMAN_HANDOVER\]",
            Self::SipSendNow => r"\[SIP:SEND_NOW(\([^)\]]*\))\]",
            Self::SipTransfer => r"\[SIP:TRANSFER(\([^)\]]*\))\]",
            Self::SipPause => r"\[SIP:PAUSE(\([^)\]]*\))\]",
            Self::SipPlayAudio => r"\[SIP:PLAY_AUDIO(\([^)\]]*\))\]",
            Self::QuerySearch => r"\[QUERY:SEARCH(\([^)\]]*\))\]",
            Self::QueryUrlFilter => r"\[QUERY:URL_FILTER(\([^)\]]*\))\]",
        }
    }

    #[must_use]
    pub fn is_sip(self) -> bool {
        Self::SIP.contains(&self)
    }

    /// The compiled [`Self::pattern`].
    #[must_use]
    pub fn regex(self) -> Option<&'static Regex> {
        PATTERNS.get(&self)
    }
}

static PATTERNS: Lazy<HashMap<TriggerKind, Regex>> = Lazy::new(|| {
    TriggerKind::ALL
        .iter()
        .filter_map(|&kind| bpi_messages::compile(kind.pattern()).map(|re| (kind, re)))
        .collect()
});

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A trigger identifier that names no known [`TriggerKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trigger: {0}")]
pub struct UnknownTrigger(pub String);

impl FromStr for TriggerKind {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.id() == s)
            .ok_or_else(|| UnknownTrigger(s.to_string()))
    }
}

// ── FoundTriggers ───────────────────────────────────────────────────────────

/// Triggers found in one message with their payloads, in scan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundTriggers {
    entries: Vec<(TriggerKind, Vec<String>)>,
}

impl FoundTriggers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `kind`, replacing any earlier payloads for it.
    pub fn insert(&mut self, kind: TriggerKind, payloads: Vec<String>) {
        match self.entries.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => *existing = payloads,
            None => self.entries.push((kind, payloads)),
        }
    }

    #[must_use]
    pub fn get(&self, kind: TriggerKind) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p.as_slice())
    }

    #[must_use]
    pub fn contains(&self, kind: TriggerKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn kinds(&self) -> impl Iterator<Item = TriggerKind> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TriggerKind, &[String])> {
        self.entries.iter().map(|(k, p)| (*k, p.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for FoundTriggers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (kind, payloads)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}: {payloads:?}")?;
        }
        f.write_str("}")
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[test]
    fn every_pattern_compiles() {
        for &kind in TriggerKind::ALL {
            assert!(kind.regex().is_some(), "{kind} did not compile");
        }
    }

    #[test]
    fn ids_round_trip_through_from_str() {
        for &kind in TriggerKind::ALL {
            assert_eq!(kind.id().parse::<TriggerKind>().unwrap(), kind);
        }
        assert_eq!(
            "SIP:NOPE".parse::<TriggerKind>(),
            Err(UnknownTrigger("SIP:NOPE".into()))
        );
    }

    #[rstest]
    #[case(TriggerKind::SipHangup, true)]
    #[case(TriggerKind::SipPlayAudio, true)]
    #[case(TriggerKind::QuerySearch, false)]
    #[case(TriggerKind::QueryUrlFilter, false)]
    fn sip_subset(#[case] kind: TriggerKind, #[case] expected: bool) {
        assert_eq!(kind.is_sip(), expected);
    }

    #[rstest]
    #[case(TriggerKind::SipHangup, "Bye [SIP:HANGUP]", true)]
    #[case(TriggerKind::SipHangup, "Bye [SIP:HANGUP('x')]", false)]
    #[case(TriggerKind::SipTransfer, "[SIP:TRANSFER('+4930')]", true)]
    #[case(TriggerKind::SipTransfer, "[SIP:TRANSFER]", false)]
    #[case(TriggerKind::QueryUrlFilter, "[QUERY:URL_FILTER('.*wiki.*')]", true)]
    fn patterns_match_markers(
        #[case] kind: TriggerKind,
        #[case] text: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(kind.regex().unwrap().is_match(text), expected);
    }

    #[test]
    fn found_triggers_keep_insertion_order() {
        let mut found = FoundTriggers::new();
        found.insert(TriggerKind::SipPause, vec!["2".into()]);
        found.insert(TriggerKind::SipHangup, vec!["[SIP:HANGUP]".into()]);
        found.insert(TriggerKind::SipPause, vec!["3".into()]);

        let kinds: Vec<_> = found.kinds().collect();
        assert_eq!(kinds, vec![TriggerKind::SipPause, TriggerKind::SipHangup]);
        assert_eq!(found.get(TriggerKind::SipPause), Some(&["3".to_string()][..]));
        assert!(!found.contains(TriggerKind::SipTransfer));
        assert_eq!(found.len(), 2);
    }
}
