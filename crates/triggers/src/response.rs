//! SIP trigger helpers over whole responses.
//!
//! Only text messages with at least one segment are looked at.

use {
    bpi_messages::{Substitution, response::map_text_messages},
    bpi_protocol::DetectIntentResponse,
    once_cell::sync::Lazy,
};

use crate::kind::TriggerKind;

static SIP_STRIPPERS: Lazy<Vec<Substitution>> = Lazy::new(|| {
    TriggerKind::SIP
        .iter()
        .filter_map(|kind| Substitution::new(kind.pattern()))
        .collect()
});

/// SIP triggers present in the response and all their payloads.
///
/// A kind is listed once per message it occurs in.
#[must_use]
pub fn check_for_triggers(response: &DetectIntentResponse) -> (Vec<TriggerKind>, Vec<String>) {
    let mut kinds = Vec::new();
    let mut payloads = Vec::new();
    for message in response.messages().iter().filter(|m| m.has_text()) {
        for &kind in TriggerKind::SIP {
            let Some(re) = kind.regex() else {
                continue;
            };
            if bpi_messages::matches(message, re) {
                kinds.push(kind);
                payloads.extend(bpi_messages::extract_with(message, re));
            }
        }
    }
    (kinds, payloads)
}

/// Delete every SIP trigger marker from the response's text messages.
#[must_use]
pub fn remove_triggers(response: DetectIntentResponse) -> DetectIntentResponse {
    map_text_messages(response, |message| {
        SIP_STRIPPERS
            .iter()
            .fold(message, |m, sub| sub.apply(&m, "", false))
    })
}
