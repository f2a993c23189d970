//! Transforms over every fulfillment message of a response.
//!
//! All functions take the response by value and hand back the transformed
//! one; nothing is edited in place behind the caller's back.

use {
    bpi_protocol::{DetectIntentResponse, Message},
    tracing::info,
};

use crate::{
    dates::{self, DayNames},
    matcher,
};

/// Whether any text message of the response contains `pattern`.
#[must_use]
pub fn check_for_pattern(response: &DetectIntentResponse, pattern: &str) -> bool {
    let Some(re) = matcher::compile(pattern) else {
        return false;
    };
    response
        .messages()
        .iter()
        .filter(|m| m.has_text())
        .any(|m| matcher::matches(m, &re))
}

/// Replace `pattern` with `replacement` in every message.
#[must_use]
pub fn substitute_pattern(
    response: DetectIntentResponse,
    pattern: &str,
    replacement: &str,
) -> DetectIntentResponse {
    info!(pattern, replacement, "replacing text in response");
    let Some(sub) = matcher::Substitution::new(pattern) else {
        return response;
    };
    map_messages(response, |m| sub.apply(&m, replacement, false))
}

#[must_use]
pub fn reformat_date(response: DetectIntentResponse) -> DetectIntentResponse {
    info!("reformatting dates in response");
    map_text_messages(response, |m| dates::reformat_date(&m))
}

#[must_use]
pub fn strip_seconds(response: DetectIntentResponse) -> DetectIntentResponse {
    info!("stripping seconds in response");
    map_text_messages(response, |m| dates::strip_seconds(&m))
}

#[must_use]
pub fn add_weekday(response: DetectIntentResponse, days: DayNames) -> DetectIntentResponse {
    info!(?days, "adding weekday to dates in response");
    map_text_messages(response, |m| dates::add_weekday(&m, days))
}

/// Apply `f` to every message.
#[must_use]
pub fn map_messages(
    mut response: DetectIntentResponse,
    f: impl FnMut(Message) -> Message,
) -> DetectIntentResponse {
    let messages = std::mem::take(&mut response.query_result.fulfillment_messages);
    response.query_result.fulfillment_messages = messages.into_iter().map(f).collect();
    response
}

/// Apply `f` to text messages with at least one segment; others pass through.
#[must_use]
pub fn map_text_messages(
    response: DetectIntentResponse,
    mut f: impl FnMut(Message) -> Message,
) -> DetectIntentResponse {
    map_messages(response, |m| if m.has_text() { f(m) } else { m })
}
