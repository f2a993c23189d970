//! Convenience operations on top of [`NluClient`] for intent handlers.

use {
    bpi_protocol::{
        Context, ContextParameter, DetectIntentRequest, DetectIntentResponse,
        names::context_name,
    },
    tracing::{info, warn},
};

use crate::{NluClient, Result, error::Context as _};

/// Lifespan given to contexts the helpers have to create.
pub const CREATED_LIFESPAN_COUNT: i32 = 100;
pub const CREATED_LIFESPAN_TIME: f32 = 1000.0;
/// Short name of the context that forces an exact intent match.
pub const EXACT_INTENT_CONTEXT: &str = "exact_intent";

/// Merge `params` into the backend context `context` of `session`.
///
/// Reads the context, overwrites the given parameters and writes it back. A
/// context the backend does not know is created instead. Returns the context
/// as written.
pub async fn add_params_to_backend_context<C, I, K, V>(
    client: &C,
    session: &str,
    params: I,
    context: &str,
) -> Result<Context>
where
    C: NluClient + ?Sized,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let name = context_name(session, context);
    let params: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    info!(context = %name, count = params.len(), "adding parameters to backend context");

    match client.get_context(&name).await {
        Ok(mut existing) => {
            for (key, value) in params {
                existing
                    .parameters
                    .insert(key.clone(), ContextParameter::new(key, value));
            }
            client.update_context(existing).await
        },
        Err(e) if e.is_not_found() => {
            let mut created = Context::new(name, CREATED_LIFESPAN_COUNT)
                .with_lifespan_time(CREATED_LIFESPAN_TIME);
            for (key, value) in params {
                created = created.with_parameter(key, value);
            }
            client.create_context(session, created).await
        },
        Err(e) => Err(e),
    }
}

/// Remove one parameter from a backend context.
///
/// The backend has no partial update for parameters, so the context is
/// deleted and recreated without it. A missing parameter is logged and left
/// alone.
pub async fn delete_param_from_backend_context<C>(
    client: &C,
    session: &str,
    param: &str,
    context: &str,
) -> Result<()>
where
    C: NluClient + ?Sized,
{
    let name = context_name(session, context);
    info!(context = %name, param, "deleting parameter from backend context");

    let mut existing = client.get_context(&name).await?;
    if existing.parameters.remove(param).is_none() {
        warn!(context = %name, param, "tried to delete a parameter that does not exist");
        return Ok(());
    }
    client.delete_context(&name).await?;
    client.create_context(session, existing).await?;
    Ok(())
}

/// Send `text` as a new turn in the session `response` belongs to.
pub async fn detect_intent_text<C>(
    client: &C,
    response: &DetectIntentResponse,
    text: &str,
    language: &str,
) -> Result<DetectIntentResponse>
where
    C: NluClient + ?Sized,
{
    let session = response
        .session_id()
        .context("response carries no session id")?;
    let result = client
        .detect_intent(DetectIntentRequest::text(session, text, language))
        .await?;
    info!(
        session,
        text,
        messages = result.messages().len(),
        "detect intent from helper"
    );
    Ok(result)
}

/// Make the backend answer with `intent_name` without intent matching.
///
/// Sends a turn carrying the exact-intent context (lifespan 1) plus any
/// `additional_contexts`.
pub async fn trigger_intent<C>(
    client: &C,
    session: &str,
    intent_name: &str,
    language: &str,
    additional_contexts: Vec<Context>,
) -> Result<DetectIntentResponse>
where
    C: NluClient + ?Sized,
{
    info!(session, intent_name, "triggering specific intent");
    let trigger = Context::new(context_name(session, EXACT_INTENT_CONTEXT), 1)
        .with_parameter("intent_name", intent_name);
    let mut contexts = Vec::with_capacity(additional_contexts.len() + 1);
    contexts.push(trigger);
    contexts.extend(additional_contexts);

    let request = DetectIntentRequest::text(
        session,
        format!("Triggering Specific Intent: {intent_name}"),
        language,
    )
    .with_contexts(contexts);
    client.detect_intent(request).await
}

/// Strip leading and trailing periods from the request text.
#[must_use]
pub fn strip_final_periods(mut request: DetectIntentRequest) -> DetectIntentRequest {
    if let Some(text) = request.query_input.text.as_mut() {
        text.text = text.text.trim_matches('.').to_string();
    }
    request
}
