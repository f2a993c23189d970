//! Output-context parameter lookup and value-returning edits.

use {
    bpi_protocol::{Context, ContextParameter, DetectIntentResponse},
    tracing::{debug, info},
};

/// First output context whose name ends with `suffix`.
#[must_use]
pub fn get_context<'a>(response: &'a DetectIntentResponse, suffix: &str) -> Option<&'a Context> {
    let found = response.contexts().iter().find(|c| c.name.ends_with(suffix));
    debug!(suffix, found = found.is_some(), "searched output contexts");
    found
}

/// Parameter `param` of the context matched by [`get_context`].
#[must_use]
pub fn get_param<'a>(
    response: &'a DetectIntentResponse,
    param: &str,
    context_suffix: &str,
) -> Option<&'a ContextParameter> {
    let value = get_context(response, context_suffix)?.parameters.get(param);
    debug!(param, context = context_suffix, found = value.is_some(), "looked up parameter");
    value
}

/// Value of parameter `param`, or `None`.
#[must_use]
pub fn get_param_value<'a>(
    response: &'a DetectIntentResponse,
    param: &str,
    context_suffix: &str,
) -> Option<&'a str> {
    get_param(response, param, context_suffix).map(|p| p.value.as_str())
}

/// Set `params` on the output context named exactly `context_name`.
///
/// Each parameter gets its key as display name. Responses without such a
/// context come back unchanged.
#[must_use]
pub fn add_params<I, K, V>(
    mut response: DetectIntentResponse,
    params: I,
    context_name: &str,
) -> DetectIntentResponse
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    info!(context = context_name, "adding parameters to response");
    let params: Vec<ContextParameter> = params
        .into_iter()
        .map(|(k, v)| ContextParameter::new(k, v))
        .collect();
    for context in response
        .query_result
        .output_contexts
        .iter_mut()
        .filter(|c| c.name == context_name)
    {
        for param in &params {
            context
                .parameters
                .insert(param.display_name.clone(), param.clone());
        }
    }
    response
}

/// Remove parameter `param` from every output context.
#[must_use]
pub fn delete_param(mut response: DetectIntentResponse, param: &str) -> DetectIntentResponse {
    info!(param, "deleting parameter from response");
    for context in &mut response.query_result.output_contexts {
        context.parameters.remove(param);
    }
    response
}
