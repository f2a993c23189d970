//! Race a turn between the NLU and QA backends.
//!
//! The NLU answer is taken as soon as it arrives unless it is the fallback
//! intent. In that case the QA answer wins if it has any fulfillment message.
//! A failed backend call fails the turn whichever backend finishes first.

use std::sync::Arc;

use {
    bpi_client::{NluClient, QaClient},
    bpi_config::QaConfig,
    bpi_protocol::{
        DetectIntentRequest, DetectIntentResponse, GetAnswerRequest, GetAnswerResponse, TextInput,
        UrlFilter, names,
    },
    tokio::task::JoinError,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use bpi_metrics::{counter, labels, race as race_metrics};

use crate::{Result, loops::SessionLoops};

/// Which backend answered a raced turn.
#[derive(Debug, Clone, PartialEq)]
pub enum RaceOutcome {
    /// The NLU answer, still to be post-processed.
    Nlu(DetectIntentResponse),
    /// The QA answer, returned as is.
    Qa(DetectIntentResponse),
    /// A backend call failed; the turn gets the empty response.
    Failed,
}

impl RaceOutcome {
    #[must_use]
    pub fn source(&self) -> &'static str {
        match self {
            Self::Nlu(_) => "nlu",
            Self::Qa(_) => "qa",
            Self::Failed => "failed",
        }
    }
}

/// Runs raced turns, one at a time per session.
pub struct QaRace {
    nlu: Arc<dyn NluClient>,
    qa: Arc<dyn QaClient>,
    settings: QaConfig,
    fallback_intent: String,
    loops: Arc<SessionLoops>,
}

impl QaRace {
    pub fn new(
        nlu: Arc<dyn NluClient>,
        qa: Arc<dyn QaClient>,
        settings: QaConfig,
        fallback_intent: impl Into<String>,
        loops: Arc<SessionLoops>,
    ) -> Self {
        Self {
            nlu,
            qa,
            settings,
            fallback_intent: fallback_intent.into(),
            loops,
        }
    }

    #[must_use]
    pub fn loops(&self) -> &Arc<SessionLoops> {
        &self.loops
    }

    pub async fn run(&self, request: DetectIntentRequest) -> RaceOutcome {
        self.loops.evict_idle();
        let gate = self.loops.touch(&request.session);
        let _turn = gate.lock().await;

        let outcome = self.race(request).await;
        info!(winner = outcome.source(), "race finished");
        #[cfg(feature = "metrics")]
        counter!(race_metrics::WINNERS_TOTAL, labels::SOURCE => outcome.source()).increment(1);
        outcome
    }

    async fn race(&self, request: DetectIntentRequest) -> RaceOutcome {
        let nlu_task = {
            let nlu = Arc::clone(&self.nlu);
            let request = request.clone();
            tokio::spawn(async move { nlu.detect_intent(request).await })
        };
        let qa_task = self.settings.active.then(|| {
            let nlu = Arc::clone(&self.nlu);
            let qa = Arc::clone(&self.qa);
            let settings = self.settings.clone();
            tokio::spawn(async move { ask_qa(nlu.as_ref(), qa.as_ref(), &settings, &request).await })
        });

        let Some(mut qa_task) = qa_task else {
            return match nlu_result(nlu_task.await) {
                Some(response) => RaceOutcome::Nlu(response),
                None => RaceOutcome::Failed,
            };
        };
        let mut nlu_task = nlu_task;

        tokio::select! {
            joined = &mut nlu_task => {
                let Some(nlu_response) = nlu_result(joined) else {
                    return RaceOutcome::Failed;
                };
                debug!(intent = nlu_response.intent_display_name(), "NLU answered first");
                if nlu_response.intent_display_name() != self.fallback_intent {
                    debug!("NLU answer is not the fallback, returning early");
                    // the QA task keeps running detached
                    drop(qa_task);
                    return RaceOutcome::Nlu(nlu_response);
                }
                match qa_result(qa_task.await) {
                    Some(answer) => self.decide(nlu_response, answer),
                    None => RaceOutcome::Failed,
                }
            },
            joined = &mut qa_task => {
                let Some(answer) = qa_result(joined) else {
                    return RaceOutcome::Failed;
                };
                debug!(has_answer = answer.has_answer(), "QA answered first, waiting for NLU");
                match nlu_result(nlu_task.await) {
                    Some(nlu_response) => self.decide(nlu_response, answer),
                    None => RaceOutcome::Failed,
                }
            },
        }
    }

    /// Both backends answered: QA wins only over the fallback intent and
    /// only with at least one message.
    fn decide(&self, nlu_response: DetectIntentResponse, answer: GetAnswerResponse) -> RaceOutcome {
        if nlu_response.intent_display_name() != self.fallback_intent {
            return RaceOutcome::Nlu(nlu_response);
        }
        if answer.has_answer() {
            debug!(
                confidence = answer.query_result.query_result.intent_detection_confidence,
                threshold = self.settings.threshold_reader,
                "QA answered"
            );
            RaceOutcome::Qa(answer.query_result)
        } else {
            debug!("no answer from QA, keeping the fallback");
            RaceOutcome::Nlu(nlu_response)
        }
    }
}

fn nlu_result(
    joined: std::result::Result<bpi_client::Result<DetectIntentResponse>, JoinError>,
) -> Option<DetectIntentResponse> {
    match joined {
        Ok(Ok(response)) => Some(response),
        Ok(Err(e)) => {
            warn!(error = %e, "NLU call failed during race");
            None
        },
        Err(e) => {
            warn!(error = %e, "NLU task failed during race");
            None
        },
    }
}

fn qa_result(
    joined: std::result::Result<Result<GetAnswerResponse>, JoinError>,
) -> Option<GetAnswerResponse> {
    match joined {
        Ok(Ok(answer)) => Some(answer),
        Ok(Err(e)) => {
            warn!(error = %e, "QA call failed during race");
            None
        },
        Err(e) => {
            warn!(error = %e, "QA task failed during race");
            None
        },
    }
}

async fn ask_qa(
    nlu: &dyn NluClient,
    qa: &dyn QaClient,
    settings: &QaConfig,
    request: &DetectIntentRequest,
) -> Result<GetAnswerResponse> {
    let url_filter = url_filter(nlu, settings, &request.session).await;
    let answer_request = answer_request(settings, request, url_filter);
    info!(
        text = %answer_request.text.text,
        url_filter = %answer_request.url_filter.regex_filter_include,
        "asking QA"
    );
    Ok(qa.get_answer(answer_request).await?)
}

/// The URL filter for a session's QA requests.
///
/// Read from the session's filter context: the provisional parameter wins
/// over the default one, a context without either yields an empty filter,
/// and a failed lookup yields the configured fallback.
pub async fn url_filter(nlu: &dyn NluClient, settings: &QaConfig, session: &str) -> String {
    let config = &settings.url_filter;
    let name = names::context_name(session, &config.context);
    match nlu.get_context(&name).await {
        Ok(context) => {
            let param = |key: &str| context.parameters.get(key).map(|p| p.value.clone());
            param(&config.provisional_param)
                .or_else(|| param(&config.default_param))
                .unwrap_or_default()
        },
        Err(e) => {
            info!(session_id = session, error = %e, "no URL filter found");
            config.fallback.clone()
        },
    }
}

#[must_use]
pub fn answer_request(
    settings: &QaConfig,
    request: &DetectIntentRequest,
    url_filter: String,
) -> GetAnswerRequest {
    GetAnswerRequest {
        session_id: request.session.clone(),
        text: TextInput {
            text: request.input_text().unwrap_or_default().to_string(),
            language_code: settings.language.clone(),
        },
        max_num_answers: settings.max_answers,
        threshold_reader: settings.threshold_reader,
        threshold_retriever: settings.threshold_retriever,
        url_filter: UrlFilter {
            regex_filter_include: url_filter,
        },
    }
}
