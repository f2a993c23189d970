//! JSON-over-HTTP backend clients.

#[cfg(feature = "metrics")]
use std::time::Instant;

use {
    async_trait::async_trait,
    bpi_protocol::{
        Context, DetectIntentRequest, DetectIntentResponse, GetAnswerRequest, GetAnswerResponse,
    },
    reqwest::{Method, RequestBuilder, Response, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::{Serialize, de::DeserializeOwned},
    tracing::debug,
};

#[cfg(feature = "metrics")]
use bpi_metrics::{backend as backend_metrics, counter, histogram, labels};

use crate::{Error, NluClient, QaClient, Result};

#[derive(Clone)]
enum Auth {
    None,
    Bearer(Secret<String>),
    Basic {
        user: String,
        password: Option<Secret<String>>,
    },
}

/// Shared request plumbing for both backends.
#[derive(Clone)]
struct Endpoint {
    http: reqwest::Client,
    base_url: String,
    auth: Auth,
    backend: &'static str,
}

impl Endpoint {
    fn new(base_url: impl Into<String>, backend: &'static str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth: Auth::None,
            backend,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self
            .http
            .request(method, url)
            .header("Accept", "application/json");
        match &self.auth {
            Auth::None => builder,
            Auth::Bearer(token) => builder.bearer_auth(token.expose_secret()),
            Auth::Basic { user, password } => {
                builder.basic_auth(user, password.as_ref().map(|p| p.expose_secret()))
            },
        }
    }

    async fn call<B, T>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let resp = self.send(operation, method, path, body).await?;
        resp.json().await.map_err(|source| {
            Error::external(format!("failed to parse {operation} response"), source)
        })
    }

    async fn send<B>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response>
    where
        B: Serialize + Sync,
    {
        #[cfg(feature = "metrics")]
        let start = Instant::now();

        debug!(backend = self.backend, operation, path, "backend call");
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let result = builder
            .send()
            .await
            .map_err(|source| Error::external(format!("{operation} request failed"), source));

        #[cfg(feature = "metrics")]
        {
            let status = match &result {
                Ok(resp) => resp.status().as_u16().to_string(),
                Err(_) => "error".to_string(),
            };
            counter!(
                backend_metrics::CALLS_TOTAL,
                labels::BACKEND => self.backend,
                labels::OPERATION => operation,
                labels::STATUS => status
            )
            .increment(1);
            histogram!(
                backend_metrics::CALL_DURATION_SECONDS,
                labels::BACKEND => self.backend,
                labels::OPERATION => operation
            )
            .record(start.elapsed().as_secs_f64());
        }

        let resp = result?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(path.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            #[cfg(feature = "metrics")]
            counter!(
                backend_metrics::ERRORS_TOTAL,
                labels::BACKEND => self.backend,
                labels::OPERATION => operation
            )
            .increment(1);
            return Err(Error::Status {
                operation,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

// ── NLU ─────────────────────────────────────────────────────────────────────

/// NLU backend reached over its JSON/HTTP gateway.
///
/// Resource names are passed through as URL paths, so a session
/// `projects/p/agent/sessions/s` is detected at
/// `{base}/v2/projects/p/agent/sessions/s:detectIntent`.
#[derive(Clone)]
pub struct HttpNluClient {
    endpoint: Endpoint,
}

impl HttpNluClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, "nlu"),
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Secret<String>) -> Self {
        self.endpoint.auth = Auth::Bearer(token);
        self
    }

    #[must_use]
    pub fn with_basic_auth(
        mut self,
        user: impl Into<String>,
        password: Option<Secret<String>>,
    ) -> Self {
        self.endpoint.auth = Auth::Basic {
            user: user.into(),
            password,
        };
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.endpoint.base_url
    }
}

#[async_trait]
impl NluClient for HttpNluClient {
    async fn detect_intent(&self, request: DetectIntentRequest) -> Result<DetectIntentResponse> {
        let path = format!("v2/{}:detectIntent", request.session);
        self.endpoint
            .call("detect_intent", Method::POST, &path, Some(&request))
            .await
    }

    async fn get_context(&self, name: &str) -> Result<Context> {
        self.endpoint
            .call::<(), _>("get_context", Method::GET, &format!("v2/{name}"), None)
            .await
    }

    async fn update_context(&self, context: Context) -> Result<Context> {
        let path = format!("v2/{}", context.name);
        self.endpoint
            .call("update_context", Method::PATCH, &path, Some(&context))
            .await
    }

    async fn create_context(&self, session: &str, context: Context) -> Result<Context> {
        let path = format!("v2/{session}/contexts");
        self.endpoint
            .call("create_context", Method::POST, &path, Some(&context))
            .await
    }

    async fn delete_context(&self, name: &str) -> Result<()> {
        self.endpoint
            .send::<()>("delete_context", Method::DELETE, &format!("v2/{name}"), None)
            .await?;
        Ok(())
    }
}

// ── QA ──────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct HttpQaClient {
    endpoint: Endpoint,
}

impl HttpQaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint::new(base_url, "qa"),
        }
    }
}

#[async_trait]
impl QaClient for HttpQaClient {
    async fn get_answer(&self, request: GetAnswerRequest) -> Result<GetAnswerResponse> {
        self.endpoint
            .call("get_answer", Method::POST, "v1/qa:getAnswer", Some(&request))
            .await
    }
}
