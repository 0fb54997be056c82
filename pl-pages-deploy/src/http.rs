//! Blocking `ureq` calls bridged onto the tokio runtime.
//!
//! Non-2xx statuses are returned as ordinary responses so each caller
//! decides what counts as failure; only transport problems are errors.

use serde::de::DeserializeOwned;

use crate::error::HttpError;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|source| HttpError::Decode {
            url: self.url.clone(),
            source,
        })
    }
}

/// Shared HTTP agent.
#[derive(Debug, Clone)]
pub struct Http {
    agent: ureq::Agent,
}

impl Default for Http {
    fn default() -> Self {
        Self::new()
    }
}

impl Http {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }

    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        let agent = self.agent.clone();
        let target = url.to_owned();
        run(url, move || agent.get(&target).call()).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<HttpResponse, HttpError> {
        let agent = self.agent.clone();
        let target = url.to_owned();
        run(url, move || {
            agent
                .post(&target)
                .set("Accept", "application/json")
                .send_json(body)
        })
        .await
    }

    pub async fn post_bytes(
        &self,
        url: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<HttpResponse, HttpError> {
        let agent = self.agent.clone();
        let target = url.to_owned();
        run(url, move || {
            agent
                .post(&target)
                .set("Content-Type", content_type)
                .set("Accept", "application/json")
                .send_bytes(&body)
        })
        .await
    }
}

async fn run<F>(url: &str, call: F) -> Result<HttpResponse, HttpError>
where
    F: FnOnce() -> Result<ureq::Response, ureq::Error> + Send + 'static,
{
    let owned = url.to_owned();
    tracing::debug!(url = %owned, "http request");
    let joined = tokio::task::spawn_blocking(move || match call() {
        Ok(response) | Err(ureq::Error::Status(_, response)) => read(owned, response),
        Err(ureq::Error::Transport(transport)) => Err(HttpError::Transport {
            url: owned,
            message: transport.to_string(),
        }),
    })
    .await;
    joined.map_err(|e| HttpError::Transport {
        url: url.to_owned(),
        message: e.to_string(),
    })?
}

fn read(url: String, response: ureq::Response) -> Result<HttpResponse, HttpError> {
    let status = response.status();
    match response.into_string() {
        Ok(body) => Ok(HttpResponse { url, status, body }),
        Err(e) => Err(HttpError::Body {
            url,
            message: e.to_string(),
        }),
    }
}
