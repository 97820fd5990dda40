use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("endpoint returned status {status}")]
    Status { status: StatusCode, body: String },

    #[error("malformed response body: {0}")]
    Protocol(#[from] serde_json::Error),
}

/// Client for the text generation endpoint: `{prompt}` in, `{response}` out
#[derive(Clone)]
pub struct GenerateClient {
    client: Client,
    endpoint: String,
}

impl GenerateClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn generate(&self, prompt: &str) -> Result<String, RequestError> {
        let transport = |source| RequestError::Transport {
            url: self.endpoint.clone(),
            source,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RequestError::Status { status, body });
        }

        // Read the body first so a missing `response` field is reported as a
        // protocol error rather than a transport one.
        let bytes = response.bytes().await.map_err(transport)?;
        let generated: GenerateResponse = serde_json::from_slice(&bytes)?;
        Ok(generated.response)
    }
}
