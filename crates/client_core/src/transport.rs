use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{routes::Method, DispatchError};

/// Sends dispatcher calls to the HTTP server. Cookies set by the server are
/// kept and sent back on later requests.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(server_url: &str) -> Result<Self, DispatchError> {
        let base_url = Url::parse(server_url)?;
        let http = Client::builder().cookie_store(true).build()?;
        Ok(Self { http, base_url })
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Value, DispatchError> {
        let url = self.base_url.join(path)?;
        debug!(%method, %url, "sending request over network");

        let mut request = self.http.request(method.into(), url);
        if let Some(payload) = payload {
            request = request.json(payload);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(err) => {
                    debug!(%status, error = %err, "failed to read error body");
                    String::new()
                }
            };
            let message = if body.is_empty() {
                status.canonical_reason().unwrap_or_default().to_string()
            } else {
                body
            };
            return Err(DispatchError::Transport {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
