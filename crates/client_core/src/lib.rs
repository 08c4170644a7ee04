use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shared::{
    domain::{GroupId, StudentId},
    error::ApiException,
    protocol::{ApiCall, Endpoint, SearchKind, DEFAULT_SEARCH_TYPE},
};
use thiserror::Error;
use tracing::debug;

pub mod local;
pub mod routes;
pub mod transport;

pub use local::LocalBackend;
pub use routes::{Method, RouteMatch};
pub use transport::HttpTransport;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The server answered with a non-success status.
    #[error("{status}: {message}")]
    Transport { status: u16, message: String },
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("path `{0}` does not carry a record id")]
    MissingId(String),
    #[error("invalid payload for {endpoint:?}: {source}")]
    InvalidPayload {
        endpoint: Endpoint,
        #[source]
        source: serde_json::Error,
    },
    #[error("json conversion failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Rejected(#[from] ApiException),
    #[error(transparent)]
    Local(#[from] anyhow::Error),
}

impl DispatchError {
    /// HTTP status of a transport failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Serves `(method, path, payload)` calls either from a local backend or from
/// the HTTP server, with the same results either way.
pub struct Dispatcher {
    local: Option<Arc<dyn LocalBackend>>,
    transport: HttpTransport,
}

impl Dispatcher {
    pub fn new(server_url: &str) -> Result<Self, DispatchError> {
        Ok(Self {
            local: None,
            transport: HttpTransport::new(server_url)?,
        })
    }

    pub fn with_local_backend(mut self, backend: Arc<dyn LocalBackend>) -> Self {
        self.local = Some(backend);
        self
    }

    pub fn has_local_backend(&self) -> bool {
        self.local.is_some()
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<Value, DispatchError> {
        if let Some(backend) = &self.local {
            if let Some(route) = routes::decode(method, path) {
                let call = decode_call(&route, path, payload)?;
                debug!(
                    %method,
                    path,
                    endpoint = ?call.endpoint(),
                    "dispatching to local backend"
                );
                call.validate()?;
                let reply = local::execute(backend.as_ref(), call).await?;
                return Ok(serde_json::to_value(reply)?);
            }
            debug!(%method, path, "no local route matched; using network");
        }

        self.transport.send(method, path, payload.as_ref()).await
    }

    pub async fn request_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<T, DispatchError> {
        let value = self.request(method, path, payload).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Builds the typed call for a matched route. A missing payload reads as `{}`.
pub fn decode_call(
    route: &RouteMatch,
    path: &str,
    payload: Option<Value>,
) -> Result<ApiCall, DispatchError> {
    let payload = payload.unwrap_or_else(|| Value::Object(Map::new()));
    let id = || route.id.ok_or_else(|| DispatchError::MissingId(path.to_string()));
    let endpoint = route.endpoint;

    let call = match endpoint {
        Endpoint::ListStudents => ApiCall::ListStudents,
        Endpoint::CreateStudent => ApiCall::CreateStudent(decode_body(endpoint, payload)?),
        Endpoint::SearchStudents => ApiCall::SearchStudents {
            query: route.query_param("q").unwrap_or_default().to_string(),
            kind: SearchKind::from_param(
                route.query_param("type").unwrap_or(DEFAULT_SEARCH_TYPE),
            ),
        },
        Endpoint::ImportStudents => ApiCall::ImportStudents(decode_body(endpoint, payload)?),
        Endpoint::GetStudent => ApiCall::GetStudent(StudentId(id()?)),
        Endpoint::UpdateStudent => {
            ApiCall::UpdateStudent(StudentId(id()?), decode_body(endpoint, payload)?)
        }
        Endpoint::DeleteStudent => ApiCall::DeleteStudent(StudentId(id()?)),
        Endpoint::ListStudentTransferRequests => {
            ApiCall::ListStudentTransferRequests(StudentId(id()?))
        }
        Endpoint::ListGroups => ApiCall::ListGroups,
        Endpoint::CreateGroup => ApiCall::CreateGroup(decode_body(endpoint, payload)?),
        Endpoint::DeleteGroup => ApiCall::DeleteGroup(GroupId(id()?)),
        Endpoint::CreateTransferRequest => {
            ApiCall::CreateTransferRequest(decode_body(endpoint, payload)?)
        }
    };
    Ok(call)
}

fn decode_body<T: DeserializeOwned>(
    endpoint: Endpoint,
    payload: Value,
) -> Result<T, DispatchError> {
    serde_json::from_value(payload)
        .map_err(|source| DispatchError::InvalidPayload { endpoint, source })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
