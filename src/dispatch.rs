use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::lead::AssignmentRequest;
use crate::response::{AssignmentResult, FailureKind};

const USER_AGENT: &str = concat!("assignment-tester/", env!("CARGO_PKG_VERSION"));
const BODY_PREVIEW_CHARS: usize = 180;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("POST {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("POST {url} returned {status}: {preview}")]
    Status {
        url: String,
        status: StatusCode,
        preview: String,
    },
    #[error("POST {url} returned content-type {found:?}, expected application/json")]
    ContentType { url: String, found: String },
    #[error("invalid JSON response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport { .. } | Self::Status { .. } | Self::Decode { .. } => {
                FailureKind::Transport
            }
            Self::ContentType { .. } => FailureKind::ContentType,
        }
    }
}

/// The remote assignment endpoint.
#[async_trait]
pub trait AssignmentService: Send + Sync {
    fn endpoint(&self) -> &str;
    async fn assign(&self, request: &AssignmentRequest) -> Result<AssignmentResult, DispatchError>;
}

pub struct HttpAssignmentService {
    client: Client,
    url: String,
}

impl HttpAssignmentService {
    /// No request timeout is set; only connection setup is bounded.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AssignmentService for HttpAssignmentService {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn assign(&self, request: &AssignmentRequest) -> Result<AssignmentResult, DispatchError> {
        let url = self.url.as_str();
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|source| DispatchError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!(%status, %content_type, bytes = body.len(), "assignment response received");

        if !status.is_success() {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            return Err(DispatchError::Status {
                url: url.to_string(),
                status,
                preview,
            });
        }
        if !is_json_content_type(&content_type) {
            return Err(DispatchError::ContentType {
                url: url.to_string(),
                found: content_type,
            });
        }
        serde_json::from_str(&body).map_err(|source| DispatchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

pub fn is_json_content_type(raw: &str) -> bool {
    let essence = raw.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence.to_ascii_lowercase().ends_with("+json")
}

/// Sends one request and always yields a displayable result.
///
/// Transport and content-type errors are folded into a `success: false`
/// result; a `success: false` answer from the service is tagged as an
/// assignment failure. Nothing is retried.
pub async fn dispatch(service: &dyn AssignmentService, request: &AssignmentRequest) -> AssignmentResult {
    if let Some(params) = &request.algorithm_params {
        if !params.weights.is_balanced() {
            warn!(
                sum = params.weights.sum(),
                "scoring weights do not sum to 1.0, sending as-is"
            );
        }
    }
    info!(endpoint = service.endpoint(), city = %request.lead.city, "submitting lead");

    match service.assign(request).await {
        Ok(mut result) => {
            result.tag_remote_failure();
            info!(success = result.success, salesperson = ?result.salesperson, "assignment finished");
            result
        }
        Err(err) => {
            warn!("assignment request failed: {err}");
            let message = match err.kind() {
                FailureKind::ContentType => {
                    "Error testing assignment: the service did not answer with JSON."
                }
                _ => "Error testing assignment: the service could not be reached or rejected the request.",
            };
            AssignmentResult::failed(err.kind(), message, err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::lead::{AlgorithmParams, LeadInput, ParamOverrides};

    struct CannedService {
        answer: Mutex<Option<Result<AssignmentResult, DispatchError>>>,
        seen: Mutex<Vec<AssignmentRequest>>,
    }

    impl CannedService {
        fn new(answer: Result<AssignmentResult, DispatchError>) -> Self {
            Self {
                answer: Mutex::new(Some(answer)),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AssignmentService for CannedService {
        fn endpoint(&self) -> &str {
            "memory://canned"
        }

        async fn assign(
            &self,
            request: &AssignmentRequest,
        ) -> Result<AssignmentResult, DispatchError> {
            self.seen.lock().unwrap().push(request.clone());
            self.answer.lock().unwrap().take().expect("called once")
        }
    }

    fn request() -> AssignmentRequest {
        AssignmentRequest::new(
            LeadInput {
                first_name: "John".into(),
                last_name: "Smith".into(),
                phone: "416-555-0123".into(),
                city: "Toronto".into(),
                ..LeadInput::default()
            },
            None,
        )
        .expect("valid lead")
    }

    #[test]
    fn recognizes_json_content_types() {
        assert!(is_json_content_type("application/json"));
        assert!(is_json_content_type("application/json; charset=utf-8"));
        assert!(is_json_content_type("application/problem+json"));
        assert!(!is_json_content_type("text/html; charset=utf-8"));
        assert!(!is_json_content_type(""));
    }

    #[test]
    fn content_type_error_maps_to_content_type_kind() {
        let err = DispatchError::ContentType {
            url: "https://example.test".into(),
            found: "text/html".into(),
        };
        assert_eq!(err.kind(), FailureKind::ContentType);
    }

    #[tokio::test]
    async fn remote_success_false_is_tagged_as_assignment_failure() {
        let service = CannedService::new(Ok(AssignmentResult {
            success: false,
            response: Some("No salesperson available".into()),
            ..AssignmentResult::default()
        }));
        let result = dispatch(&service, &request()).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::Assignment));
        assert_eq!(result.response.as_deref(), Some("No salesperson available"));
    }

    #[tokio::test]
    async fn content_type_error_becomes_failure_result() {
        let service = CannedService::new(Err(DispatchError::ContentType {
            url: "https://example.test".into(),
            found: "text/html".into(),
        }));
        let result = dispatch(&service, &request()).await;
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::ContentType));
        assert!(result.error.as_deref().unwrap_or_default().contains("text/html"));
    }

    #[test]
    fn unbalanced_weights_are_still_sent() {
        let params = ParamOverrides {
            capacity: Some(0.9),
            ..ParamOverrides::default()
        }
        .apply(AlgorithmParams::default());
        let mut req = request();
        req.algorithm_params = Some(params);
        let service = CannedService::new(Ok(AssignmentResult {
            success: true,
            ..AssignmentResult::default()
        }));
        let result = tokio_test::block_on(dispatch(&service, &req));
        assert!(result.success);
        assert_eq!(result.failure, None);
        let seen = service.seen.lock().unwrap();
        assert_eq!(seen[0].algorithm_params, Some(params));
    }
}
