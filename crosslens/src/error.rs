use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, status, Responder};
use rocket::serde::json::Json;
use thiserror::Error;

/// Errors surfaced to HTTP callers.
///
/// Extraction problems are not represented here: they are recovered into
/// [`crate::extraction::ExtractionOutcome`] and only mark a result partial.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or empty request input.
    #[error("{0}")]
    InvalidInput(String),

    /// The model reply was not valid JSON or broke the requested schema.
    #[error("model response violated schema: {0}")]
    SchemaViolation(String),

    /// A target reached aggregation without a result.
    #[error("no result produced for target {url}")]
    MissingResult { url: String },

    /// Vendor API or local IO failure.
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidInput(_) => Status::BadRequest,
            Self::SchemaViolation(_) | Self::Upstream(_) => Status::BadGateway,
            Self::MissingResult { .. } => Status::InternalServerError,
        }
    }
}

impl<'r> Responder<'r, 'static> for ServiceError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            tracing::error!(status = status.code, error = ?self, "request failed");
        } else {
            tracing::warn!(status = status.code, error = %self, "request rejected");
        }
        let body = serde_json::json!({ "detail": DisplayChain(&self).to_string() });
        status::Custom(status, Json(body)).respond_to(req)
    }
}

/// Renders the anyhow context chain for upstream errors.
struct DisplayChain<'a>(&'a ServiceError);

impl std::fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            ServiceError::Upstream(e) => write!(f, "{:#}", e),
            other => write!(f, "{}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn status_mapping() {
        assert_eq!(ServiceError::invalid("empty").status(), Status::BadRequest);
        assert_eq!(ServiceError::schema("no tone").status(), Status::BadGateway);
        assert_eq!(
            ServiceError::MissingResult { url: "https://a.example".into() }.status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn upstream_chain_is_rendered() {
        let err: anyhow::Result<()> = Err(anyhow::anyhow!("429 Too Many Requests"));
        let err = ServiceError::from(err.context("LLM HTTP request failed").unwrap_err());
        let rendered = format!("{}", DisplayChain(&err));
        assert!(rendered.contains("LLM HTTP request failed"));
        assert!(rendered.contains("429"));
    }
}
