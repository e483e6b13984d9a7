use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::preview::RenderError,
    domain::error::DomainError,
    infra::{error::InfraError, sandbox::SessionLimitReached},
};

/// Diagnostic attached to error responses; the response logging middleware
/// turns it into a structured log record.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Plain-text error response for the HTML routes.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("preview session not found")]
    SessionNotFound,
    #[error("preview session limit of {limit} reached")]
    SessionLimit { limit: u32 },
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<SessionLimitReached> for AppError {
    fn from(err: SessionLimitReached) -> Self {
        Self::SessionLimit { limit: err.limit }
    }
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::UnknownLanguage { .. }) => StatusCode::BAD_REQUEST,
            AppError::Render(RenderError::NothingToReload) => StatusCode::CONFLICT,
            AppError::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SessionNotFound => StatusCode::NOT_FOUND,
            AppError::SessionLimit { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(InfraError::Io(_))
            | AppError::Infra(InfraError::Telemetry(_))
            | AppError::Infra(InfraError::Configuration { .. })
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::UnknownLanguage { .. }) => "Unknown language",
            AppError::Render(RenderError::NothingToReload) => "Nothing to reload yet",
            AppError::Render(_) => "Preview could not be rendered",
            AppError::SessionNotFound => "Preview session not found",
            AppError::SessionLimit { .. } => "Too many preview sessions",
            AppError::Infra(InfraError::Configuration { .. }) => "Service misconfigured",
            AppError::Infra(InfraError::Telemetry(_)) => "Logging subsystem could not start",
            AppError::Infra(InfraError::Io(_)) => "I/O failure during request",
            AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
