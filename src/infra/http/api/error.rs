use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use codeverse_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::{
    application::{error::ErrorReport, preview::RenderError},
    domain::error::DomainError,
    infra::sandbox::SessionLimitReached,
};

pub mod codes {
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_LANGUAGE: &str = "invalid_language";
    pub const NOTHING_TO_RELOAD: &str = "nothing_to_reload";
    pub const NOTHING_TO_DOWNLOAD: &str = "nothing_to_download";
    pub const SESSION_LIMIT: &str = "session_limit";
    pub const RENDER: &str = "render_error";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn session_not_found() -> Self {
        Self::not_found("preview session not found")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::UnknownLanguage { .. } => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_LANGUAGE,
                "unknown language",
                Some(err.to_string()),
            ),
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NothingToReload => Self::new(
                StatusCode::CONFLICT,
                codes::NOTHING_TO_RELOAD,
                "nothing to reload",
                Some("submit a document before asking for a reload".to_string()),
            ),
            other => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                codes::RENDER,
                "preview could not be rendered",
                Some(other.to_string()),
            ),
        }
    }
}

impl From<SessionLimitReached> for ApiError {
    fn from(err: SessionLimitReached) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::SESSION_LIMIT,
            "too many preview sessions",
            Some(err.to_string()),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_errors_map_to_api_codes() {
        let err = ApiError::from(RenderError::NothingToReload);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code, codes::NOTHING_TO_RELOAD);

        let err = ApiError::from(DomainError::unknown_language("cobol"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.hint.as_deref(), Some("unknown language `cobol`"));
    }

    #[test]
    fn error_responses_carry_a_report() {
        let response = ApiError::session_not_found().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let report = response
            .extensions()
            .get::<ErrorReport>()
            .expect("report attached");
        assert_eq!(report.messages, vec!["not_found: preview session not found"]);
    }
}
