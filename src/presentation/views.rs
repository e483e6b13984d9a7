use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        error::HttpError,
        preview::{RenderSnapshot, RenderStatus},
    },
    domain::language::Language,
};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub struct LanguageOption {
    pub value: &'static str,
    pub label: &'static str,
    pub starter: &'static str,
    pub selected: bool,
}

impl LanguageOption {
    pub fn catalog(selected: Language) -> Vec<Self> {
        Language::ALL
            .into_iter()
            .map(|language| Self {
                value: language.as_str(),
                label: language.name(),
                starter: language.starter(),
                selected: language == selected,
            })
            .collect()
    }
}

/// Status line shown above the preview frame.
pub struct StatusView {
    pub state: &'static str,
    pub label: String,
    pub retry: bool,
}

impl From<&RenderSnapshot> for StatusView {
    fn from(snapshot: &RenderSnapshot) -> Self {
        match &snapshot.status {
            RenderStatus::Idle => Self {
                state: "idle",
                label: "Write some HTML and run it to see a preview".to_string(),
                retry: false,
            },
            RenderStatus::Loading => Self {
                state: "loading",
                label: "Loading preview...".to_string(),
                retry: false,
            },
            RenderStatus::Ready => Self {
                state: "ready",
                label: "Preview ready".to_string(),
                retry: false,
            },
            RenderStatus::Error(message) => Self {
                state: "error",
                label: message.clone(),
                retry: true,
            },
        }
    }
}

pub struct WorkspaceView {
    /// Absolute URL on the preview origin, never the workspace's own.
    pub preview_url: String,
    pub sandbox: String,
    pub api_base: String,
    pub generation: u64,
    pub status: StatusView,
    pub languages: Vec<LanguageOption>,
    pub source: String,
}

#[derive(Template)]
#[template(path = "workspace.html")]
pub struct WorkspaceTemplate {
    pub view: WorkspaceView,
}
