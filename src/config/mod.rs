//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::language::Language;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "codeverse";
const ENV_PREFIX: &str = "CODEVERSE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 10;
const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 1024 * 1024;
const DEFAULT_MAX_SESSIONS: u64 = 256;
const DEFAULT_PREVIEW_PORT: u16 = 3001;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30 * 60;

/// Command-line arguments for the CodeVerse preview binary.
#[derive(Debug, Parser)]
#[command(
    name = "codeverse-preview",
    version,
    about = "CodeVerse live preview server"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "CODEVERSE_CONFIG_FILE",
        value_name = "PATH"
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the preview HTTP service.
    Serve(Box<ServeArgs>),
    /// Compose the preview document for a source file and print it.
    Compose(ComposeArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the largest composed preview document accepted, in bytes.
    #[arg(long = "preview-max-document-bytes", value_name = "BYTES")]
    pub preview_max_document_bytes: Option<u64>,

    /// Override the number of concurrently open preview sessions.
    #[arg(long = "preview-max-sessions", value_name = "COUNT")]
    pub preview_max_sessions: Option<u64>,

    /// Override the host the preview listener binds to.
    #[arg(long = "preview-host", value_name = "HOST")]
    pub preview_host: Option<String>,

    /// Override the port the preview listener binds to.
    #[arg(long = "preview-port", value_name = "PORT")]
    pub preview_port: Option<u16>,

    /// Override the public origin preview frames are loaded from.
    #[arg(long = "preview-origin", value_name = "URL")]
    pub preview_origin: Option<String>,

    /// Override how long an unobserved session may stay untouched.
    #[arg(long = "preview-idle-timeout-seconds", value_name = "SECONDS")]
    pub preview_idle_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ComposeArgs {
    /// Editor language of the source file.
    #[arg(long, default_value_t = Language::Html, value_parser = parse_language)]
    pub language: Language,

    /// Source document to compose.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: PathBuf,
}

fn parse_language(value: &str) -> Result<Language, String> {
    Language::from_str(value).map_err(|err| err.to_string())
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub preview: PreviewSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Preview documents are served by a second listener on their own origin, so
/// a sandboxed frame never shares an origin with the workspace or the API.
#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub addr: SocketAddr,
    /// Serialized origin (`scheme://host[:port]`) frames load previews from.
    pub origin: String,
    pub max_document_bytes: NonZeroUsize,
    pub max_sessions: NonZeroU32,
    pub idle_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Compose(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    preview: RawPreviewSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(bytes) = overrides.preview_max_document_bytes {
            self.preview.max_document_bytes = Some(bytes);
        }
        if let Some(count) = overrides.preview_max_sessions {
            self.preview.max_sessions = Some(count);
        }
        if let Some(host) = overrides.preview_host.as_ref() {
            self.preview.host = Some(host.clone());
        }
        if let Some(port) = overrides.preview_port {
            self.preview.port = Some(port);
        }
        if let Some(origin) = overrides.preview_origin.as_ref() {
            self.preview.origin = Some(origin.clone());
        }
        if let Some(seconds) = overrides.preview_idle_timeout_seconds {
            self.preview.idle_timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            preview,
        } = raw;

        let server = build_server_settings(server)?;
        let preview = build_preview_settings(preview, &server)?;

        Ok(Self {
            server,
            logging: build_logging_settings(logging)?,
            preview,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_preview_settings(
    preview: RawPreviewSettings,
    server: &ServerSettings,
) -> Result<PreviewSettings, LoadError> {
    let host = preview.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = preview.port.unwrap_or(DEFAULT_PREVIEW_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "preview.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("preview.addr", reason))?;
    if addr == server.addr {
        return Err(LoadError::invalid(
            "preview.port",
            "the preview listener must not share the server listener",
        ));
    }

    let origin = match preview.origin {
        Some(origin) => parse_origin(&origin),
        None if addr.ip().is_unspecified() => Err(format!(
            "must be set when the preview listener binds to {}",
            addr.ip()
        )),
        None => parse_origin(&format!("http://{addr}")),
    }
    .map_err(|reason| LoadError::invalid("preview.origin", reason))?;
    if parse_origin(&format!("http://{}", server.addr)).is_ok_and(|workspace| workspace == origin)
    {
        return Err(LoadError::invalid(
            "preview.origin",
            "must differ from the workspace origin",
        ));
    }

    let idle_secs = preview
        .idle_timeout_seconds
        .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);
    if idle_secs == 0 {
        return Err(LoadError::invalid(
            "preview.idle_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let max_document_bytes = non_zero_usize(
        preview
            .max_document_bytes
            .unwrap_or(DEFAULT_MAX_DOCUMENT_BYTES),
        "preview.max_document_bytes",
    )?;
    let max_sessions = non_zero_u32(
        preview.max_sessions.unwrap_or(DEFAULT_MAX_SESSIONS),
        "preview.max_sessions",
    )?;

    Ok(PreviewSettings {
        addr,
        origin,
        max_document_bytes,
        max_sessions,
        idle_timeout: Duration::from_secs(idle_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPreviewSettings {
    host: Option<String>,
    port: Option<u16>,
    origin: Option<String>,
    max_document_bytes: Option<u64>,
    max_sessions: Option<u64>,
    idle_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Normalize `value` to a serialized `scheme://host[:port]` origin.
fn parse_origin(value: &str) -> Result<String, String> {
    let url = Url::parse(value).map_err(|err| format!("invalid origin `{value}`: {err}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("origin `{value}` must use http or https"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(format!(
            "origin `{value}` must not carry a path, query or fragment"
        ));
    }
    Ok(url.origin().ascii_serialization())
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn preview_limits_have_defaults() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.preview.max_document_bytes.get(), 1024 * 1024);
        assert_eq!(settings.preview.max_sessions.get(), 256);
        assert_eq!(settings.preview.idle_timeout, Duration::from_secs(1800));
    }

    #[test]
    fn previews_default_to_their_own_origin() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 3000);
        assert_eq!(settings.preview.addr.port(), 3001);
        assert_eq!(settings.preview.origin, "http://127.0.0.1:3001");
    }

    #[test]
    fn preview_origin_is_normalized() {
        let mut raw = RawSettings::default();
        raw.preview.origin = Some("https://Preview.Example.com/".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.preview.origin, "https://preview.example.com");
    }

    #[test]
    fn preview_origin_must_not_be_the_workspace_origin() {
        let mut raw = RawSettings::default();
        raw.preview.origin = Some("http://127.0.0.1:3000".to_string());
        let err = Settings::from_raw(raw).expect_err("shared origin rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "preview.origin",
                ..
            }
        ));

        let mut raw = RawSettings::default();
        raw.preview.port = Some(3000);
        let err = Settings::from_raw(raw).expect_err("shared listener rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "preview.port",
                ..
            }
        ));
    }

    #[test]
    fn malformed_preview_origins_are_rejected() {
        for origin in ["preview.example.com", "ftp://files.example.com", "http://p.example.com/frames"] {
            let mut raw = RawSettings::default();
            raw.preview.origin = Some(origin.to_string());
            let err = Settings::from_raw(raw).expect_err("origin rejected");
            assert!(err.to_string().contains("preview.origin"), "{origin}: {err}");
        }

        let mut raw = RawSettings::default();
        raw.preview.host = Some("0.0.0.0".to_string());
        let err = Settings::from_raw(raw).expect_err("unspecified host needs an origin");
        assert!(err.to_string().contains("preview.origin"), "{err}");
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut raw = RawSettings::default();
        raw.preview.max_sessions = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero sessions rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "preview.max_sessions",
                ..
            }
        ));
    }

    #[test]
    fn invalid_log_level_is_reported() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("loud".to_string());

        let err = Settings::from_raw(raw).expect_err("invalid level rejected");
        assert!(err.to_string().contains("logging.level"), "{err}");
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn config_file_values_are_loaded() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp config");
        writeln!(
            file,
            "[server]\nport = 8088\n\n[preview]\nmax_document_bytes = 2048"
        )
        .expect("write config");

        let args = CliArgs::parse_from([
            "codeverse-preview",
            "--config-file",
            file.path().to_str().expect("utf-8 path"),
            "serve",
            "--preview-max-sessions",
            "3",
        ]);
        let settings = load(&args).expect("settings load");

        assert_eq!(settings.server.addr.port(), 8088);
        assert_eq!(settings.preview.max_document_bytes.get(), 2048);
        assert_eq!(settings.preview.max_sessions.get(), 3);
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["codeverse-preview"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_compose_arguments() {
        let args = CliArgs::parse_from(["codeverse-preview", "compose", "/tmp/index.html"]);
        match args.command.expect("compose command") {
            Command::Compose(compose) => {
                assert_eq!(compose.language, Language::Html);
                assert_eq!(compose.file, std::path::Path::new("/tmp/index.html"));
            }
            _ => panic!("wrong command parsed"),
        }

        let args = CliArgs::parse_from([
            "codeverse-preview",
            "compose",
            "--language",
            "PYTHON",
            "main.py",
        ]);
        match args.command.expect("compose command") {
            Command::Compose(compose) => assert_eq!(compose.language, Language::Python),
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "codeverse-preview",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--log-json",
            "yes",
            "--preview-origin",
            "https://preview.example.com",
            "--preview-idle-timeout-seconds",
            "60",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.log_json, Some(true));
                assert_eq!(
                    serve.overrides.preview_origin.as_deref(),
                    Some("https://preview.example.com")
                );
                assert_eq!(serve.overrides.preview_idle_timeout_seconds, Some(60));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
