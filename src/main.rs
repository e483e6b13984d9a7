use std::{future::IntoFuture, io::Write, process};

use codeverse_preview::{
    application::{
        error::AppError,
        preview::{Generation, RenderError, compose, extract},
    },
    config,
    domain::document::SourceDocument,
    infra::{
        error::InfraError,
        http::{self, AppState},
        sandbox::PreviewSessions,
        telemetry,
    },
};
use tokio::{signal, sync::watch};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(err.to_string()))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Compose(args) => run_compose(args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let sessions = PreviewSessions::new(&settings.preview);
    let state = AppState::new(sessions.clone());
    let workspace_router = http::build_router(state.clone());
    let preview_router = http::build_preview_router(state);

    let workspace_listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    let preview_listener = tokio::net::TcpListener::bind(settings.preview.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "codeverse::serve",
        addr = %settings.server.addr,
        preview_addr = %settings.preview.addr,
        preview_origin = %settings.preview.origin,
        max_sessions = settings.preview.max_sessions.get(),
        "Preview server listening"
    );

    let sweeper = sessions.spawn_idle_sweeper();
    let (stop, _) = watch::channel(false);
    let workspace = axum::serve(workspace_listener, workspace_router.into_make_service())
        .with_graceful_shutdown(stopped(stop.subscribe()))
        .into_future();
    let preview = axum::serve(preview_listener, preview_router.into_make_service())
        .with_graceful_shutdown(stopped(stop.subscribe()))
        .into_future();

    // Open status streams never finish on their own, so draining is bounded.
    let grace = settings.server.graceful_shutdown;
    let outcome = tokio::select! {
        result = async { tokio::try_join!(workspace, preview) } => {
            result.map(|_| ()).map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = async {
            shutdown_signal().await;
            info!(
                target = "codeverse::serve",
                "Shutdown requested, draining connections"
            );
            stop.send_replace(true);
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                target = "codeverse::serve",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown timed out"
            );
            Ok(())
        }
    };

    sweeper.abort();
    outcome
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(mut stop: watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print the composed preview document for a source file, as the renderer
/// would mount it, without a sandbox bridge.
async fn run_compose(args: config::ComposeArgs) -> Result<(), AppError> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .map_err(InfraError::from)?;
    let document = SourceDocument::new(args.language, text);

    let language = document.language();
    if !language.is_markup() {
        return Err(RenderError::UnsupportedLanguage { language }.into());
    }

    let extraction = extract(document.text());
    let composed = compose(&extraction, Generation::default(), None)?;
    info!(
        target = "codeverse::compose",
        path = %args.file.display(),
        source_bytes = document.len(),
        composed_bytes = composed.len(),
        "Composed preview document"
    );

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(composed.html().as_bytes())
        .map_err(InfraError::from)?;
    stdout.flush().map_err(InfraError::from)?;
    Ok(())
}
