use std::sync::Mutex;

use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{domain::document::SourceDocument, util::lock::mutex_lock};

use super::{
    compose::compose,
    extract::extract,
    surface::SandboxSurface,
    types::{EventOutcome, Generation, RenderError, RenderSnapshot, RenderStatus, SandboxEvent},
};

const SOURCE: &str = "application::preview::PreviewRenderer";

pub(crate) const METRIC_RENDERS_TOTAL: &str = "codeverse_preview_renders_total";
pub(crate) const METRIC_SUPERSEDED_TOTAL: &str = "codeverse_preview_superseded_total";
pub(crate) const METRIC_RUNTIME_FAULTS_TOTAL: &str = "codeverse_preview_runtime_faults_total";
pub(crate) const METRIC_RENDER_FAILURES_TOTAL: &str = "codeverse_preview_render_failures_total";

#[derive(Debug)]
struct RendererState {
    current: Generation,
    last: Option<SourceDocument>,
}

/// Turns source documents into sandboxed previews and tracks the status of
/// the current render cycle.
///
/// Each call to [`render`](Self::render) starts a new generation and fully
/// replaces whatever the surface held. Events from earlier generations are
/// discarded, so a superseded cycle can never move the status.
#[derive(Debug)]
pub struct PreviewRenderer<S> {
    surface: S,
    state: Mutex<RendererState>,
    status: watch::Sender<RenderSnapshot>,
}

impl<S: SandboxSurface> PreviewRenderer<S> {
    pub fn new(surface: S) -> Self {
        let (status, _) = watch::channel(RenderSnapshot::idle());
        Self {
            surface,
            state: Mutex::new(RendererState {
                current: Generation::default(),
                last: None,
            }),
            status,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderSnapshot> {
        self.status.subscribe()
    }

    /// Whether anyone currently follows this renderer's status.
    pub fn is_observed(&self) -> bool {
        self.status.receiver_count() > 0
    }

    /// The document most recently handed to [`render`](Self::render).
    pub fn last_document(&self) -> Option<SourceDocument> {
        mutex_lock(&self.state, SOURCE, "last_document").last.clone()
    }

    /// Start a render cycle for `document`. The status is `Loading` on return
    /// unless the cycle already failed; readiness arrives later through
    /// [`notify`](Self::notify).
    pub fn render(&self, document: SourceDocument) -> Generation {
        let mut state = mutex_lock(&self.state, SOURCE, "render");
        let generation = state.current.next();
        state.current = generation;
        state.last = Some(document.clone());

        counter!(METRIC_RENDERS_TOTAL).increment(1);
        if self.status.borrow().status == RenderStatus::Loading {
            counter!(METRIC_SUPERSEDED_TOTAL).increment(1);
            debug!(
                target = SOURCE,
                generation = generation.get(),
                "Superseding in-flight preview render"
            );
        }

        let language = document.language();
        if !language.is_markup() {
            self.fail(generation, &RenderError::UnsupportedLanguage { language });
            return generation;
        }

        self.status
            .send_replace(RenderSnapshot::begin(generation, RenderStatus::Loading));

        let extraction = extract(document.text());
        let endpoint = self.surface.bridge_endpoint();
        let mounted = compose(&extraction, generation, endpoint.as_deref()).and_then(|composed| {
            let bytes = composed.len();
            self.surface.mount(composed)?;
            Ok(bytes)
        });

        match mounted {
            Ok(bytes) => info!(
                target = SOURCE,
                generation = generation.get(),
                source_bytes = document.len(),
                composed_bytes = bytes,
                has_script = !extraction.script.is_empty(),
                "Preview document mounted"
            ),
            Err(error) => self.fail(generation, &error),
        }

        generation
    }

    /// Render the most recently supplied document again.
    pub fn reload(&self) -> Result<Generation, RenderError> {
        let document = mutex_lock(&self.state, SOURCE, "reload")
            .last
            .clone()
            .ok_or(RenderError::NothingToReload)?;
        Ok(self.render(document))
    }

    /// Apply an event reported by the sandboxed document of `generation`.
    pub fn notify(&self, generation: Generation, event: SandboxEvent) -> EventOutcome {
        let state = mutex_lock(&self.state, SOURCE, "notify");
        if generation != state.current {
            debug!(
                target = SOURCE,
                generation = generation.get(),
                current = state.current.get(),
                event = ?event,
                "Discarding stale sandbox event"
            );
            return EventOutcome::Stale;
        }

        let mut outcome = EventOutcome::Ignored;
        self.status.send_if_modified(|snapshot| match &event {
            SandboxEvent::Ready | SandboxEvent::Loaded => {
                if snapshot.status != RenderStatus::Loading {
                    return false;
                }
                snapshot.status = RenderStatus::Ready;
                outcome = EventOutcome::Applied;
                true
            }
            SandboxEvent::RuntimeError(message) => {
                if !matches!(snapshot.status, RenderStatus::Loading | RenderStatus::Ready) {
                    return false;
                }
                counter!(METRIC_RUNTIME_FAULTS_TOTAL).increment(1);
                if snapshot.runtime_error.is_none() {
                    info!(
                        target = SOURCE,
                        generation = generation.get(),
                        message = %message,
                        "Preview script raised a runtime error"
                    );
                    snapshot.runtime_error = Some(message.clone());
                } else {
                    snapshot.suppressed_faults = snapshot.suppressed_faults.saturating_add(1);
                    warn!(
                        target = SOURCE,
                        generation = generation.get(),
                        suppressed = snapshot.suppressed_faults,
                        message = %message,
                        "Suppressed additional preview runtime error"
                    );
                }
                outcome = EventOutcome::Applied;
                true
            }
        });

        drop(state);
        outcome
    }

    fn fail(&self, generation: Generation, error: &RenderError) {
        counter!(METRIC_RENDER_FAILURES_TOTAL).increment(1);
        warn!(
            target = SOURCE,
            generation = generation.get(),
            error = %error,
            "Preview render failed"
        );
        self.status.send_replace(RenderSnapshot::begin(
            generation,
            RenderStatus::Error(error.to_string()),
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    use super::*;
    use crate::{
        application::preview::{
            surface::{ComposedDocument, SandboxPolicy, SurfaceError},
            types::UNSUPPORTED_LANGUAGE_MESSAGE,
        },
        domain::language::Language,
    };

    #[derive(Default)]
    struct RecordingSurface {
        policy: SandboxPolicy,
        mounted: Mutex<Vec<ComposedDocument>>,
        unavailable: AtomicBool,
    }

    impl RecordingSurface {
        fn mounts(&self) -> Vec<ComposedDocument> {
            self.mounted.lock().expect("mounted lock").clone()
        }
    }

    impl SandboxSurface for RecordingSurface {
        fn policy(&self) -> &SandboxPolicy {
            &self.policy
        }

        fn mount(&self, document: ComposedDocument) -> Result<(), SurfaceError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(SurfaceError::unavailable("frame was detached"));
            }
            self.mounted.lock().expect("mounted lock").push(document);
            Ok(())
        }
    }

    fn renderer() -> PreviewRenderer<Arc<RecordingSurface>> {
        PreviewRenderer::new(Arc::new(RecordingSurface::default()))
    }

    #[test]
    fn starts_idle() {
        let renderer = renderer();
        let snapshot = renderer.snapshot();
        assert_eq!(snapshot.status, RenderStatus::Idle);
        assert_eq!(snapshot.generation, Generation::default());
    }

    #[test]
    fn render_is_loading_until_the_surface_reports_ready() {
        let renderer = renderer();
        let mut updates = renderer.subscribe();

        let generation = renderer.render(SourceDocument::html(
            "<style>body{color:red}</style><p>hi</p><script>document.title='x'</script>",
        ));
        assert_eq!(generation, Generation::new(1));
        assert_eq!(renderer.snapshot().status, RenderStatus::Loading);
        assert!(updates.has_changed().expect("sender alive"));
        assert_eq!(updates.borrow_and_update().status, RenderStatus::Loading);

        let mounts = renderer.surface().mounts();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].generation(), generation);
        assert!(mounts[0].html().contains("<p>hi</p>"));

        assert_eq!(
            renderer.notify(generation, SandboxEvent::Ready),
            EventOutcome::Applied
        );
        assert_eq!(renderer.snapshot().status, RenderStatus::Ready);
        assert_eq!(updates.borrow_and_update().status, RenderStatus::Ready);

        // The native load event arrives second and changes nothing.
        assert_eq!(
            renderer.notify(generation, SandboxEvent::Loaded),
            EventOutcome::Ignored
        );
        assert!(!updates.has_changed().expect("sender alive"));
    }

    #[test]
    fn superseded_render_cannot_report_ready() {
        let renderer = renderer();
        let first = renderer.render(SourceDocument::html("<p>A</p>"));
        let second = renderer.render(SourceDocument::html("<p>B</p>"));
        assert!(second > first);

        assert_eq!(
            renderer.notify(first, SandboxEvent::Ready),
            EventOutcome::Stale
        );
        assert_eq!(renderer.snapshot().status, RenderStatus::Loading);
        assert_eq!(
            renderer.notify(first, SandboxEvent::RuntimeError("old".into())),
            EventOutcome::Stale
        );

        assert_eq!(
            renderer.notify(second, SandboxEvent::Loaded),
            EventOutcome::Applied
        );
        let snapshot = renderer.snapshot();
        assert_eq!(snapshot.generation, second);
        assert_eq!(snapshot.status, RenderStatus::Ready);
        assert!(snapshot.runtime_error.is_none());

        let mounts = renderer.surface().mounts();
        let latest = mounts.last().expect("latest mount");
        assert_eq!(latest.generation(), second);
        assert!(latest.html().contains("<p>B</p>"));
        assert!(!latest.html().contains("<p>A</p>"));
    }

    #[test]
    fn runtime_errors_stay_inside_a_ready_preview() {
        let renderer = renderer();
        let generation =
            renderer.render(SourceDocument::html("<script>throw new Error('boom')</script>"));

        renderer.notify(generation, SandboxEvent::RuntimeError("Error: boom".into()));
        renderer.notify(generation, SandboxEvent::Ready);

        let snapshot = renderer.snapshot();
        assert_eq!(snapshot.status, RenderStatus::Ready);
        assert_eq!(snapshot.runtime_error.as_deref(), Some("Error: boom"));
        assert_eq!(snapshot.suppressed_faults, 0);
    }

    #[test]
    fn only_the_first_runtime_fault_is_surfaced() {
        let renderer = renderer();
        let generation = renderer.render(SourceDocument::html("<p></p>"));
        renderer.notify(generation, SandboxEvent::Ready);

        for message in ["first", "second", "third"] {
            assert_eq!(
                renderer.notify(generation, SandboxEvent::RuntimeError(message.into())),
                EventOutcome::Applied
            );
        }

        let snapshot = renderer.snapshot();
        assert_eq!(snapshot.status, RenderStatus::Ready);
        assert_eq!(snapshot.runtime_error.as_deref(), Some("first"));
        assert_eq!(snapshot.suppressed_faults, 2);
    }

    #[test]
    fn a_new_render_clears_the_previous_fault() {
        let renderer = renderer();
        let first = renderer.render(SourceDocument::html("<p></p>"));
        renderer.notify(first, SandboxEvent::RuntimeError("boom".into()));
        renderer.notify(first, SandboxEvent::Ready);

        renderer.render(SourceDocument::html("<p>fixed</p>"));
        let snapshot = renderer.snapshot();
        assert_eq!(snapshot.status, RenderStatus::Loading);
        assert!(snapshot.runtime_error.is_none());
        assert_eq!(snapshot.suppressed_faults, 0);
    }

    #[test]
    fn unsupported_language_is_refused_without_mounting() {
        let renderer = renderer();
        let generation = renderer.render(SourceDocument::new(Language::Python, "print('hi')"));

        let snapshot = renderer.snapshot();
        assert_eq!(snapshot.generation, generation);
        assert_eq!(
            snapshot.status,
            RenderStatus::Error(UNSUPPORTED_LANGUAGE_MESSAGE.to_string())
        );
        assert!(renderer.surface().mounts().is_empty());
        assert_eq!(
            renderer.notify(generation, SandboxEvent::Ready),
            EventOutcome::Ignored
        );
    }

    #[test]
    fn unavailable_surface_fails_the_cycle_and_reload_retries() {
        let renderer = renderer();
        renderer.surface().unavailable.store(true, Ordering::SeqCst);

        let failed = renderer.render(SourceDocument::html("<p>retry me</p>"));
        match renderer.snapshot().status {
            RenderStatus::Error(message) => assert!(message.contains("unavailable"), "{message}"),
            other => panic!("expected error status, got {other:?}"),
        }
        assert!(renderer.surface().mounts().is_empty());

        renderer.surface().unavailable.store(false, Ordering::SeqCst);
        let retried = renderer.reload().expect("reload succeeds");
        assert!(retried > failed);
        assert_eq!(renderer.snapshot().status, RenderStatus::Loading);

        let mounts = renderer.surface().mounts();
        assert_eq!(mounts.len(), 1);
        assert!(mounts[0].html().contains("<p>retry me</p>"));
    }

    #[test]
    fn reload_before_any_render_is_rejected() {
        let renderer = renderer();
        assert!(matches!(
            renderer.reload(),
            Err(RenderError::NothingToReload)
        ));
        assert_eq!(renderer.snapshot().status, RenderStatus::Idle);
    }

    #[test]
    fn events_before_any_render_are_ignored() {
        let renderer = renderer();
        assert_eq!(
            renderer.notify(Generation::default(), SandboxEvent::Ready),
            EventOutcome::Ignored
        );
        assert_eq!(
            renderer.notify(Generation::new(5), SandboxEvent::Ready),
            EventOutcome::Stale
        );
        assert_eq!(renderer.snapshot().status, RenderStatus::Idle);
    }
}
