//! Browser-hosted sandbox surfaces and the registry of open preview sessions.

use std::{
    num::{NonZeroU32, NonZeroUsize},
    sync::{Arc, RwLock},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use metrics::{counter, gauge};
use thiserror::Error;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    application::preview::{
        ComposedDocument, PreviewRenderer, SandboxPolicy, SandboxSurface, SurfaceError,
    },
    config::PreviewSettings,
    util::lock::{rw_read, rw_write},
};

const SOURCE: &str = "infra::sandbox";

pub(crate) const METRIC_SESSIONS_OPEN: &str = "codeverse_preview_sessions_open";
pub(crate) const METRIC_SESSIONS_EVICTED_TOTAL: &str = "codeverse_preview_sessions_evicted_total";

const MIN_SWEEP_PERIOD: Duration = Duration::from_secs(1);

pub type SessionRenderer = PreviewRenderer<HostedSurface>;

#[derive(Debug)]
enum Slot {
    Empty,
    Mounted(ComposedDocument),
    Detached,
}

/// A surface whose single document slot is served to a sandboxed frame over
/// HTTP. The frame loads whatever is mounted at `{origin}/preview/{session}`
/// and reports back to `{origin}/preview/{session}/events`, where `origin` is
/// the dedicated preview origin.
#[derive(Debug)]
pub struct HostedSurface {
    session: Uuid,
    origin: Arc<str>,
    policy: SandboxPolicy,
    max_document_bytes: NonZeroUsize,
    slot: RwLock<Slot>,
}

impl HostedSurface {
    pub fn new(
        session: Uuid,
        origin: Arc<str>,
        policy: SandboxPolicy,
        max_document_bytes: NonZeroUsize,
    ) -> Self {
        Self {
            session,
            origin,
            policy,
            max_document_bytes,
            slot: RwLock::new(Slot::Empty),
        }
    }

    /// Absolute URL of the mounted document on the preview origin.
    pub fn document_url(&self) -> String {
        format!("{}/preview/{}", self.origin, self.session)
    }

    /// Document currently mounted, if any.
    pub fn current(&self) -> Option<ComposedDocument> {
        match &*rw_read(&self.slot, SOURCE, "current") {
            Slot::Mounted(document) => Some(document.clone()),
            Slot::Empty | Slot::Detached => None,
        }
    }

    /// Tear the surface down. Later mounts fail as unavailable.
    pub fn detach(&self) {
        *rw_write(&self.slot, SOURCE, "detach") = Slot::Detached;
    }

    pub fn is_detached(&self) -> bool {
        matches!(&*rw_read(&self.slot, SOURCE, "is_detached"), Slot::Detached)
    }
}

impl SandboxSurface for HostedSurface {
    fn policy(&self) -> &SandboxPolicy {
        &self.policy
    }

    fn mount(&self, document: ComposedDocument) -> Result<(), SurfaceError> {
        let mut slot = rw_write(&self.slot, SOURCE, "mount");
        if matches!(*slot, Slot::Detached) {
            return Err(SurfaceError::unavailable(format!(
                "session {} was closed",
                self.session
            )));
        }

        let limit = self.max_document_bytes.get();
        if document.len() > limit {
            *slot = Slot::Empty;
            return Err(SurfaceError::rejected(format!(
                "composed document is {} bytes, limit is {limit}",
                document.len()
            )));
        }

        *slot = Slot::Mounted(document);
        Ok(())
    }

    fn bridge_endpoint(&self) -> Option<String> {
        Some(format!("{}/events", self.document_url()))
    }
}

#[derive(Debug, Clone, Error)]
#[error("preview session limit of {limit} reached")]
pub struct SessionLimitReached {
    pub limit: u32,
}

struct Session {
    renderer: Arc<SessionRenderer>,
    last_seen: Instant,
}

/// Open preview sessions, one renderer and one hosted surface each.
///
/// A session that nobody watches through a status stream and that has not
/// been touched for the idle timeout is evicted, either by the periodic
/// sweeper or when a new session needs its slot.
#[derive(Clone)]
pub struct PreviewSessions {
    sessions: Arc<DashMap<Uuid, Session>>,
    policy: SandboxPolicy,
    origin: Arc<str>,
    max_document_bytes: NonZeroUsize,
    max_sessions: NonZeroU32,
    idle_timeout: Duration,
}

impl PreviewSessions {
    pub fn new(settings: &PreviewSettings) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            policy: SandboxPolicy::preview(),
            origin: Arc::from(settings.origin.as_str()),
            max_document_bytes: settings.max_document_bytes,
            max_sessions: settings.max_sessions,
            idle_timeout: settings.idle_timeout,
        }
    }

    pub fn create(&self) -> Result<(Uuid, Arc<SessionRenderer>), SessionLimitReached> {
        let limit = self.max_sessions.get();
        if self.open_count() >= limit as usize {
            self.evict_idle();
            if self.open_count() >= limit as usize {
                return Err(SessionLimitReached { limit });
            }
        }

        loop {
            let id = Uuid::new_v4();
            if let Entry::Vacant(vacant) = self.sessions.entry(id) {
                let surface = HostedSurface::new(
                    id,
                    Arc::clone(&self.origin),
                    self.policy.clone(),
                    self.max_document_bytes,
                );
                let renderer = Arc::new(PreviewRenderer::new(surface));
                vacant.insert(Session {
                    renderer: Arc::clone(&renderer),
                    last_seen: Instant::now(),
                });
                self.record_open();
                info!(target = SOURCE, session = %id, "Preview session opened");
                return Ok((id, renderer));
            }
        }
    }

    /// Look a session up and mark it as recently used.
    pub fn get(&self, id: &Uuid) -> Option<Arc<SessionRenderer>> {
        self.sessions.get_mut(id).map(|mut session| {
            session.last_seen = Instant::now();
            Arc::clone(&session.renderer)
        })
    }

    /// Close a session. Its surface is detached so in-flight handles cannot
    /// mount into it any more.
    pub fn remove(&self, id: &Uuid) -> Option<Arc<SessionRenderer>> {
        let (_, session) = self.sessions.remove(id)?;
        session.renderer.surface().detach();
        self.record_open();
        info!(target = SOURCE, session = %id, "Preview session closed");
        Some(session.renderer)
    }

    /// Drop every unobserved session idle for at least the idle timeout.
    /// Returns how many were evicted.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut evicted = Vec::new();
        self.sessions.retain(|id, session| {
            let idle = now.saturating_duration_since(session.last_seen) >= self.idle_timeout
                && !session.renderer.is_observed();
            if idle {
                evicted.push((*id, Arc::clone(&session.renderer)));
            }
            !idle
        });

        for (id, renderer) in &evicted {
            renderer.surface().detach();
            info!(target = SOURCE, session = %id, "Idle preview session evicted");
        }
        if !evicted.is_empty() {
            counter!(METRIC_SESSIONS_EVICTED_TOTAL).increment(evicted.len() as u64);
            self.record_open();
        }
        evicted.len()
    }

    /// Run [`evict_idle`](Self::evict_idle) periodically until the returned
    /// task is aborted.
    pub fn spawn_idle_sweeper(&self) -> JoinHandle<()> {
        let sessions = self.clone();
        let period = (self.idle_timeout / 2).max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = sessions.evict_idle();
                debug!(
                    target = SOURCE,
                    evicted,
                    open = sessions.open_count(),
                    "Idle session sweep finished"
                );
            }
        })
    }

    pub fn open_count(&self) -> usize {
        self.sessions.len()
    }

    fn record_open(&self) {
        gauge!(METRIC_SESSIONS_OPEN).set(self.open_count() as f64);
    }
}
