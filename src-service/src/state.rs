//! Capture session state for the Skusho service.
//!
//! [`CaptureService`] owns the mirror session, the overlay and the unlock
//! watchers of the active session. Only the service's own methods and the
//! tasks it spawns mutate that state; clients go through the public
//! operations (usually via IPC).

use crate::burst::{run_burst, BurstRequest};
use crate::capture::{CaptureError, ConsentToken, FrameSink, MirrorFacility, MirrorSession};
use crate::config::{FeatureFlags, ServiceConfig, SettingsStore};
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::overlay::{OverlayController, WindowHost};
use crate::persist::{MediaStore, PersistencePipeline, SaveOptions, SaveSummary};
use crate::unlock::{Clock, UnlockGate};
use skusho_common::{OverlayVisibility, ServiceStatus, StopReason, TouchAction, TouchOutcome};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// External collaborators of the service.
pub struct ServiceDeps {
    pub facility: Arc<dyn MirrorFacility>,
    pub window_host: Arc<dyn WindowHost>,
    pub media_store: Arc<dyn MediaStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub flags: Arc<dyn FeatureFlags>,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
}

/// Events broadcast to in-process subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// A capture session started
    Started,
    /// The session ended
    Stopped(StopReason),
    OverlayChanged(OverlayVisibility),
    /// All shots of a burst were attempted
    BurstCaptured { requested: u32, captured: usize },
    /// A burst's images were written
    BurstSaved { saved: usize, requested: usize },
}

/// Result of one capture trigger.
#[derive(Debug, Default)]
pub struct CaptureReport {
    pub requested: u32,
    pub captured: usize,
    /// Present once persistence ran
    pub summary: Option<SaveSummary>,
    /// Set when the burst was aborted
    pub error: Option<CaptureError>,
}

/// Handle to a running capture. Dropping it detaches the capture.
pub struct CaptureTicket {
    handle: JoinHandle<CaptureReport>,
}

impl CaptureTicket {
    /// Abandon the burst. Nothing is saved; the overlay is still restored.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// Wait for the burst and its persistence to finish.
    pub async fn wait(self) -> CaptureReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => CaptureReport {
                error: Some(CaptureError::Platform(format!("capture task failed: {}", e))),
                ..CaptureReport::default()
            },
        }
    }
}

/// Restores the overlay of session `id` when dropped without
/// [`OverlayRestore::restore`] (the capture task panicked or was aborted).
struct OverlayRestore {
    service: Option<Arc<CaptureService>>,
    id: u64,
}

impl OverlayRestore {
    async fn restore(mut self) {
        if let Some(service) = self.service.take() {
            service.restore_overlay(self.id).await;
        }
    }
}

impl Drop for OverlayRestore {
    fn drop(&mut self) {
        let Some(service) = self.service.take() else {
            return;
        };
        warn!("Capture for session {} ended early, restoring overlay", self.id);
        let id = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move { service.restore_overlay(id).await });
            }
            Err(e) => error!("Cannot restore overlay outside the runtime: {}", e),
        }
    }
}

struct SessionState {
    id: u64,
    mirror: MirrorSession,
    overlay: OverlayController,
    watchers: Vec<JoinHandle<()>>,
}

/// The capture service.
pub struct CaptureService {
    deps: ServiceDeps,
    config: ServiceConfig,
    gate: UnlockGate,
    pipeline: PersistencePipeline,
    running: AtomicBool,
    next_session: AtomicU64,
    session: Mutex<Option<SessionState>>,
    event_tx: broadcast::Sender<ServiceEvent>,
}

impl CaptureService {
    pub fn new(deps: ServiceDeps, config: ServiceConfig) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        let gate = UnlockGate::new(
            Arc::clone(&deps.settings),
            Arc::clone(&deps.flags),
            Arc::clone(&deps.clock),
            config.gate_poll_interval,
        );
        let pipeline = PersistencePipeline::new(Arc::clone(&deps.media_store));
        Self {
            deps,
            config,
            gate,
            pipeline,
            running: AtomicBool::new(false),
            next_session: AtomicU64::new(0),
            session: Mutex::new(None),
            event_tx,
        }
    }

    /// Subscribe to service events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast(&self, event: ServiceEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// The polled running flag.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot for clients.
    pub async fn status(&self) -> ServiceStatus {
        let overlay = self
            .session
            .lock()
            .await
            .as_ref()
            .map_or(OverlayVisibility::Removed, |s| s.overlay.visibility());
        ServiceStatus {
            running: self.is_running(),
            overlay,
            unlock_expiry_ms: self.deps.settings.unlock_expiry_ms(),
            unlock_remaining_ms: self.gate.remaining().as_millis() as u64,
            ad_required: self.gate.is_ad_required(),
        }
    }

    /// Number of output targets the current session has created.
    pub async fn output_targets_created(&self) -> Option<u32> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|s| s.mirror.targets_created())
    }

    /// Open the unlock window for the reward duration. Returns the expiry.
    pub fn grant_unlock(&self) -> i64 {
        let expiry = self.gate.grant();
        info!("Capture unlock granted until {}", expiry);
        expiry
    }

    /// Start a session from a mirroring consent token and show the overlay.
    pub async fn start(self: &Arc<Self>, consent: ConsentToken) -> Result<(), ServiceError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Err(ServiceError::AlreadyRunning);
        }
        if !self.gate.capture_allowed() {
            warn!("Refusing to start: capture is locked");
            return Err(ServiceError::CaptureLocked);
        }

        let revoked = Arc::new(Notify::new());
        let on_revoked = Arc::clone(&revoked);
        let mut mirror = MirrorSession::start(
            self.deps.facility.as_ref(),
            &consent,
            Box::new(move || on_revoked.notify_one()),
        )?;

        let mut overlay = OverlayController::new(
            Arc::clone(&self.deps.window_host),
            self.deps.settings.settings().overlay_position,
        );
        if let Err(e) = overlay.show() {
            error!("Failed to show overlay: {}", e);
            mirror.stop();
            return Err(e.into());
        }

        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let watchers = vec![
            self.spawn_gate_watch(id),
            self.spawn_revoke_watch(id, revoked),
        ];

        *session = Some(SessionState {
            id,
            mirror,
            overlay,
            watchers,
        });
        self.running.store(true, Ordering::SeqCst);
        drop(session);

        info!("Capture session {} started", id);
        self.broadcast(ServiceEvent::Started);
        self.broadcast(ServiceEvent::OverlayChanged(OverlayVisibility::Shown));
        Ok(())
    }

    /// Stop the active session. Returns false if none was running.
    pub async fn stop(&self, reason: StopReason) -> bool {
        self.stop_session(None, reason).await
    }

    /// Tear down the session, but only if it is still session `id` when
    /// given. Safe to call repeatedly.
    async fn stop_session(&self, id: Option<u64>, reason: StopReason) -> bool {
        let state = {
            let mut session = self.session.lock().await;
            let matches = session
                .as_ref()
                .is_some_and(|s| id.map_or(true, |id| id == s.id));
            if matches {
                session.take()
            } else {
                None
            }
        };

        let Some(mut state) = state else {
            debug!("Stop ({}) ignored: no matching session", reason);
            return false;
        };

        for watcher in &state.watchers {
            watcher.abort();
        }
        if state.overlay.visibility() != OverlayVisibility::Removed {
            if let Err(e) = state.overlay.remove() {
                warn!("Overlay removal failed during stop: {}", e);
            }
        }
        state.mirror.stop();
        self.running.store(false, Ordering::SeqCst);

        info!("Capture session {} stopped: {}", state.id, reason);
        self.broadcast(ServiceEvent::OverlayChanged(OverlayVisibility::Removed));
        self.broadcast(ServiceEvent::Stopped(reason));
        true
    }

    /// Run the stop on its own task so the caller (a watcher about to be
    /// aborted) does not cancel it midway.
    fn spawn_stop(self: &Arc<Self>, id: u64, reason: StopReason) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.stop_session(Some(id), reason).await;
        });
    }

    fn spawn_gate_watch(self: &Arc<Self>, id: u64) -> JoinHandle<()> {
        let gate = self.gate.clone();
        let service = Arc::downgrade(self);
        tokio::spawn(async move {
            gate.wait_for_expiry().await;
            if let Some(service) = service.upgrade() {
                service.spawn_stop(id, StopReason::UnlockExpired);
            }
        })
    }

    fn spawn_revoke_watch(self: &Arc<Self>, id: u64, revoked: Arc<Notify>) -> JoinHandle<()> {
        let service = Arc::downgrade(self);
        tokio::spawn(async move {
            revoked.notified().await;
            warn!("Mirroring session {} revoked by the system", id);
            if let Some(service) = service.upgrade() {
                service.spawn_stop(id, StopReason::SessionRevoked);
            }
        })
    }

    /// Trigger one burst.
    ///
    /// The overlay is hidden before this returns. Shots, overlay
    /// restoration and persistence continue on a spawned task.
    pub async fn capture(self: &Arc<Self>) -> Result<CaptureTicket, ServiceError> {
        let settings = self.deps.settings.settings();

        let (id, sink) = {
            let mut guard = self.session.lock().await;
            let state = guard.as_mut().ok_or(ServiceError::NotRunning)?;
            if !self.gate.capture_allowed() {
                warn!("Capture refused: unlock window not active");
                return Err(ServiceError::CaptureLocked);
            }

            match state.overlay.hide() {
                Ok(()) => self.broadcast(ServiceEvent::OverlayChanged(state.overlay.visibility())),
                Err(e) => warn!("Failed to hide overlay before capture: {}", e),
            }

            let bounds = self.deps.window_host.display_bounds();
            match state.mirror.ensure_output_target(bounds) {
                Ok(sink) => {
                    // Anything queued now was rendered with the overlay visible.
                    let stale = sink.drain();
                    if stale > 0 {
                        debug!("Dropped {} frame(s) queued before the overlay was hidden", stale);
                    }
                    (state.id, sink)
                }
                Err(e) => {
                    if let Err(e) = state.overlay.show_after_capture() {
                        warn!("Failed to restore overlay: {}", e);
                    }
                    if e == CaptureError::SessionRevoked {
                        self.spawn_stop(state.id, StopReason::SessionRevoked);
                    }
                    error!("Capture unavailable: {}", e);
                    return Err(e.into());
                }
            }
        };

        let request = BurstRequest::new(
            settings.continuous_shot_count,
            settings.continuous_shot_interval_ms,
            self.deps.clock.now_ms(),
        );
        let options = SaveOptions {
            format: settings.image_format,
            quality: settings.image_quality,
        };

        let service = Arc::clone(self);
        let handle = tokio::spawn(async move { service.run_capture(id, sink, request, options).await });
        Ok(CaptureTicket { handle })
    }

    async fn run_capture(
        self: Arc<Self>,
        id: u64,
        sink: FrameSink,
        request: BurstRequest,
        options: SaveOptions,
    ) -> CaptureReport {
        let restore = OverlayRestore {
            service: Some(Arc::clone(&self)),
            id,
        };
        let result = run_burst(&sink, request, &self.config.burst).await;
        drop(sink);
        restore.restore().await;

        let mut report = CaptureReport {
            requested: request.shot_count,
            ..CaptureReport::default()
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Capture aborted: {}", e);
                report.error = Some(e);
                return report;
            }
        };

        report.captured = outcome.images.len();
        self.broadcast(ServiceEvent::BurstCaptured {
            requested: outcome.requested(),
            captured: outcome.images.len(),
        });

        if outcome.images.is_empty() {
            warn!("No frames captured, nothing to save");
            return report;
        }

        let pipeline = self.pipeline.clone();
        let requested = outcome.requested() as usize;
        let images = outcome.images;
        let saved =
            tokio::task::spawn_blocking(move || pipeline.save_burst(images, requested, options))
                .await;

        match saved {
            Ok(summary) => {
                self.deps.notifier.burst_saved(&summary);
                self.broadcast(ServiceEvent::BurstSaved {
                    saved: summary.saved_count(),
                    requested: summary.requested,
                });
                report.summary = Some(summary);
            }
            Err(e) => {
                error!("Persistence task failed: {}", e);
                report.error = Some(CaptureError::Platform(format!(
                    "persistence task failed: {}",
                    e
                )));
            }
        }
        report
    }

    async fn restore_overlay(&self, id: u64) {
        let mut guard = self.session.lock().await;
        let Some(state) = guard.as_mut().filter(|s| s.id == id) else {
            debug!("Session {} gone, overlay not restored", id);
            return;
        };
        match state.overlay.show_after_capture() {
            Ok(()) => self.broadcast(ServiceEvent::OverlayChanged(state.overlay.visibility())),
            Err(e) => warn!("Failed to restore overlay after capture: {}", e),
        }
    }

    /// Feed a pointer event to the overlay. A recognized tap triggers a
    /// capture.
    pub async fn handle_touch(
        self: &Arc<Self>,
        action: TouchAction,
        x: f32,
        y: f32,
    ) -> Result<TouchOutcome, ServiceError> {
        let outcome = {
            let mut guard = self.session.lock().await;
            let state = guard.as_mut().ok_or(ServiceError::NotRunning)?;
            let outcome = state.overlay.handle_touch(action, x, y)?;
            if outcome == TouchOutcome::Snapped {
                if let Some(position) = state.overlay.saved_position() {
                    self.deps.settings.set_overlay_position(position);
                }
            }
            outcome
        };

        if outcome == TouchOutcome::CaptureRequested {
            if let Err(e) = self.capture().await {
                warn!("Capture from overlay tap failed: {}", e);
            }
        }
        Ok(outcome)
    }

    /// Stop any session for process shutdown.
    pub async fn shutdown(&self) {
        if self.stop(StopReason::Shutdown).await {
            info!("Active session stopped for shutdown");
        }
    }
}
