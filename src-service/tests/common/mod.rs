//! Shared fakes for service scenario tests.

#![allow(dead_code)]

use skusho_service::capture::{
    CaptureError, ConsentToken, DisplayBounds, FrameSink, MirrorFacility, MirrorHandle,
    OutputTarget, RawFrame, RevokeCallback,
};
use skusho_service::config::{
    FeatureFlags, JsonSettingsStore, ServiceConfig, Settings, SettingsFile, SettingsStore,
};
use skusho_service::notify::Notifier;
use skusho_service::overlay::HeadlessWindowHost;
use skusho_service::persist::{MediaRecord, MediaStore, PendingEntry, SaveSummary, StorageError};
use skusho_service::unlock::Clock;
use skusho_service::{CaptureService, ServiceDeps};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Small display so frames stay cheap.
pub const BOUNDS: DisplayBounds = DisplayBounds {
    width: 8,
    height: 4,
    density_dpi: 160,
};

/// Epoch ms the test clock starts at.
pub const START_MS: i64 = 1_760_000_000_000;

/// When the fake mirror renders frames after an output target is created.
#[derive(Debug, Clone)]
pub enum FrameSchedule {
    /// One frame at each offset
    At(Vec<Duration>),
    /// A frame every period until released
    Every(Duration),
    Never,
}

pub struct FakeFacility {
    schedule: FrameSchedule,
    opens: AtomicU32,
    targets: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    revoke: Mutex<Option<RevokeCallback>>,
}

impl FakeFacility {
    pub fn new(schedule: FrameSchedule) -> Self {
        Self {
            schedule,
            opens: AtomicU32::new(0),
            targets: Arc::new(AtomicU32::new(0)),
            stops: Arc::new(AtomicU32::new(0)),
            revoke: Mutex::new(None),
        }
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn targets(&self) -> u32 {
        self.targets.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    /// Simulate the OS withdrawing consent.
    pub fn revoke(&self) {
        if let Some(callback) = self.revoke.lock().unwrap().as_ref() {
            callback();
        }
    }
}

impl MirrorFacility for FakeFacility {
    fn open(
        &self,
        consent: &ConsentToken,
        on_revoked: RevokeCallback,
    ) -> Result<Box<dyn MirrorHandle>, CaptureError> {
        if consent.as_str() == "denied" {
            return Err(CaptureError::ConsentInvalid("user denied".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.revoke.lock().unwrap() = Some(on_revoked);
        Ok(Box::new(FakeHandle {
            schedule: self.schedule.clone(),
            targets: Arc::clone(&self.targets),
            stops: Arc::clone(&self.stops),
        }))
    }
}

struct FakeHandle {
    schedule: FrameSchedule,
    targets: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
}

fn frame(bounds: DisplayBounds, fill: u8) -> RawFrame {
    RawFrame::packed(
        bounds.width,
        bounds.height,
        vec![fill; (bounds.width * bounds.height * 4) as usize],
    )
}

impl MirrorHandle for FakeHandle {
    fn create_output_target(
        &self,
        _name: &str,
        bounds: DisplayBounds,
        sink: FrameSink,
    ) -> Result<Box<dyn OutputTarget>, CaptureError> {
        self.targets.fetch_add(1, Ordering::SeqCst);
        let released = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&released);
        let created = Instant::now();
        let schedule = self.schedule.clone();

        tokio::spawn(async move {
            match schedule {
                FrameSchedule::At(offsets) => {
                    for (i, offset) in offsets.into_iter().enumerate() {
                        tokio::time::sleep_until(created + offset).await;
                        if stop.load(Ordering::SeqCst) || !sink.submit(frame(bounds, i as u8 + 1)) {
                            return;
                        }
                    }
                }
                FrameSchedule::Every(period) => {
                    let mut fill = 0u8;
                    loop {
                        tokio::time::sleep(period).await;
                        fill = fill.wrapping_add(1);
                        if stop.load(Ordering::SeqCst) || !sink.submit(frame(bounds, fill)) {
                            return;
                        }
                    }
                }
                FrameSchedule::Never => {}
            }
        });

        Ok(Box::new(FakeTarget { released }))
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeTarget {
    released: Arc<AtomicBool>,
}

impl OutputTarget for FakeTarget {
    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Media store keeping published records in memory.
#[derive(Default)]
pub struct MemoryMediaStore {
    buffers: Arc<Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>>,
    published: Mutex<Vec<MediaRecord>>,
    deleted: Mutex<Vec<String>>,
}

impl MemoryMediaStore {
    pub fn published(&self) -> Vec<MediaRecord> {
        self.published.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

struct BufferWriter {
    key: PathBuf,
    buffers: Arc<Mutex<std::collections::HashMap<PathBuf, Vec<u8>>>>,
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffers
            .lock()
            .unwrap()
            .entry(self.key.clone())
            .or_default()
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl MediaStore for MemoryMediaStore {
    fn insert_pending(&self, record: MediaRecord) -> Result<PendingEntry, StorageError> {
        Ok(PendingEntry {
            key: PathBuf::from(&record.display_name),
            record,
        })
    }

    fn open_writer(&self, entry: &PendingEntry) -> Result<Box<dyn Write + Send>, StorageError> {
        Ok(Box::new(BufferWriter {
            key: entry.key.clone(),
            buffers: Arc::clone(&self.buffers),
        }))
    }

    fn publish(&self, entry: &PendingEntry) -> Result<PathBuf, StorageError> {
        let mut record = entry.record.clone();
        record.is_pending = false;
        self.published.lock().unwrap().push(record);
        Ok(PathBuf::from(&entry.record.relative_path).join(&entry.key))
    }

    fn delete(&self, entry: &PendingEntry) {
        self.buffers.lock().unwrap().remove(&entry.key);
        self.deleted
            .lock()
            .unwrap()
            .push(entry.record.display_name.clone());
    }
}

/// Wall clock driven by tokio's (pausable) clock.
pub struct TestClock {
    start: Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> i64 {
        START_MS + self.start.elapsed().as_millis() as i64
    }
}

pub struct StaticFlags(pub AtomicBool);

impl FeatureFlags for StaticFlags {
    fn is_ad_required(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn burst_saved(&self, summary: &SaveSummary) {
        self.messages.lock().unwrap().push(summary.to_string());
    }
}

pub struct Harness {
    pub service: Arc<CaptureService>,
    pub facility: Arc<FakeFacility>,
    pub host: Arc<HeadlessWindowHost>,
    pub store: Arc<MemoryMediaStore>,
    pub settings: Arc<JsonSettingsStore>,
    pub clock: Arc<TestClock>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(settings: Settings, ad_required: bool, schedule: FrameSchedule) -> Self {
        let facility = Arc::new(FakeFacility::new(schedule));
        let host = Arc::new(HeadlessWindowHost::new(BOUNDS, (2, 2)));
        let store = Arc::new(MemoryMediaStore::default());
        let settings = Arc::new(JsonSettingsStore::in_memory(SettingsFile {
            settings,
            ..SettingsFile::default()
        }));
        let clock = Arc::new(TestClock::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let deps = ServiceDeps {
            facility: facility.clone(),
            window_host: host.clone(),
            media_store: store.clone(),
            settings: settings.clone(),
            flags: Arc::new(StaticFlags(AtomicBool::new(ad_required))),
            clock: clock.clone(),
            notifier: notifier.clone(),
        };

        Self {
            service: Arc::new(CaptureService::new(deps, ServiceConfig::default())),
            facility,
            host,
            store,
            settings,
            clock,
            notifier,
        }
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn set_expiry(&self, expiry_ms: i64) {
        self.settings.set_unlock_expiry_ms(expiry_ms);
    }
}

pub fn consent() -> ConsentToken {
    ConsentToken::new("granted")
}

pub fn offsets(ms: &[u64]) -> FrameSchedule {
    FrameSchedule::At(ms.iter().map(|m| Duration::from_millis(*m)).collect())
}

/// Let spawned tasks run. With paused time the short sleep only fires
/// once every ready task has had its turn.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1)).await;
}
