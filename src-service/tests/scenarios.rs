//! End-to-end capture scenarios against fake platform collaborators.

mod common;

use common::*;
use skusho_common::{OverlayVisibility, StopReason, TouchAction, TouchOutcome};
use skusho_service::capture::{CaptureError, ConsentToken};
use skusho_service::config::{Settings, SettingsStore};
use skusho_service::{ServiceError, ServiceEvent};
use std::time::Duration;

fn shots(count: u32, interval_ms: u64) -> Settings {
    Settings {
        continuous_shot_count: count,
        continuous_shot_interval_ms: interval_ms,
        ..Settings::default()
    }
}

fn sequence_suffix(name: &str) -> Option<String> {
    let stem = name.strip_prefix("Screenshot_")?.strip_suffix(".png")?;
    let parts: Vec<&str> = stem.split('_').collect();
    match parts.as_slice() {
        [_date, _time, _millis] => None,
        [_date, _time, _millis, seq] => Some(seq.to_string()),
        _ => panic!("unexpected file name {}", name),
    }
}

#[tokio::test(start_paused = true)]
async fn single_shot_saves_one_image_without_suffix() {
    let h = Harness::new(shots(0, 500), false, offsets(&[20]));
    h.service.start(consent()).await.unwrap();
    assert!(h.service.is_running());

    let started_at = h.now_ms();
    let report = h.service.capture().await.unwrap().wait().await;

    assert_eq!(report.requested, 1);
    assert_eq!(report.captured, 1);
    let summary = report.summary.unwrap();
    assert_eq!(summary.to_string(), "saved 1 of 1");
    assert_eq!(h.notifier.messages(), vec!["saved 1 of 1".to_string()]);

    let records = h.store.published();
    assert_eq!(records.len(), 1);
    assert_eq!(sequence_suffix(&records[0].display_name), None);
    assert_eq!(records[0].date_taken_ms, started_at);
    assert_eq!(records[0].relative_path, "Pictures/Screenshots");
    assert_eq!((records[0].width, records[0].height), (8, 4));
}

#[tokio::test(start_paused = true)]
async fn burst_keeps_original_sequence_numbers() {
    // Frames exist for shots 1 and 3 only; shot 2 polls while nothing arrives.
    let h = Harness::new(shots(3, 500), false, offsets(&[20, 900]));
    h.service.start(consent()).await.unwrap();

    let started_at = h.now_ms();
    let report = h.service.capture().await.unwrap().wait().await;

    assert_eq!(report.requested, 3);
    assert_eq!(report.captured, 2);
    assert_eq!(report.summary.unwrap().to_string(), "saved 2 of 3");

    let records = h.store.published();
    assert_eq!(records.len(), 2);
    assert_eq!(sequence_suffix(&records[0].display_name).as_deref(), Some("01"));
    assert_eq!(sequence_suffix(&records[1].display_name).as_deref(), Some("03"));
    assert_eq!(records[0].date_taken_ms, started_at);
    assert_eq!(records[1].date_taken_ms, started_at + 2);
    assert_eq!(h.notifier.messages(), vec!["saved 2 of 3".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn unlock_expiry_stops_session_without_capture() {
    let h = Harness::new(Settings::default(), true, FrameSchedule::Never);
    h.set_expiry(h.now_ms() + 5_000);
    let mut events = h.service.subscribe();

    h.service.start(consent()).await.unwrap();
    assert!(h.service.is_running());

    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert!(h.service.is_running());

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;

    assert!(!h.service.is_running());
    assert_eq!(h.settings.unlock_expiry_ms(), 0);
    assert_eq!(h.facility.targets(), 0);
    assert_eq!(h.facility.stops(), 1);
    assert_eq!(h.service.status().await.overlay, OverlayVisibility::Removed);

    let mut stopped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ServiceEvent::Stopped(reason) = event {
            stopped.push(reason);
        }
    }
    assert_eq!(stopped, vec![StopReason::UnlockExpired]);
}

#[tokio::test(start_paused = true)]
async fn past_expiry_stops_exactly_once() {
    let h = Harness::new(Settings::default(), true, FrameSchedule::Never);
    h.set_expiry(h.now_ms() + 60_000);
    let mut events = h.service.subscribe();
    h.service.start(consent()).await.unwrap();

    h.set_expiry(h.now_ms() - 1);
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    settle().await;

    assert!(!h.service.is_running());
    assert_eq!(h.settings.unlock_expiry_ms(), 0);

    // Later polls and a user stop change nothing.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!h.service.stop(StopReason::User).await);

    let stops = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|e| matches!(e, ServiceEvent::Stopped(_)))
        .count();
    assert_eq!(stops, 1);
    assert_eq!(h.facility.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn gate_inert_when_ads_not_required() {
    let h = Harness::new(Settings::default(), false, FrameSchedule::Never);
    h.set_expiry(h.now_ms() - 1);
    h.service.start(consent()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;

    assert!(h.service.is_running());
    assert_eq!(h.settings.unlock_expiry_ms(), START_MS - 1);
}

#[tokio::test(start_paused = true)]
async fn locked_service_refuses_start_and_capture() {
    let h = Harness::new(Settings::default(), true, FrameSchedule::Never);
    assert_eq!(
        h.service.start(consent()).await.unwrap_err(),
        ServiceError::CaptureLocked
    );
    assert_eq!(h.facility.opens(), 0);
    assert_eq!(h.service.status().await.unlock_remaining_ms, 0);

    let expiry = h.service.grant_unlock();
    assert_eq!(expiry, h.now_ms() + 300_000);
    h.service.start(consent()).await.unwrap();

    let status = h.service.status().await;
    assert!(status.ad_required);
    assert_eq!(status.unlock_remaining_ms, 300_000);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.service.status().await.unlock_remaining_ms, 240_000);
}

#[tokio::test(start_paused = true)]
async fn repeated_bursts_reuse_output_target() {
    let h = Harness::new(
        shots(2, 500),
        false,
        FrameSchedule::Every(Duration::from_millis(40)),
    );
    h.service.start(consent()).await.unwrap();

    let first = h.service.capture().await.unwrap().wait().await;
    let second = h.service.capture().await.unwrap().wait().await;

    assert_eq!(first.captured, 2);
    assert_eq!(second.captured, 2);
    assert_eq!(h.facility.targets(), 1);
    assert_eq!(h.service.output_targets_created().await, Some(1));
    assert_eq!(h.store.published().len(), 4);
}

#[tokio::test(start_paused = true)]
async fn frames_queued_before_trigger_are_not_captured() {
    let h = Harness::new(shots(1, 500), false, offsets(&[20, 1000]));
    h.service.start(consent()).await.unwrap();

    let first = h.service.capture().await.unwrap().wait().await;
    assert_eq!(first.captured, 1);

    // The second frame lands between bursts, while the overlay is showing.
    tokio::time::sleep(Duration::from_millis(2000)).await;
    let second = h.service.capture().await.unwrap().wait().await;

    assert_eq!(second.captured, 0);
    assert_eq!(h.store.published().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn overlay_hidden_during_burst_and_restored_after() {
    let h = Harness::new(shots(2, 500), false, offsets(&[20, 600]));
    h.service.start(consent()).await.unwrap();
    assert!(h.host.is_visible());

    let ticket = h.service.capture().await.unwrap();
    assert_eq!(h.service.status().await.overlay, OverlayVisibility::Hidden);
    assert!(!h.host.is_visible());

    ticket.wait().await;
    assert_eq!(h.service.status().await.overlay, OverlayVisibility::Shown);
    assert!(h.host.is_visible());
    assert_eq!(h.host.add_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_burst_still_restores_overlay() {
    let h = Harness::new(shots(3, 1000), false, FrameSchedule::Never);
    h.service.start(consent()).await.unwrap();

    let ticket = h.service.capture().await.unwrap();
    assert!(!h.host.is_visible());

    tokio::time::sleep(Duration::from_millis(120)).await;
    ticket.cancel();
    let report = ticket.wait().await;
    assert!(report.error.is_some());
    settle().await;

    assert_eq!(h.service.status().await.overlay, OverlayVisibility::Shown);
    assert!(h.host.is_visible());
    assert!(h.store.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn burst_without_frames_restores_overlay_and_saves_nothing() {
    let h = Harness::new(shots(2, 500), false, FrameSchedule::Never);
    h.service.start(consent()).await.unwrap();

    let report = h.service.capture().await.unwrap().wait().await;

    assert_eq!(report.captured, 0);
    assert!(report.summary.is_none());
    assert!(h.store.published().is_empty());
    assert!(h.notifier.messages().is_empty());
    assert_eq!(h.service.status().await.overlay, OverlayVisibility::Shown);
}

#[tokio::test(start_paused = true)]
async fn stop_during_burst_aborts_it() {
    let h = Harness::new(shots(3, 500), false, offsets(&[20]));
    h.service.start(consent()).await.unwrap();

    let ticket = h.service.capture().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(h.service.stop(StopReason::User).await);

    let report = ticket.wait().await;
    assert_eq!(report.error, Some(CaptureError::SinkClosed));
    assert!(h.store.published().is_empty());
    assert_eq!(h.service.status().await.overlay, OverlayVisibility::Removed);
    assert!(!h.service.is_running());
}

#[tokio::test(start_paused = true)]
async fn revocation_tears_down_session() {
    let h = Harness::new(Settings::default(), false, FrameSchedule::Never);
    let mut events = h.service.subscribe();
    h.service.start(consent()).await.unwrap();

    h.facility.revoke();
    settle().await;

    assert!(!h.service.is_running());
    assert_eq!(h.facility.stops(), 1);
    let reasons: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            ServiceEvent::Stopped(reason) => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(reasons, vec![StopReason::SessionRevoked]);

    // A fresh consent starts a new session.
    h.service.start(consent()).await.unwrap();
    assert_eq!(h.facility.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_are_guarded() {
    let h = Harness::new(Settings::default(), false, FrameSchedule::Never);

    assert!(!h.service.stop(StopReason::User).await);
    assert_eq!(
        h.service.capture().await.err(),
        Some(ServiceError::NotRunning)
    );
    assert!(matches!(
        h.service.start(ConsentToken::new("denied")).await,
        Err(ServiceError::Capture(CaptureError::ConsentInvalid(_)))
    ));
    assert!(!h.service.is_running());

    h.service.start(consent()).await.unwrap();
    assert_eq!(
        h.service.start(consent()).await.unwrap_err(),
        ServiceError::AlreadyRunning
    );
    assert!(h.service.stop(StopReason::User).await);
    assert!(!h.service.stop(StopReason::User).await);
    assert_eq!(h.facility.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn tap_captures_and_drag_snaps() {
    let h = Harness::new(shots(1, 500), false, FrameSchedule::Every(Duration::from_millis(40)));
    let mut events = h.service.subscribe();
    h.service.start(consent()).await.unwrap();

    // Drag right past the 10px threshold: snaps and is remembered, no capture.
    let s = &h.service;
    s.handle_touch(TouchAction::Down, 1.0, 201.0).await.unwrap();
    assert_eq!(
        s.handle_touch(TouchAction::Move, 16.0, 202.0).await.unwrap(),
        TouchOutcome::Dragged
    );
    assert_eq!(
        s.handle_touch(TouchAction::Up, 16.0, 202.0).await.unwrap(),
        TouchOutcome::Snapped
    );
    let saved = h.settings.settings().overlay_position.unwrap();
    assert_eq!(saved.x, 6);
    assert_eq!(h.facility.targets(), 0);

    // Tap: capture runs in the background.
    s.handle_touch(TouchAction::Down, 16.0, 202.0).await.unwrap();
    assert_eq!(
        s.handle_touch(TouchAction::Up, 16.0, 202.0).await.unwrap(),
        TouchOutcome::CaptureRequested
    );

    loop {
        match events.recv().await.unwrap() {
            ServiceEvent::BurstSaved { saved, requested } => {
                assert_eq!((saved, requested), (1, 1));
                break;
            }
            _ => continue,
        }
    }
    assert_eq!(h.store.published().len(), 1);
}
