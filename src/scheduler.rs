//! Display cycle state machine
//!
//! `Stopped -> Armed -> Showing -> Armed -> ...`, driven entirely by the
//! owner's clock: the daemon loop sleeps until [`DisplayScheduler::next_deadline`]
//! and then calls [`DisplayScheduler::advance`]. Every hide, whatever caused
//! it, funnels through one path that emits `ImageHidden` once and re-arms at
//! most once.

use anyhow::{bail, Result};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ConfigStore;
use crate::constants::timing;
use crate::overlay::{CloseReason, OverlayInput, OverlayKind, OverlayLifecycle, SurfaceFactory, SurfaceId};
use crate::timer::OneShot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Stopped,
    Armed,
    Showing,
}

/// Notifications for whoever listens (tray, logs, tests)
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    StatusChanged(bool),
    ImageDisplayed(PathBuf),
    ImageHidden { path: PathBuf, reason: CloseReason },
    /// The image stays in the library; the cycle continues
    DisplayFailed { path: PathBuf, reason: String },
}

pub struct DisplayScheduler {
    store: ConfigStore,
    factory: Box<dyn SurfaceFactory>,
    events: Sender<SchedulerEvent>,
    running: bool,
    armed: OneShot,
    active: Option<OverlayLifecycle>,
}

impl DisplayScheduler {
    pub fn new(store: ConfigStore, factory: Box<dyn SurfaceFactory>, events: Sender<SchedulerEvent>) -> Self {
        Self {
            store,
            factory,
            events,
            running: false,
            armed: OneShot::new(),
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// A visible preview counts as showing even while stopped
    pub fn phase(&self) -> Phase {
        if self.active.is_some() {
            Phase::Showing
        } else if self.running {
            Phase::Armed
        } else {
            Phase::Stopped
        }
    }

    pub fn active_overlay(&self) -> Option<&OverlayLifecycle> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore {
        &mut self.store
    }

    /// Armed cycle timer plus the visible overlay's hide timer
    pub fn pending_timers(&self) -> usize {
        usize::from(self.armed.is_pending())
            + usize::from(self.active.as_ref().is_some_and(|o| o.hide_deadline().is_some()))
    }

    /// Earliest instant at which [`Self::advance`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let hide = self.active.as_ref().and_then(|o| o.hide_deadline());
        match (self.armed.deadline(), hide) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn start(&mut self, now: Instant) {
        if self.running {
            debug!("Scheduler already running");
            return;
        }
        self.running = true;
        info!("Display scheduler started");
        self.emit(SchedulerEvent::StatusChanged(true));
        self.arm(now);
    }

    pub fn stop(&mut self) {
        if !self.running {
            debug!("Scheduler already stopped");
            return;
        }
        self.running = false;
        self.armed.cancel();
        info!("Display scheduler stopped");
        self.emit(SchedulerEvent::StatusChanged(false));
        self.teardown_active(CloseReason::Stopped);
    }

    /// Fire whatever timers are due at `now`
    pub fn advance(&mut self, now: Instant) {
        if let Some(reason) = self.active.as_mut().and_then(|overlay| overlay.poll_timeout(now)) {
            self.finish_active(reason, now);
        }

        if self.running && self.armed.fire_if_due(now) {
            self.on_interval_elapsed(now);
        }
    }

    /// Show `path` right away with the short preview auto-hide. Leaves the
    /// cycle timer and the running flag alone.
    pub fn show_immediately(&mut self, path: &Path, now: Instant) -> Result<()> {
        if !path.is_file() {
            bail!("Image not found: {}", path.display());
        }
        info!(path = %path.display(), "Showing preview");
        self.present(path, OverlayKind::Preview, timing::PREVIEW_DURATION, now)
    }

    /// Preview a random library image; returns the one picked
    pub fn show_random_now(&mut self, now: Instant) -> Result<PathBuf> {
        let paths = self.store.existing_image_paths();
        let Some(path) = pick_random(&paths) else {
            bail!("No images in library");
        };
        self.show_immediately(&path, now)?;
        Ok(path)
    }

    /// Route backend input to the overlay it belongs to
    pub fn handle_input(&mut self, surface: SurfaceId, input: OverlayInput, now: Instant) {
        let Some(overlay) = self.active.as_mut().filter(|o| o.surface_id() == surface) else {
            debug!(surface, ?input, "Input for unknown surface ignored");
            return;
        };
        if let Some(reason) = overlay.handle_input(input, &mut self.store) {
            self.finish_active(reason, now);
        }
    }

    /// The backend saw the surface disappear without us closing it
    pub fn notify_surface_closed(&mut self, surface: SurfaceId, now: Instant) {
        if self.active.as_ref().is_some_and(|o| o.surface_id() == surface) {
            warn!(surface, "Overlay window vanished");
            self.finish_active(CloseReason::WindowGone, now);
        } else {
            debug!(surface, "Close notice for a surface already torn down");
        }
    }

    /// Persist a new target size and rescale the visible overlay
    pub fn apply_gif_size(&mut self, size: u32) {
        self.store.set_gif_size(size);
        let target = self.store.get().gif_size;
        if let Some(overlay) = self.active.as_mut() {
            overlay.apply_target_size(target, &mut self.store);
        }
    }

    fn on_interval_elapsed(&mut self, now: Instant) {
        let paths = self.store.existing_image_paths();
        let Some(path) = pick_random(&paths) else {
            info!("No images in library, waiting for next interval");
            self.arm(now);
            return;
        };

        if !path.exists() {
            warn!(path = %path.display(), "Picked image vanished, removing from library");
            self.store.remove_path(&path);
            self.arm(now);
            return;
        }

        let visible_for = Duration::from_secs(self.store.get().max_display);
        // Failures are logged, emitted and re-armed inside present
        self.present(&path, OverlayKind::Cycle, visible_for, now).ok();
    }

    /// Replace any visible overlay with a new one for `path`
    fn present(&mut self, path: &Path, kind: OverlayKind, visible_for: Duration, now: Instant) -> Result<()> {
        self.teardown_active(CloseReason::Replaced);

        let opened = OverlayLifecycle::open(
            path,
            kind,
            visible_for,
            &self.store,
            self.factory.as_mut(),
            &mut rand::rng(),
            now,
        );
        match opened {
            Ok(overlay) => {
                self.active = Some(overlay);
                self.emit(SchedulerEvent::ImageDisplayed(path.to_path_buf()));
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = ?e, "Failed to display image");
                self.emit(SchedulerEvent::DisplayFailed {
                    path: path.to_path_buf(),
                    reason: format!("{e:#}"),
                });
                // Whatever was visible is gone, so the cycle must not stall
                if self.running && !self.armed.is_pending() {
                    self.arm(now);
                }
                Err(e)
            }
        }
    }

    /// Close the visible overlay without re-arming
    fn teardown_active(&mut self, reason: CloseReason) {
        if let Some(mut overlay) = self.active.take()
            && let Some(reason) = overlay.close(reason)
        {
            self.emit_hidden(&overlay, reason);
        }
    }

    /// The visible overlay ended on its own (timeout, dismissal, window gone)
    fn finish_active(&mut self, reason: CloseReason, now: Instant) {
        let Some(mut overlay) = self.active.take() else {
            return;
        };
        // The overlay may have closed itself already; either way report once
        overlay.close(reason);
        self.emit_hidden(&overlay, reason);

        if self.running && !self.armed.is_pending() {
            self.arm(now);
        }
    }

    fn arm(&mut self, now: Instant) {
        let interval = self.store.get().display_interval;
        self.armed.arm(now, Duration::from_secs(interval));
        debug!(seconds = interval, "Next display armed");
    }

    fn emit_hidden(&self, overlay: &OverlayLifecycle, reason: CloseReason) {
        debug!(kind = ?overlay.kind(), ?reason, "Overlay hidden");
        self.emit(SchedulerEvent::ImageHidden {
            path: overlay.path().to_path_buf(),
            reason,
        });
    }

    fn emit(&self, event: SchedulerEvent) {
        if self.events.send(event).is_err() {
            debug!("No listener for scheduler events");
        }
    }
}

fn pick_random(paths: &[PathBuf]) -> Option<PathBuf> {
    paths.choose(&mut rand::rng()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::store::tests::{memory_store, MemoryBackend};
    use crate::config::{Configuration, PositionMode};
    use crate::overlay::tests::{closes, FakeSurfaces, OpLog, SurfaceOp};
    use crate::types::Position;
    use std::fs;
    use std::sync::mpsc::{self, Receiver};
    use tempfile::TempDir;

    struct Harness {
        scheduler: DisplayScheduler,
        events: Receiver<SchedulerEvent>,
        log: OpLog,
        backend: MemoryBackend,
        dir: TempDir,
        t0: Instant,
    }

    impl Harness {
        fn new(images: &[&str], edit: impl FnOnce(&mut Configuration)) -> Self {
            Self::build(images, edit, false)
        }

        fn build(images: &[&str], edit: impl FnOnce(&mut Configuration), fail_open: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = Configuration {
                display_interval: 1,
                max_display: 1,
                ..Configuration::default()
            };
            for name in images {
                let path = dir.path().join(name);
                fs::write(&path, b"GIF89a").unwrap();
                config.image_paths.insert(path);
            }
            edit(&mut config);

            let (store, backend) = memory_store(config);
            let (mut factory, log) = FakeSurfaces::new();
            factory.fail_open = fail_open;
            let (tx, events) = mpsc::channel();
            Self {
                scheduler: DisplayScheduler::new(store, Box::new(factory), tx),
                events,
                log,
                backend,
                dir,
                t0: Instant::now(),
            }
        }

        fn at(&self, secs: u64) -> Instant {
            self.t0 + Duration::from_secs(secs)
        }

        fn drain(&self) -> Vec<SchedulerEvent> {
            self.events.try_iter().collect()
        }

        fn opened_at(&self) -> Vec<Position> {
            self.log
                .borrow()
                .iter()
                .filter_map(|op| match op {
                    SurfaceOp::Open { position, .. } => Some(*position),
                    _ => None,
                })
                .collect()
        }
    }

    fn displayed(events: &[SchedulerEvent]) -> usize {
        events.iter().filter(|e| matches!(e, SchedulerEvent::ImageDisplayed(_))).count()
    }

    fn hidden(events: &[SchedulerEvent]) -> usize {
        events.iter().filter(|e| matches!(e, SchedulerEvent::ImageHidden { .. })).count()
    }

    #[test]
    fn test_empty_library_keeps_rearming() {
        let mut h = Harness::new(&[], |_| {});
        h.scheduler.start(h.at(0));

        for tick in 1..=5 {
            h.scheduler.advance(h.at(tick));
            assert_eq!(h.scheduler.next_deadline(), Some(h.at(tick + 1)));
        }

        let events = h.drain();
        assert_eq!(events, vec![SchedulerEvent::StatusChanged(true)]);
        assert!(h.scheduler.is_running());
        assert_eq!(h.scheduler.phase(), Phase::Armed);
    }

    #[test]
    fn test_one_image_shows_then_hides_in_order() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));

        h.scheduler.advance(h.at(1));
        assert_eq!(h.scheduler.phase(), Phase::Showing);
        h.scheduler.advance(h.at(2));
        assert_eq!(h.scheduler.phase(), Phase::Armed);

        let path = h.dir.path().join("x.gif");
        assert_eq!(
            h.drain(),
            vec![
                SchedulerEvent::StatusChanged(true),
                SchedulerEvent::ImageDisplayed(path.clone()),
                SchedulerEvent::ImageHidden { path, reason: CloseReason::Timeout },
            ]
        );
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(3)));
    }

    #[test]
    fn test_interval_is_read_fresh_at_arm_time() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.store_mut().update(|config| config.display_interval = 30);

        // The running wait keeps the deadline it was armed with
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(1)));
        h.scheduler.advance(h.at(1));
        h.scheduler.advance(h.at(2));
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(32)));
    }

    #[test]
    fn test_saved_position_is_used() {
        let mut h = Harness::new(&["x.gif"], |config| {
            config.position_mode = PositionMode::BottomRight;
            config.custom_positions.insert("x.gif".into(), crate::types::SavedPlacement::at(Position::new(10, 20)));
        });
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));
        assert_eq!(h.opened_at(), vec![Position::new(10, 20)]);
    }

    #[test]
    fn test_dragged_position_is_reused_next_time() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));

        let overlay = h.scheduler.active_overlay().unwrap();
        let (id, start) = (overlay.surface_id(), overlay.position());
        h.scheduler.handle_input(id, OverlayInput::DragStart { x: start.x, y: start.y }, h.at(1));
        h.scheduler.handle_input(id, OverlayInput::DragMove { x: 50, y: 60 }, h.at(1));
        h.scheduler.handle_input(id, OverlayInput::DragEnd, h.at(1));
        h.scheduler.handle_input(id, OverlayInput::RightClick, h.at(1));
        assert_eq!(h.scheduler.phase(), Phase::Armed);

        // Closed at t=1 and re-armed for t=2
        h.scheduler.advance(h.at(2));
        assert_eq!(h.opened_at().last(), Some(&Position::new(50, 60)));
        let saved = h.backend.stored.lock().unwrap().clone().unwrap();
        assert_eq!(saved.custom_positions["x.gif"].position(), Position::new(50, 60));
    }

    #[test]
    fn test_stop_then_start_leaves_one_timer() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.stop();
        h.scheduler.start(h.at(0));
        assert_eq!(h.scheduler.pending_timers(), 1);

        // Same while showing: the overlay's hide timer goes away with it
        h.scheduler.advance(h.at(1));
        h.scheduler.stop();
        assert_eq!(h.scheduler.pending_timers(), 0);
        h.scheduler.start(h.at(1));
        assert_eq!(h.scheduler.pending_timers(), 1);
        assert!(h.scheduler.active_overlay().is_none());
    }

    #[test]
    fn test_stop_while_showing_hides_once() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));
        let id = h.scheduler.active_overlay().unwrap().surface_id();

        h.scheduler.stop();
        h.scheduler.stop();
        h.scheduler.notify_surface_closed(id, h.at(1));
        h.scheduler.advance(h.at(10));

        let events = h.drain();
        assert_eq!(hidden(&events), 1);
        assert!(events.contains(&SchedulerEvent::ImageHidden {
            path: h.dir.path().join("x.gif"),
            reason: CloseReason::Stopped,
        }));
        assert_eq!(closes(&h.log), 1);
        assert_eq!(h.scheduler.phase(), Phase::Stopped);
        assert_eq!(h.scheduler.next_deadline(), None);
    }

    #[test]
    fn test_window_gone_rearms_once() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));
        let id = h.scheduler.active_overlay().unwrap().surface_id();

        h.scheduler.notify_surface_closed(id, h.at(1));
        h.scheduler.notify_surface_closed(id, h.at(1));
        assert_eq!(h.scheduler.pending_timers(), 1);
        assert_eq!(hidden(&h.drain()), 1);
    }

    #[test]
    fn test_at_most_one_overlay_at_a_time() {
        let mut h = Harness::new(&["a.gif", "b.gif"], |config| config.max_display = 100);
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));
        h.scheduler.show_immediately(&h.dir.path().join("b.gif"), h.at(2)).unwrap();
        h.scheduler.show_random_now(h.at(3)).unwrap();

        let opens = h.opened_at().len();
        assert_eq!(opens, 3);
        // Every open except the live one has been closed
        assert_eq!(closes(&h.log), opens - 1);
    }

    #[test]
    fn test_preview_leaves_cycle_timer_alone() {
        let mut h = Harness::new(&["x.gif"], |config| config.display_interval = 60);
        h.scheduler.start(h.at(0));
        h.scheduler.show_immediately(&h.dir.path().join("x.gif"), h.at(1)).unwrap();

        assert_eq!(h.scheduler.phase(), Phase::Showing);
        assert_eq!(h.scheduler.pending_timers(), 2);

        h.scheduler.advance(h.at(1) + timing::PREVIEW_DURATION);
        assert_eq!(h.scheduler.phase(), Phase::Armed);
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(60)));
        assert_eq!(h.scheduler.pending_timers(), 1);
    }

    #[test]
    fn test_preview_while_stopped_does_not_start() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.show_immediately(&h.dir.path().join("x.gif"), h.at(0)).unwrap();
        h.scheduler.advance(h.at(0) + timing::PREVIEW_DURATION);

        let events = h.drain();
        assert_eq!((displayed(&events), hidden(&events)), (1, 1));
        assert!(!h.scheduler.is_running());
        assert_eq!(h.scheduler.next_deadline(), None);
    }

    #[test]
    fn test_preview_of_missing_file_is_rejected() {
        let mut h = Harness::new(&[], |_| {});
        assert!(h.scheduler.show_immediately(Path::new("/nope/missing.gif"), h.at(0)).is_err());
        assert!(h.scheduler.show_random_now(h.at(0)).is_err());
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_vanished_image_is_pruned_without_display() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        fs::remove_file(h.dir.path().join("x.gif")).unwrap();
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));

        assert_eq!(displayed(&h.drain()), 0);
        assert!(h.scheduler.store().get().image_paths.is_empty());
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(2)));
    }

    #[test]
    fn test_presentation_failure_keeps_image_and_rearms() {
        let mut h = Harness::build(&["x.gif"], |_| {}, true);
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));

        let events = h.drain();
        assert!(events.iter().any(|e| matches!(e, SchedulerEvent::DisplayFailed { .. })));
        assert_eq!(displayed(&events), 0);
        assert_eq!(h.scheduler.store().get().image_paths.len(), 1);
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(2)));
    }

    #[test]
    fn test_failed_preview_over_cycle_overlay_rearms() {
        let mut h = Harness::new(&["x.gif"], |config| config.max_display = 100);
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));
        assert_eq!(h.scheduler.pending_timers(), 1);

        // Preview of a file that exists but the backend refuses
        let broken = h.dir.path().join("broken.gif");
        fs::write(&broken, b"junk").unwrap();
        h.scheduler.factory = Box::new(FakeSurfaces { fail_open: true, ..FakeSurfaces::new().0 });
        assert!(h.scheduler.show_immediately(&broken, h.at(2)).is_err());

        assert!(h.scheduler.active_overlay().is_none());
        assert_eq!(h.scheduler.next_deadline(), Some(h.at(3)));
    }

    #[test]
    fn test_apply_gif_size_resizes_live_overlay() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));

        h.scheduler.apply_gif_size(400);
        let overlay = h.scheduler.active_overlay().unwrap();
        assert_eq!(overlay.size(), crate::types::Dimensions::new(400, 200));
        assert_eq!(h.scheduler.store().get().gif_size, 400);
        assert_eq!(
            h.scheduler.store().get().custom_positions["x.gif"].width,
            Some(400)
        );
    }

    #[test]
    fn test_huge_configured_durations_do_not_panic() {
        let config: Configuration = serde_json::from_str(
            r#"{"display_interval_secs":18446744073709551615,"max_display_secs":18446744073709551615}"#,
        )
        .unwrap();
        let (store, _) = memory_store(config);
        let (factory, _) = FakeSurfaces::new();
        let (tx, _rx) = mpsc::channel();
        let mut scheduler = DisplayScheduler::new(store, Box::new(factory), tx);

        let t0 = Instant::now();
        scheduler.start(t0);
        assert!(scheduler.is_running());
        assert_eq!(scheduler.next_deadline(), Some(t0 + timing::MAX_TIMER_DELAY));
    }

    #[test]
    fn test_pick_random_covers_library() {
        assert_eq!(pick_random(&[]), None);
        let one = vec![PathBuf::from("/a.gif")];
        assert_eq!(pick_random(&one), Some(PathBuf::from("/a.gif")));
        let two = vec![PathBuf::from("/a.gif"), PathBuf::from("/b.gif")];
        let picked = pick_random(&two).unwrap();
        assert!(two.contains(&picked));
    }

    #[test]
    fn test_input_for_stale_surface_is_ignored() {
        let mut h = Harness::new(&["x.gif"], |_| {});
        h.scheduler.start(h.at(0));
        h.scheduler.advance(h.at(1));
        h.scheduler.handle_input(999, OverlayInput::RightClick, h.at(1));
        assert_eq!(h.scheduler.phase(), Phase::Showing);
    }
}
