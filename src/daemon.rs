//! Daemon: owns the scheduler thread and the helper threads feeding it
//!
//! Everything that touches [`DisplayScheduler`] happens on the thread that
//! calls [`run`]. The X11 event pump, the control socket listener and the
//! signal watcher only send [`LoopMessage`]s into one channel.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::ConfigStore;
use crate::constants::{ipc, timing};
use crate::ipc::{ControlRequest, ControlResponse, ControlServer};
use crate::library;
use crate::overlay::headless::HeadlessSurfaces;
use crate::overlay::{SurfaceEvent, SurfaceFactory};
use crate::persistence::JsonFile;
use crate::scheduler::{DisplayScheduler, SchedulerEvent};
use crate::x11::{spawn_event_pump, X11Surfaces};

pub struct DaemonOptions {
    pub config_path: PathBuf,
    pub headless: bool,
    /// Start the cycle regardless of `auto_start`
    pub start: bool,
}

pub enum LoopMessage {
    Control(ControlRequest, Sender<ControlResponse>),
    Surface(SurfaceEvent),
    Shutdown,
}

pub fn run(options: DaemonOptions) -> Result<()> {
    let store = ConfigStore::open_with_defaults(
        Box::new(JsonFile::new(&options.config_path)),
        library::first_run_defaults,
    );
    info!(
        config = %options.config_path.display(),
        images = store.get().image_paths.len(),
        "Loaded configuration"
    );

    let (tx, rx) = mpsc::channel();

    let factory: Box<dyn SurfaceFactory> = if options.headless {
        Box::new(HeadlessSurfaces::default())
    } else {
        let surfaces = X11Surfaces::connect()?;
        let surface_tx = tx.clone();
        spawn_event_pump(surfaces.connection(), move |event| {
            surface_tx.send(LoopMessage::Surface(event)).is_ok()
        });
        Box::new(surfaces)
    };

    let server = ControlServer::bind().context("Failed to start control socket")?;
    let socket_path = server.path().to_path_buf();
    info!(socket = %socket_path.display(), "Control socket listening");
    spawn_ipc_listener(server, tx.clone());

    #[cfg(unix)]
    let _signal_watcher = spawn_signal_watcher(tx.clone()).context("Failed to install signal handlers")?;
    drop(tx);

    let (event_tx, event_rx) = mpsc::channel();
    let mut scheduler = DisplayScheduler::new(store, factory, event_tx);

    if options.start || scheduler.store().get().auto_start {
        scheduler.start(Instant::now());
    }

    info!("glimmr daemon running");
    run_loop(&mut scheduler, &rx, &event_rx);

    // Shutdown hides whatever is visible before the process exits
    scheduler.stop();
    log_events(&event_rx);
    // The listener thread is still blocked in accept, so its server never drops
    let _ = std::fs::remove_file(&socket_path);
    info!("glimmr daemon stopped");
    Ok(())
}

fn run_loop(scheduler: &mut DisplayScheduler, rx: &Receiver<LoopMessage>, events: &Receiver<SchedulerEvent>) {
    loop {
        let now = Instant::now();
        let wait = scheduler
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now))
            .unwrap_or(timing::IDLE_POLL);

        match rx.recv_timeout(wait) {
            Ok(LoopMessage::Shutdown) => {
                info!("Shutdown requested");
                break;
            }
            Ok(LoopMessage::Control(request, reply)) => {
                let shutdown = request == ControlRequest::Shutdown;
                let response = handle_request(scheduler, request);
                if reply.send(response).is_err() {
                    debug!("Control client went away before the reply");
                }
                if shutdown {
                    break;
                }
            }
            Ok(LoopMessage::Surface(event)) => handle_surface_event(scheduler, event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("All message senders gone, stopping daemon");
                break;
            }
        }

        scheduler.advance(Instant::now());
        log_events(events);
    }
}

fn handle_surface_event(scheduler: &mut DisplayScheduler, event: SurfaceEvent) {
    let now = Instant::now();
    match event {
        SurfaceEvent::Input(surface, input) => scheduler.handle_input(surface, input, now),
        SurfaceEvent::Destroyed(surface) => scheduler.notify_surface_closed(surface, now),
    }
}

pub(crate) fn handle_request(scheduler: &mut DisplayScheduler, request: ControlRequest) -> ControlResponse {
    let now = Instant::now();
    debug!(?request, "Handling control request");

    let result: Result<ControlResponse> = match request {
        ControlRequest::Start => {
            scheduler.start(now);
            Ok(ControlResponse::Ok)
        }
        ControlRequest::Stop => {
            scheduler.stop();
            Ok(ControlResponse::Ok)
        }
        ControlRequest::ShowNow { path: Some(path) } => {
            scheduler.show_immediately(&path, now).map(|()| ControlResponse::Ok)
        }
        ControlRequest::ShowNow { path: None } => scheduler.show_random_now(now).map(|_| ControlResponse::Ok),
        ControlRequest::SetGifSize(size) => {
            scheduler.apply_gif_size(size);
            Ok(ControlResponse::Ok)
        }
        ControlRequest::AddPath(path) => library::validate_new_image(&path).map(|path| {
            scheduler.store_mut().add_path(path);
            ControlResponse::Ok
        }),
        ControlRequest::RemovePath(path) => {
            scheduler.store_mut().remove_path(&path);
            Ok(ControlResponse::Ok)
        }
        ControlRequest::Status => Ok(ControlResponse::Status {
            running: scheduler.is_running(),
            phase: scheduler.phase(),
            showing: scheduler.active_overlay().map(|o| o.path().to_path_buf()),
            library_size: scheduler.store().get().image_paths.len(),
        }),
        ControlRequest::Ping => Ok(ControlResponse::Pong),
        ControlRequest::Shutdown => Ok(ControlResponse::Ok),
    };

    result.unwrap_or_else(|e| {
        warn!(error = ?e, "Control request failed");
        ControlResponse::Error(format!("{e:#}"))
    })
}

fn log_events(events: &Receiver<SchedulerEvent>) {
    for event in events.try_iter() {
        match event {
            SchedulerEvent::StatusChanged(running) => info!(running, "Scheduler status changed"),
            SchedulerEvent::ImageDisplayed(path) => info!(path = %path.display(), "Image displayed"),
            SchedulerEvent::ImageHidden { path, reason } => {
                info!(path = %path.display(), ?reason, "Image hidden")
            }
            SchedulerEvent::DisplayFailed { path, reason } => {
                warn!(path = %path.display(), %reason, "Image could not be displayed")
            }
        }
    }
}

/// Accept CLI connections and marshal each request onto the scheduler thread
fn spawn_ipc_listener(server: ControlServer, tx: Sender<LoopMessage>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut backoff = AcceptBackoff::default();
        loop {
            let mut conn = match server.accept() {
                Ok(conn) => {
                    backoff.reset();
                    conn
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!(error = ?e, retry_in_ms = delay.as_millis() as u64, "IPC listener failed to accept");
                    std::thread::sleep(delay);
                    continue;
                }
            };
            debug!("Control client connected");

            // A client may send several requests; EOF ends the session
            while let Ok(request) = conn.recv_request() {
                let (reply_tx, reply_rx) = mpsc::channel();
                if tx.send(LoopMessage::Control(request, reply_tx)).is_err() {
                    info!("Daemon loop gone, IPC listener stopping");
                    return;
                }
                let response = reply_rx
                    .recv()
                    .unwrap_or_else(|_| ControlResponse::Error("daemon is shutting down".to_string()));
                if let Err(e) = conn.send_response(&response) {
                    warn!(error = ?e, "Failed to send control response");
                    break;
                }
            }
            debug!("Control client disconnected");
        }
    })
}

/// Pause between failed accepts, doubling up to a cap
#[derive(Debug, Default)]
struct AcceptBackoff {
    current: Option<Duration>,
}

impl AcceptBackoff {
    fn next_delay(&mut self) -> Duration {
        let delay = match self.current {
            None => ipc::ACCEPT_RETRY_MIN,
            Some(previous) => (previous * 2).min(ipc::ACCEPT_RETRY_MAX),
        };
        self.current = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(unix)]
fn spawn_signal_watcher(tx: Sender<LoopMessage>) -> Result<std::thread::JoinHandle<()>> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    Ok(std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received termination signal");
            let _ = tx.send(LoopMessage::Shutdown);
        }
    }))
}
