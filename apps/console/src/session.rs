use std::{io, path::Path, sync::Arc, thread, time::Duration};

use crossbeam_channel::{Select, TryRecvError};
use parking_lot::Mutex;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use analysis::ChartFrame;
use crashsim_ingest_core::{
    channel, resolve_profile, shutdown_channel, CollisionType, IngestError, RunState, Sample, Scenario,
    ShutdownTx, TelemetryRx, TelemetrySource, TelemetryStore, HISTORY_CAPACITY,
};
use crashsim_ingest_synth::{SyntheticConfig, SyntheticSource, DEFAULT_TICK};
use iox::ExportError;

use crate::render::{self, ChartSink};

pub const INVALID_SPEED: &str = "Please enter valid numeric values.";
pub const MISSING_COLLISION: &str = "Collision type must be selected for accidents.";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    #[error("Simulation already running")]
    AlreadyRunning,
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("chart redraw failed: {0:#}")]
    Render(anyhow::Error),
    #[error("failed to spawn sample pump: {0}")]
    Spawn(#[source] io::Error),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick: Duration,
    pub render_period: Duration,
    pub history_capacity: usize,
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_TICK,
            render_period: Duration::from_millis(100),
            history_capacity: HISTORY_CAPACITY,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StartRequest {
    pub speed_kmh: f64,
    pub scenario: Scenario,
    pub collision: Option<CollisionType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub id: Uuid,
    pub scenario: Scenario,
    pub collision: Option<CollisionType>,
    pub speed_kmh: f64,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub state: RunState,
    pub history_len: usize,
    pub history_capacity: usize,
    pub log_len: usize,
    pub run: Option<RunInfo>,
    pub fault: Option<String>,
}

pub struct Inner {
    pub store: TelemetryStore,
    pub state: RunState,
    pub run: Option<RunInfo>,
    pub fault: Option<String>,
    // receiving end of the live run, drained by clear
    pub queue: Option<TelemetryRx>,
}

// background activities of one run
struct ActiveRun {
    id: Uuid,
    shutdown: ShutdownTx,
    producer: JoinHandle<()>,
    renderer: JoinHandle<()>,
    pump: thread::JoinHandle<()>,
}

/// Simulation controller: owns the buffers, the run state and the tasks of
/// the current run.
pub struct AppSession {
    inner: Arc<Mutex<Inner>>,
    // serializes start/stop; held across the awaits that reap a run
    active: tokio::sync::Mutex<Option<ActiveRun>>,
    sink: Arc<dyn ChartSink>,
    cfg: SessionConfig,
}

impl AppSession {
    pub fn new(cfg: SessionConfig, sink: Arc<dyn ChartSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                store: TelemetryStore::with_capacity(cfg.history_capacity),
                state: RunState::Idle,
                run: None,
                fault: None,
                queue: None,
            })),
            active: tokio::sync::Mutex::new(None),
            sink,
            cfg,
        }
    }

    pub async fn start(&self, req: StartRequest) -> Result<RunInfo, SessionError> {
        validate(&req)?;
        resolve_profile(req.scenario, req.collision)?;

        let src = SyntheticSource::new(SyntheticConfig {
            speed_kmh: req.speed_kmh,
            scenario: req.scenario,
            collision: req.collision,
            tick: self.cfg.tick,
            seed: self.cfg.seed,
        });
        self.launch(req, src).await
    }

    async fn launch<S: TelemetrySource + 'static>(&self, req: StartRequest, src: S) -> Result<RunInfo, SessionError> {
        let mut active = self.active.lock().await;
        if let Some(run) = active.take() {
            if !run.producer.is_finished() {
                *active = Some(run);
                return Err(SessionError::AlreadyRunning);
            }
            // producer died on its own; clean up before reuse
            reap(run).await;
        }

        let info = RunInfo {
            id: Uuid::new_v4(),
            scenario: req.scenario,
            collision: if req.scenario == Scenario::Accident { req.collision } else { None },
            speed_kmh: req.speed_kmh,
            started_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "unknown".into()),
        };

        let (tx, rx) = channel();
        let (shutdown, stop_rx) = shutdown_channel();
        let queue = rx.clone();
        let pump = spawn_pump(self.inner.clone(), rx).map_err(SessionError::Spawn)?;

        {
            let mut inner = self.inner.lock();
            inner.queue = Some(queue);
            inner.state = RunState::Running;
            inner.run = Some(info.clone());
            inner.fault = None;
        }

        let inner = self.inner.clone();
        let run_id = info.id;
        let producer_stop = stop_rx.clone();
        let producer = tokio::spawn(async move {
            if let Err(e) = src.run(tx, producer_stop).await {
                error!(%run_id, error = %e, "producer failed");
                let mut inner = inner.lock();
                inner.state = RunState::Idle;
                inner.fault = Some(e.to_string());
            }
        });
        let renderer = tokio::spawn(render::redraw_loop(
            self.inner.clone(),
            self.sink.clone(),
            self.cfg.render_period,
            stop_rx,
        ));

        info!(
            run_id = %info.id,
            scenario = %info.scenario,
            collision = ?info.collision,
            speed_kmh = info.speed_kmh,
            "simulation started"
        );
        *active = Some(ActiveRun { id: info.id, shutdown, producer, renderer, pump });
        Ok(info)
    }

    /// Halts the current run and waits until no further sample can land in
    /// the buffers. Returns `false` when nothing was running.
    pub async fn stop(&self) -> bool {
        let mut active = self.active.lock().await;
        let Some(run) = active.take() else {
            return false;
        };
        let run_id = run.id;
        reap(run).await;
        let log_len = {
            let mut inner = self.inner.lock();
            inner.state = RunState::Idle;
            inner.queue = None;
            inner.store.export_log().len()
        };
        info!(%run_id, samples = log_len, "simulation stopped");
        true
    }

    /// Writes the export log. `None` means the operator picked no destination.
    pub fn save(&self, dest: Option<&Path>) -> Result<Option<usize>, SessionError> {
        let Some(path) = dest else {
            return Ok(None);
        };
        let log: Vec<Sample> = self.inner.lock().store.export_log().to_vec();
        match path.extension().and_then(|e| e.to_str()) {
            Some("ndjson") | Some("jsonl") => iox::export_ndjson(&log, path)?,
            _ => iox::export_csv(&log, path)?,
        }
        info!(path = %path.display(), samples = log.len(), "export written");
        Ok(Some(log.len()))
    }

    /// Empties both buffers. Samples already in flight from the producer are
    /// discarded too, so the export log only ever holds samples published
    /// after this returns.
    pub fn clear(&self) -> Result<(), SessionError> {
        let discarded = {
            let mut inner = self.inner.lock();
            let discarded = inner.queue.as_ref().map_or(0, |q| q.try_iter().count());
            inner.store.clear();
            discarded
        };
        self.sink.redraw(&ChartFrame::empty()).map_err(SessionError::Render)?;
        info!(discarded, "buffers cleared");
        Ok(())
    }

    pub fn status(&self) -> Status {
        let inner = self.inner.lock();
        Status {
            state: inner.state,
            history_len: inner.store.history().len(),
            history_capacity: inner.store.capacity(),
            log_len: inner.store.export_log().len(),
            run: inner.run.clone(),
            fault: inner.fault.clone(),
        }
    }
}

#[cfg(test)]
impl AppSession {
    fn state(&self) -> RunState {
        self.inner.lock().state
    }

    fn history(&self) -> Vec<Sample> {
        self.inner.lock().store.snapshot()
    }

    fn export_log(&self) -> Vec<Sample> {
        self.inner.lock().store.export_log().to_vec()
    }
}

fn validate(req: &StartRequest) -> Result<(), SessionError> {
    if !req.speed_kmh.is_finite() || req.speed_kmh < 0.0 {
        warn!(speed_kmh = req.speed_kmh, "rejected start: bad speed");
        return Err(SessionError::Validation(INVALID_SPEED.into()));
    }
    if req.scenario == Scenario::Accident && req.collision.is_none() {
        warn!("rejected start: accident without collision type");
        return Err(SessionError::Validation(MISSING_COLLISION.into()));
    }
    Ok(())
}

// consumer side: samples are only taken off the channel under the buffer
// lock, so a clear either sees them queued or already applied
fn spawn_pump(inner: Arc<Mutex<Inner>>, rx: TelemetryRx) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("telemetry-pump".into()).spawn(move || {
        let mut sel = Select::new();
        sel.recv(&rx);
        loop {
            sel.ready();
            let mut inner = inner.lock();
            loop {
                match rx.try_recv() {
                    Ok(sample) => inner.store.push(sample),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }
        }
    })
}

async fn reap(run: ActiveRun) {
    let _ = run.shutdown.send(true);
    if let Err(e) = run.producer.await {
        warn!(run_id = %run.id, error = %e, "producer task did not finish cleanly");
    }
    if let Err(e) = run.renderer.await {
        warn!(run_id = %run.id, error = %e, "renderer task did not finish cleanly");
    }
    // producer is gone, so its sender is dropped and the pump drains and exits
    let pump = run.pump;
    match tokio::task::spawn_blocking(move || pump.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!(run_id = %run.id, "sample pump panicked"),
        Err(e) => warn!(run_id = %run.id, error = %e, "could not join sample pump"),
    }
}
