use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use parking_lot::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use analysis::{chart_frame, ChartFrame};
use crashsim_ingest_core::{RunState, ShutdownRx};

use crate::session::Inner;

/// Chart backend. Receives a complete frame on every redraw.
pub trait ChartSink: Send + Sync {
    fn redraw(&self, frame: &ChartFrame) -> anyhow::Result<()>;
}

pub struct NullSink;

impl ChartSink for NullSink {
    fn redraw(&self, _frame: &ChartFrame) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Reports the latest reading of each channel through `tracing`.
pub struct LogSink;

impl ChartSink for LogSink {
    fn redraw(&self, frame: &ChartFrame) -> anyhow::Result<()> {
        let latest = |points: &[[f64; 2]]| points.last().map(|p| p[1]);
        debug!(
            samples = frame.len(),
            time_range = ?frame.time_range(),
            speed = ?latest(&frame.speed.points),
            acceleration = ?latest(&frame.acceleration.points),
            gyroscope = ?latest(&frame.gyroscope.points),
            gps = frame.gps.last().map(|m| m.label.as_str()),
            "redraw"
        );
        Ok(())
    }
}

/// Appends one JSON document per redraw.
pub struct JsonLinesSink {
    out: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self { out: Mutex::new(BufWriter::new(f)) })
    }
}

impl ChartSink for JsonLinesSink {
    fn redraw(&self, frame: &ChartFrame) -> anyhow::Result<()> {
        let mut w = self.out.lock();
        serde_json::to_writer(&mut *w, frame)?;
        w.write_all(b"\n")?;
        w.flush()?;
        Ok(())
    }
}

/// Periodic redraw from the history window, independent of the producer's
/// timer. Ends on the stop signal or when the run leaves `Running`.
pub async fn redraw_loop(inner: Arc<Mutex<Inner>>, sink: Arc<dyn ChartSink>, period: Duration, mut stop: ShutdownRx) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() { break; }
            }
            _ = ticker.tick() => {
                let snapshot = {
                    let inner = inner.lock();
                    if inner.state != RunState::Running { break; }
                    inner.store.snapshot()
                };
                if let Err(e) = sink.redraw(&chart_frame(&snapshot)) {
                    warn!(error = %e, "redraw failed");
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingSink {
        frames: Mutex<Vec<ChartFrame>>,
    }

    impl RecordingSink {
        pub(crate) fn frames(&self) -> Vec<ChartFrame> {
            self.frames.lock().clone()
        }
    }

    impl ChartSink for RecordingSink {
        fn redraw(&self, frame: &ChartFrame) -> anyhow::Result<()> {
            self.frames.lock().push(frame.clone());
            Ok(())
        }
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.jsonl");
        let sink = JsonLinesSink::create(&path).unwrap();
        sink.redraw(&ChartFrame::empty()).unwrap();
        sink.redraw(&ChartFrame::empty()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["gps"], serde_json::json!([]));
    }

    #[test]
    fn empty_frame_is_fine_for_every_sink() {
        let frame = ChartFrame::empty();
        assert!(NullSink.redraw(&frame).is_ok());
        assert!(LogSink.redraw(&frame).is_ok());
    }
}
