//! Core telemetry plumbing shared by crashsim sources and the controller

mod store;

pub use model::{CollisionType, Profile, RunState, Sample, Scenario};
pub use store::{TelemetryStore, HISTORY_CAPACITY};

use tokio::sync::watch;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("no profile for scenario '{scenario}' with collision type {collision:?}")]
    UnknownProfile {
        scenario: Scenario,
        collision: Option<CollisionType>,
    },
    #[error("sample consumer disconnected")]
    ChannelClosed,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type TelemetryTx = crossbeam_channel::Sender<Sample>;
pub type TelemetryRx = crossbeam_channel::Receiver<Sample>;

/// Cooperative stop flag. The controller flips it to `true`; sources poll it
/// once per tick.
pub type ShutdownTx = watch::Sender<bool>;
pub type ShutdownRx = watch::Receiver<bool>;

/// Trait for any live source connector
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Publishes samples on `tx` until `shutdown` fires. Must not publish
    /// after observing the stop signal.
    async fn run(&self, tx: TelemetryTx, shutdown: ShutdownRx) -> Result<(), IngestError>;
}

pub fn channel() -> (TelemetryTx, TelemetryRx) {
    crossbeam_channel::unbounded()
}

pub fn shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(false)
}

/// Resolves a profile, failing with [`IngestError::UnknownProfile`] when the
/// table has no entry.
pub fn resolve_profile(scenario: Scenario, collision: Option<CollisionType>) -> Result<Profile, IngestError> {
    model::profile_for(scenario, collision).ok_or(IngestError::UnknownProfile { scenario, collision })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_profile_for_bare_accident() {
        let err = resolve_profile(Scenario::Accident, None).unwrap_err();
        assert!(matches!(err, IngestError::UnknownProfile { scenario: Scenario::Accident, collision: None }));
        assert!(resolve_profile(Scenario::Accident, Some(CollisionType::Truck)).is_ok());
    }

    #[tokio::test]
    async fn shutdown_signal_is_observed() {
        let (tx, mut rx) = shutdown_channel();
        assert!(!*rx.borrow());
        tx.send(true).unwrap();
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }
}
