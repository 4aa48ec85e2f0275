//! Sync progress stages and the callback that receives them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stages reported while a sync runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum SyncStage {
    Connecting,
    Downloading,
    Processing { records: usize },
    Saving { saved: usize, total: usize },
    Done { records: usize },
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Connecting => write!(f, "Connecting to server..."),
            SyncStage::Downloading => write!(f, "Downloading data..."),
            SyncStage::Processing { records } => write!(f, "Processing {} records...", records),
            SyncStage::Saving { saved, total } => write!(f, "Saving... ({}/{})", saved, total),
            SyncStage::Done { records } => write!(f, "Saved {} records", records),
        }
    }
}

/// Receives stage updates during a sync
pub trait SyncObserver: Send + Sync {
    fn on_stage(&self, stage: SyncStage);
}

impl<F> SyncObserver for F
where
    F: Fn(SyncStage) + Send + Sync,
{
    fn on_stage(&self, stage: SyncStage) {
        self(stage)
    }
}

/// Observer that ignores every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl SyncObserver for NoProgress {
    fn on_stage(&self, _stage: SyncStage) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_stage_messages() {
        assert_eq!(SyncStage::Connecting.to_string(), "Connecting to server...");
        assert_eq!(
            SyncStage::Saving { saved: 100, total: 250 }.to_string(),
            "Saving... (100/250)"
        );
        assert_eq!(SyncStage::Done { records: 3 }.to_string(), "Saved 3 records");
    }

    #[test]
    fn test_closure_observer_receives_stages() {
        let seen = Mutex::new(Vec::new());
        let observer = |stage: SyncStage| seen.lock().unwrap().push(stage);

        let dyn_observer: &dyn SyncObserver = &observer;
        dyn_observer.on_stage(SyncStage::Downloading);
        NoProgress.on_stage(SyncStage::Downloading);

        assert_eq!(*seen.lock().unwrap(), vec![SyncStage::Downloading]);
    }
}
