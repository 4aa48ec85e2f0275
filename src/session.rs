//! Presentation-facing state model
//!
//! A `Session` owns everything a front end needs: the cache, the record
//! source, the current block/point selection, the geofence tracker and a
//! single-flight sync task. Sync results are delivered as `SessionEvent`s on
//! a channel so the front end consumes them on its own task, in order.

use crate::error::{Error, Result};
use crate::geofence::{Geofence, GeofenceTracker, Transition, Verdict};
use crate::models::{GeoPoint, LocationRecord};
use crate::store::LocationStore;
use crate::stage::SyncStage;
use crate::sync::{sync_into, RecordSource, SyncReport};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Messages from the background sync to the front end
#[derive(Debug)]
pub enum SessionEvent {
    Progress(SyncStage),
    Synced(SyncReport),
    SyncFailed(Error),
}

/// At most one sync in flight. Dropping the task aborts it.
#[derive(Default)]
pub struct SyncTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a sync unless one is already running
    pub fn trigger(
        &self,
        source: Arc<dyn RecordSource>,
        store: LocationStore,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<()> {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());

        if guard.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Sync trigger rejected: already running");
            return Err(Error::SyncInProgress);
        }

        *guard = Some(tokio::spawn(async move {
            let progress = events.clone();
            let observer = move |stage: SyncStage| {
                let _ = progress.send(SessionEvent::Progress(stage));
            };

            let event = match sync_into(source.as_ref(), &store, &observer).await {
                Ok(report) => SessionEvent::Synced(report),
                Err(e) => SessionEvent::SyncFailed(e),
            };
            let _ = events.send(event);
        }));

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Abort the in-flight sync. Returns whether one was running.
    ///
    /// An aborted sync never commits, so the cache keeps its previous
    /// snapshot.
    pub fn cancel(&self) -> bool {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        match handle {
            Some(h) if !h.is_finished() => {
                info!("Cancelling in-flight sync");
                h.abort();
                true
            }
            _ => false,
        }
    }
}

impl Drop for SyncTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Current block/point selection
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub block_code: Option<String>,
    pub point_id: Option<String>,
    pub record: Option<LocationRecord>,
}

/// State shared by a front end for the lifetime of one page/session
pub struct Session {
    store: LocationStore,
    source: Arc<dyn RecordSource>,
    tracker: GeofenceTracker,
    selection: Selection,
    sync: SyncTask,
    events: UnboundedSender<SessionEvent>,
}

impl Session {
    /// Create a session and the receiver its events arrive on
    pub fn new(
        store: LocationStore,
        source: Arc<dyn RecordSource>,
        geofence: Geofence,
    ) -> (Self, UnboundedReceiver<SessionEvent>) {
        let (events, rx) = unbounded_channel();
        let session = Self {
            store,
            source,
            tracker: GeofenceTracker::new(geofence),
            selection: Selection::default(),
            sync: SyncTask::new(),
            events,
        };
        (session, rx)
    }

    pub fn store(&self) -> &LocationStore {
        &self.store
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn verdict(&self) -> Verdict {
        self.tracker.verdict()
    }

    pub fn geofence(&self) -> &Geofence {
        self.tracker.geofence()
    }

    /// Start a background sync; rejected while another is running
    pub fn trigger_sync(&self) -> Result<()> {
        self.sync
            .trigger(self.source.clone(), self.store.clone(), self.events.clone())
    }

    pub fn is_syncing(&self) -> bool {
        self.sync.is_running()
    }

    pub fn cancel_sync(&self) -> bool {
        self.sync.cancel()
    }

    /// Whether the selection lists should be offered at all
    pub async fn has_data(&self) -> Result<bool> {
        Ok(!self.store.is_empty().await?)
    }

    /// Block codes for the first selector
    pub async fn block_codes(&self) -> Result<Vec<String>> {
        self.store.block_codes().await
    }

    /// Select a block (or clear it). Clears the point and target, returning
    /// the point ids offered for the new block.
    pub async fn select_block(&mut self, block_code: Option<&str>) -> Result<Vec<String>> {
        self.selection = Selection {
            block_code: block_code.map(str::to_string),
            ..Selection::default()
        };
        self.tracker.set_target(None);

        match block_code {
            Some(block) => self.store.points_for_block(block).await,
            None => Ok(Vec::new()),
        }
    }

    /// Select a point within the selected block (or clear it) and re-run the
    /// geofence against its coordinate.
    ///
    /// A point with an unparseable coordinate is selected but leaves the
    /// target unset, so the verdict stays `Unknown`.
    pub async fn select_point(&mut self, point_id: Option<&str>) -> Result<Transition> {
        let Some(point) = point_id else {
            self.selection.point_id = None;
            self.selection.record = None;
            return Ok(self.tracker.set_target(None));
        };

        let block = self
            .selection
            .block_code
            .clone()
            .ok_or_else(|| Error::Other("select a block before a point".to_string()))?;

        let record = self.store.get(&block, point).await?;
        let target = record.target();
        if target.is_none() {
            warn!(
                block = %block,
                point = %point,
                "Selected TPH has no usable coordinate: '{}'",
                record.coordinate
            );
        }

        self.selection.point_id = Some(point.to_string());
        self.selection.record = Some(record);
        Ok(self.tracker.set_target(target))
    }

    /// Feed a device position
    pub fn update_position(&mut self, position: GeoPoint) -> Transition {
        self.tracker.update_position(position)
    }

    /// Tear down: abort any in-flight sync
    pub fn shutdown(&mut self) {
        if self.sync.cancel() {
            debug!("Session shut down with a sync in flight");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
