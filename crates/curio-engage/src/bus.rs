//! The lifecycle event bus: post-commit, asynchronous image cleanup.
//!
//! Stores publish [`LifecycleEvent`]s into a transaction-bound outbox; only a
//! committed mutation hands back the events (see [`Committed`]). The bus
//! takes them from there, queues them to a background worker, and returns
//! immediately. The worker runs one cleanup task per event, so events for
//! different subjects complete in no particular order, but every handler
//! observes the database at or after its owning commit.

use std::{collections::HashSet, sync::Arc};

use curio_core::{
  lifecycle::{ChangeKind, Committed, LifecycleEvent},
  objects::ObjectStore,
  store::EngagementStore,
};
use tokio::{
  sync::mpsc,
  task::{JoinHandle, JoinSet},
};

/// What a single cleanup pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
  /// Images deleted from object storage and removed from the index.
  pub removed: Vec<String>,
  /// Images whose deletion failed; they stay indexed.
  pub failed:  Vec<String>,
}

/// Delete the images orphaned by `event`.
///
/// For [`ChangeKind::Updated`] these are the indexed images of the subject
/// that are no longer referenced; for [`ChangeKind::Deleted`], all of them.
/// Each image is handled on its own: a failure is logged and the rest carry
/// on. Re-running a pass that already completed finds nothing to do.
pub async fn cleanup<S, O>(store: &S, objects: &O, event: &LifecycleEvent) -> CleanupReport
where
  S: EngagementStore,
  O: ObjectStore,
{
  let mut report = CleanupReport::default();

  let indexed = match store.images_for_subject(event.subject_id).await {
    Ok(images) => images,
    Err(e) => {
      tracing::error!(
        subject_id = event.subject_id,
        change = %event.change,
        error = %e,
        "cleanup could not list images"
      );
      return report;
    }
  };

  let still_referenced: HashSet<&str> = match event.change {
    ChangeKind::Updated => event.resource_refs.iter().map(String::as_str).collect(),
    ChangeKind::Deleted => HashSet::new(),
  };

  for image in indexed {
    if still_referenced.contains(image.name.as_str()) {
      continue;
    }

    if let Err(e) = objects.delete_object(&image.name).await {
      tracing::warn!(subject_id = event.subject_id, image = %image.name, error = %e, "object delete failed");
      report.failed.push(image.name);
      continue;
    }
    if let Err(e) = store.remove_image(&image.name).await {
      tracing::warn!(subject_id = event.subject_id, image = %image.name, error = %e, "index removal failed");
      report.failed.push(image.name);
      continue;
    }
    report.removed.push(image.name);
  }

  if !report.removed.is_empty() || !report.failed.is_empty() {
    tracing::info!(
      subject_id = event.subject_id,
      change = %event.change,
      removed = report.removed.len(),
      failed = report.failed.len(),
      "orphaned images cleaned up"
    );
  }
  report
}

// ─── Bus ─────────────────────────────────────────────────────────────────────

pub struct LifecycleBus {
  sender: std::sync::Mutex<Option<mpsc::UnboundedSender<LifecycleEvent>>>,
  worker: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl LifecycleBus {
  /// Start the background worker. Must be called inside a tokio runtime.
  pub fn spawn<S, O>(store: Arc<S>, objects: Arc<O>) -> Self
  where
    S: EngagementStore + 'static,
    O: ObjectStore + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(run_worker(store, objects, rx));
    Self {
      sender: std::sync::Mutex::new(Some(tx)),
      worker: tokio::sync::Mutex::new(Some(worker)),
    }
  }

  /// Hand a committed mutation's events to the worker and return its value.
  /// Never waits for cleanup.
  pub fn dispatch<T>(&self, committed: Committed<T>) -> T {
    let (value, events) = committed.into_parts();
    let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
    for event in events {
      let Some(tx) = sender.as_ref() else {
        tracing::warn!(subject_id = event.subject_id, "lifecycle bus closed, event dropped");
        continue;
      };
      if tx.send(event).is_err() {
        tracing::warn!("lifecycle worker gone, event dropped");
      }
    }
    value
  }

  /// Stop accepting events and wait until every queued cleanup has finished.
  pub async fn close(&self) {
    self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Some(worker) = self.worker.lock().await.take()
      && let Err(e) = worker.await
    {
      tracing::error!(error = %e, "lifecycle worker panicked");
    }
  }
}

async fn run_worker<S, O>(
  store: Arc<S>,
  objects: Arc<O>,
  mut rx: mpsc::UnboundedReceiver<LifecycleEvent>,
) where
  S: EngagementStore + 'static,
  O: ObjectStore + 'static,
{
  let mut tasks = JoinSet::new();

  while let Some(event) = rx.recv().await {
    let store = store.clone();
    let objects = objects.clone();
    tasks.spawn(async move {
      cleanup(store.as_ref(), objects.as_ref(), &event).await;
    });

    while let Some(done) = tasks.try_join_next() {
      log_join(done);
    }
  }

  while let Some(done) = tasks.join_next().await {
    log_join(done);
  }
  tracing::debug!("lifecycle worker stopped");
}

fn log_join(done: Result<(), tokio::task::JoinError>) {
  if let Err(e) = done {
    tracing::error!(error = %e, "cleanup task failed");
  }
}
