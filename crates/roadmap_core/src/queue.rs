//! crates/roadmap_core/src/queue.rs
//!
//! The background topic-content generation queue.
//!
//! `enqueue` never blocks: it appends to a FIFO and dispatches as many tasks as the
//! concurrency limit allows, each on its own tokio task. Every finished task frees its
//! slot and dispatches again, so the queue drains itself without a poller and goes
//! back to idle once nothing is pending or in flight.
//!
//! Pending tasks live only in memory and are lost if the process stops.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::GenerationTask;
use crate::ports::{ContentGenerationService, ContentStore, PortError, PortResult};

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 2;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of generations in flight at once. Values below 1 are treated as 1.
    pub concurrency_limit: usize,
    /// Upper bound on a single generation. `None` waits for as long as the LLM takes.
    pub task_timeout: Option<Duration>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            task_timeout: None,
        }
    }
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pending: usize,
    pub in_flight: usize,
    pub processing: bool,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<GenerationTask>,
    in_flight: usize,
    active_topics: HashSet<Uuid>,
    processing: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    generator: Arc<dyn ContentGenerationService>,
    store: Arc<dyn ContentStore>,
    config: QueueConfig,
    idle_tx: watch::Sender<bool>,
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // The state is only touched in short non-panicking sections; recover if a
        // holder ever did panic rather than wedging the queue.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn limit(&self) -> usize {
        self.config.concurrency_limit.max(1)
    }
}

/// Cheap to clone; all clones share one queue.
#[derive(Clone)]
pub struct GenerationQueue {
    inner: Arc<QueueInner>,
}

impl GenerationQueue {
    pub fn new(
        generator: Arc<dyn ContentGenerationService>,
        store: Arc<dyn ContentStore>,
        config: QueueConfig,
    ) -> Self {
        let (idle_tx, _) = watch::channel(true);
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                generator,
                store,
                config,
                idle_tx,
            }),
        }
    }

    /// Appends a task and kicks dispatch. Must be called from within a tokio runtime.
    pub fn enqueue(&self, task: GenerationTask) {
        {
            let mut state = self.inner.lock();
            debug!(
                "Queueing topic {} ('{}'), {} already pending.",
                task.topic_id,
                task.topic_name,
                state.pending.len()
            );
            state.pending.push_back(task);
            if !state.processing {
                state.processing = true;
                self.inner.idle_tx.send_replace(false);
            }
        }
        dispatch(&self.inner);
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        let state = self.inner.lock();
        QueueSnapshot {
            pending: state.pending.len(),
            in_flight: state.in_flight,
            processing: state.processing,
        }
    }

    /// Resolves once nothing is pending or in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle_tx.subscribe();
        // The sender lives in `inner`, which `self` keeps alive, so this cannot fail.
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

/// Starts pending tasks until the concurrency limit is reached, and flips the queue
/// back to idle when there is nothing left to do.
fn dispatch(inner: &Arc<QueueInner>) {
    let mut ready = Vec::new();
    {
        let mut state = inner.lock();
        while state.in_flight < inner.limit() {
            let Some(task) = state.pending.pop_front() else {
                break;
            };
            if !state.active_topics.insert(task.topic_id) {
                info!(
                    "Topic {} is already being generated, dropping duplicate task.",
                    task.topic_id
                );
                continue;
            }
            state.in_flight += 1;
            ready.push(task);
        }

        if state.pending.is_empty() && state.in_flight == 0 && state.processing {
            state.processing = false;
            inner.idle_tx.send_replace(true);
            info!("Generation queue drained, now idle.");
        }
    }

    for task in ready {
        let guard = InFlightGuard {
            inner: inner.clone(),
            topic_id: task.topic_id,
        };
        tokio::spawn(async move {
            run_task(&guard.inner, task).await;
            drop(guard);
        });
    }
}

/// Releases a task's slot and re-dispatches when dropped, whether the task finished,
/// failed or panicked.
struct InFlightGuard {
    inner: Arc<QueueInner>,
    topic_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.active_topics.remove(&self.topic_id);
        }
        dispatch(&self.inner);
    }
}

async fn run_task(inner: &QueueInner, task: GenerationTask) {
    let topic_id = task.topic_id;
    let outcome = match inner.config.task_timeout {
        Some(limit) => match tokio::time::timeout(limit, process(inner, &task)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PortError::Generation(format!("timed out after {:?}", limit))),
        },
        None => process(inner, &task).await,
    };

    match outcome {
        Ok(TaskOutcome::Generated) => {
            info!("Generated and saved content for topic {}.", topic_id)
        }
        Ok(TaskOutcome::AlreadyPresent) => {
            info!("Content already exists for topic {}, skipping.", topic_id)
        }
        Err(e) => error!("Background generation failed for topic {}: {}", topic_id, e),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum TaskOutcome {
    Generated,
    AlreadyPresent,
}

async fn process(inner: &QueueInner, task: &GenerationTask) -> PortResult<TaskOutcome> {
    // Re-checked here rather than at enqueue time: the on-demand read path may have
    // filled the topic while this task was waiting.
    if inner.store.has_content(task.topic_id).await {
        return Ok(TaskOutcome::AlreadyPresent);
    }

    let content = inner
        .generator
        .generate_topic_content(&task.content_request())
        .await?;

    if let Err(e) = inner.store.save_content(task.topic_id, &content).await {
        warn!(
            "Generated content for topic {} could not be saved and is discarded.",
            task.topic_id
        );
        return Err(e);
    }
    Ok(TaskOutcome::Generated)
}
