#![allow(dead_code)]

use async_trait::async_trait;
use roadmap_core::memory::InMemoryRepository;
use roadmap_core::{
    ContentGenerationService, ContentStore, Journey, LlmService, NewDay, NewJourney, PortError,
    PortResult, RoadmapRepository, TopicContentRequest,
};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Generator that records calls and peak concurrency, can fail chosen topics, and
/// can hold later days behind a gate.
pub struct InstrumentedGenerator {
    pub calls: AtomicUsize,
    current: AtomicUsize,
    pub peak: AtomicUsize,
    pub failing_topics: Mutex<HashSet<String>>,
    pub delay: Duration,
    gate: Option<Arc<Semaphore>>,
}

impl InstrumentedGenerator {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            failing_topics: Mutex::new(HashSet::new()),
            delay,
            gate: None,
        }
    }

    /// Topics after Day 1 wait until the returned semaphore gets permits.
    pub fn gated(delay: Duration) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut generator = Self::new(delay);
        generator.gate = Some(gate.clone());
        (generator, gate)
    }

    pub fn fail_topic(&self, name: &str) {
        self.failing_topics.lock().unwrap().insert(name.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentGenerationService for InstrumentedGenerator {
    async fn generate_topic_content(&self, request: &TopicContentRequest) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if request.day_number > 1 {
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.map_err(|e| PortError::Unexpected(e.to_string()))?;
            }
        }
        // Vary the delay a little per topic so completions interleave.
        let jitter = (request.topic_name.len() % 3) as u32;
        tokio::time::sleep(self.delay * (jitter + 1)).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        if self.failing_topics.lock().unwrap().contains(&request.topic_name) {
            return Err(PortError::Generation(format!("LLM rejected {}", request.topic_name)));
        }
        Ok(format!("# {}\n\nDay {} material.", request.topic_name, request.day_number))
    }
}

/// Content store wrapper that counts reads and writes, and can pretend topics are filled.
pub struct CountingStore {
    pub inner: Arc<InMemoryRepository>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub pretend_filled: Mutex<HashSet<Uuid>>,
}

impl CountingStore {
    pub fn new(inner: Arc<InMemoryRepository>) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            pretend_filled: Mutex::new(HashSet::new()),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for CountingStore {
    async fn has_content(&self, topic_id: Uuid) -> bool {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.pretend_filled.lock().unwrap().contains(&topic_id) {
            return true;
        }
        self.inner.has_content(topic_id).await
    }

    async fn save_content(&self, topic_id: Uuid, content: &str) -> PortResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.save_content(topic_id, content).await
    }
}

/// LLM that answers with queued replies in order and records prompts.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<PortResult<String>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn with_replies(replies: Vec<PortResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::Generation("no scripted reply left".to_string())))
    }
}

/// Creates a journey with `days` days of `topics_per_day` topics named `d{day}t{n}`.
pub async fn seed_journey(repo: &InMemoryRepository, user_id: Uuid, days: u32, topics_per_day: u32) -> Journey {
    let new = NewJourney {
        user_id,
        goal: "Become a backend engineer".to_string(),
        title: "Backend bootcamp".to_string(),
        prep_type: "Career switch".to_string(),
        resume_text: None,
        days: (1..=days)
            .map(|day| NewDay {
                title: format!("Day {}", day),
                summary: Some(format!("Focus of day {}", day)),
                topics: (1..=topics_per_day).map(|n| format!("d{}t{}", day, n)).collect(),
            })
            .collect(),
    };
    repo.create_journey(new).await.unwrap()
}
