//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and wires the core services together.

use crate::config::Config;
use crate::error::ApiError;
use roadmap_core::chat::{ChatHistoryPolicy, ChatService};
use roadmap_core::content::{TopicContentGenerator, TopicContentService};
use roadmap_core::orchestrator::InitialContentOrchestrator;
use roadmap_core::ports::{ChatSessionStore, ContentStore, LlmService, RoadmapRepository};
use roadmap_core::progress::ProgressTracker;
use roadmap_core::queue::{GenerationQueue, QueueConfig};
use roadmap_core::roadmap::RoadmapBuildOrchestrator;
use std::sync::Arc;
use uuid::Uuid;

//=========================================================================================
// Backends
//=========================================================================================

/// The LLM backends, one per workload so each can use its own model.
#[derive(Clone)]
pub struct LlmBackends {
    pub content: Arc<dyn LlmService>,
    pub roadmap: Arc<dyn LlmService>,
    pub chat: Arc<dyn LlmService>,
}

impl LlmBackends {
    /// Uses the same backend for every workload.
    pub fn shared(llm: Arc<dyn LlmService>) -> Self {
        Self {
            content: llm.clone(),
            roadmap: llm.clone(),
            chat: llm,
        }
    }
}

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub repo: Arc<dyn RoadmapRepository>,
    pub queue: GenerationQueue,
    pub roadmaps: Arc<RoadmapBuildOrchestrator>,
    pub progress: Arc<ProgressTracker>,
    pub initial_content: Arc<InitialContentOrchestrator>,
    pub topic_content: Arc<TopicContentService>,
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        repo: Arc<dyn RoadmapRepository>,
        store: Arc<dyn ContentStore>,
        llms: LlmBackends,
        sessions: Arc<dyn ChatSessionStore>,
    ) -> Self {
        let generator = Arc::new(TopicContentGenerator::new(llms.content));
        let queue = GenerationQueue::new(
            generator.clone(),
            store.clone(),
            QueueConfig {
                concurrency_limit: config.generation_concurrency,
                task_timeout: config.generation_task_timeout,
            },
        );
        let policy = ChatHistoryPolicy {
            cap: config.chat_history_cap,
            pin_system_message: config.chat_pin_system_message,
        };

        Self {
            roadmaps: Arc::new(RoadmapBuildOrchestrator::new(llms.roadmap, repo.clone())),
            progress: Arc::new(ProgressTracker::new(repo.clone())),
            initial_content: Arc::new(InitialContentOrchestrator::new(
                repo.clone(),
                generator.clone(),
                store.clone(),
                queue.clone(),
            )),
            topic_content: Arc::new(TopicContentService::new(repo.clone(), store, generator)),
            chat: Arc::new(ChatService::new(llms.chat, repo.clone(), sessions, policy)),
            config,
            repo,
            queue,
        }
    }

    /// Loads a journey and checks that it belongs to the caller.
    pub async fn owned_journey(
        &self,
        user_id: Uuid,
        journey_id: Uuid,
    ) -> Result<roadmap_core::Journey, ApiError> {
        let journey = self.repo.get_journey(journey_id).await?;
        if journey.user_id != user_id {
            return Err(roadmap_core::PortError::Unauthorized.into());
        }
        Ok(journey)
    }
}
