//! crates/roadmap_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the LLM vendor and the session cache.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatSession, ChatTurn, DayWithTopics, Journey, NewJourney, Topic, TopicContext,
    TopicContentRequest,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait LlmService: Send + Sync {
    /// Sends one prompt and returns the model's text.
    async fn generate(&self, prompt: &str) -> PortResult<String>;

    /// Runs a conversational turn. The default flattens everything into one prompt;
    /// adapters that speak a role-tagged protocol should override it.
    async fn converse(&self, system: Option<&str>, turns: &[ChatTurn]) -> PortResult<String> {
        let mut prompt = String::new();
        if let Some(system) = system {
            prompt.push_str(system);
            prompt.push_str("\n\n");
        }
        for turn in turns {
            prompt.push_str(&format!("{}: {}\n", turn.role.as_str(), turn.text));
        }
        prompt.push_str("model:");
        self.generate(&prompt).await
    }
}

#[async_trait]
pub trait ContentGenerationService: Send + Sync {
    /// Produces markdown content for one topic.
    async fn generate_topic_content(&self, request: &TopicContentRequest) -> PortResult<String>;
}

/// Key-value view of topic content.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// True iff the topic's content is non-empty. Read failures are logged and
    /// reported as `false`, so a flaky read costs a regeneration, not an error.
    async fn has_content(&self, topic_id: Uuid) -> bool;

    /// Overwrites the topic's content.
    async fn save_content(&self, topic_id: Uuid, content: &str) -> PortResult<()>;
}

#[async_trait]
pub trait RoadmapRepository: Send + Sync {
    // --- Journeys ---
    async fn create_journey(&self, journey: NewJourney) -> PortResult<Journey>;

    async fn get_journey(&self, journey_id: Uuid) -> PortResult<Journey>;

    async fn list_journeys_for_user(&self, user_id: Uuid) -> PortResult<Vec<Journey>>;

    async fn set_journey_completed(&self, journey_id: Uuid, completed: bool) -> PortResult<()>;

    async fn set_last_visited_day(&self, journey_id: Uuid, day_number: u32) -> PortResult<()>;

    // --- Days and Topics ---
    /// Days of a journey ordered by day number, each with its topics.
    async fn get_days_with_topics(&self, journey_id: Uuid) -> PortResult<Vec<DayWithTopics>>;

    async fn get_topic(&self, topic_id: Uuid) -> PortResult<Topic>;

    async fn get_topic_context(&self, topic_id: Uuid) -> PortResult<TopicContext>;

    async fn set_topic_completed(&self, topic_id: Uuid, completed: bool) -> PortResult<()>;

    async fn set_day_completed(&self, day_id: Uuid, completed: bool) -> PortResult<()>;

    // --- Chat history ---
    /// Registers the session under `journey_id` unless it exists, then returns the
    /// journey the stored session belongs to.
    async fn ensure_chat_session(&self, session_id: &str, journey_id: Uuid) -> PortResult<Uuid>;

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()>;

    /// The most recent `limit` messages of a session, oldest first.
    async fn get_chat_history(&self, session_id: &str, limit: usize) -> PortResult<Vec<ChatMessage>>;
}

/// Cache of live chat sessions. Implementations choose their eviction policy.
#[async_trait]
pub trait ChatSessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Option<ChatSession>;

    async fn put(&self, session: ChatSession);

    async fn evict(&self, session_id: &str);
}
