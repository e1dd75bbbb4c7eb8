pub mod chat;
pub mod content;
pub mod domain;
pub mod memory;
pub mod orchestrator;
pub mod ports;
pub mod progress;
pub mod queue;
pub mod roadmap;

pub use domain::{
    ChatMessage, ChatRole, ChatSession, ChatTurn, Day, DayWithTopics, GenerationStatus,
    GenerationTask, Journey, NewDay, NewJourney, Topic, TopicContentRequest, TopicContext,
};
pub use ports::{
    ChatSessionStore, ContentGenerationService, ContentStore, LlmService, PortError, PortResult,
    RoadmapRepository,
};
pub use queue::{GenerationQueue, QueueConfig, QueueSnapshot};
