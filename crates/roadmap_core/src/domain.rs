//! crates/roadmap_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! Persistence adapters convert their own record types into these.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// A user's learning plan spanning a fixed number of days.
#[derive(Debug, Clone)]
pub struct Journey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal: String,
    pub title: String,
    pub duration_days: u32,
    pub prep_type: String,
    pub resume_text: Option<String>,
    pub last_visited_day: u32,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Journey {
    /// The date by which the plan is meant to be finished.
    pub fn deadline(&self) -> DateTime<Utc> {
        self.created_at + Duration::days(i64::from(self.duration_days))
    }
}

/// One day of a journey. `day_number` is 1-based and never changes.
#[derive(Debug, Clone)]
pub struct Day {
    pub id: Uuid,
    pub journey_id: Uuid,
    pub day_number: u32,
    pub title: String,
    pub summary: Option<String>,
    pub is_completed: bool,
}

/// The smallest learning unit. `content` stays `None` until generated.
#[derive(Debug, Clone)]
pub struct Topic {
    pub id: Uuid,
    pub day_id: Uuid,
    pub name: String,
    pub content: Option<String>,
    pub is_completed: bool,
}

impl Topic {
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// A day together with its topics, as read back for a journey.
#[derive(Debug, Clone)]
pub struct DayWithTopics {
    pub day: Day,
    pub topics: Vec<Topic>,
}

impl DayWithTopics {
    pub fn summary_or_empty(&self) -> &str {
        self.day.summary.as_deref().unwrap_or("")
    }
}

/// A topic plus everything needed to generate its content.
#[derive(Debug, Clone)]
pub struct TopicContext {
    pub topic: Topic,
    pub journey_id: Uuid,
    pub journey_goal: String,
    pub day_number: u32,
    pub day_summary: String,
}

//=========================================================================================
// Creation payloads
//=========================================================================================

#[derive(Debug, Clone)]
pub struct NewDay {
    pub title: String,
    pub summary: Option<String>,
    pub topics: Vec<String>,
}

/// Everything needed to materialise a journey with its day/topic graph.
/// Days are numbered in the order given, starting at 1.
#[derive(Debug, Clone)]
pub struct NewJourney {
    pub user_id: Uuid,
    pub goal: String,
    pub title: String,
    pub prep_type: String,
    pub resume_text: Option<String>,
    pub days: Vec<NewDay>,
}

//=========================================================================================
// Content generation
//=========================================================================================

/// Inputs for generating the content of a single topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicContentRequest {
    pub topic_name: String,
    pub journey_goal: String,
    pub day_number: u32,
    pub day_summary: String,
}

/// One unit of queued background work. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub topic_id: Uuid,
    pub topic_name: String,
    pub journey_goal: String,
    pub day_number: u32,
    pub day_summary: String,
}

impl GenerationTask {
    pub fn for_topic(topic: &Topic, journey_goal: &str, day: &DayWithTopics) -> Self {
        Self {
            topic_id: topic.id,
            topic_name: topic.name.clone(),
            journey_goal: journey_goal.to_string(),
            day_number: day.day.day_number,
            day_summary: day.summary_or_empty().to_string(),
        }
    }

    pub fn content_request(&self) -> TopicContentRequest {
        TopicContentRequest {
            topic_name: self.topic_name.clone(),
            journey_goal: self.journey_goal.clone(),
            day_number: self.day_number,
            day_summary: self.day_summary.clone(),
        }
    }
}

/// How much of a journey's content has been generated so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    pub journey_id: Uuid,
    pub total_topics: usize,
    pub generated_topics: usize,
    pub percent_complete: u32,
    pub is_complete: bool,
}

impl GenerationStatus {
    pub fn from_days(journey_id: Uuid, days: &[DayWithTopics]) -> Self {
        let total_topics = days.iter().map(|d| d.topics.len()).sum();
        let generated_topics = days
            .iter()
            .flat_map(|d| d.topics.iter())
            .filter(|t| t.has_content())
            .count();
        Self {
            journey_id,
            total_topics,
            generated_topics,
            percent_complete: percent(generated_topics, total_topics),
            is_complete: total_topics > 0 && generated_topics == total_topics,
        }
    }
}

/// Rounded percentage, 0 when `total` is 0.
pub fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as u32
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Model,
    System,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
            ChatRole::System => "system",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(ChatRole::User),
            "model" | "assistant" => Some(ChatRole::Model),
            "system" => Some(ChatRole::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

/// A conversation with a bounded, most-recent-first-evicted history.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    pub journey_id: Uuid,
    pub turns: VecDeque<ChatTurn>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, journey_id: Uuid) -> Self {
        Self {
            id: id.into(),
            journey_id,
            turns: VecDeque::new(),
        }
    }
}

/// A chat message as persisted by the repository.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub session_id: String,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
