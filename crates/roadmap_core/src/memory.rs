//! crates/roadmap_core/src/memory.rs
//!
//! In-process implementations of the storage ports. Used when the service runs
//! without a database and as the backing store in tests.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatSession, Day, DayWithTopics, Journey, NewJourney, Topic, TopicContext,
};
use crate::ports::{ChatSessionStore, ContentStore, PortError, PortResult, RoadmapRepository};

#[derive(Default)]
struct Tables {
    journeys: Vec<Journey>,
    days: Vec<Day>,
    topics: Vec<Topic>,
    chat_sessions: HashMap<String, Uuid>,
    chat_messages: Vec<ChatMessage>,
}

/// A `RoadmapRepository` and `ContentStore` over plain vectors.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

#[async_trait]
impl RoadmapRepository for InMemoryRepository {
    async fn create_journey(&self, new: NewJourney) -> PortResult<Journey> {
        let journey = Journey {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            goal: new.goal,
            title: new.title,
            duration_days: new.days.len() as u32,
            prep_type: new.prep_type,
            resume_text: new.resume_text,
            last_visited_day: 1,
            is_completed: false,
            created_at: Utc::now(),
        };

        let mut tables = self.tables();
        for (index, new_day) in new.days.into_iter().enumerate() {
            let day = Day {
                id: Uuid::new_v4(),
                journey_id: journey.id,
                day_number: index as u32 + 1,
                title: new_day.title,
                summary: new_day.summary,
                is_completed: false,
            };
            for name in new_day.topics {
                tables.topics.push(Topic {
                    id: Uuid::new_v4(),
                    day_id: day.id,
                    name,
                    content: None,
                    is_completed: false,
                });
            }
            tables.days.push(day);
        }
        tables.journeys.push(journey.clone());
        Ok(journey)
    }

    async fn get_journey(&self, journey_id: Uuid) -> PortResult<Journey> {
        self.tables()
            .journeys
            .iter()
            .find(|j| j.id == journey_id)
            .cloned()
            .ok_or_else(|| not_found("Journey", journey_id))
    }

    async fn list_journeys_for_user(&self, user_id: Uuid) -> PortResult<Vec<Journey>> {
        let mut journeys: Vec<Journey> = self
            .tables()
            .journeys
            .iter()
            .filter(|j| j.user_id == user_id)
            .cloned()
            .collect();
        journeys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(journeys)
    }

    async fn set_journey_completed(&self, journey_id: Uuid, completed: bool) -> PortResult<()> {
        let mut tables = self.tables();
        let journey = tables
            .journeys
            .iter_mut()
            .find(|j| j.id == journey_id)
            .ok_or_else(|| not_found("Journey", journey_id))?;
        journey.is_completed = completed;
        Ok(())
    }

    async fn set_last_visited_day(&self, journey_id: Uuid, day_number: u32) -> PortResult<()> {
        let mut tables = self.tables();
        let journey = tables
            .journeys
            .iter_mut()
            .find(|j| j.id == journey_id)
            .ok_or_else(|| not_found("Journey", journey_id))?;
        journey.last_visited_day = day_number;
        Ok(())
    }

    async fn get_days_with_topics(&self, journey_id: Uuid) -> PortResult<Vec<DayWithTopics>> {
        let tables = self.tables();
        let mut days: Vec<DayWithTopics> = tables
            .days
            .iter()
            .filter(|d| d.journey_id == journey_id)
            .map(|day| DayWithTopics {
                day: day.clone(),
                topics: tables
                    .topics
                    .iter()
                    .filter(|t| t.day_id == day.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        days.sort_by_key(|d| d.day.day_number);
        Ok(days)
    }

    async fn get_topic(&self, topic_id: Uuid) -> PortResult<Topic> {
        self.tables()
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .cloned()
            .ok_or_else(|| not_found("Topic", topic_id))
    }

    async fn get_topic_context(&self, topic_id: Uuid) -> PortResult<TopicContext> {
        let tables = self.tables();
        let topic = tables
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .cloned()
            .ok_or_else(|| not_found("Topic", topic_id))?;
        let day = tables
            .days
            .iter()
            .find(|d| d.id == topic.day_id)
            .ok_or_else(|| not_found("Day", topic.day_id))?;
        let journey = tables
            .journeys
            .iter()
            .find(|j| j.id == day.journey_id)
            .ok_or_else(|| not_found("Journey", day.journey_id))?;

        Ok(TopicContext {
            journey_id: journey.id,
            journey_goal: journey.goal.clone(),
            day_number: day.day_number,
            day_summary: day.summary.clone().unwrap_or_default(),
            topic,
        })
    }

    async fn set_topic_completed(&self, topic_id: Uuid, completed: bool) -> PortResult<()> {
        let mut tables = self.tables();
        let topic = tables
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| not_found("Topic", topic_id))?;
        topic.is_completed = completed;
        Ok(())
    }

    async fn set_day_completed(&self, day_id: Uuid, completed: bool) -> PortResult<()> {
        let mut tables = self.tables();
        let day = tables
            .days
            .iter_mut()
            .find(|d| d.id == day_id)
            .ok_or_else(|| not_found("Day", day_id))?;
        day.is_completed = completed;
        Ok(())
    }

    async fn ensure_chat_session(&self, session_id: &str, journey_id: Uuid) -> PortResult<Uuid> {
        let mut tables = self.tables();
        let owner = tables
            .chat_sessions
            .entry(session_id.to_string())
            .or_insert(journey_id);
        Ok(*owner)
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        let mut tables = self.tables();
        if !tables.chat_sessions.contains_key(&message.session_id) {
            return Err(not_found("Chat session", &message.session_id));
        }
        tables.chat_messages.push(message);
        Ok(())
    }

    async fn get_chat_history(&self, session_id: &str, limit: usize) -> PortResult<Vec<ChatMessage>> {
        let tables = self.tables();
        let messages: Vec<ChatMessage> = tables
            .chat_messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.into_iter().skip(skip).collect())
    }
}

#[async_trait]
impl ContentStore for InMemoryRepository {
    async fn has_content(&self, topic_id: Uuid) -> bool {
        self.tables()
            .topics
            .iter()
            .find(|t| t.id == topic_id)
            .is_some_and(Topic::has_content)
    }

    async fn save_content(&self, topic_id: Uuid, content: &str) -> PortResult<()> {
        let mut tables = self.tables();
        let topic = tables
            .topics
            .iter_mut()
            .find(|t| t.id == topic_id)
            .ok_or_else(|| PortError::Storage(format!("Topic {} not found", topic_id)))?;
        topic.content = Some(content.to_string());
        Ok(())
    }
}

/// Unbounded session map. Suitable for tests; the service uses a bounded cache.
#[derive(Default)]
pub struct InMemoryChatSessionStore {
    sessions: Mutex<HashMap<String, ChatSession>>,
}

impl InMemoryChatSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, ChatSession>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatSessionStore for InMemoryChatSessionStore {
    async fn get(&self, session_id: &str) -> Option<ChatSession> {
        self.sessions().get(session_id).cloned()
    }

    async fn put(&self, session: ChatSession) {
        self.sessions().insert(session.id.clone(), session);
    }

    async fn evict(&self, session_id: &str) {
        self.sessions().remove(session_id);
    }
}
