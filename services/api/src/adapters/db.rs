//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RoadmapRepository` and `ContentStore` ports from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roadmap_core::domain::{
    ChatMessage, ChatRole, Day, DayWithTopics, Journey, NewJourney, Topic, TopicContext,
};
use roadmap_core::ports::{ContentStore, PortError, PortResult, RoadmapRepository};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the repository and content store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

fn lookup(kind: &str, id: impl std::fmt::Display) -> impl FnOnce(sqlx::Error) -> PortError {
    let label = format!("{} {}", kind, id);
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", label)),
        other => storage(other),
    }
}

fn ensure_updated(rows: u64, kind: &str, id: impl std::fmt::Display) -> PortResult<()> {
    if rows == 0 {
        return Err(PortError::NotFound(format!("{} {} not found", kind, id)));
    }
    Ok(())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const JOURNEY_COLUMNS: &str = "id, user_id, goal, title, duration_days, prep_type, resume_text, \
                               last_visited_day, is_completed, created_at";

#[derive(FromRow)]
struct JourneyRecord {
    id: Uuid,
    user_id: Uuid,
    goal: String,
    title: String,
    duration_days: i32,
    prep_type: String,
    resume_text: Option<String>,
    last_visited_day: i32,
    is_completed: bool,
    created_at: DateTime<Utc>,
}
impl JourneyRecord {
    fn to_domain(self) -> Journey {
        Journey {
            id: self.id,
            user_id: self.user_id,
            goal: self.goal,
            title: self.title,
            duration_days: self.duration_days as u32,
            prep_type: self.prep_type,
            resume_text: self.resume_text,
            last_visited_day: self.last_visited_day as u32,
            is_completed: self.is_completed,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct DayRecord {
    id: Uuid,
    journey_id: Uuid,
    day_number: i32,
    title: String,
    summary: Option<String>,
    is_completed: bool,
}
impl DayRecord {
    fn to_domain(self) -> Day {
        Day {
            id: self.id,
            journey_id: self.journey_id,
            day_number: self.day_number as u32,
            title: self.title,
            summary: self.summary,
            is_completed: self.is_completed,
        }
    }
}

#[derive(FromRow)]
struct TopicRecord {
    id: Uuid,
    day_id: Uuid,
    name: String,
    content: Option<String>,
    is_completed: bool,
}
impl TopicRecord {
    fn to_domain(self) -> Topic {
        Topic {
            id: self.id,
            day_id: self.day_id,
            name: self.name,
            content: self.content,
            is_completed: self.is_completed,
        }
    }
}

#[derive(FromRow)]
struct TopicContextRecord {
    id: Uuid,
    day_id: Uuid,
    name: String,
    content: Option<String>,
    is_completed: bool,
    journey_id: Uuid,
    goal: String,
    day_number: i32,
    summary: Option<String>,
}
impl TopicContextRecord {
    fn to_domain(self) -> TopicContext {
        TopicContext {
            topic: Topic {
                id: self.id,
                day_id: self.day_id,
                name: self.name,
                content: self.content,
                is_completed: self.is_completed,
            },
            journey_id: self.journey_id,
            journey_goal: self.goal,
            day_number: self.day_number as u32,
            day_summary: self.summary.unwrap_or_default(),
        }
    }
}

#[derive(FromRow)]
struct ChatMessageRecord {
    session_id: String,
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl ChatMessageRecord {
    fn to_domain(self) -> PortResult<ChatMessage> {
        let role = ChatRole::parse(&self.role).ok_or_else(|| {
            PortError::Storage(format!("Unknown chat role '{}' in session {}", self.role, self.session_id))
        })?;
        Ok(ChatMessage {
            session_id: self.session_id,
            role,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// `RoadmapRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl RoadmapRepository for DbAdapter {
    async fn create_journey(&self, new: NewJourney) -> PortResult<Journey> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let record = sqlx::query_as::<_, JourneyRecord>(&format!(
            "INSERT INTO journeys (id, user_id, goal, title, duration_days, prep_type, resume_text) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            JOURNEY_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(&new.goal)
        .bind(&new.title)
        .bind(new.days.len() as i32)
        .bind(&new.prep_type)
        .bind(&new.resume_text)
        .fetch_one(&mut *tx)
        .await
        .map_err(storage)?;

        for (index, day) in new.days.iter().enumerate() {
            let day_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO days (id, journey_id, day_number, title, summary) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(day_id)
            .bind(record.id)
            .bind(index as i32 + 1)
            .bind(&day.title)
            .bind(&day.summary)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

            for (position, name) in day.topics.iter().enumerate() {
                sqlx::query("INSERT INTO topics (id, day_id, position, name) VALUES ($1, $2, $3, $4)")
                    .bind(Uuid::new_v4())
                    .bind(day_id)
                    .bind(position as i32)
                    .bind(name)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
            }
        }

        tx.commit().await.map_err(storage)?;
        Ok(record.to_domain())
    }

    async fn get_journey(&self, journey_id: Uuid) -> PortResult<Journey> {
        let record = sqlx::query_as::<_, JourneyRecord>(&format!(
            "SELECT {} FROM journeys WHERE id = $1",
            JOURNEY_COLUMNS
        ))
        .bind(journey_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Journey", journey_id))?;
        Ok(record.to_domain())
    }

    async fn list_journeys_for_user(&self, user_id: Uuid) -> PortResult<Vec<Journey>> {
        let records = sqlx::query_as::<_, JourneyRecord>(&format!(
            "SELECT {} FROM journeys WHERE user_id = $1 ORDER BY created_at DESC",
            JOURNEY_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(JourneyRecord::to_domain).collect())
    }

    async fn set_journey_completed(&self, journey_id: Uuid, completed: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE journeys SET is_completed = $2 WHERE id = $1")
            .bind(journey_id)
            .bind(completed)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        ensure_updated(result.rows_affected(), "Journey", journey_id)
    }

    async fn set_last_visited_day(&self, journey_id: Uuid, day_number: u32) -> PortResult<()> {
        let result = sqlx::query("UPDATE journeys SET last_visited_day = $2 WHERE id = $1")
            .bind(journey_id)
            .bind(day_number as i32)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        ensure_updated(result.rows_affected(), "Journey", journey_id)
    }

    async fn get_days_with_topics(&self, journey_id: Uuid) -> PortResult<Vec<DayWithTopics>> {
        let days = sqlx::query_as::<_, DayRecord>(
            "SELECT id, journey_id, day_number, title, summary, is_completed \
             FROM days WHERE journey_id = $1 ORDER BY day_number",
        )
        .bind(journey_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut topics = sqlx::query_as::<_, TopicRecord>(
            "SELECT t.id, t.day_id, t.name, t.content, t.is_completed \
             FROM topics t JOIN days d ON d.id = t.day_id \
             WHERE d.journey_id = $1 ORDER BY d.day_number, t.position",
        )
        .bind(journey_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?
        .into_iter()
        .map(TopicRecord::to_domain)
        .peekable();

        // Both result sets are ordered by day number, so topics can be drained in step.
        let mut grouped = Vec::with_capacity(days.len());
        for record in days {
            let day = record.to_domain();
            let mut day_topics = Vec::new();
            while let Some(topic) = topics.next_if(|t| t.day_id == day.id) {
                day_topics.push(topic);
            }
            grouped.push(DayWithTopics {
                day,
                topics: day_topics,
            });
        }
        Ok(grouped)
    }

    async fn get_topic(&self, topic_id: Uuid) -> PortResult<Topic> {
        let record = sqlx::query_as::<_, TopicRecord>(
            "SELECT id, day_id, name, content, is_completed FROM topics WHERE id = $1",
        )
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Topic", topic_id))?;
        Ok(record.to_domain())
    }

    async fn get_topic_context(&self, topic_id: Uuid) -> PortResult<TopicContext> {
        let record = sqlx::query_as::<_, TopicContextRecord>(
            "SELECT t.id, t.day_id, t.name, t.content, t.is_completed, \
                    j.id AS journey_id, j.goal, d.day_number, d.summary \
             FROM topics t \
             JOIN days d ON d.id = t.day_id \
             JOIN journeys j ON j.id = d.journey_id \
             WHERE t.id = $1",
        )
        .bind(topic_id)
        .fetch_one(&self.pool)
        .await
        .map_err(lookup("Topic", topic_id))?;
        Ok(record.to_domain())
    }

    async fn set_topic_completed(&self, topic_id: Uuid, completed: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE topics SET is_completed = $2 WHERE id = $1")
            .bind(topic_id)
            .bind(completed)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        ensure_updated(result.rows_affected(), "Topic", topic_id)
    }

    async fn set_day_completed(&self, day_id: Uuid, completed: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE days SET is_completed = $2 WHERE id = $1")
            .bind(day_id)
            .bind(completed)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        ensure_updated(result.rows_affected(), "Day", day_id)
    }

    async fn ensure_chat_session(&self, session_id: &str, journey_id: Uuid) -> PortResult<Uuid> {
        sqlx::query(
            "INSERT INTO chat_sessions (id, journey_id) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(session_id)
        .bind(journey_id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query_scalar::<_, Uuid>("SELECT journey_id FROM chat_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await
            .map_err(lookup("Chat session", session_id))
    }

    async fn save_chat_message(&self, message: ChatMessage) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_messages (session_id, role, content, created_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&message.session_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_chat_history(&self, session_id: &str, limit: usize) -> PortResult<Vec<ChatMessage>> {
        let mut records = sqlx::query_as::<_, ChatMessageRecord>(
            "SELECT session_id, role, content, created_at FROM chat_messages \
             WHERE session_id = $1 ORDER BY id DESC LIMIT $2",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        records.reverse();
        records.into_iter().map(ChatMessageRecord::to_domain).collect()
    }
}

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentStore for DbAdapter {
    async fn has_content(&self, topic_id: Uuid) -> bool {
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT COALESCE(content <> '', FALSE) FROM topics WHERE id = $1",
        )
        .bind(topic_id)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(found) => found.unwrap_or(false),
            Err(e) => {
                warn!(%topic_id, "Content check failed, treating topic as empty: {}", e);
                false
            }
        }
    }

    async fn save_content(&self, topic_id: Uuid, content: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE topics SET content = $2 WHERE id = $1")
            .bind(topic_id)
            .bind(content)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        if result.rows_affected() == 0 {
            return Err(PortError::Storage(format!("Topic {} not found", topic_id)));
        }
        Ok(())
    }
}
