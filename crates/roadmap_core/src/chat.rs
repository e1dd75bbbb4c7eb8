//! crates/roadmap_core/src/chat.rs
//!
//! Conversational help about a journey: a size-bounded context prompt built from
//! optional fragments, and a capped rolling history per session.

use chrono::Utc;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ChatMessage, ChatRole, ChatSession, ChatTurn, DayWithTopics, Journey, Topic};
use crate::ports::{ChatSessionStore, LlmService, PortError, PortResult, RoadmapRepository};
use crate::roadmap::take_chars;

pub const RESUME_BUDGET: usize = 2000;
pub const RESUME_TRUNCATION_MARKER: &str = "... (truncated)";
pub const TOPIC_CONTENT_BUDGET: usize = 1000;
pub const TOPIC_TRUNCATION_MARKER: &str = "...";
pub const DEFAULT_HISTORY_CAP: usize = 20;

const ASSISTANT_PREAMBLE: &str = "You are a friendly study assistant helping a learner follow a personalised day-by-day roadmap. \
Answer questions about the current topic, explain concepts with examples, and keep the learner on track for their deadline. \
Use Markdown for code and lists.";

const SIMPLIFY_TEMPLATE: &str = r#"As an expert educator, simplify the following text to make it more accessible and easier to understand. Maintain the key concepts but use simpler language and shorter sentences. Break it down into bullet points if it helps clarity.

Original text: "{text}"

Guidelines:
- Use clear, everyday language
- Keep technical terms only if essential
- Break long sentences into shorter ones
- Maintain the original meaning
- Add examples where helpful

Simplified version:"#;

//=========================================================================================
// Context assembly
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineTopic {
    pub name: String,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineDay {
    pub day_number: u32,
    pub title: String,
    pub topics: Vec<OutlineTopic>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentTopic {
    pub name: String,
    pub content: Option<String>,
}

/// Optional fragments that go into a chat context. Absent or blank fragments are
/// left out of the prompt entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatContext {
    pub goal: Option<String>,
    pub deadline: Option<String>,
    pub progress: Option<String>,
    pub resume: Option<String>,
    pub outline: Vec<OutlineDay>,
    pub current_topic: Option<CurrentTopic>,
}

impl ChatContext {
    pub fn from_journey(journey: &Journey, days: &[DayWithTopics], current_topic: Option<&Topic>) -> Self {
        let total = days.iter().map(|d| d.topics.len()).sum::<usize>();
        let done = days
            .iter()
            .flat_map(|d| d.topics.iter())
            .filter(|t| t.is_completed)
            .count();

        Self {
            goal: Some(journey.goal.clone()),
            deadline: Some(format!(
                "{} ({} days from {})",
                journey.deadline().format("%Y-%m-%d"),
                journey.duration_days,
                journey.created_at.format("%Y-%m-%d")
            )),
            progress: (total > 0).then(|| {
                format!(
                    "{}/{} topics completed ({}%), last visited Day {}",
                    done,
                    total,
                    crate::domain::percent(done, total),
                    journey.last_visited_day
                )
            }),
            resume: journey.resume_text.clone(),
            outline: days
                .iter()
                .map(|d| OutlineDay {
                    day_number: d.day.day_number,
                    title: d.day.title.clone(),
                    topics: d
                        .topics
                        .iter()
                        .map(|t| OutlineTopic {
                            name: t.name.clone(),
                            is_completed: t.is_completed,
                        })
                        .collect(),
                })
                .collect(),
            current_topic: current_topic.map(|t| CurrentTopic {
                name: t.name.clone(),
                content: t.content.clone(),
            }),
        }
    }
}

fn non_blank(fragment: &Option<String>) -> Option<&str> {
    fragment.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Cuts `text` to `budget` characters, appending `marker` only when something was cut.
pub fn truncate_with_marker(text: &str, budget: usize, marker: &str) -> String {
    match take_chars(text, budget) {
        (head, true) => format!("{}{}", head, marker),
        (whole, false) => whole.to_string(),
    }
}

/// Renders the context in a fixed order: goal/deadline/progress, resume, outline,
/// current topic.
pub fn assemble_context(context: &ChatContext) -> String {
    let mut sections: Vec<String> = vec![ASSISTANT_PREAMBLE.to_string()];

    let mut learner = String::new();
    if let Some(goal) = non_blank(&context.goal) {
        let _ = writeln!(learner, "Learning goal: {}", goal);
    }
    if let Some(deadline) = non_blank(&context.deadline) {
        let _ = writeln!(learner, "Deadline: {}", deadline);
    }
    if let Some(progress) = non_blank(&context.progress) {
        let _ = writeln!(learner, "Progress: {}", progress);
    }
    if !learner.is_empty() {
        sections.push(format!("LEARNER:\n{}", learner.trim_end()));
    }

    if let Some(resume) = non_blank(&context.resume) {
        sections.push(format!(
            "RESUME EXCERPT:\n{}",
            truncate_with_marker(resume, RESUME_BUDGET, RESUME_TRUNCATION_MARKER)
        ));
    }

    if !context.outline.is_empty() {
        let mut outline = String::from("ROADMAP OUTLINE:");
        for day in &context.outline {
            let _ = write!(outline, "\nDay {}: {}", day.day_number, day.title);
            for topic in &day.topics {
                let mark = if topic.is_completed { "x" } else { " " };
                let _ = write!(outline, "\n  [{}] {}", mark, topic.name);
            }
        }
        sections.push(outline);
    }

    if let Some(topic) = &context.current_topic {
        let mut current = format!("CURRENT TOPIC: {}", topic.name);
        if let Some(content) = non_blank(&topic.content) {
            let _ = write!(
                current,
                "\n{}",
                truncate_with_marker(content, TOPIC_CONTENT_BUDGET, TOPIC_TRUNCATION_MARKER)
            );
        }
        sections.push(current);
    }

    sections.join("\n\n")
}

//=========================================================================================
// History policy
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatHistoryPolicy {
    /// Maximum number of turns kept, the system turn included. At least 1.
    pub cap: usize,
    /// Keep the system turn at the front instead of evicting it with the oldest turns.
    pub pin_system_message: bool,
}

impl Default for ChatHistoryPolicy {
    fn default() -> Self {
        Self {
            cap: DEFAULT_HISTORY_CAP,
            pin_system_message: false,
        }
    }
}

impl ChatHistoryPolicy {
    pub fn push(&self, session: &mut ChatSession, turn: ChatTurn) {
        session.turns.push_back(turn);
        self.enforce(session);
    }

    /// Replaces any system turn with `text`, placed at the front. The oldest
    /// conversation turns make room for it, so the session always leaves this call
    /// with its context, pinned or not. The newest turn is never dropped.
    pub fn refresh_system(&self, session: &mut ChatSession, text: String) {
        session.turns.retain(|t| t.role != ChatRole::System);
        let room = self.cap.max(1).saturating_sub(1).max(1);
        while session.turns.len() > room {
            session.turns.pop_front();
        }
        session.turns.push_front(ChatTurn::new(ChatRole::System, text));
    }

    fn enforce(&self, session: &mut ChatSession) {
        let cap = self.cap.max(1);
        while session.turns.len() > cap {
            let pinned = self.pin_system_message
                && session.turns.front().is_some_and(|t| t.role == ChatRole::System);
            if pinned {
                session.turns.remove(1);
            } else {
                session.turns.pop_front();
            }
        }
    }
}

//=========================================================================================
// Chat service
//=========================================================================================

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub journey_id: Uuid,
    pub message: String,
    pub current_topic_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
}

pub struct ChatService {
    llm: Arc<dyn LlmService>,
    repo: Arc<dyn RoadmapRepository>,
    sessions: Arc<dyn ChatSessionStore>,
    policy: ChatHistoryPolicy,
}

impl ChatService {
    pub fn new(
        llm: Arc<dyn LlmService>,
        repo: Arc<dyn RoadmapRepository>,
        sessions: Arc<dyn ChatSessionStore>,
        policy: ChatHistoryPolicy,
    ) -> Self {
        Self {
            llm,
            repo,
            sessions,
            policy,
        }
    }

    /// Time-based id for requests that did not name a session. Two requests landing in
    /// the same nanosecond would share a session.
    fn synthesize_session_id() -> String {
        format!(
            "session-{}",
            Utc::now().timestamp_nanos_opt().unwrap_or_else(|| Utc::now().timestamp_micros())
        )
    }

    pub async fn send(&self, user_id: Uuid, request: ChatRequest) -> PortResult<ChatReply> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(PortError::Validation("Message is required".to_string()));
        }

        let journey = self.repo.get_journey(request.journey_id).await?;
        if journey.user_id != user_id {
            return Err(PortError::Unauthorized);
        }
        let days = self.repo.get_days_with_topics(journey.id).await?;

        let current_topic = match request.current_topic_id {
            Some(topic_id) => match self.repo.get_topic(topic_id).await {
                Ok(topic) => Some(topic),
                Err(e) => {
                    warn!("Current topic {} unavailable for chat context: {}", topic_id, e);
                    None
                }
            },
            None => None,
        };

        let session_id = request
            .session_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(Self::synthesize_session_id);
        let mut session = self.load_session(&session_id, journey.id).await?;

        let context = ChatContext::from_journey(&journey, &days, current_topic.as_ref());
        self.policy
            .push(&mut session, ChatTurn::new(ChatRole::User, message));
        self.policy.refresh_system(&mut session, assemble_context(&context));

        let system = session
            .turns
            .iter()
            .find(|t| t.role == ChatRole::System)
            .map(|t| t.text.clone());
        let conversation: Vec<ChatTurn> = session
            .turns
            .iter()
            .filter(|t| t.role != ChatRole::System)
            .cloned()
            .collect();

        let reply = self
            .llm
            .converse(system.as_deref(), &conversation)
            .await
            .map_err(|e| match e {
                PortError::Generation(msg) => PortError::Generation(msg),
                other => PortError::Generation(other.to_string()),
            })?;

        self.policy
            .push(&mut session, ChatTurn::new(ChatRole::Model, reply.clone()));
        self.sessions.put(session).await;

        for (role, content) in [(ChatRole::User, message.to_string()), (ChatRole::Model, reply.clone())] {
            let record = ChatMessage {
                session_id: session_id.clone(),
                role,
                content,
                created_at: Utc::now(),
            };
            if let Err(e) = self.repo.save_chat_message(record).await {
                warn!("Failed to persist {} message for session {}: {}", role.as_str(), session_id, e);
            }
        }

        Ok(ChatReply { session_id, reply })
    }

    /// Live session from the cache, else rebuilt from persisted history, else new.
    /// A session id already bound to a different journey is rejected before any of its
    /// history is read.
    async fn load_session(&self, session_id: &str, journey_id: Uuid) -> PortResult<ChatSession> {
        let owner = self.repo.ensure_chat_session(session_id, journey_id).await?;
        if owner != journey_id {
            return Err(foreign_session(session_id));
        }

        if let Some(session) = self.sessions.get(session_id).await {
            if session.journey_id != journey_id {
                return Err(foreign_session(session_id));
            }
            return Ok(session);
        }

        let mut session = ChatSession::new(session_id, journey_id);
        let history = self
            .repo
            .get_chat_history(session_id, self.policy.cap.max(1))
            .await?;
        if !history.is_empty() {
            info!(
                "Rehydrating chat session {} from {} stored message(s).",
                session_id,
                history.len()
            );
        }
        for message in history {
            self.policy
                .push(&mut session, ChatTurn::new(message.role, message.content));
        }
        Ok(session)
    }

    pub async fn simplify(&self, text: &str) -> PortResult<String> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PortError::Validation("No text provided".to_string()));
        }
        let prompt = SIMPLIFY_TEMPLATE.replace("{text}", text);
        self.llm.generate(&prompt).await.map_err(|e| match e {
            PortError::Generation(msg) => PortError::Generation(msg),
            other => PortError::Generation(other.to_string()),
        })
    }

    pub async fn end_session(&self, session_id: &str) {
        self.sessions.evict(session_id).await;
    }
}

fn foreign_session(session_id: &str) -> PortError {
    PortError::Validation(format!(
        "Chat session {} belongs to another journey",
        session_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        ChatSession::new("s", Uuid::nil())
    }

    #[test]
    fn resume_fragment_never_exceeds_budget_plus_marker() {
        let context = ChatContext {
            resume: Some("r".repeat(RESUME_BUDGET * 3)),
            ..Default::default()
        };
        let assembled = assemble_context(&context);
        let section = assembled
            .split("RESUME EXCERPT:\n")
            .nth(1)
            .unwrap();
        assert!(section.chars().count() <= RESUME_BUDGET + RESUME_TRUNCATION_MARKER.len());
        assert!(section.ends_with(RESUME_TRUNCATION_MARKER));
    }

    #[test]
    fn short_fragments_are_not_marked() {
        assert_eq!(truncate_with_marker("abc", 10, "..."), "abc");
        assert_eq!(truncate_with_marker("abcdef", 3, "..."), "abc...");
    }

    #[test]
    fn absent_fragments_are_omitted_and_order_is_fixed() {
        let context = ChatContext {
            goal: Some("Learn Rust".to_string()),
            deadline: None,
            progress: Some("   ".to_string()),
            resume: None,
            outline: vec![OutlineDay {
                day_number: 1,
                title: "Basics".to_string(),
                topics: vec![
                    OutlineTopic {
                        name: "Cargo".to_string(),
                        is_completed: true,
                    },
                    OutlineTopic {
                        name: "Syntax".to_string(),
                        is_completed: false,
                    },
                ],
            }],
            current_topic: Some(CurrentTopic {
                name: "Cargo".to_string(),
                content: Some("c".repeat(TOPIC_CONTENT_BUDGET + 50)),
            }),
        };
        let assembled = assemble_context(&context);

        assert!(!assembled.contains("Deadline:"));
        assert!(!assembled.contains("Progress:"));
        assert!(!assembled.contains("RESUME EXCERPT"));
        assert!(assembled.contains("  [x] Cargo\n  [ ] Syntax"));

        let learner = assembled.find("LEARNER:").unwrap();
        let outline = assembled.find("ROADMAP OUTLINE:").unwrap();
        let current = assembled.find("CURRENT TOPIC: Cargo").unwrap();
        assert!(learner < outline && outline < current);
        assert!(assembled.ends_with(&format!(
            "{}{}",
            "c".repeat(TOPIC_CONTENT_BUDGET),
            TOPIC_TRUNCATION_MARKER
        )));
    }

    #[test]
    fn history_never_exceeds_cap_and_keeps_most_recent() {
        let policy = ChatHistoryPolicy {
            cap: 4,
            pin_system_message: false,
        };
        let mut s = session();
        for i in 0..25 {
            policy.push(&mut s, ChatTurn::new(ChatRole::User, i.to_string()));
            assert!(s.turns.len() <= 4);
        }
        let kept: Vec<&str> = s.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(kept, vec!["21", "22", "23", "24"]);
    }

    #[test]
    fn unpinned_system_turn_is_evicted_like_any_other() {
        let policy = ChatHistoryPolicy {
            cap: 3,
            pin_system_message: false,
        };
        let mut s = session();
        policy.refresh_system(&mut s, "ctx".to_string());
        for i in 0..3 {
            policy.push(&mut s, ChatTurn::new(ChatRole::User, i.to_string()));
        }
        assert_eq!(s.turns.len(), 3);
        assert!(s.turns.iter().all(|t| t.role != ChatRole::System));
    }

    #[test]
    fn refreshed_context_displaces_the_oldest_turns() {
        let policy = ChatHistoryPolicy {
            cap: 3,
            pin_system_message: false,
        };
        let mut s = session();
        for i in 0..3 {
            policy.push(&mut s, ChatTurn::new(ChatRole::User, i.to_string()));
        }
        policy.refresh_system(&mut s, "ctx".to_string());
        let kept: Vec<&str> = s.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(kept, vec!["ctx", "1", "2"]);

        let tiny = ChatHistoryPolicy {
            cap: 1,
            pin_system_message: false,
        };
        tiny.refresh_system(&mut s, "ctx".to_string());
        let kept: Vec<&str> = s.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(kept, vec!["ctx", "2"]);
    }

    #[test]
    fn pinned_system_turn_survives_the_cap() {
        let policy = ChatHistoryPolicy {
            cap: 3,
            pin_system_message: true,
        };
        let mut s = session();
        policy.refresh_system(&mut s, "ctx".to_string());
        for i in 0..5 {
            policy.push(&mut s, ChatTurn::new(ChatRole::User, i.to_string()));
        }
        let kept: Vec<&str> = s.turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(kept, vec!["ctx", "3", "4"]);

        policy.refresh_system(&mut s, "new ctx".to_string());
        assert_eq!(s.turns.len(), 3);
        assert_eq!(s.turns.front().unwrap().text, "new ctx");
    }
}
