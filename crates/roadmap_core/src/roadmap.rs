//! crates/roadmap_core/src/roadmap.rs
//!
//! One-shot roadmap creation: ask the LLM for a day-by-day plan, parse and validate
//! its JSON, and write the journey/day/topic graph to the repository.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{Journey, NewDay, NewJourney};
use crate::ports::{LlmService, PortError, PortResult, RoadmapRepository};

pub const DEFAULT_TIMELINE_DAYS: u32 = 30;
pub const MAX_TIMELINE_DAYS: u32 = 365;
const RESUME_PROMPT_BUDGET: usize = 2000;

static JSON_OBJECT_SPAN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}"));

const ROADMAP_TEMPLATE: &str = r#"You are an expert learning path creator. Create a personalized learning roadmap for a user with the following goal:
"{goal}"

{resume}

Create a detailed day-by-day learning roadmap for exactly {days} days. First, determine:
1. A concise title for this learning journey
2. The preparation type (e.g., "Technical Interview Preparation", "Full-Stack Development Learning", etc.)

Then create the daily roadmap structured as follows:
1. Create exactly {days} sections, one for each day (Day 1, Day 2, etc.)
2. Each day should have a title and a description of what will be covered
3. Each day should contain 2-4 specific topics to learn on that day
4. Each topic should have a title and description (DO NOT include detailed content)

Respond with a JSON object in this exact format:
{
  "title": "Concise title of the learning journey",
  "timeline": "{days} days",
  "prepType": "Type of preparation/study",
  "roadmap": [
    {
      "id": "day-1",
      "title": "Day 1: [Focus Area]",
      "description": "What will be covered on Day 1",
      "topics": [
        { "id": "topic-1-1", "title": "Topic Title", "description": "Topic description" }
      ]
    }
  ]
}

You MUST create exactly {days} days, with a logical progression of topics.
Only respond with the JSON object, no additional text."#;

//=========================================================================================
// Request and LLM response shapes
//=========================================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapRequest {
    pub goal: String,
    #[serde(default)]
    pub resume_text: Option<String>,
    #[serde(default, alias = "timelineInDays")]
    pub timeline_days: Option<u32>,
}

impl RoadmapRequest {
    /// Checks the request and returns the effective number of days.
    pub fn validate(&self) -> PortResult<u32> {
        if self.goal.trim().is_empty() {
            return Err(PortError::Validation("Goal is required".to_string()));
        }
        let days = self.timeline_days.unwrap_or(DEFAULT_TIMELINE_DAYS);
        if days == 0 || days > MAX_TIMELINE_DAYS {
            return Err(PortError::Validation(format!(
                "Timeline must be between 1 and {} days, got {}",
                MAX_TIMELINE_DAYS, days
            )));
        }
        Ok(days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapDraft {
    pub title: String,
    #[serde(default)]
    pub timeline: String,
    #[serde(default)]
    pub prep_type: String,
    pub roadmap: Vec<DraftDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftDay {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, alias = "summary")]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<DraftTopic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftTopic {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl RoadmapDraft {
    /// Exactly `expected_days` days, each with at least one named topic.
    pub fn validate(&self, expected_days: u32) -> PortResult<()> {
        if self.roadmap.len() != expected_days as usize {
            return Err(PortError::Generation(format!(
                "roadmap has {} days, expected {}",
                self.roadmap.len(),
                expected_days
            )));
        }
        for (index, day) in self.roadmap.iter().enumerate() {
            if day.topics.is_empty() {
                return Err(PortError::Generation(format!("day {} has no topics", index + 1)));
            }
            if day.topics.iter().any(|t| t.title.trim().is_empty()) {
                return Err(PortError::Generation(format!(
                    "day {} has a topic without a title",
                    index + 1
                )));
            }
        }
        Ok(())
    }

    fn into_new_journey(self, user_id: Uuid, goal: &str, resume_text: Option<String>) -> NewJourney {
        let prep_type = if self.prep_type.trim().is_empty() {
            "general".to_string()
        } else {
            self.prep_type
        };
        NewJourney {
            user_id,
            goal: goal.to_string(),
            title: self.title,
            prep_type,
            resume_text,
            days: self
                .roadmap
                .into_iter()
                .map(|day| NewDay {
                    title: day.title,
                    summary: Some(day.description).filter(|s| !s.trim().is_empty()),
                    topics: day.topics.into_iter().map(|t| t.title).collect(),
                })
                .collect(),
        }
    }
}

/// Pulls the outermost `{ ... }` span out of a model reply and parses it.
pub fn parse_roadmap_reply(reply: &str) -> PortResult<RoadmapDraft> {
    let json_span = JSON_OBJECT_SPAN
        .as_ref()
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .find(reply)
        .ok_or_else(|| {
            PortError::Generation("Could not find a JSON object in the roadmap reply".to_string())
        })?;

    serde_json::from_str::<RoadmapDraft>(json_span.as_str())
        .map_err(|e| PortError::Generation(format!("Failed to parse roadmap JSON: {}", e)))
}

/// First `budget` characters of `text`, plus whether anything was cut.
pub(crate) fn take_chars(text: &str, budget: usize) -> (&str, bool) {
    match text.char_indices().nth(budget) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

//=========================================================================================
// Orchestrator
//=========================================================================================

pub struct RoadmapBuildOrchestrator {
    llm: Arc<dyn LlmService>,
    repo: Arc<dyn RoadmapRepository>,
}

impl RoadmapBuildOrchestrator {
    pub fn new(llm: Arc<dyn LlmService>, repo: Arc<dyn RoadmapRepository>) -> Self {
        Self { llm, repo }
    }

    pub fn build_prompt(request: &RoadmapRequest, days: u32) -> String {
        let resume = match request.resume_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                let (excerpt, _) = take_chars(text, RESUME_PROMPT_BUDGET);
                format!(
                    "The user has provided their resume, here is the extracted text:\n{}...",
                    excerpt
                )
            }
            _ => "The user has not provided a resume.".to_string(),
        };
        ROADMAP_TEMPLATE
            .replace("{goal}", request.goal.trim())
            .replace("{resume}", &resume)
            .replace("{days}", &days.to_string())
    }

    /// Asks the LLM for a roadmap and returns it parsed and validated, without saving.
    pub async fn draft(&self, request: &RoadmapRequest) -> PortResult<RoadmapDraft> {
        let days = request.validate()?;
        let prompt = Self::build_prompt(request, days);

        let reply = self.llm.generate(&prompt).await.map_err(|e| match e {
            PortError::Generation(msg) => PortError::Generation(msg),
            other => PortError::Generation(other.to_string()),
        })?;
        info!("Roadmap reply received, {} bytes.", reply.len());

        let draft = parse_roadmap_reply(&reply).map_err(|e| {
            error!("Unusable roadmap reply: {}", e);
            e
        })?;
        draft.validate(days)?;
        Ok(draft)
    }

    /// Persists an already drafted roadmap. Days are numbered in draft order from 1.
    pub async fn save(
        &self,
        user_id: Uuid,
        goal: &str,
        resume_text: Option<String>,
        draft: RoadmapDraft,
    ) -> PortResult<Journey> {
        if goal.trim().is_empty() {
            return Err(PortError::Validation("Goal is required".to_string()));
        }
        let expected = draft.roadmap.len() as u32;
        if expected == 0 {
            return Err(PortError::Validation("Roadmap has no days".to_string()));
        }
        if expected > MAX_TIMELINE_DAYS {
            return Err(PortError::Validation(format!(
                "Timeline must be between 1 and {} days, got {}",
                MAX_TIMELINE_DAYS, expected
            )));
        }
        draft.validate(expected)?;

        let journey = self
            .repo
            .create_journey(draft.into_new_journey(user_id, goal.trim(), resume_text))
            .await?;
        info!(
            "Created journey {} with {} day(s) for user {}.",
            journey.id, journey.duration_days, user_id
        );
        Ok(journey)
    }

    /// Drafts and persists in one go.
    pub async fn build(&self, user_id: Uuid, request: RoadmapRequest) -> PortResult<Journey> {
        let draft = self.draft(&request).await?;
        self.save(user_id, &request.goal, request.resume_text.clone(), draft)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"Sure! Here is your plan:
```json
{
  "title": "Rust in a Weekend",
  "timeline": "2 days",
  "prepType": "Language Learning",
  "roadmap": [
    {"id": "day-1", "title": "Day 1: Basics", "description": "Syntax and tooling",
     "topics": [{"id": "topic-1-1", "title": "Cargo", "description": "Build tool"}]},
    {"id": "day-2", "title": "Day 2: Ownership", "description": "Borrowing",
     "topics": [{"id": "topic-2-1", "title": "Borrowing", "description": ""},
                {"id": "topic-2-2", "title": "Lifetimes", "description": ""}]}
  ]
}
```"#;

    #[test]
    fn parses_json_wrapped_in_prose() {
        let draft = parse_roadmap_reply(REPLY).unwrap();
        assert_eq!(draft.title, "Rust in a Weekend");
        assert_eq!(draft.prep_type, "Language Learning");
        assert_eq!(draft.roadmap.len(), 2);
        assert_eq!(draft.roadmap[1].topics[1].title, "Lifetimes");
        assert!(draft.validate(2).is_ok());
    }

    #[test]
    fn wrong_day_count_is_rejected() {
        let draft = parse_roadmap_reply(REPLY).unwrap();
        assert!(matches!(draft.validate(3), Err(PortError::Generation(_))));
    }

    #[test]
    fn reply_without_json_is_a_generation_error() {
        let err = parse_roadmap_reply("I cannot help with that.").unwrap_err();
        assert!(matches!(err, PortError::Generation(_)));
        let err = parse_roadmap_reply("{ not json }").unwrap_err();
        assert!(matches!(err, PortError::Generation(_)));
    }

    #[test]
    fn request_defaults_to_thirty_days_and_rejects_bad_input() {
        let request = RoadmapRequest {
            goal: "Learn SQL".to_string(),
            resume_text: None,
            timeline_days: None,
        };
        assert_eq!(request.validate().unwrap(), DEFAULT_TIMELINE_DAYS);

        let blank = RoadmapRequest {
            goal: "  ".to_string(),
            ..request.clone()
        };
        assert!(matches!(blank.validate(), Err(PortError::Validation(_))));

        let zero = RoadmapRequest {
            timeline_days: Some(0),
            ..request
        };
        assert!(matches!(zero.validate(), Err(PortError::Validation(_))));
    }

    #[test]
    fn prompt_caps_resume_excerpt() {
        let request = RoadmapRequest {
            goal: "Learn Go".to_string(),
            resume_text: Some("x".repeat(5000)),
            timeline_days: Some(7),
        };
        let prompt = RoadmapBuildOrchestrator::build_prompt(&request, 7);
        assert!(prompt.contains(&format!("{}...", "x".repeat(RESUME_PROMPT_BUDGET))));
        assert!(!prompt.contains(&"x".repeat(RESUME_PROMPT_BUDGET + 1)));
        assert!(prompt.contains("exactly 7 days"));
    }

    #[test]
    fn take_chars_respects_multibyte_boundaries() {
        assert_eq!(take_chars("héllo", 2), ("hé", true));
        assert_eq!(take_chars("hé", 5), ("hé", false));
    }
}
