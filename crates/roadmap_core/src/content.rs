//! crates/roadmap_core/src/content.rs
//!
//! Topic content: the LLM-backed generator and the read path that generates
//! on demand when a topic is opened before the background queue reached it.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{GenerationStatus, TopicContentRequest};
use crate::ports::{
    ContentGenerationService, ContentStore, LlmService, PortError, PortResult, RoadmapRepository,
};

const TOPIC_CONTENT_TEMPLATE: &str = r#"You are an expert educational content creator. Create detailed, comprehensive learning content for the following topic:

Topic: "{topic}"

This topic is part of Day {day} in a learning journey focused on: "{goal}"

Day {day} Summary: "{summary}"

Please create educational content that:
1. Starts with a brief introduction to the topic
2. Explains key concepts in detail with examples
3. Provides practical applications or exercises
4. Includes code examples if relevant
5. Ends with a summary and next steps

Format the content using Markdown, with proper headings, code blocks, bullet points, etc.
Make the content comprehensive but concise, focusing on the most important aspects of the topic.

Respond with just the formatted Markdown content, no additional text."#;

//=========================================================================================
// ContentGenerator
//=========================================================================================

/// Generates topic content through an `LlmService`. Stateless per call: no caching,
/// no retries.
#[derive(Clone)]
pub struct TopicContentGenerator {
    llm: Arc<dyn LlmService>,
}

impl TopicContentGenerator {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }

    pub fn build_prompt(request: &TopicContentRequest) -> String {
        TOPIC_CONTENT_TEMPLATE
            .replace("{topic}", &request.topic_name)
            .replace("{day}", &request.day_number.to_string())
            .replace("{goal}", &request.journey_goal)
            .replace("{summary}", &request.day_summary)
    }
}

#[async_trait]
impl ContentGenerationService for TopicContentGenerator {
    async fn generate_topic_content(&self, request: &TopicContentRequest) -> PortResult<String> {
        let prompt = Self::build_prompt(request);
        let content = self.llm.generate(&prompt).await.map_err(|e| match e {
            PortError::Generation(msg) => PortError::Generation(msg),
            other => PortError::Generation(format!(
                "content for '{}' could not be generated: {}",
                request.topic_name, other
            )),
        })?;

        let content = content.trim();
        if content.is_empty() {
            return Err(PortError::Generation(format!(
                "LLM returned empty content for '{}'",
                request.topic_name
            )));
        }
        Ok(content.to_string())
    }
}

//=========================================================================================
// On-demand read path and status
//=========================================================================================

/// Content returned to a reader, generated on the spot when missing.
#[derive(Debug, Clone)]
pub struct TopicContentView {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub generated_now: bool,
}

pub struct TopicContentService {
    repo: Arc<dyn RoadmapRepository>,
    store: Arc<dyn ContentStore>,
    generator: Arc<dyn ContentGenerationService>,
}

impl TopicContentService {
    pub fn new(
        repo: Arc<dyn RoadmapRepository>,
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn ContentGenerationService>,
    ) -> Self {
        Self {
            repo,
            store,
            generator,
        }
    }

    /// Returns the topic's content, generating and saving it first if it is empty.
    ///
    /// This races with the background queue; both sides check before generating and
    /// the last write wins.
    pub async fn get_or_generate(&self, topic_id: Uuid) -> PortResult<TopicContentView> {
        let ctx = self.repo.get_topic_context(topic_id).await?;
        if let Some(content) = ctx.topic.content.clone().filter(|c| !c.is_empty()) {
            return Ok(TopicContentView {
                id: ctx.topic.id,
                name: ctx.topic.name,
                content,
                generated_now: false,
            });
        }

        info!("Topic {} has no content yet, generating on demand.", topic_id);
        let request = TopicContentRequest {
            topic_name: ctx.topic.name.clone(),
            journey_goal: ctx.journey_goal.clone(),
            day_number: ctx.day_number,
            day_summary: ctx.day_summary.clone(),
        };
        let content = self.generator.generate_topic_content(&request).await?;
        self.store.save_content(topic_id, &content).await?;

        Ok(TopicContentView {
            id: ctx.topic.id,
            name: ctx.topic.name,
            content,
            generated_now: true,
        })
    }

    pub async fn status(&self, journey_id: Uuid) -> PortResult<GenerationStatus> {
        let days = self.repo.get_days_with_topics(journey_id).await?;
        if days.is_empty() {
            warn!("Status requested for journey {} with no days.", journey_id);
        }
        Ok(GenerationStatus::from_days(journey_id, &days))
    }
}
