//! crates/roadmap_core/src/orchestrator.rs
//!
//! Kicks off content generation for a journey: Day 1 is generated while the caller
//! waits, every other day is handed to the background queue.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{DayWithTopics, GenerationTask, Topic, TopicContentRequest};
use crate::ports::{
    ContentGenerationService, ContentStore, PortError, PortResult, RoadmapRepository,
};
use crate::queue::GenerationQueue;

/// What `generate_initial` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitialContentReport {
    pub day_one_generated: Vec<Uuid>,
    pub day_one_failed: Vec<Uuid>,
    pub queued: usize,
}

pub struct InitialContentOrchestrator {
    repo: Arc<dyn RoadmapRepository>,
    generator: Arc<dyn ContentGenerationService>,
    store: Arc<dyn ContentStore>,
    queue: GenerationQueue,
}

impl InitialContentOrchestrator {
    pub fn new(
        repo: Arc<dyn RoadmapRepository>,
        generator: Arc<dyn ContentGenerationService>,
        store: Arc<dyn ContentStore>,
        queue: GenerationQueue,
    ) -> Self {
        Self {
            repo,
            generator,
            store,
            queue,
        }
    }

    /// Generates every empty Day 1 topic concurrently and waits for them, then queues
    /// the empty topics of all later days.
    ///
    /// A single Day 1 failure is logged and reported; the call only fails when Day 1
    /// had work and none of it succeeded.
    pub async fn generate_initial(&self, journey_id: Uuid) -> PortResult<InitialContentReport> {
        let journey = self.repo.get_journey(journey_id).await?;
        let days = self.repo.get_days_with_topics(journey_id).await?;
        if days.is_empty() {
            return Err(PortError::NotFound(format!(
                "No days found for journey {}",
                journey_id
            )));
        }

        let mut report = InitialContentReport::default();

        if let Some(day_one) = days.iter().find(|d| d.day.day_number == 1) {
            let pending: Vec<&Topic> = day_one.topics.iter().filter(|t| !t.has_content()).collect();
            info!(
                "Generating {} Day 1 topic(s) for journey {}.",
                pending.len(),
                journey_id
            );

            let results = join_all(
                pending
                    .iter()
                    .map(|topic| self.generate_now(topic, &journey.goal, day_one)),
            )
            .await;

            for (topic, result) in pending.iter().zip(results) {
                match result {
                    Ok(()) => report.day_one_generated.push(topic.id),
                    Err(e) => {
                        error!("Day 1 generation failed for topic {}: {}", topic.id, e);
                        report.day_one_failed.push(topic.id);
                    }
                }
            }

            if !pending.is_empty() && report.day_one_generated.is_empty() {
                return Err(PortError::Generation(format!(
                    "none of the {} Day 1 topics of journey {} could be generated",
                    pending.len(),
                    journey_id
                )));
            }
        }

        for day in days.iter().filter(|d| d.day.day_number != 1) {
            for topic in day.topics.iter().filter(|t| !t.has_content()) {
                self.queue
                    .enqueue(GenerationTask::for_topic(topic, &journey.goal, day));
                report.queued += 1;
            }
        }

        info!(
            "Journey {}: {} Day 1 topic(s) ready, {} failed, {} queued.",
            journey_id,
            report.day_one_generated.len(),
            report.day_one_failed.len(),
            report.queued
        );
        Ok(report)
    }

    async fn generate_now(&self, topic: &Topic, goal: &str, day: &DayWithTopics) -> PortResult<()> {
        let request = TopicContentRequest {
            topic_name: topic.name.clone(),
            journey_goal: goal.to_string(),
            day_number: day.day.day_number,
            day_summary: day.summary_or_empty().to_string(),
        };
        let content = self.generator.generate_topic_content(&request).await?;
        self.store.save_content(topic.id, &content).await
    }
}
