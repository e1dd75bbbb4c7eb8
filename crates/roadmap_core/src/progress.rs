//! crates/roadmap_core/src/progress.rs
//!
//! Completion tracking for topics, days and journeys.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{percent, DayWithTopics};
use crate::ports::{PortError, PortResult, RoadmapRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    pub is_completed: bool,
    pub progress_percent: u32,
    pub all_topics_completed: bool,
}

pub struct ProgressTracker {
    repo: Arc<dyn RoadmapRepository>,
}

impl ProgressTracker {
    pub fn new(repo: Arc<dyn RoadmapRepository>) -> Self {
        Self { repo }
    }

    /// Marks a topic done or not done, then brings its day and the journey in line.
    /// The journey flag is only ever flipped to complete, never back.
    pub async fn set_topic_completion(
        &self,
        journey_id: Uuid,
        topic_id: Uuid,
        completed: bool,
    ) -> PortResult<ProgressReport> {
        let days = self.repo.get_days_with_topics(journey_id).await?;
        let day_index = days
            .iter()
            .position(|d| d.topics.iter().any(|t| t.id == topic_id))
            .ok_or_else(|| {
                PortError::NotFound(format!(
                    "Topic {} does not belong to journey {}",
                    topic_id, journey_id
                ))
            })?;

        self.repo.set_topic_completed(topic_id, completed).await?;

        let days = apply_completion(days, topic_id, completed);
        let day = &days[day_index];
        let day_done = day.topics.iter().all(|t| t.is_completed);
        if day_done != day.day.is_completed {
            self.repo.set_day_completed(day.day.id, day_done).await?;
        }

        let total = days.iter().map(|d| d.topics.len()).sum::<usize>();
        let done = days
            .iter()
            .flat_map(|d| d.topics.iter())
            .filter(|t| t.is_completed)
            .count();
        let all_topics_completed = total > 0 && done == total;

        if all_topics_completed {
            self.repo.set_journey_completed(journey_id, true).await?;
            info!("Journey {} completed.", journey_id);
        }

        Ok(ProgressReport {
            is_completed: completed,
            progress_percent: percent(done, total),
            all_topics_completed,
        })
    }

    pub async fn visit_day(&self, journey_id: Uuid, day_number: u32) -> PortResult<()> {
        let journey = self.repo.get_journey(journey_id).await?;
        if day_number == 0 || day_number > journey.duration_days {
            return Err(PortError::Validation(format!(
                "Day {} is outside journey {} (1..={})",
                day_number, journey_id, journey.duration_days
            )));
        }
        self.repo.set_last_visited_day(journey_id, day_number).await
    }
}

fn apply_completion(mut days: Vec<DayWithTopics>, topic_id: Uuid, completed: bool) -> Vec<DayWithTopics> {
    for topic in days.iter_mut().flat_map(|d| d.topics.iter_mut()) {
        if topic.id == topic_id {
            topic.is_completed = completed;
        }
    }
    days
}
