mod common;

use common::{seed_journey, CountingStore, InstrumentedGenerator};
use roadmap_core::content::TopicContentService;
use roadmap_core::memory::InMemoryRepository;
use roadmap_core::orchestrator::InitialContentOrchestrator;
use roadmap_core::progress::ProgressTracker;
use roadmap_core::{ContentStore, GenerationQueue, PortError, QueueConfig, RoadmapRepository};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

struct Harness {
    repo: Arc<InMemoryRepository>,
    generator: Arc<InstrumentedGenerator>,
    queue: GenerationQueue,
    orchestrator: InitialContentOrchestrator,
}

fn harness(generator: InstrumentedGenerator) -> Harness {
    let repo = Arc::new(InMemoryRepository::new());
    let generator = Arc::new(generator);
    let store = Arc::new(CountingStore::new(repo.clone()));
    let queue = GenerationQueue::new(generator.clone(), store.clone(), QueueConfig::default());
    let orchestrator =
        InitialContentOrchestrator::new(repo.clone(), generator.clone(), store, queue.clone());
    Harness {
        repo,
        generator,
        queue,
        orchestrator,
    }
}

#[tokio::test]
async fn day_one_is_ready_on_return_and_the_rest_is_queued() {
    let (generator, gate) = InstrumentedGenerator::gated(Duration::from_millis(1));
    let h = harness(generator);
    let journey = seed_journey(&h.repo, Uuid::new_v4(), 3, 2).await;

    let report = h.orchestrator.generate_initial(journey.id).await.unwrap();

    assert_eq!(report.day_one_generated.len(), 2);
    assert!(report.day_one_failed.is_empty());
    assert_eq!(report.queued, 4);

    let days = h.repo.get_days_with_topics(journey.id).await.unwrap();
    assert!(days[0].topics.iter().all(|t| t.has_content()));
    assert!(days[1..]
        .iter()
        .flat_map(|d| d.topics.iter())
        .all(|t| !t.has_content()));

    let snapshot = h.queue.snapshot();
    assert!(snapshot.processing);
    assert_eq!(snapshot.pending + snapshot.in_flight, 4);

    gate.add_permits(4);
    h.queue.wait_idle().await;

    let days = h.repo.get_days_with_topics(journey.id).await.unwrap();
    assert!(days.iter().flat_map(|d| d.topics.iter()).all(|t| t.has_content()));
    assert_eq!(h.generator.calls(), 6);
}

#[tokio::test]
async fn topics_with_content_are_neither_generated_nor_queued() {
    let h = harness(InstrumentedGenerator::new(Duration::from_millis(1)));
    let journey = seed_journey(&h.repo, Uuid::new_v4(), 2, 2).await;
    let days = h.repo.get_days_with_topics(journey.id).await.unwrap();
    h.repo.save_content(days[0].topics[0].id, "done").await.unwrap();
    h.repo.save_content(days[1].topics[1].id, "done").await.unwrap();

    let report = h.orchestrator.generate_initial(journey.id).await.unwrap();
    h.queue.wait_idle().await;

    assert_eq!(report.day_one_generated, vec![days[0].topics[1].id]);
    assert_eq!(report.queued, 1);
    assert_eq!(h.generator.calls(), 2);
}

#[tokio::test]
async fn one_day_one_failure_is_isolated() {
    let h = harness(InstrumentedGenerator::new(Duration::from_millis(1)));
    h.generator.fail_topic("d1t1");
    let journey = seed_journey(&h.repo, Uuid::new_v4(), 2, 2).await;

    let report = h.orchestrator.generate_initial(journey.id).await.unwrap();
    h.queue.wait_idle().await;

    assert_eq!(report.day_one_generated.len(), 1);
    assert_eq!(report.day_one_failed.len(), 1);
    assert_eq!(report.queued, 2);
}

#[tokio::test]
async fn total_day_one_failure_is_an_error() {
    let h = harness(InstrumentedGenerator::new(Duration::from_millis(1)));
    h.generator.fail_topic("d1t1");
    h.generator.fail_topic("d1t2");
    let journey = seed_journey(&h.repo, Uuid::new_v4(), 2, 2).await;

    let err = h.orchestrator.generate_initial(journey.id).await.unwrap_err();
    assert!(matches!(err, PortError::Generation(_)));
    assert!(!h.queue.snapshot().processing);
}

#[tokio::test]
async fn unknown_journey_is_not_found() {
    let h = harness(InstrumentedGenerator::new(Duration::from_millis(1)));
    let err = h
        .orchestrator
        .generate_initial(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
}

#[tokio::test]
async fn on_demand_read_generates_once_and_status_counts_it() {
    let h = harness(InstrumentedGenerator::new(Duration::from_millis(1)));
    let journey = seed_journey(&h.repo, Uuid::new_v4(), 2, 2).await;
    let days = h.repo.get_days_with_topics(journey.id).await.unwrap();
    let service = TopicContentService::new(h.repo.clone(), h.repo.clone(), h.generator.clone());
    let topic_id = days[1].topics[0].id;

    let first = service.get_or_generate(topic_id).await.unwrap();
    let second = service.get_or_generate(topic_id).await.unwrap();

    assert!(first.generated_now);
    assert!(!second.generated_now);
    assert_eq!(first.content, second.content);
    assert!(first.content.contains("Day 2 material"));
    assert_eq!(h.generator.calls(), 1);

    let status = service.status(journey.id).await.unwrap();
    assert_eq!(status.total_topics, 4);
    assert_eq!(status.generated_topics, 1);
    assert_eq!(status.percent_complete, 25);
    assert!(!status.is_complete);
}

#[tokio::test]
async fn completing_every_topic_completes_the_journey() {
    let repo = Arc::new(InMemoryRepository::new());
    let journey = seed_journey(&repo, Uuid::new_v4(), 2, 1).await;
    let days = repo.get_days_with_topics(journey.id).await.unwrap();
    let tracker = ProgressTracker::new(repo.clone());

    let first = tracker
        .set_topic_completion(journey.id, days[0].topics[0].id, true)
        .await
        .unwrap();
    assert_eq!(first.progress_percent, 50);
    assert!(!first.all_topics_completed);

    let second = tracker
        .set_topic_completion(journey.id, days[1].topics[0].id, true)
        .await
        .unwrap();
    assert_eq!(second.progress_percent, 100);
    assert!(second.all_topics_completed);

    assert!(repo.get_journey(journey.id).await.unwrap().is_completed);
    let days = repo.get_days_with_topics(journey.id).await.unwrap();
    assert!(days.iter().all(|d| d.day.is_completed));

    let foreign = tracker
        .set_topic_completion(Uuid::new_v4(), days[0].topics[0].id, false)
        .await;
    assert!(matches!(foreign, Err(PortError::NotFound(_))));

    assert!(tracker.visit_day(journey.id, 2).await.is_ok());
    assert!(matches!(
        tracker.visit_day(journey.id, 3).await,
        Err(PortError::Validation(_))
    ));
    assert_eq!(repo.get_journey(journey.id).await.unwrap().last_visited_day, 2);
}
