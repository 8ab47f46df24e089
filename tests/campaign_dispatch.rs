//! Campaign controller integration tests.
//!
//! The load-bearing stress property: with a concurrency bound of 2 and ten
//! leads of randomized duration, the observed in-flight count never exceeds
//! the bound, every lead is counted exactly once, and the campaign
//! completes exactly once.

mod fixtures;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use dialcast::call::{Campaign, CampaignStatus, CampaignStore, InMemoryCampaignStore};
use dialcast::campaign::{AttemptOutcome, AttemptRunner, CampaignController, DispatchLimits};

use fixtures::audio_fixtures::TestRng;

/// Runner with per-lead randomized durations and an in-flight gauge.
struct RandomizedRunner {
    durations: Mutex<Vec<Duration>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    completions: AtomicUsize,
}

impl RandomizedRunner {
    fn new(seed: u64, leads: usize) -> Self {
        let mut rng = TestRng::new(seed);
        let durations = (0..leads)
            .map(|_| Duration::from_millis(rng.next_in_range(50, 200)))
            .collect();
        Self {
            durations: Mutex::new(durations),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl AttemptRunner for RandomizedRunner {
    async fn run(&self, _campaign_id: Uuid, _lead_id: Uuid) -> AttemptOutcome {
        let duration = self
            .durations
            .lock()
            .pop()
            .expect("more attempts than leads");

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(duration).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.completions.fetch_add(1, Ordering::SeqCst);
        AttemptOutcome::Success
    }
}

async fn await_completed(store: &InMemoryCampaignStore, id: Uuid) -> Campaign {
    for _ in 0..500 {
        if let Some(campaign) = store.get(id).await {
            if campaign.status == CampaignStatus::Completed {
                return campaign;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("campaign never completed");
}

#[tokio::test]
async fn test_concurrency_bound_holds_under_randomized_durations() {
    let campaigns = Arc::new(InMemoryCampaignStore::new());
    let campaign = Campaign::new(10);
    let campaign_id = campaign.id;
    campaigns.insert(campaign).await;

    let runner = Arc::new(RandomizedRunner::new(0xD1A1, 10));
    let controller = Arc::new(CampaignController::new(campaigns.clone(), runner.clone()));

    controller
        .dispatch(
            campaign_id,
            (0..10).map(|_| Uuid::new_v4()).collect(),
            DispatchLimits::new(2, Duration::from_millis(5)),
        )
        .await;

    let done = await_completed(&campaigns, campaign_id).await;

    assert_eq!(done.completed_calls, 10, "every lead counted exactly once");
    assert_eq!(done.total_leads, 10);
    assert_eq!(runner.completions.load(Ordering::SeqCst), 10);
    assert!(
        runner.peak.load(Ordering::SeqCst) <= 2,
        "in-flight exceeded the bound: {}",
        runner.peak.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_completion_fires_exactly_once_out_of_order() {
    // Wildly uneven durations force completions far out of dispatch order.
    struct UnevenRunner {
        remaining: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl AttemptRunner for UnevenRunner {
        async fn run(&self, _campaign_id: Uuid, _lead_id: Uuid) -> AttemptOutcome {
            let duration = self.remaining.lock().pop().unwrap();
            tokio::time::sleep(duration).await;
            AttemptOutcome::Failure
        }
    }

    let campaigns = Arc::new(InMemoryCampaignStore::new());
    let campaign = Campaign::new(5);
    let campaign_id = campaign.id;
    campaigns.insert(campaign).await;

    // Popped from the back: first dispatched lead sleeps longest.
    let runner = Arc::new(UnevenRunner {
        remaining: Mutex::new(vec![
            Duration::from_millis(10),
            Duration::from_millis(40),
            Duration::from_millis(80),
            Duration::from_millis(120),
            Duration::from_millis(200),
        ]),
    });

    let controller = Arc::new(CampaignController::new(campaigns.clone(), runner));
    controller
        .dispatch(
            campaign_id,
            (0..5).map(|_| Uuid::new_v4()).collect(),
            DispatchLimits::new(5, Duration::ZERO),
        )
        .await;

    let done = await_completed(&campaigns, campaign_id).await;
    assert_eq!(done.completed_calls, 5);
    assert_eq!(done.status, CampaignStatus::Completed);
    // All five were failures; none count as successful.
    assert_eq!(done.successful_calls, 0);
}
