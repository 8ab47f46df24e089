//! Bounded dispatch driver.
//!
//! A single sequential loop acquires an in-flight slot (semaphore permit),
//! spawns the attempt as a fire-and-forget task with the permit moved in,
//! then sleeps the inter-dispatch delay before considering the next lead.
//! The permit is released when the attempt task finishes, whatever the
//! outcome, so the in-flight bound holds even through per-lead failures
//! and panics.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::call::CampaignStore;

use super::attempt::{AttemptOutcome, AttemptRunner};

/// Concurrency and pacing limits for one campaign run.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLimits {
    /// Maximum simultaneous in-flight calls (>= 1)
    pub max_concurrent: usize,
    /// Minimum delay between the start of consecutive dispatches
    pub delay_between: Duration,
}

impl DispatchLimits {
    pub fn new(max_concurrent: usize, delay_between: Duration) -> Self {
        Self {
            // The bound is meaningless at zero; clamp rather than error so
            // a bad API value degrades to strictly serial dialing.
            max_concurrent: max_concurrent.max(1),
            delay_between,
        }
    }
}

/// Drives campaign dispatch. The controller is the only writer of campaign
/// counters.
pub struct CampaignController {
    campaigns: Arc<dyn CampaignStore>,
    runner: Arc<dyn AttemptRunner>,
}

impl CampaignController {
    pub fn new(campaigns: Arc<dyn CampaignStore>, runner: Arc<dyn AttemptRunner>) -> Self {
        Self { campaigns, runner }
    }

    /// Run the dispatch loop for one campaign to completion of the loop
    /// (not of the attempts). Attempt completions keep arriving after this
    /// returns; the campaign is marked completed by whichever attempt
    /// brings `completed_calls` to `total_leads`.
    pub async fn dispatch(
        self: Arc<Self>,
        campaign_id: Uuid,
        lead_ids: Vec<Uuid>,
        limits: DispatchLimits,
    ) {
        let total = lead_ids.len();
        info!(
            campaign_id = %campaign_id,
            leads = total,
            max_concurrent = limits.max_concurrent,
            delay_ms = limits.delay_between.as_millis() as u64,
            "campaign dispatch starting"
        );

        let semaphore = Arc::new(Semaphore::new(limits.max_concurrent));

        for (index, lead_id) in lead_ids.into_iter().enumerate() {
            // Suspend until an in-flight slot frees up. The semaphore is
            // never closed, but a panicked runtime shutdown surfaces here.
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!(campaign_id = %campaign_id, "dispatch semaphore closed, aborting loop");
                    break;
                }
            };

            let controller = self.clone();
            tokio::spawn(async move {
                let outcome = controller.run_guarded(campaign_id, lead_id).await;
                controller.record(campaign_id, outcome).await;
                drop(permit);
            });

            // Pace the next dispatch regardless of how quickly prior
            // attempts complete; skip the pointless trailing sleep.
            if index + 1 < total && !limits.delay_between.is_zero() {
                tokio::time::sleep(limits.delay_between).await;
            }
        }

        info!(campaign_id = %campaign_id, "campaign dispatch loop finished");
    }

    /// Run one attempt with panic isolation: a panicking attempt counts as
    /// a failed call, never as a lost slot.
    async fn run_guarded(&self, campaign_id: Uuid, lead_id: Uuid) -> AttemptOutcome {
        match std::panic::AssertUnwindSafe(self.runner.run(campaign_id, lead_id))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(
                    campaign_id = %campaign_id,
                    lead_id = %lead_id,
                    "call attempt panicked; counting as failure"
                );
                AttemptOutcome::Failure
            }
        }
    }

    /// Fold one attempt completion into the campaign counters.
    async fn record(&self, campaign_id: Uuid, outcome: AttemptOutcome) {
        let successful = matches!(outcome, AttemptOutcome::Success);
        match self.campaigns.record_attempt(campaign_id, successful).await {
            Some(progress) => {
                if progress.just_completed {
                    info!(
                        campaign_id = %campaign_id,
                        completed = progress.completed_calls,
                        successful = progress.successful_calls,
                        "campaign completed"
                    );
                }
            }
            None => {
                warn!(campaign_id = %campaign_id, "attempt completion for unknown campaign");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{Campaign, CampaignStatus, InMemoryCampaignStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runner that tracks the observed in-flight high-water mark.
    struct GaugeRunner {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        duration: Duration,
        panic_on: Option<Uuid>,
    }

    #[async_trait]
    impl AttemptRunner for GaugeRunner {
        async fn run(&self, _campaign_id: Uuid, lead_id: Uuid) -> AttemptOutcome {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(current, Ordering::SeqCst);

            if Some(lead_id) == self.panic_on {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("boom");
            }

            tokio::time::sleep(self.duration).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            AttemptOutcome::Success
        }
    }

    async fn wait_for_completion(store: &InMemoryCampaignStore, id: Uuid) -> Campaign {
        for _ in 0..200 {
            if let Some(campaign) = store.get(id).await
                && campaign.status == CampaignStatus::Completed
            {
                return campaign;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("campaign never completed");
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_bound() {
        let campaigns = Arc::new(InMemoryCampaignStore::new());
        let campaign = Campaign::new(10);
        let id = campaign.id;
        campaigns.insert(campaign).await;

        let runner = Arc::new(GaugeRunner {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            duration: Duration::from_millis(30),
            panic_on: None,
        });

        let controller = Arc::new(CampaignController::new(campaigns.clone(), runner.clone()));
        controller
            .dispatch(
                id,
                (0..10).map(|_| Uuid::new_v4()).collect(),
                DispatchLimits::new(2, Duration::ZERO),
            )
            .await;

        let done = wait_for_completion(&campaigns, id).await;
        assert_eq!(done.completed_calls, 10);
        assert!(
            runner.peak.load(Ordering::SeqCst) <= 2,
            "in-flight peaked at {}",
            runner.peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_panicking_attempt_counts_as_failure() {
        let campaigns = Arc::new(InMemoryCampaignStore::new());
        let campaign = Campaign::new(3);
        let id = campaign.id;
        campaigns.insert(campaign).await;

        let poison = Uuid::new_v4();
        let runner = Arc::new(GaugeRunner {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            duration: Duration::from_millis(5),
            panic_on: Some(poison),
        });

        let controller = Arc::new(CampaignController::new(campaigns.clone(), runner));
        let leads = vec![Uuid::new_v4(), poison, Uuid::new_v4()];
        controller
            .dispatch(id, leads, DispatchLimits::new(2, Duration::ZERO))
            .await;

        let done = wait_for_completion(&campaigns, id).await;
        assert_eq!(done.completed_calls, 3);
        assert_eq!(done.successful_calls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_paces_dispatches() {
        let campaigns = Arc::new(InMemoryCampaignStore::new());
        let campaign = Campaign::new(3);
        let id = campaign.id;
        campaigns.insert(campaign).await;

        let runner = Arc::new(GaugeRunner {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            duration: Duration::ZERO,
            panic_on: None,
        });

        let controller = Arc::new(CampaignController::new(campaigns.clone(), runner));
        let started = tokio::time::Instant::now();
        controller
            .dispatch(
                id,
                (0..3).map(|_| Uuid::new_v4()).collect(),
                DispatchLimits::new(4, Duration::from_secs(2)),
            )
            .await;

        // Two inter-dispatch gaps for three leads.
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[test]
    fn test_limits_clamp_zero_concurrency() {
        let limits = DispatchLimits::new(0, Duration::ZERO);
        assert_eq!(limits.max_concurrent, 1);
    }
}
