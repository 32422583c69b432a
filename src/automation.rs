pub mod decision;

use crate::config::AutomationSettings;
use crate::entity::submissions;
use crate::instagram::StoryLookup;
use crate::store::Store;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, Utc};
use decision::Decision;
use serde::Serialize;
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct Counters {
    total_runs: u64,
    total_checked: u64,
    total_verified: u64,
    total_rejected: u64,
    last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationStats {
    pub total_runs: u64,
    pub total_checked: u64,
    pub total_verified: u64,
    pub total_rejected: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub is_running: bool,
    pub check_interval_minutes: f64,
}

/// Result of one pass over the pending submissions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub checked: u64,
    pub verified: u64,
    pub rejected: u64,
    pub still_pending: u64,
    pub errors: u64,
}

pub struct AutomationEngine {
    store: Arc<Store>,
    lookup: Arc<dyn StoryLookup>,
    settings: AutomationSettings,
    counters: RwLock<Counters>,
    check_lock: Mutex<()>,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl AutomationEngine {
    pub fn new(
        store: Arc<Store>,
        lookup: Arc<dyn StoryLookup>,
        settings: AutomationSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            lookup,
            settings,
            counters: RwLock::new(Counters::default()),
            check_lock: Mutex::new(()),
            scheduler: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn lookup(&self) -> &Arc<dyn StoryLookup> {
        &self.lookup
    }

    pub fn auto_verify_confidence(&self) -> i32 {
        self.settings.auto_verify_confidence
    }

    /// Returns false when the engine was already running.
    pub async fn start(self: &Arc<Self>) -> Result<bool> {
        let mut slot = self.scheduler.lock().await;
        if slot.is_some() {
            warn!("Automation already running");
            return Ok(false);
        }

        let scheduler = JobScheduler::new().await?;
        let engine: Weak<Self> = Arc::downgrade(self);
        let job = Job::new_repeated_async(self.settings.check_interval, move |_uuid, _l| {
            let engine = engine.clone();
            Box::pin(async move {
                if let Some(engine) = engine.upgrade() {
                    engine.run_scheduled_check().await;
                }
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        *slot = Some(scheduler);
        drop(slot);

        info!(
            interval_minutes = self.interval_minutes(),
            "Automation engine started"
        );

        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_scheduled_check().await;
        });
        Ok(true)
    }

    /// Returns false when the engine was not running.
    pub async fn stop(&self) -> Result<bool> {
        let Some(mut scheduler) = self.scheduler.lock().await.take() else {
            warn!("Automation not running");
            return Ok(false);
        };
        scheduler.shutdown().await?;
        info!("Automation engine stopped");
        Ok(true)
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    async fn run_scheduled_check(&self) {
        if let Err(e) = self.run_check().await {
            error!("Automation check failed: {:#}", e);
        }
    }

    pub async fn run_check(&self) -> Result<Option<CheckSummary>> {
        self.run_check_for(None).await
    }

    /// One pass over the pending submissions, optionally only those of one
    /// brand. `None` when another pass is still in progress.
    pub async fn run_check_for(&self, business_id: Option<&str>) -> Result<Option<CheckSummary>> {
        let Ok(_guard) = self.check_lock.try_lock() else {
            info!("Previous automation check still running, skipping");
            return Ok(None);
        };

        let run = {
            let mut counters = self.counters.write().await;
            counters.total_runs += 1;
            counters.last_run = Some(Utc::now());
            counters.total_runs
        };
        info!(run, "Running automation check");

        let summary = self.check_pending(business_id).await?;

        {
            let mut counters = self.counters.write().await;
            counters.total_checked += summary.checked;
            counters.total_verified += summary.verified;
            counters.total_rejected += summary.rejected;
        }
        info!(
            checked = summary.checked,
            verified = summary.verified,
            rejected = summary.rejected,
            still_pending = summary.still_pending,
            errors = summary.errors,
            "Check completed"
        );
        Ok(Some(summary))
    }

    /// Checks every pending submission, optionally only those of one brand.
    /// Items run serially with the configured delay between them.
    async fn check_pending(&self, business_id: Option<&str>) -> Result<CheckSummary> {
        let pending = self.store.pending_submissions(business_id).await?;
        if pending.is_empty() {
            info!("No pending submissions to check");
            return Ok(CheckSummary::default());
        }
        info!("Checking {} pending submissions", pending.len());

        let mut summary = CheckSummary::default();
        let total = pending.len();
        for (index, submission) in pending.iter().enumerate() {
            match self.check_submission(submission, Utc::now()).await {
                Ok(decision) => {
                    summary.checked += 1;
                    match decision {
                        Decision::Verified { .. } => summary.verified += 1,
                        Decision::Rejected { .. } => summary.rejected += 1,
                        Decision::Pending { .. } => summary.still_pending += 1,
                    }
                }
                Err(e) => {
                    error!(submission_id = %submission.id, "Error checking submission: {:#}", e);
                    summary.errors += 1;
                }
            }

            if index + 1 < total && !self.settings.item_delay.is_zero() {
                tokio::time::sleep(self.settings.item_delay).await;
            }
        }
        Ok(summary)
    }

    async fn check_submission(
        &self,
        submission: &submissions::Model,
        now: DateTime<Utc>,
    ) -> Result<Decision> {
        let created = DateTime::<Utc>::from_timestamp_micros(submission.created_at_us)
            .unwrap_or(now);
        let age = now - created;
        if age > Duration::hours(self.settings.manual_review_after_hours) {
            let reason = format!(
                "Pending more than {} hours",
                self.settings.manual_review_after_hours
            );
            self.store
                .mark_for_manual_review(&submission.id, Some(&reason))
                .await?;
            warn!(
                submission_id = %submission.id,
                username = %submission.username,
                hours_old = age.num_hours(),
                "Submission marked for manual review"
            );
            return Ok(Decision::Pending { reason });
        }

        let brand = self
            .store
            .brand_by_id(&submission.business_id)
            .await?
            .ok_or_else(|| anyhow!("Business {} not found", submission.business_id))?;

        let result = self
            .lookup
            .search_user_story(&submission.username, &brand.instagram_handle)
            .await?;
        decision::apply(
            &self.store,
            submission,
            &result,
            self.settings.auto_verify_confidence,
        )
        .await
    }

    fn interval_minutes(&self) -> f64 {
        self.settings.check_interval.as_secs_f64() / 60.0
    }

    pub async fn stats(&self) -> AutomationStats {
        let counters = self.counters.read().await.clone();
        AutomationStats {
            total_runs: counters.total_runs,
            total_checked: counters.total_checked,
            total_verified: counters.total_verified,
            total_rejected: counters.total_rejected,
            last_run: counters.last_run,
            is_running: self.is_running().await,
            check_interval_minutes: self.interval_minutes(),
        }
    }

    pub async fn reset_stats(&self) {
        *self.counters.write().await = Counters::default();
        info!("Automation stats reset");
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::{FakeLookup, quick_settings};
    use super::*;
    use crate::instagram::StoryResult;
    use crate::store::test_store;

    fn tagged(views: i64) -> StoryResult {
        StoryResult::Tagged {
            story_id: "s".to_string(),
            views,
            timestamp: None,
            url: None,
        }
    }

    #[tokio::test]
    async fn check_applies_decisions_and_updates_stats() {
        let (_dir, store) = test_store().await;
        let brand = store.insert_brand("Cafe", "cafe.tlv", None).await.unwrap();
        let now = Utc::now();
        for user in ["tagged", "untagged", "absent", "broken"] {
            store.insert_submission(&brand.id, user, None, now).await.unwrap();
        }
        store
            .insert_submission(&brand.id, "old", None, now - Duration::hours(30))
            .await
            .unwrap();

        let mut lookup = FakeLookup::with(&[("tagged", tagged(50)), ("untagged", StoryResult::Untagged)]);
        lookup.failing.push("broken".to_string());
        let lookup = Arc::new(lookup);
        let engine = AutomationEngine::new(store.clone(), lookup.clone(), quick_settings());

        let summary = engine.run_check().await.unwrap().unwrap();
        assert_eq!(
            summary,
            CheckSummary {
                checked: 4,
                verified: 1,
                rejected: 1,
                still_pending: 2,
                errors: 1,
            }
        );

        // The stale submission never reaches the lookup.
        let looked_up: Vec<String> = lookup.calls.lock().unwrap().iter().map(|c| c.0.clone()).collect();
        assert!(!looked_up.contains(&"old".to_string()));
        assert!(lookup.calls.lock().unwrap().iter().all(|c| c.1 == "cafe.tlv"));

        let pending = store.pending_submissions(None).await.unwrap();
        let mut users: Vec<&str> = pending.iter().map(|s| s.username.as_str()).collect();
        users.sort();
        assert_eq!(users, vec!["absent", "broken"]);

        let stats = engine.stats().await;
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.total_checked, 4);
        assert_eq!(stats.total_verified, 1);
        assert_eq!(stats.total_rejected, 1);
        assert!(stats.last_run.is_some());
        assert!(!stats.is_running);
        assert_eq!(stats.check_interval_minutes, 5.0);

        engine.reset_stats().await;
        assert_eq!(engine.stats().await.total_runs, 0);
    }

    #[tokio::test]
    async fn missing_brand_counts_as_error() {
        let (_dir, store) = test_store().await;
        store
            .insert_submission("no-such-brand", "noa", None, Utc::now())
            .await
            .unwrap();
        let engine = AutomationEngine::new(store, Arc::new(FakeLookup::default()), quick_settings());

        let summary = engine.run_check().await.unwrap().unwrap();
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.checked, 0);
    }

    #[tokio::test]
    async fn overlapping_checks_are_skipped() {
        let (_dir, store) = test_store().await;
        let engine = AutomationEngine::new(store, Arc::new(FakeLookup::default()), quick_settings());

        let _held = engine.check_lock.lock().await;
        assert!(engine.run_check().await.unwrap().is_none());
        assert!(engine.run_check_for(Some("any-brand")).await.unwrap().is_none());
        assert_eq!(engine.stats().await.total_runs, 0);
    }

    #[tokio::test]
    async fn start_and_stop_are_idempotent() {
        let (_dir, store) = test_store().await;
        let engine = AutomationEngine::new(store, Arc::new(FakeLookup::default()), quick_settings());

        assert!(engine.start().await.unwrap());
        assert!(!engine.start().await.unwrap());
        assert!(engine.stats().await.is_running);

        assert!(engine.stop().await.unwrap());
        assert!(!engine.stop().await.unwrap());
        assert!(!engine.is_running().await);
    }
}
