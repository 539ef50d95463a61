use crate::domain::model::{StepReport, StepStatus};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::time::{Duration, Instant};

/// 產生套件的標準步驟
pub const PACKAGE_STEPS: [&str; 6] = ["extract", "compress", "number", "toc", "merge", "finalize"];

const CRITICAL_MARGIN: Duration = Duration::from_secs(30);
const WARNING_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct Checkpoint {
    pub label: String,
    pub elapsed_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeoutStatus {
    pub elapsed_seconds: f64,
    pub remaining_seconds: f64,
    pub completed_items: usize,
    pub should_wrap_up: bool,
    pub is_critical: bool,
    pub is_expired: bool,
    pub percent_complete: f64,
}

/// 追蹤總時限，接近上限時提早收尾而不是直接失敗
#[derive(Debug, Clone)]
pub struct TimeoutManager {
    max: Duration,
    warning_at: Duration,
    critical_at: Duration,
    started: Option<Instant>,
    checkpoints: Vec<Checkpoint>,
}

impl TimeoutManager {
    pub fn new(max: Duration) -> Self {
        Self::with_thresholds(max, max.saturating_sub(WARNING_MARGIN), None)
    }

    /// critical_at 未指定時為 max - 30s
    pub fn with_thresholds(max: Duration, warning_at: Duration, critical_at: Option<Duration>) -> Self {
        Self {
            max,
            warning_at,
            critical_at: critical_at.unwrap_or_else(|| max.saturating_sub(CRITICAL_MARGIN)),
            started: None,
            checkpoints: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.checkpoints.clear();
        tracing::info!("⏱️ Timeout timer started: {}s limit", self.max.as_secs());
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    pub fn remaining(&self) -> Duration {
        self.max.saturating_sub(self.elapsed())
    }

    pub fn should_wrap_up(&self) -> bool {
        self.elapsed() >= self.warning_at
    }

    pub fn is_critical(&self) -> bool {
        self.elapsed() >= self.critical_at
    }

    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.max
    }

    pub fn checkpoint(&mut self, label: impl Into<String>) {
        let checkpoint = Checkpoint {
            label: label.into(),
            elapsed_seconds: self.elapsed().as_secs_f64(),
            timestamp: Utc::now(),
        };
        self.checkpoints.push(checkpoint);
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// 已完成項目 (依完成順序)
    pub fn partial_output(&self) -> Vec<&str> {
        self.checkpoints.iter().map(|c| c.label.as_str()).collect()
    }

    pub fn status(&self) -> TimeoutStatus {
        let elapsed = self.elapsed().as_secs_f64();
        let max = self.max.as_secs_f64();
        TimeoutStatus {
            elapsed_seconds: elapsed,
            remaining_seconds: self.remaining().as_secs_f64(),
            completed_items: self.checkpoints.len(),
            should_wrap_up: self.should_wrap_up(),
            is_critical: self.is_critical(),
            is_expired: self.is_expired(),
            percent_complete: if max > 0.0 { elapsed / max * 100.0 } else { 100.0 },
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchFailure<T> {
    pub item: T,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct TimedBatch<T, R> {
    pub processed: Vec<(T, R)>,
    pub failed: Vec<BatchFailure<T>>,
    pub skipped: Vec<T>,
    pub partial: bool,
    pub elapsed_seconds: f64,
    pub status: TimeoutStatus,
}

impl<T, R> TimedBatch<T, R> {
    pub fn total_items(&self) -> usize {
        self.processed.len() + self.failed.len() + self.skipped.len()
    }
}

/// 逐項處理，時間到 critical 點時跳過剩餘項目並回傳部分結果
pub async fn process_with_timeout<T, R, F, Fut>(items: Vec<T>, max: Duration, mut f: F) -> TimedBatch<T, R>
where
    T: Clone,
    F: FnMut(usize, T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let mut timeout = TimeoutManager::new(max);
    timeout.start();

    let total = items.len();
    let mut processed = Vec::new();
    let mut failed = Vec::new();
    let mut skipped = Vec::new();

    let mut queue = items.into_iter().enumerate();
    while let Some((index, item)) = queue.next() {
        if timeout.is_critical() {
            tracing::warn!(
                "⚠️ Time limit reached. Processed {} of {} items.",
                processed.len(),
                total
            );
            skipped.push(item);
            skipped.extend(queue.by_ref().map(|(_, rest)| rest));
            break;
        }

        if timeout.should_wrap_up() {
            tracing::warn!(
                "⚠️ Approaching time limit ({:.0}s remaining). Wrapping up...",
                timeout.remaining().as_secs_f64()
            );
        }

        tracing::debug!("Processing item {}/{}", index + 1, total);
        match f(index, item.clone()).await {
            Ok(result) => {
                processed.push((item, result));
                timeout.checkpoint(format!("item-{}", index + 1));
            }
            Err(e) => {
                tracing::warn!("❌ Failed to process item {}: {}", index + 1, e);
                failed.push(BatchFailure {
                    item,
                    error: e.to_string(),
                });
            }
        }
    }

    let partial = !skipped.is_empty();
    let elapsed_seconds = timeout.elapsed().as_secs_f64();
    if partial {
        tracing::warn!("⚠️ Partial output: {}/{} items completed", processed.len(), total);
    } else {
        tracing::info!(
            "✅ Complete: {}/{} items processed in {:.1}s",
            processed.len(),
            total,
            elapsed_seconds
        );
    }

    TimedBatch {
        processed,
        failed,
        skipped,
        partial,
        elapsed_seconds,
        status: timeout.status(),
    }
}

#[derive(Debug, Clone)]
struct StepState {
    name: String,
    status: StepStatus,
    progress: f64,
    error_message: Option<String>,
}

/// 多步驟進度追蹤
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    steps: Vec<StepState>,
    timeout: TimeoutManager,
}

impl ProgressTracker {
    pub fn new(max: Duration) -> Self {
        Self::with_steps(&PACKAGE_STEPS, max)
    }

    pub fn with_steps(steps: &[&str], max: Duration) -> Self {
        Self {
            steps: steps
                .iter()
                .map(|name| StepState {
                    name: name.to_string(),
                    status: StepStatus::Pending,
                    progress: 0.0,
                    error_message: None,
                })
                .collect(),
            timeout: TimeoutManager::new(max),
        }
    }

    pub fn start(&mut self) {
        self.timeout.start();
    }

    fn step_mut(&mut self, name: &str) -> Option<&mut StepState> {
        self.steps.iter_mut().find(|s| s.name == name)
    }

    pub fn begin(&mut self, name: &str) {
        if let Some(step) = self.step_mut(name) {
            step.status = StepStatus::Running;
            tracing::info!("▶️ Starting step: {}", name);
        }
    }

    pub fn update(&mut self, name: &str, percent: f64) {
        if let Some(step) = self.step_mut(name) {
            step.progress = percent.clamp(0.0, 100.0);
        }
    }

    pub fn complete(&mut self, name: &str) {
        if let Some(step) = self.step_mut(name) {
            step.status = StepStatus::Completed;
            step.progress = 100.0;
            tracing::info!("✅ Completed step: {}", name);
        }
    }

    pub fn fail(&mut self, name: &str, error: impl Into<String>) {
        let error = error.into();
        if let Some(step) = self.step_mut(name) {
            tracing::error!("❌ Failed step {}: {}", name, error);
            step.status = StepStatus::Failed;
            step.error_message = Some(error);
        }
    }

    /// 所有步驟的平均進度
    pub fn overall_progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 100.0;
        }
        self.steps.iter().map(|s| s.progress).sum::<f64>() / self.steps.len() as f64
    }

    pub fn should_abort(&self) -> bool {
        self.timeout.is_critical()
    }

    pub fn timeout(&self) -> &TimeoutManager {
        &self.timeout
    }

    /// 剩餘可用時間，交給 process_with_timeout
    pub fn remaining(&self) -> Duration {
        self.timeout.remaining()
    }

    pub fn reports(&self) -> Vec<StepReport> {
        self.steps
            .iter()
            .map(|s| StepReport {
                name: s.name.clone(),
                status: s.status,
                progress: s.progress,
                error_message: s.error_message.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ExhibitError;

    #[test]
    fn test_manager_thresholds() {
        let mut manager = TimeoutManager::new(Duration::from_secs(300));
        manager.start();

        assert!(!manager.should_wrap_up());
        assert!(!manager.is_critical());
        assert!(!manager.is_expired());
        assert!(manager.remaining() <= Duration::from_secs(300));

        manager.checkpoint("award.pdf");
        assert_eq!(manager.partial_output(), vec!["award.pdf"]);
        assert_eq!(manager.status().completed_items, 1);
    }

    #[test]
    fn test_zero_budget_is_immediately_critical() {
        let mut manager = TimeoutManager::new(Duration::ZERO);
        manager.start();
        assert!(manager.is_critical());
        assert!(manager.is_expired());
        assert_eq!(manager.remaining(), Duration::ZERO);
        assert_eq!(manager.status().percent_complete, 100.0);
    }

    #[tokio::test]
    async fn test_process_collects_failures() {
        let items = vec![1, 2, 3, 4];
        let batch = process_with_timeout(items, Duration::from_secs(300), |_, n| async move {
            if n % 2 == 0 {
                Err(ExhibitError::processing(format!("even {}", n)))
            } else {
                Ok(n * 10)
            }
        })
        .await;

        assert_eq!(batch.processed, vec![(1, 10), (3, 30)]);
        assert_eq!(batch.failed.len(), 2);
        assert!(batch.failed[0].error.contains("even 2"));
        assert!(batch.skipped.is_empty());
        assert!(!batch.partial);
        assert_eq!(batch.total_items(), 4);
    }

    #[tokio::test]
    async fn test_zero_budget_skips_everything() {
        let batch = process_with_timeout(vec!["a", "b"], Duration::ZERO, |_, s| async move {
            Ok::<_, ExhibitError>(s.len())
        })
        .await;

        assert!(batch.processed.is_empty());
        assert_eq!(batch.skipped, vec!["a", "b"]);
        assert!(batch.partial);
    }

    #[test]
    fn test_warning_before_critical() {
        let mut manager =
            TimeoutManager::with_thresholds(Duration::from_secs(10), Duration::ZERO, Some(Duration::from_secs(5)));
        manager.start();

        let status = manager.status();
        assert!(status.should_wrap_up);
        assert!(!status.is_critical);
        assert!(!status.is_expired);
    }

    #[tokio::test]
    async fn test_slow_item_crosses_critical_point() {
        // 31s 上限：warning 在 0s，critical 在 1s
        let batch = process_with_timeout(vec!["award", "press", "salary"], Duration::from_secs(31), |index, s| async move {
            if index == 0 {
                tokio::time::sleep(Duration::from_millis(1100)).await;
            }
            Ok::<_, ExhibitError>(s.len())
        })
        .await;

        assert_eq!(batch.processed, vec![("award", 5)]);
        assert_eq!(batch.skipped, vec!["press", "salary"]);
        assert!(batch.failed.is_empty());
        assert!(batch.partial);
        assert_eq!(batch.total_items(), 3);
        assert!(batch.status.should_wrap_up);
        assert!(batch.status.is_critical);
        assert!(!batch.status.is_expired);
        assert_eq!(batch.status.completed_items, 1);
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::new(Duration::from_secs(300));
        tracker.start();

        tracker.begin("extract");
        tracker.complete("extract");
        tracker.update("compress", 150.0);
        tracker.fail("merge", "bad page tree");
        tracker.begin("unknown");

        let reports = tracker.reports();
        assert_eq!(reports.len(), 6);
        assert_eq!(reports[0].status, StepStatus::Completed);
        assert_eq!(reports[1].progress, 100.0);
        assert_eq!(reports[4].status, StepStatus::Failed);
        assert_eq!(reports[4].error_message.as_deref(), Some("bad page tree"));
        assert!((tracker.overall_progress() - 200.0 / 6.0).abs() < 1e-9);
        assert!(!tracker.should_abort());
    }
}
