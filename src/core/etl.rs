use crate::core::timeout::ProgressTracker;
use crate::core::Pipeline;
use crate::domain::model::{PackageReport, VisaType};
use crate::utils::error::Result;
use crate::utils::monitor::ResourceMonitor;
use chrono::Utc;
use std::time::Duration;
use uuid::Uuid;

/// 依序執行 extract / transform / load 並彙整報告
pub struct PackageEngine<P: Pipeline> {
    pipeline: P,
    timeout: Duration,
    monitor: ResourceMonitor,
}

impl<P: Pipeline> PackageEngine<P> {
    pub fn new(pipeline: P, timeout: Duration) -> Self {
        Self::new_with_monitoring(pipeline, timeout, false)
    }

    pub fn new_with_monitoring(pipeline: P, timeout: Duration, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            timeout,
            monitor: ResourceMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self, id: Uuid, visa_type: VisaType) -> Result<PackageReport> {
        tracing::info!("🚀 Starting package generation {}", id);

        let mut progress = ProgressTracker::new(self.timeout);
        progress.start();
        let mut resource_stats = Vec::new();
        resource_stats.extend(self.monitor.log_phase("start"));

        // Extract
        let intake = self.pipeline.extract(&mut progress).await?;
        tracing::info!("📥 Collected {} documents", intake.documents.len());
        resource_stats.extend(self.monitor.log_phase("extract"));

        // Transform
        let assembly = self.pipeline.transform(intake, &mut progress).await?;
        tracing::info!(
            "🔢 Numbered {} exhibits ({} failed)",
            assembly.exhibits.len(),
            assembly.failed.len()
        );
        resource_stats.extend(self.monitor.log_phase("transform"));

        // Load
        let output = self.pipeline.load(assembly, &mut progress).await?;
        resource_stats.extend(self.monitor.log_phase("load"));

        let elapsed_seconds = progress.timeout().elapsed().as_secs_f64();
        if output.partial {
            tracing::warn!(
                "⚠️ Partial package: {} exhibits, {} skipped",
                output.exhibits.len(),
                output.skipped.len()
            );
        }
        tracing::info!(
            "✅ Package ready in {:.1}s: {}",
            elapsed_seconds,
            output.output_file.display()
        );

        Ok(PackageReport {
            id,
            created_at: Utc::now(),
            visa_type,
            exhibits: output.exhibits,
            skipped: output.skipped,
            total_pages: output.total_pages,
            original_size: output.original_size,
            compressed_size: output.compressed_size,
            output_file: output.output_file,
            manifest_file: output.manifest_file,
            steps: progress.reports(),
            partial: output.partial,
            elapsed_seconds,
            resource_stats,
        })
    }
}
