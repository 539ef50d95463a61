use crate::utils::error::{ExhibitError, Result};
use std::time::Duration;

pub const HEALTH_PATH: &str = "/_stcore/health";
pub const DEFAULT_HEALTH_URL: &str = "http://localhost:8080/_stcore/health";

/// 對健康檢查端點發出 GET，非 2xx 視為失敗
pub async fn probe_health(url: &str, timeout: Duration) -> Result<()> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ExhibitError::processing(format!(
            "Health check returned HTTP {}",
            status.as_u16()
        )));
    }

    tracing::debug!("✅ Health check passed: {}", url);
    Ok(())
}
