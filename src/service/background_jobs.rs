// service/background_jobs.rs
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::{sleep, Duration};

use crate::AppState;

/// Refills every customer's support-time balance at each UTC midnight.
pub async fn start_daily_reset_job(app_state: Arc<AppState>) {
    loop {
        let wait = duration_until_next_midnight(Utc::now());
        tracing::info!("Next support time reset in {}s", wait.as_secs());
        sleep(wait).await;

        tracing::info!("Running support time reset job at {}", Utc::now());

        match app_state
            .support_time
            .reset_daily_allowance(app_state.env.daily_support_seconds)
            .await
        {
            Ok(count) => tracing::info!("Support time reset completed for {} customers", count),
            Err(e) => tracing::error!("Support time reset failed: {}", e),
        }
    }
}

pub fn duration_until_next_midnight(now: DateTime<Utc>) -> Duration {
    let next_midnight = (now.date_naive() + ChronoDuration::days(1))
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now + ChronoDuration::days(1));

    (next_midnight - now)
        .to_std()
        .unwrap_or(Duration::from_secs(1))
        .max(Duration::from_secs(1))
}
