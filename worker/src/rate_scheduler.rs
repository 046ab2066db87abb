//! Daily exchange-rate scheduler (spec §4.5, C2). A single cooperative
//! timer loop grounded on the teacher's
//! `lexe-ln/src/background_processor.rs`: one task, `tokio::select!`
//! between the next scheduled fire and the shutdown signal, no spawned
//! sub-tasks per tick.

use std::sync::Arc;

use chrono::{NaiveTime, TimeZone, Utc};
use creditscan_core::error::CoreResult;
use creditscan_core::model::{CurrencyPair, ExchangeRate};
use creditscan_store::Pool;
use rt::Shutdown;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::collaborators::RateHtmlSource;

pub struct RateScheduler {
    pool: Pool,
    rate_html_source: Arc<dyn RateHtmlSource>,
    fire_hour_utc: u32,
    fire_minute_utc: u32,
}

impl RateScheduler {
    pub fn new(pool: Pool, rate_html_source: Arc<dyn RateHtmlSource>, fire_hour_utc: u32, fire_minute_utc: u32) -> Self {
        Self { pool, rate_html_source, fire_hour_utc, fire_minute_utc }
    }

    /// Runs until `shutdown` fires. The in-flight run (if any) is allowed
    /// to finish, or is itself cancelled at its own suspension point (the
    /// HTTP call inside `run_once`) - spec §4.5.
    #[instrument(skip_all, name = "[rate scheduler]")]
    pub async fn run(&self, mut shutdown: Shutdown) {
        loop {
            let next_fire = self.next_fire_instant();
            tokio::select! {
                biased;
                () = shutdown.recv() => {
                    info!("shutdown received, exiting");
                    return;
                }
                () = tokio::time::sleep_until(next_fire) => {}
            }

            tokio::select! {
                biased;
                () = shutdown.recv() => {
                    info!("shutdown received mid-run, exiting");
                    return;
                }
                result = self.run_once() => {
                    if let Err(err) = result {
                        error!(%err, "rate extraction run failed, will retry at next scheduled fire");
                    }
                }
            }
        }
    }

    /// The same upsert path the timer loop uses, exposed for a
    /// privileged caller to request an immediate extraction (spec §4.5's
    /// "manual-trigger contract").
    #[instrument(skip(self))]
    pub async fn trigger_now(&self, date: chrono::NaiveDate) -> CoreResult<()> {
        self.fetch_and_upsert(date).await
    }

    async fn run_once(&self) -> CoreResult<()> {
        let today = Utc::now().date_naive();
        self.fetch_and_upsert(today).await
    }

    async fn fetch_and_upsert(&self, date: chrono::NaiveDate) -> CoreResult<()> {
        let quote = self
            .rate_html_source
            .fetch(date)
            .await
            .map_err(|err| creditscan_core::error::CoreError::Storage { source: err.into() })?;
        let rate = ExchangeRate { pair: CurrencyPair::USD_ARS, rate_date: date, quote };
        creditscan_store::rates::upsert(&self.pool, &rate).await?;
        info!(%date, "upserted daily rate quote");
        Ok(())
    }

    fn next_fire_instant(&self) -> Instant {
        let now = Utc::now();
        let target_time = NaiveTime::from_hms_opt(self.fire_hour_utc, self.fire_minute_utc, 0)
            .expect("fire_hour_utc/fire_minute_utc validated by config parsing");
        let today_fire = Utc.from_utc_datetime(&now.date_naive().and_time(target_time));
        let next_fire = if today_fire > now { today_fire } else { today_fire + chrono::Duration::days(1) };
        let delay = (next_fire - now).to_std().unwrap_or(std::time::Duration::ZERO);
        Instant::now() + delay
    }
}
