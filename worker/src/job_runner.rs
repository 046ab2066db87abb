//! Per-job orchestration (spec §4.3, C7): fetch the blob, call the
//! extractor, convert currencies, invoke the atomic importer, apply rules,
//! land the terminal state. Grounded on the teacher's
//! `lexe-ln/src/background_processor.rs` for the "suspension points between
//! cancellable steps" shape, generalized from a single timer loop into a
//! linear pipeline with an early-exit at every step.

use std::sync::Arc;
use std::time::Duration;

use creditscan_core::error::{CoreError, CoreResult};
use creditscan_core::ids::JobId;
use creditscan_core::model::JobStatus;
use creditscan_core::Currency;
use creditscan_store::importer::{self, ImportInput};
use creditscan_store::Pool;
use rt::Shutdown;
use tracing::{info, instrument, warn};

use crate::collaborators::{BlobStore, CollaboratorError, ExtractionResult, Extractor, ExtractorModel, LiveRateClient};
use crate::rule_applier::{self, Scope};

/// The backoff steps tried within step 1's visibility bound (spec §4.3 step
/// 1: "no more than a few attempts totalling under one second" by default).
/// Scaled down if the configured bound is tighter than their sum.
const VISIBILITY_RETRY_STEPS: [Duration; 4] = [
    Duration::from_millis(25),
    Duration::from_millis(75),
    Duration::from_millis(200),
    Duration::from_millis(500),
];

pub struct JobRunner {
    pool: Pool,
    blob_store: Arc<dyn BlobStore>,
    extractor: Arc<dyn Extractor>,
    live_rate_client: Arc<dyn LiveRateClient>,
    visibility_timeout: Duration,
}

impl JobRunner {
    pub fn new(
        pool: Pool,
        blob_store: Arc<dyn BlobStore>,
        extractor: Arc<dyn Extractor>,
        live_rate_client: Arc<dyn LiveRateClient>,
        visibility_timeout: Duration,
    ) -> Self {
        Self { pool, blob_store, extractor, live_rate_client, visibility_timeout }
    }

    /// Runs one job to a terminal state, or leaves it non-terminal if
    /// cancelled or if step 1's visibility bound is exceeded. Never panics
    /// on a collaborator failure; every failure path is a classified
    /// terminal transition instead.
    #[instrument(skip(self, shutdown), fields(job_id = %job_id))]
    pub async fn run(&self, job_id: JobId, mut shutdown: Shutdown) {
        if let Err(err) = self.run_inner(job_id, &mut shutdown).await {
            warn!(%err, "job runner gave up without reaching a terminal state");
        }
    }

    async fn run_inner(&self, job_id: JobId, shutdown: &mut Shutdown) -> CoreResult<()> {
        // Step 1: PENDING -> PROCESSING, with a bounded read-after-write
        // retry for the case where our own transition raced the job's
        // insert becoming visible.
        let job = match self.begin_processing(job_id).await? {
            Some(job) => job,
            None => {
                warn!("gave up waiting for job to become visible; crash resumption will retry it");
                return Ok(());
            }
        };

        if shutdown.try_recv() {
            return Ok(());
        }

        // Step 2: fetch the blob.
        let bytes = match self.blob_store.get(&job.file_path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return self.fail(job_id, CoreError::BlobUnavailable).await,
            Err(err) => return self.fail(job_id, collaborator_to_storage(err)).await,
        };

        if shutdown.try_recv() {
            return Ok(());
        }

        // Step 3: call the extractor, primary then fallback.
        let extraction = match self.extractor.extract(job.card_id, &bytes, ExtractorModel::Primary).await {
            Ok(result) => result,
            Err(primary_err) => {
                creditscan_store::jobs::increment_retry(&self.pool, job_id).await?;
                warn!(%primary_err, "primary extraction failed, trying fallback model");
                match self.extractor.extract(job.card_id, &bytes, ExtractorModel::Fallback).await {
                    Ok(result) => result,
                    Err(fallback_err) => {
                        return self
                            .fail(job_id, CoreError::ExtractionFailed { reason: fallback_err.to_string() })
                            .await
                    }
                }
            }
        };

        if shutdown.try_recv() {
            return Ok(());
        }

        // Step 4/5/6: partition, convert, import.
        let (extracted_statement, transactions, card_limit, mut demote_to_partial) = match extraction {
            ExtractionResult::Empty { reason } => {
                return self.fail(job_id, CoreError::ExtractionFailed { reason }).await
            }
            ExtractionResult::Full { statement, transactions, card_limit } => {
                (statement, transactions, card_limit, false)
            }
            ExtractionResult::Partial { statement, transactions, reason: _ } => {
                (statement, transactions, None, true)
            }
        };
        let statement = creditscan_core::model::NewCardStatement {
            card_id: job.card_id,
            user_id: job.user_id,
            period_start: extracted_statement.period_start,
            period_end: extracted_statement.period_end,
            close_date: extracted_statement.close_date,
            due_date: extracted_statement.due_date,
            previous_balance: extracted_statement.previous_balance.map(creditscan_core::Money::new),
            current_balance: extracted_statement.current_balance.map(creditscan_core::Money::new),
            minimum_payment: extracted_statement.minimum_payment.map(creditscan_core::Money::new),
            currency: extracted_statement.currency,
            status: extracted_statement.status,
            is_fully_paid: extracted_statement.is_fully_paid,
            source_file_path: Some(job.file_path.clone()),
        };

        let new_limit_in_card_currency = match card_limit {
            Some((amount, currency)) => match self.convert_card_limit(&statement, amount, currency).await {
                Ok(converted) => Some(converted),
                Err(err) => {
                    warn!(%err, "card limit conversion failed, demoting to partial");
                    demote_to_partial = true;
                    None
                }
            },
            None => None,
        };

        if shutdown.try_recv() {
            return Ok(());
        }

        let import_result = importer::atomic_import(
            &self.pool,
            ImportInput { statement, transactions, new_limit_in_card_currency },
        )
        .await;

        let import = match import_result {
            Ok(output) => output,
            Err(err) => return self.fail(job_id, err).await,
        };

        // Step 7: best-effort rule application. Never blocks the terminal
        // transition below.
        if !shutdown.try_recv() {
            match rule_applier::apply(&self.pool, job.user_id, Scope::TransactionIds(import.transaction_ids.clone())).await {
                Ok(summary) => info!(
                    transactions_processed = summary.transactions_processed,
                    tags_applied = summary.tags_applied,
                    "rule application finished"
                ),
                Err(err) => warn!(%err, "rule application failed, import stands regardless"),
            }
        }

        // Step 8: terminal transition.
        let to = if demote_to_partial { JobStatus::Partial } else { JobStatus::Completed };
        creditscan_store::jobs::transition(&self.pool, job_id, JobStatus::Processing, to, Some(import.statement_id), None)
            .await?;
        Ok(())
    }

    async fn begin_processing(&self, job_id: JobId) -> CoreResult<Option<creditscan_core::model::UploadJob>> {
        let deadline = tokio::time::Instant::now() + self.visibility_timeout;
        for delay in VISIBILITY_RETRY_STEPS {
            match creditscan_store::jobs::transition(&self.pool, job_id, JobStatus::Pending, JobStatus::Processing, None, None)
                .await
            {
                Ok(true) => return creditscan_store::jobs::get(&self.pool, job_id).await.map(Some),
                Ok(false) | Err(CoreError::NotFound) => {
                    if tokio::time::Instant::now() >= deadline {
                        break;
                    }
                    tokio::time::sleep(delay.min(deadline.saturating_duration_since(tokio::time::Instant::now()))).await;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    async fn convert_card_limit(
        &self,
        statement: &creditscan_core::model::NewCardStatement,
        amount: rust_decimal::Decimal,
        from: Currency,
    ) -> CoreResult<(creditscan_core::Money, Currency)> {
        let to = statement.currency;
        let money = creditscan_core::Money::new(amount);
        if from == to {
            return Ok((money, to));
        }
        let rate = self
            .live_rate_client
            .convert(money, from, to)
            .await
            .map_err(|_| CoreError::RateNotFound)?;
        let converted = money
            .checked_mul_rate(rate)
            .ok_or(CoreError::RateNotFound)?;
        Ok((converted, to))
    }

    async fn fail(&self, job_id: JobId, err: CoreError) -> CoreResult<()> {
        let sanitized = err.sanitize();
        warn!(%err, "job failed");
        creditscan_store::jobs::transition(
            &self.pool,
            job_id,
            JobStatus::Processing,
            JobStatus::Failed,
            None,
            Some(&sanitized.into_string()),
        )
        .await?;
        Ok(())
    }
}

fn collaborator_to_storage(err: CollaboratorError) -> CoreError {
    CoreError::Storage { source: anyhow::anyhow!(err) }
}
