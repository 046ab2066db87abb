//! The external collaborators named in spec §6 ("Outbound"): the blob
//! store, the extraction model, the daily rate-HTML source, and the live
//! conversion-rate client. The core/job runner only depend on these traits;
//! concrete HTTP/object-store implementations are an outer concern this
//! workspace stubs with a `reqwest`-backed client plus fakes for tests,
//! mirroring the teacher's collaborator fakes under
//! `node/src/command/test/mock_*.rs`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use creditscan_core::ids::CardId;
use creditscan_core::model::{Currency, NewTransaction, Quote, StatementStatus};
use creditscan_core::Money;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("blob not found at {path}")]
    BlobNotFound { path: String },
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// The statement fields an extractor can produce without any caller
/// context - it never sees a `user_id`/`card_id`/`source_file_path`, those
/// are stitched on by the job runner from the job row (spec §4.3 step 6).
#[derive(Clone, Debug, Deserialize)]
pub struct ExtractedStatement {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub previous_balance: Option<Decimal>,
    pub current_balance: Option<Decimal>,
    pub minimum_payment: Option<Decimal>,
    pub currency: Currency,
    pub status: StatementStatus,
    pub is_fully_paid: bool,
}

/// `Extractor::extract`'s result, re-architected per spec §9's redesign flag
/// away from a duck-typed structure into an exhaustively-handled variant.
pub enum ExtractionResult {
    /// A complete statement with all of its transactions.
    Full {
        statement: ExtractedStatement,
        transactions: Vec<NewTransaction>,
        card_limit: Option<(Decimal, Currency)>,
    },
    /// A statement and at least one transaction, but some required
    /// sub-structure (e.g. the closing balance) is missing.
    Partial {
        statement: ExtractedStatement,
        transactions: Vec<NewTransaction>,
        reason: String,
    },
    /// Nothing usable could be extracted.
    Empty { reason: String },
}

/// Byte-addressable object storage for uploaded statement PDFs. Read-only
/// from this subsystem's perspective after the initial upload (spec §5).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), CollaboratorError>;
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CollaboratorError>;
}

/// The LLM extraction service, consumed as a pure function `bytes ->
/// ExtractionResult` (spec §1). `model` distinguishes the primary call from
/// the fallback retry (spec §4.3 step 3).
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, card_id: CardId, bytes: &[u8], model: ExtractorModel) -> Result<ExtractionResult, CollaboratorError>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ExtractorModel {
    Primary,
    Fallback,
}

/// The daily exchange-rate scraping HTTP client (C2's collaborator). Scoped
/// to the one pair this system converts (spec §3): a fetch returns the
/// `(buy, sell)` quote for `date`, not a basket of pairs.
#[async_trait]
pub trait RateHtmlSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<Quote, CollaboratorError>;
}

/// The live HTTP conversion client used only at import time for absolute
/// limit conversion (C4).
#[async_trait]
pub trait LiveRateClient: Send + Sync {
    async fn convert(&self, amount: Money, from: Currency, to: Currency) -> Result<Decimal, CollaboratorError>;
}

/// A `reqwest`-backed [`LiveRateClient`] that calls a configured base URL's
/// `/convert` endpoint.
pub struct HttpLiveRateClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLiveRateClient {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[derive(serde::Deserialize)]
struct ConvertResponse {
    rate: Decimal,
}

#[async_trait]
impl LiveRateClient for HttpLiveRateClient {
    async fn convert(&self, amount: Money, from: Currency, to: Currency) -> Result<Decimal, CollaboratorError> {
        let url = format!("{}/convert", self.base_url);
        let response: ConvertResponse = self
            .client
            .get(&url)
            .query(&[
                ("amount", amount.as_decimal().to_string()),
                ("from", from.to_string()),
                ("to", to.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.rate)
    }
}

/// A `reqwest`-backed [`RateHtmlSource`] that scrapes a configured base
/// URL's daily quote page and parses its embedded JSON payload.
pub struct HttpRateHtmlSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRateHtmlSource {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl RateHtmlSource for HttpRateHtmlSource {
    async fn fetch(&self, date: NaiveDate) -> Result<Quote, CollaboratorError> {
        let url = format!("{}/rates/{}", self.base_url, date.format("%Y-%m-%d"));
        let quote: Quote = self.client.get(&url).send().await?.error_for_status()?.json().await?;
        Ok(quote)
    }
}

/// A filesystem-backed [`BlobStore`] rooted at a configured directory.
/// `path` is always treated as a bare file name relative to that root - no
/// `..`/absolute-path component is honored - so a job's `file_path` can't
/// escape the root.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let name = Path::new(path)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(path));
        self.root.join(name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), CollaboratorError> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.resolve(path), bytes).await?;
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, CollaboratorError> {
        match tokio::fs::read(self.resolve(path)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// A `reqwest`-backed [`Extractor`] that posts the statement bytes to a
/// configured extraction-model endpoint and parses its JSON response.
pub struct HttpExtractor {
    client: reqwest::Client,
    base_url: String,
    primary_model: String,
    fallback_model: String,
}

impl HttpExtractor {
    pub fn new(base_url: String, primary_model: String, fallback_model: String) -> Self {
        Self { client: reqwest::Client::new(), base_url, primary_model, fallback_model }
    }

    fn model_name(&self, model: ExtractorModel) -> &str {
        match model {
            ExtractorModel::Primary => &self.primary_model,
            ExtractorModel::Fallback => &self.fallback_model,
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ExtractionWireResult {
    Full {
        statement: ExtractedStatement,
        transactions: Vec<NewTransaction>,
        card_limit: Option<(Decimal, Currency)>,
    },
    Partial {
        statement: ExtractedStatement,
        transactions: Vec<NewTransaction>,
        reason: String,
    },
    Empty {
        reason: String,
    },
}

impl From<ExtractionWireResult> for ExtractionResult {
    fn from(wire: ExtractionWireResult) -> Self {
        match wire {
            ExtractionWireResult::Full { statement, transactions, card_limit } => {
                ExtractionResult::Full { statement, transactions, card_limit }
            }
            ExtractionWireResult::Partial { statement, transactions, reason } => {
                ExtractionResult::Partial { statement, transactions, reason }
            }
            ExtractionWireResult::Empty { reason } => ExtractionResult::Empty { reason },
        }
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    async fn extract(&self, card_id: CardId, bytes: &[u8], model: ExtractorModel) -> Result<ExtractionResult, CollaboratorError> {
        let url = format!("{}/extract", self.base_url);
        let wire: ExtractionWireResult = self
            .client
            .post(&url)
            .query(&[("model", self.model_name(model).to_owned()), ("card_id", card_id.as_uuid().to_string())])
            .body(bytes.to_vec())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(wire.into())
    }
}
