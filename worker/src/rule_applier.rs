//! Rule application (spec §4.8, C11): resolves a scope to a transaction
//! set, evaluates every active rule against every transaction, and attaches
//! tags for matches. Best-effort by design - the job runner never lets a
//! failure here flip a terminal state (spec §4.3 step 7).

use creditscan_core::error::CoreResult;
use creditscan_core::ids::{StatementId, TagId, TransactionId, UserId};
use creditscan_core::model::RuleActionType;
use creditscan_core::rules::evaluate_rule;
use creditscan_store::Pool;
use tracing::instrument;

/// Which transactions a run targets. Precedence when a caller has more than
/// one candidate on hand is `TransactionIds` > `StatementId` > `AllOwned`;
/// that resolution happens before constructing this enum; the only
/// guarantee here is that each variant maps to exactly one query.
pub enum Scope {
    AllOwned,
    StatementId(StatementId),
    TransactionIds(Vec<TransactionId>),
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ApplySummary {
    pub transactions_processed: usize,
    pub tags_applied: usize,
}

#[instrument(skip(pool))]
pub async fn apply(pool: &Pool, user_id: UserId, scope: Scope) -> CoreResult<ApplySummary> {
    let transactions = match scope {
        Scope::AllOwned => creditscan_store::transactions::list_all_owned(pool, user_id).await?,
        Scope::StatementId(statement_id) => {
            creditscan_store::transactions::list_by_statement(pool, statement_id, user_id).await?
        }
        Scope::TransactionIds(ids) => creditscan_store::transactions::list_by_ids_owned(pool, &ids, user_id).await?,
    };

    let rules = creditscan_store::rules::list_active_for_user(pool, user_id).await?;

    let candidate_tag_ids: Vec<TagId> = rules.iter().flat_map(|r| r.actions.iter().map(|a| a.tag_id)).collect();
    let live_tag_ids = creditscan_store::tags::live_owned_tag_ids(pool, user_id, &candidate_tag_ids).await?;

    let mut tags_applied = 0;
    for txn in &transactions {
        for rule in &rules {
            if !evaluate_rule(rule, txn) {
                continue;
            }
            for action in &rule.actions {
                let RuleActionType::AddTag = action.kind;
                if !live_tag_ids.contains(&action.tag_id) {
                    continue;
                }
                if creditscan_store::tag_memberships::attach_if_absent(pool, txn.id, action.tag_id).await? {
                    tags_applied += 1;
                }
            }
        }
    }

    Ok(ApplySummary { transactions_processed: transactions.len(), tags_applied })
}
