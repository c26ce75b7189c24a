//! Account transfer service
//!
//! Moves money between two members inside one transaction:
//!
//! ```text
//! STARTED ──▶ DEBITED ──▶ CREDITED ──▶ COMMITTED
//!    │           │           │
//!    └───────────┴───────────┴──────▶ ROLLED_BACK
//! ```
//!
//! Any failure after `begin` rolls the whole transaction back before the
//! error reaches the caller, so a debit is never committed without its credit.

use sqlx::AnyConnection;
use tracing::{error, info, warn};

use super::error::MemberError;
use super::models::Member;
use super::state::TransferState;
use super::store::MemberStore;
use super::tx::{TransactionContext, TransactionManager};

/// Destination id that always fails validation mid-transfer
pub const VALIDATION_FAILURE_ID: &str = "ex";

pub struct TransferService<M: TransactionManager> {
    store: MemberStore,
    tx_manager: M,
}

impl<M: TransactionManager> TransferService<M> {
    pub fn new(store: MemberStore, tx_manager: M) -> Self {
        Self { store, tx_manager }
    }

    pub fn store(&self) -> &MemberStore {
        &self.store
    }

    /// Transfer `amount` from `from_id` to `to_id`, all or nothing
    pub async fn account_transfer(
        &self,
        from_id: &str,
        to_id: &str,
        amount: i64,
    ) -> Result<(), MemberError> {
        let mut tx = self.tx_manager.begin().await?;
        let mut state = TransferState::Started;
        info!(
            from_id,
            to_id,
            amount,
            tx_manager = self.tx_manager.name(),
            state = %state,
            "transfer started"
        );

        let result = self
            .biz_logic(tx.connection(), from_id, to_id, amount, &mut state)
            .await;

        match result {
            Ok(()) => {
                if let Err(e) = tx.commit().await {
                    error!(from_id, to_id, amount, error = %e, "commit failed");
                    return Err(e);
                }
                advance(&mut state, TransferState::Committed);
                info!(from_id, to_id, amount, state = %state, "transfer committed");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    error!(
                        from_id,
                        to_id,
                        error = %rollback_err,
                        "rollback failed; connection discarded"
                    );
                }
                let failed_at = state;
                advance(&mut state, TransferState::RolledBack);
                warn!(
                    from_id,
                    to_id,
                    amount,
                    failed_at = %failed_at,
                    code = e.code(),
                    error = %e,
                    "transfer rolled back"
                );
                Err(e)
            }
        }
    }

    async fn biz_logic(
        &self,
        conn: &mut AnyConnection,
        from_id: &str,
        to_id: &str,
        amount: i64,
        state: &mut TransferState,
    ) -> Result<(), MemberError> {
        let from_member = self.store.find_by_id(Some(&mut *conn), from_id).await?;
        let to_member = self.store.find_by_id(Some(&mut *conn), to_id).await?;
        distinct(&from_member, &to_member)?;

        let debited = checked_money(from_member.money.checked_sub(amount), &from_member)?;
        self.store
            .update(Some(&mut *conn), &from_member.member_id, debited)
            .await?;
        advance(state, TransferState::Debited);

        validation(&to_member)?;

        let credited = checked_money(to_member.money.checked_add(amount), &to_member)?;
        self.store
            .update(Some(&mut *conn), &to_member.member_id, credited)
            .await?;
        advance(state, TransferState::Credited);

        Ok(())
    }
}

fn validation(to_member: &Member) -> Result<(), MemberError> {
    if to_member.member_id == VALIDATION_FAILURE_ID {
        return Err(MemberError::Validation(format!(
            "transfer to memberId={} rejected",
            to_member.member_id
        )));
    }
    Ok(())
}

/// `to_member` was read before the debit, so crediting it would use a stale balance
fn distinct(from_member: &Member, to_member: &Member) -> Result<(), MemberError> {
    if from_member.member_id == to_member.member_id {
        return Err(MemberError::Validation(format!(
            "transfer to the same memberId={} rejected",
            to_member.member_id
        )));
    }
    Ok(())
}

fn checked_money(result: Option<i64>, member: &Member) -> Result<i64, MemberError> {
    result.ok_or_else(|| {
        MemberError::Validation(format!(
            "balance overflow for memberId={}",
            member.member_id
        ))
    })
}

fn advance(state: &mut TransferState, next: TransferState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal transfer transition {} -> {}",
        state,
        next
    );
    *state = next;
}
