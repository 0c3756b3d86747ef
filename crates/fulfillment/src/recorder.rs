//! Audit recording.

use common::{AuditEntryId, OrderId, ProductId, UserId};
use domain::{AuditEntry, AuditTarget};
use serde::Serialize;
use storage::AuditLog;

use crate::error::AuditError;

/// Whether the audit entry for a committed change was written.
///
/// Audit is best-effort: a failed append never undoes the change it
/// describes, it is reported here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
    Recorded { entry_id: AuditEntryId },
    Failed { reason: String },
}

impl AuditStatus {
    pub fn is_recorded(&self) -> bool {
        matches!(self, AuditStatus::Recorded { .. })
    }
}

/// Appends entries to the audit ledger.
#[derive(Clone)]
pub struct AuditRecorder<A> {
    log: A,
}

impl<A: AuditLog> AuditRecorder<A> {
    /// Creates a new recorder over the given ledger.
    pub fn new(log: A) -> Self {
        Self { log }
    }

    /// Records `action` against whichever references are given.
    ///
    /// Fails with [`AuditError::InvalidTarget`] if all three are absent.
    pub async fn record(
        &self,
        action: &str,
        order: Option<OrderId>,
        user: Option<UserId>,
        product: Option<ProductId>,
    ) -> Result<AuditEntry, AuditError> {
        let target = AuditTarget::from_refs(order, user, product)?;
        self.record_target(action, target).await
    }

    /// Records `action` against an already-built target.
    #[tracing::instrument(skip(self))]
    pub async fn record_target(
        &self,
        action: &str,
        target: AuditTarget,
    ) -> Result<AuditEntry, AuditError> {
        let entry = AuditEntry::new(target, action);
        self.log.append(entry.clone()).await?;
        tracing::debug!(entry_id = %entry.id, "Audit entry recorded");
        Ok(entry)
    }

    /// Like [`record_target`](Self::record_target), but logs and counts a
    /// failure instead of returning it.
    pub async fn record_best_effort(&self, action: &str, target: AuditTarget) -> AuditStatus {
        match self.record_target(action, target).await {
            Ok(entry) => AuditStatus::Recorded { entry_id: entry.id },
            Err(e) => {
                metrics::counter!("audit_failures_total").increment(1);
                tracing::warn!(action, error = %e, "Audit append failed, change stays committed");
                AuditStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Returns the entries referencing an order, oldest first.
    pub async fn history(&self, order_id: OrderId) -> Result<Vec<AuditEntry>, AuditError> {
        Ok(self.log.entries_for_order(order_id).await?)
    }
}
