//! Append-only audit trail.
//!
//! Writes are synchronous with the operation they describe. The default
//! policy is fail-closed: if the audit row cannot be written, the operation
//! it describes must not report success. AUDIT_FAIL_OPEN flips this for
//! break-glass recovery.

use crate::db::Database;
use crate::models::AuditEvent;

use super::error::ServiceError;
use super::metrics;

const DEFAULT_QUERY_LIMIT: i64 = 50;
const MAX_QUERY_LIMIT: i64 = 500;

#[derive(Clone)]
pub struct AuditLedger {
    db: Database,
    fail_open: bool,
}

impl AuditLedger {
    pub fn new(db: Database, fail_open: bool) -> Self {
        Self { db, fail_open }
    }

    /// Record an event. Under the fail-closed policy a write failure is the
    /// caller's failure too.
    pub async fn record(&self, event: AuditEvent) -> Result<(), ServiceError> {
        match self.db.insert_audit_event(&event).await {
            Ok(()) => Ok(()),
            Err(e) if self.fail_open => {
                metrics::record_audit_write_failure();
                tracing::error!(
                    error = %e,
                    event_type = %event.event_type,
                    action = %event.action,
                    "audit write failed; continuing (fail-open policy)"
                );
                Ok(())
            }
            Err(e) => {
                metrics::record_audit_write_failure();
                Err(ServiceError::AuditWrite(e.to_string()))
            }
        }
    }

    /// Events for one folder, newest first.
    pub async fn query_by_folder(
        &self,
        project_id: &str,
        environment: &str,
        folder: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<AuditEvent>, ServiceError> {
        let limit = clamp_limit(limit);
        let offset = offset.unwrap_or(0).max(0);
        Ok(self
            .db
            .audit_by_folder(project_id, environment, folder, limit, offset)
            .await?)
    }

    /// Most recent events, optionally filtered to one organization.
    pub async fn query_recent(
        &self,
        organization_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEvent>, ServiceError> {
        Ok(self
            .db
            .audit_recent(organization_id, clamp_limit(limit))
            .await?)
    }

    /// Security-relevant events only: failed logins, unauthorized access,
    /// and suspicious activity.
    pub async fn query_security(
        &self,
        organization_id: Option<&str>,
        limit: Option<i64>,
    ) -> Result<Vec<AuditEvent>, ServiceError> {
        Ok(self
            .db
            .audit_security(organization_id, clamp_limit(limit))
            .await?)
    }
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_QUERY_LIMIT).clamp(1, MAX_QUERY_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_QUERY_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-5)), 1);
        assert_eq!(clamp_limit(Some(100)), 100);
        assert_eq!(clamp_limit(Some(10_000)), MAX_QUERY_LIMIT);
    }
}
