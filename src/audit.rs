//! Audit log endpoint (GET `/v1/audit_logs`).

use serde_json::Value;

use crate::client::SecureEndpointClient;
use crate::error::ApiResult;
use crate::http::Query;

/// Default page size for audit log queries.
pub const DEFAULT_AUDIT_LIMIT: u32 = 500;

/// Filters for [`SecureEndpointClient::get_audit_log`]. Unset fields are
/// omitted from the query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLogQuery {
    /// Only entries made by this user (`audit_log_user`).
    pub user: Option<String>,
    /// ISO 8601 lower bound (`start_time`).
    pub start: Option<String>,
    /// ISO 8601 upper bound (`end_time`).
    pub end: Option<String>,
    /// Event name, e.g. `create`, `update`, `delete`.
    pub event: Option<String>,
    /// Audit log type, e.g. `Computer`, `Policy`, `Group`.
    pub log_type: Option<String>,
    /// Page size; defaults to [`DEFAULT_AUDIT_LIMIT`].
    pub limit: u32,
    /// Entries to skip.
    pub offset: u32,
}

impl Default for AuditLogQuery {
    fn default() -> Self {
        AuditLogQuery {
            user: None,
            start: None,
            end: None,
            event: None,
            log_type: None,
            limit: DEFAULT_AUDIT_LIMIT,
            offset: 0,
        }
    }
}

impl AuditLogQuery {
    fn to_query(&self) -> Query {
        Query::new()
            .push_opt("audit_log_user", self.user.as_deref())
            .push_opt("start_time", self.start.as_deref())
            .push_opt("end_time", self.end.as_deref())
            .push_opt("event", self.event.as_deref())
            .push_opt("audit_log_type", self.log_type.as_deref())
            .push("limit", self.limit)
            .push("offset", self.offset)
    }
}

impl SecureEndpointClient {
    /// Audit log entries matching `filter`.
    ///
    /// # Errors
    ///
    /// - `HttpOutcome::AuthError` — the AMP pair was rejected.
    /// - any other [`HttpOutcome`](crate::error::HttpOutcome) for a failed call.
    pub async fn get_audit_log(&self, filter: &AuditLogQuery) -> ApiResult<Option<Value>> {
        self.v1_get("/audit_logs", filter.to_query()).await
    }
}
