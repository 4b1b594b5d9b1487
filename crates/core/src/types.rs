use crate::error::{CoreError, CoreResult};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identity of the party issuing a request, as resolved by the auth layer.
///
/// `user_id` is `None` for unauthenticated callers; `tenant_id` is `None`
/// when the user is not attached to any tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
    pub user_id: Option<DbId>,
    pub tenant_id: Option<DbId>,
}

impl CallerContext {
    pub fn new(user_id: DbId, tenant_id: DbId) -> Self {
        Self {
            user_id: Some(user_id),
            tenant_id: Some(tenant_id),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            tenant_id: None,
        }
    }

    /// Resolve `(user_id, tenant_id)`, failing closed when either is absent.
    pub fn require_tenant(&self) -> CoreResult<(DbId, DbId)> {
        let user_id = self
            .user_id
            .ok_or_else(|| CoreError::Unauthorized("Authentication required".to_string()))?;
        let tenant_id = self
            .tenant_id
            .ok_or_else(|| CoreError::Authorization("Caller has no tenant".to_string()))?;
        Ok((user_id, tenant_id))
    }
}
