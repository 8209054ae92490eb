// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Authentication outcomes, password resets and administrative actions are
//! appended to the `audit_log` table, keyed by timestamp so queries can walk
//! it newest first.

use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::AUDIT_LOG;
use super::{DbResult, Store};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Auth events
    UserRegistered,
    LoginSucceeded,
    LoginFailed,
    PasswordResetRequested,
    PasswordReset,
    RefreshRejected,
    Logout,

    // Admin events
    UserBlocked,
    UserUnblocked,
    AdminAccess,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<u64>,
    /// Username, kept alongside the id for readability.
    pub username: Option<String>,
    pub resource_id: Option<String>,
    pub resource_type: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            username: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_user(mut self, user_id: u64, username: impl Into<String>) -> Self {
        self.user_id = Some(user_id);
        self.username = Some(username.into());
        self
    }

    /// Record only a username, for events where no account was resolved.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Newest-first audit query.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub limit: usize,
    pub offset: usize,
    pub event_type: Option<AuditEventType>,
    pub user_id: Option<u64>,
}

impl AuditQuery {
    fn matches(&self, event: &AuditEvent) -> bool {
        self.event_type.is_none_or(|t| t == event.event_type)
            && self.user_id.is_none_or(|id| event.user_id == Some(id))
    }
}

pub struct AuditRepository<'a> {
    store: &'a Store,
}

impl<'a> AuditRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn log(&self, event: &AuditEvent) -> DbResult<()> {
        let bytes = serde_json::to_vec(event)?;
        self.store.write(|txn| {
            let mut table = txn.open_table(AUDIT_LOG)?;
            table.insert(
                (event.timestamp.timestamp_micros(), event.event_id.as_str()),
                bytes.as_slice(),
            )?;
            Ok(())
        })
    }

    pub fn query(&self, query: &AuditQuery) -> DbResult<Vec<AuditEvent>> {
        self.store.read(|txn| {
            let table = txn.open_table(AUDIT_LOG)?;
            let mut events = Vec::new();
            let mut skipped = 0;
            for entry in table.iter()?.rev() {
                if events.len() >= query.limit {
                    break;
                }
                let (_, raw) = entry?;
                let event: AuditEvent = serde_json::from_slice(raw.value())?;
                if !query.matches(&event) {
                    continue;
                }
                if skipped < query.offset {
                    skipped += 1;
                    continue;
                }
                events.push(event);
            }
            Ok(events)
        })
    }
}

/// Append an audit event, logging instead of failing when storage refuses.
#[macro_export]
macro_rules! audit_log {
    ($store:expr, $event:expr) => {{
        let event = $event;
        if let Err(e) = $crate::storage::AuditRepository::new($store).log(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                error = %e,
                "Failed to write audit event"
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::UserBlocked)
            .with_user(1, "admin")
            .with_resource("user", "mallory")
            .failed("nope");

        assert_eq!(event.user_id, Some(1));
        assert_eq!(event.username.as_deref(), Some("admin"));
        assert_eq!(event.resource_id.as_deref(), Some("mallory"));
        assert!(!event.success);
    }

    #[test]
    fn query_is_newest_first_with_filters() {
        let (store, _dir) = temp_store();
        let repo = AuditRepository::new(&store);

        repo.log(&AuditEvent::new(AuditEventType::LoginSucceeded).with_user(1, "ada")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        repo.log(&AuditEvent::new(AuditEventType::LoginFailed).with_username("ada")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        repo.log(&AuditEvent::new(AuditEventType::LoginSucceeded).with_user(2, "grace")).unwrap();

        let all = repo.query(&AuditQuery { limit: 10, ..AuditQuery::default() }).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].username.as_deref(), Some("grace"));

        let logins = repo
            .query(&AuditQuery {
                limit: 10,
                event_type: Some(AuditEventType::LoginSucceeded),
                ..AuditQuery::default()
            })
            .unwrap();
        assert_eq!(logins.len(), 2);

        let for_ada = repo
            .query(&AuditQuery { limit: 10, user_id: Some(1), ..AuditQuery::default() })
            .unwrap();
        assert_eq!(for_ada.len(), 1);

        let paged = repo
            .query(&AuditQuery { limit: 1, offset: 1, ..AuditQuery::default() })
            .unwrap();
        assert_eq!(paged[0].event_type, AuditEventType::LoginFailed);
    }

    #[test]
    fn macro_swallows_storage_failure() {
        let (store, _dir) = temp_store();
        store.breaker().force_open();
        audit_log!(&store, AuditEvent::new(AuditEventType::AdminAccess));
    }
}
