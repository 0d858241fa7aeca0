use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, types::Value, Connection, Row};

use super::{AuditError, AuditEvent, AuditFilter, AuditRecord, AuditStore};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at TEXT NOT NULL,
        event_type TEXT NOT NULL,
        ticket_id INTEGER,
        user_key TEXT,
        payload TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_audit_log_ticket ON audit_log(ticket_id, id);
    CREATE INDEX IF NOT EXISTS idx_audit_log_user ON audit_log(user_key, id);
    CREATE INDEX IF NOT EXISTS idx_audit_log_type ON audit_log(event_type);
"#;

const COLUMNS: &str = "id, recorded_at, event_type, ticket_id, user_key, payload";

/// Audit log kept in SQLite, usually in the same file as the tickets.
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    pub fn new(path: &Path) -> Result<Self, AuditError> {
        Self::from_connection(Connection::open(path).map_err(storage)?)
    }

    pub fn in_memory() -> Result<Self, AuditError> {
        Self::from_connection(Connection::open_in_memory().map_err(storage)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, AuditError> {
        conn.execute_batch(SCHEMA).map_err(storage)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AuditError> {
        self.conn
            .lock()
            .map_err(|_| AuditError::Storage("connection mutex poisoned".to_string()))
    }
}

/// WHERE clause and its bound values for `filter`, paging excluded.
fn conditions(filter: &AuditFilter) -> (String, Vec<Value>) {
    let mut clauses = Vec::new();
    let mut values = Vec::new();

    if let Some(ticket) = filter.ticket {
        clauses.push("ticket_id = ?".to_string());
        values.push(Value::Integer(ticket.get()));
    }
    if let Some(ref user) = filter.user {
        clauses.push("user_key = ?".to_string());
        values.push(Value::Text(user.storage_key()));
    }
    if !filter.event_types.is_empty() {
        let slots = vec!["?"; filter.event_types.len()].join(", ");
        clauses.push(format!("event_type IN ({})", slots));
        values.extend(filter.event_types.iter().cloned().map(Value::Text));
    }
    if let Some(since) = filter.since {
        clauses.push("recorded_at >= ?".to_string());
        values.push(Value::Text(since.to_rfc3339()));
    }
    if let Some(until) = filter.until {
        clauses.push("recorded_at <= ?".to_string());
        values.push(Value::Text(until.to_rfc3339()));
    }

    if clauses.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", clauses.join(" AND ")), values)
    }
}

fn storage(e: rusqlite::Error) -> AuditError {
    AuditError::Storage(e.to_string())
}

type RawRecord = (i64, String, String, Option<i64>, Option<String>, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRecord> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

impl AuditStore for SqliteAuditStore {
    fn append(&self, records: &[AuditRecord]) -> Result<usize, AuditError> {
        if records.is_empty() {
            return Ok(0);
        }

        let payloads = records
            .iter()
            .map(|r| serde_json::to_string(&r.data))
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(storage)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO audit_log (recorded_at, event_type, ticket_id, user_key, payload) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(storage)?;
            for (record, payload) in records.iter().zip(&payloads) {
                stmt.execute(params![
                    record.timestamp.to_rfc3339(),
                    record.event_type,
                    record.ticket_id,
                    record.user_key,
                    payload,
                ])
                .map_err(storage)?;
            }
        }
        tx.commit().map_err(storage)?;

        Ok(records.len())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let (where_clause, mut values) = conditions(filter);
        values.push(Value::Integer(filter.limit));
        values.push(Value::Integer(filter.offset));

        let sql = format!(
            "SELECT {} FROM audit_log {} ORDER BY id DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params_from_iter(values), read_row)
            .map_err(storage)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage)?;

        rows.into_iter()
            .map(|(id, recorded_at, event_type, ticket_id, user_key, payload)| {
                let timestamp = DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|e| AuditError::Storage(format!("bad timestamp: {}", e)))?
                    .with_timezone(&Utc);
                let data: AuditEvent = serde_json::from_str(&payload)?;
                Ok(AuditRecord {
                    id,
                    timestamp,
                    event_type,
                    ticket_id,
                    user_key,
                    data,
                })
            })
            .collect()
    }

    fn count(&self, filter: &AuditFilter) -> Result<i64, AuditError> {
        let (where_clause, values) = conditions(filter);
        let sql = format!("SELECT COUNT(*) FROM audit_log {}", where_clause);

        self.conn()?
            .query_row(&sql, params_from_iter(values), |row| row.get(0))
            .map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::{Messenger, TicketId, UserKey};
    use chrono::Duration;

    fn opened(ticket_id: i64, user: &str) -> AuditRecord {
        AuditRecord::new(
            Utc::now(),
            AuditEvent::TicketOpened {
                ticket_id,
                user: user.to_string(),
                category: String::new(),
            },
        )
    }

    fn closed(ticket_id: i64, user: &str) -> AuditRecord {
        AuditRecord::new(
            Utc::now(),
            AuditEvent::TicketStatusChanged {
                ticket_id,
                user: user.to_string(),
                operation: "close".to_string(),
                from_status: "open".to_string(),
                to_status: "closed".to_string(),
            },
        )
    }

    fn started() -> AuditRecord {
        AuditRecord::new(
            Utc::now(),
            AuditEvent::ServiceStarted {
                version: "0.1.0".to_string(),
                config_hash: "abc123".to_string(),
            },
        )
    }

    #[test]
    fn test_append_batch_and_read_back_newest_first() {
        let store = SqliteAuditStore::in_memory().unwrap();

        let written = store
            .append(&[started(), opened(1, "WEB:1"), closed(1, "WEB:1")])
            .unwrap();
        assert_eq!(written, 3);

        let records = store.query(&AuditFilter::new()).unwrap();
        let types: Vec<_> = records.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["ticket_status_changed", "ticket_opened", "service_started"]
        );
        assert!(records[0].id > records[1].id);
    }

    #[test]
    fn test_empty_batch_is_a_noop() {
        let store = SqliteAuditStore::in_memory().unwrap();
        assert_eq!(store.append(&[]).unwrap(), 0);
        assert_eq!(store.count(&AuditFilter::new()).unwrap(), 0);
    }

    #[test]
    fn test_ticket_history() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store
            .append(&[opened(1, "WEB:1"), opened(2, "WEB:2"), closed(1, "WEB:1")])
            .unwrap();

        let history = store.query(&AuditFilter::for_ticket(TicketId(1))).unwrap();
        assert_eq!(history.len(), 2);
        assert!(matches!(
            history[1].data,
            AuditEvent::TicketOpened { ticket_id: 1, .. }
        ));
    }

    #[test]
    fn test_filter_by_user_keeps_messengers_apart() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store
            .append(&[opened(1, "WEB:1"), opened(2, "SMS:1"), closed(1, "WEB:1")])
            .unwrap();

        let web = AuditFilter::new().with_user(UserKey::new(Messenger::Web, "1"));
        assert_eq!(store.count(&web).unwrap(), 2);

        let sms = AuditFilter::new().with_user(UserKey::new(Messenger::Sms, "1"));
        assert_eq!(store.count(&sms).unwrap(), 1);
    }

    #[test]
    fn test_filter_by_several_event_types() {
        let store = SqliteAuditStore::in_memory().unwrap();
        store
            .append(&[started(), opened(1, "WEB:1"), closed(1, "WEB:1")])
            .unwrap();

        let lifecycle = AuditFilter::new()
            .with_event_type("ticket_opened")
            .with_event_type("ticket_status_changed");
        assert_eq!(store.count(&lifecycle).unwrap(), 2);
        assert_eq!(store.query(&lifecycle).unwrap().len(), 2);
    }

    #[test]
    fn test_time_range() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let now = Utc::now();
        let mut old = started();
        old.timestamp = now - Duration::hours(2);
        store.append(&[old, started()]).unwrap();

        let recent = AuditFilter::new().between(Some(now - Duration::hours(1)), None);
        assert_eq!(store.count(&recent).unwrap(), 1);

        let stale = AuditFilter::new().between(None, Some(now - Duration::hours(1)));
        assert_eq!(store.count(&stale).unwrap(), 1);
    }

    #[test]
    fn test_paging_does_not_affect_count() {
        let store = SqliteAuditStore::in_memory().unwrap();
        let batch: Vec<_> = (1..=5).map(|i| opened(i, "WEB:1")).collect();
        store.append(&batch).unwrap();

        let page = AuditFilter::new().page(2, 4);
        assert_eq!(store.query(&page).unwrap().len(), 1);
        assert_eq!(store.count(&page).unwrap(), 5);
    }

    #[test]
    fn test_shares_file_with_ticket_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let _tickets = crate::ticket::SqliteTicketStore::new(&db_path).unwrap();
        let store = SqliteAuditStore::new(&db_path).unwrap();
        store.append(&[started()]).unwrap();

        let reopened = SqliteAuditStore::new(&db_path).unwrap();
        assert_eq!(reopened.count(&AuditFilter::new()).unwrap(), 1);
    }
}
