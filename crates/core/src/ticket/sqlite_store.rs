//! SQLite-backed ticket store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    Messenger, NewTicket, StoreError, ThreadId, Ticket, TicketFilter, TicketId, TicketStatus,
    TicketStore, UserKey,
};

const TICKET_COLUMNS: &str =
    "ticket_id, messenger, raw_user_id, category, status, thread_id, created_at, updated_at";

/// SQLite-backed ticket store.
pub struct SqliteTicketStore {
    conn: Mutex<Connection>,
}

impl SqliteTicketStore {
    /// Create a new SQLite ticket store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite ticket store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tickets (
                ticket_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_key TEXT NOT NULL,
                messenger TEXT NOT NULL,
                raw_user_id TEXT NOT NULL,
                category TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                thread_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_user_key ON tickets(user_key, ticket_id DESC);
            CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_open_user
                ON tickets(user_key) WHERE status = 'open';
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_thread
                ON tickets(thread_id) WHERE thread_id IS NOT NULL;
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }

    fn build_where_clause(filter: &TicketFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(messenger) = filter.messenger {
            conditions.push("messenger = ?");
            params.push(Box::new(messenger.as_str()));
        }

        if let Some(ref category) = filter.category {
            conditions.push("category = ?");
            params.push(Box::new(category.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let ticket_id: i64 = row.get(0)?;
        let messenger_str: String = row.get(1)?;
        let raw_user_id: String = row.get(2)?;
        let category: String = row.get(3)?;
        let status_str: String = row.get(4)?;
        let thread_id: Option<i64> = row.get(5)?;
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        let messenger: Messenger = messenger_str
            .parse()
            .map_err(|e: String| conversion_err(1, e))?;
        let status: TicketStatus = status_str
            .parse()
            .map_err(|e: String| conversion_err(4, e))?;

        let created_at = parse_timestamp(&created_at_str).map_err(|e| conversion_err(6, e))?;
        let updated_at = parse_timestamp(&updated_at_str).map_err(|e| conversion_err(7, e))?;

        Ok(Ticket {
            ticket_id: TicketId(ticket_id),
            user: UserKey::new(messenger, raw_user_id),
            category,
            status,
            thread_id: thread_id.map(ThreadId),
            created_at,
            updated_at,
        })
    }

    fn select_by_id(conn: &Connection, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE ticket_id = ?", TICKET_COLUMNS),
            params![id.get()],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn conversion_err(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(message),
    )
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {:?}: {}", value, e))
}

impl TicketStore for SqliteTicketStore {
    fn create(&self, ticket: NewTicket) -> Result<Ticket, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO tickets (user_key, messenger, raw_user_id, category, status, thread_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                ticket.user.storage_key(),
                ticket.user.messenger.as_str(),
                ticket.user.raw_id,
                ticket.category,
                TicketStatus::Open.as_str(),
                ticket.thread_id.map(|t| t.0),
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;

        Ok(Ticket {
            ticket_id: TicketId(conn.last_insert_rowid()),
            user: ticket.user,
            category: ticket.category,
            status: TicketStatus::Open,
            thread_id: ticket.thread_id,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_status(&self, id: TicketId, status: TicketStatus) -> Result<Ticket, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();

        let changed = conn
            .execute(
                "UPDATE tickets SET status = ?, updated_at = ? WHERE ticket_id = ?",
                params![status.as_str(), now.to_rfc3339(), id.get()],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(StoreError::Missing(id));
        }

        Self::select_by_id(&conn, id)?.ok_or(StoreError::Missing(id))
    }

    fn assign_thread(&self, id: TicketId, thread_id: ThreadId) -> Result<Ticket, StoreError> {
        let conn = self.conn()?;

        let current = Self::select_by_id(&conn, id)?.ok_or(StoreError::Missing(id))?;
        match current.thread_id {
            Some(existing) if existing == thread_id => return Ok(current),
            Some(existing) => {
                return Err(StoreError::ThreadAlreadyAssigned {
                    ticket_id: id,
                    existing,
                })
            }
            None => {}
        }

        let now = Utc::now();
        conn.execute(
            "UPDATE tickets SET thread_id = ?, updated_at = ? WHERE ticket_id = ? AND thread_id IS NULL",
            params![thread_id.0, now.to_rfc3339(), id.get()],
        )
        .map_err(db_err)?;

        Ok(Ticket {
            thread_id: Some(thread_id),
            updated_at: now,
            ..current
        })
    }

    fn find_open_by_user(&self, user: &UserKey) -> Result<Option<Ticket>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM tickets WHERE user_key = ? AND status = 'open'",
                TICKET_COLUMNS
            ),
            params![user.storage_key()],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(db_err)
    }

    fn find_latest_by_user(&self, user: &UserKey) -> Result<Option<Ticket>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM tickets WHERE user_key = ? ORDER BY ticket_id DESC LIMIT 1",
                TICKET_COLUMNS
            ),
            params![user.storage_key()],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(db_err)
    }

    fn find_by_id(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let conn = self.conn()?;
        Self::select_by_id(&conn, id)
    }

    fn find_by_thread_id(&self, thread_id: ThreadId) -> Result<Option<Ticket>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE thread_id = ?", TICKET_COLUMNS),
            params![thread_id.0],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(db_err)
    }

    fn close_all_open(&self) -> Result<Vec<Ticket>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err)?;
        let now = Utc::now();

        let open = {
            let mut stmt = tx
                .prepare(&format!(
                    "SELECT {} FROM tickets WHERE status = 'open' ORDER BY ticket_id ASC",
                    TICKET_COLUMNS
                ))
                .map_err(db_err)?;
            let rows = stmt.query_map([], Self::row_to_ticket).map_err(db_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_err)?
        };

        tx.execute(
            "UPDATE tickets SET status = 'closed', updated_at = ? WHERE status = 'open'",
            params![now.to_rfc3339()],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;

        Ok(open
            .into_iter()
            .map(|ticket| Ticket {
                status: TicketStatus::Closed,
                updated_at: now,
                ..ticket
            })
            .collect())
    }

    fn list(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY ticket_id DESC LIMIT ? OFFSET ?",
            TICKET_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(db_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(db_err)
    }

    fn count(&self, filter: &TicketFilter) -> Result<i64, StoreError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(db_err)
    }
}
