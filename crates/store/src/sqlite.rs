//! SQLite store — the durable, cross-process implementation.
//!
//! Every CLI invocation opens the same database file, so a mission waiting
//! on approval in one process sees a decision written by another. Tables:
//! - `pending_commands` — commands awaiting an approver
//! - `work_units` — scan and patch missions
//! - `findings` — classified security findings
//! - `chat_messages` — operator messages and replies
//! - `credentials`, `settings` — single-row tables
//!
//! Each table carries an integer `seq` so listings keep insertion order even
//! when two rows share a timestamp.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudwarden_core::error::StoreError;
use cloudwarden_core::settings::{Settings, SettingsPatch};
use cloudwarden_core::store::*;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A SQLite-backed [`PersistQueueStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open a store from a connection string.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?;
        Self::connect(options, url).await
    }

    /// Open (creating if needed) a database file, including its parent directory.
    pub async fn open_file(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }
        let options = SqliteConnectOptions::new().filename(path);
        Self::connect(options, &path.display().to_string()).await
    }

    async fn connect(options: SqliteConnectOptions, label: &str) -> Result<Self, StoreError> {
        let options = options
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        // Every connection to an unnamed in-memory database sees its own copy
        let max_connections = if label.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {label}");
        Ok(store)
    }

    /// Run schema migrations and seed the settings row.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: [(&str, &str); 8] = [
            (
                "pending_commands table",
                r#"
                CREATE TABLE IF NOT EXISTS pending_commands (
                    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                    id           TEXT UNIQUE NOT NULL,
                    command      TEXT NOT NULL,
                    status       TEXT NOT NULL DEFAULT 'pending',
                    created_at   TEXT NOT NULL,
                    decided_at   TEXT
                )
                "#,
            ),
            (
                "work_units table",
                r#"
                CREATE TABLE IF NOT EXISTS work_units (
                    seq          INTEGER PRIMARY KEY AUTOINCREMENT,
                    id           TEXT UNIQUE NOT NULL,
                    kind         TEXT NOT NULL,
                    status       TEXT NOT NULL,
                    payload      TEXT NOT NULL DEFAULT '{}',
                    created_at   TEXT NOT NULL,
                    updated_at   TEXT NOT NULL
                )
                "#,
            ),
            (
                "findings table",
                r#"
                CREATE TABLE IF NOT EXISTS findings (
                    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
                    id             TEXT UNIQUE NOT NULL,
                    scan_id        TEXT NOT NULL,
                    resource       TEXT NOT NULL,
                    resource_name  TEXT NOT NULL,
                    resource_arn   TEXT NOT NULL,
                    severity       TEXT NOT NULL,
                    message        TEXT NOT NULL,
                    issue          TEXT NOT NULL,
                    details        TEXT NOT NULL,
                    fixed          INTEGER NOT NULL DEFAULT 0,
                    consent        INTEGER NOT NULL DEFAULT 0,
                    solution       TEXT,
                    created_at     TEXT NOT NULL
                )
                "#,
            ),
            (
                "chat_messages table",
                r#"
                CREATE TABLE IF NOT EXISTS chat_messages (
                    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
                    id            TEXT UNIQUE NOT NULL,
                    user_message  TEXT NOT NULL,
                    ai_response   TEXT,
                    status        TEXT NOT NULL,
                    created_at    TEXT NOT NULL,
                    replied_at    TEXT
                )
                "#,
            ),
            (
                "credentials table",
                r#"
                CREATE TABLE IF NOT EXISTS credentials (
                    id                 INTEGER PRIMARY KEY CHECK (id = 1),
                    aws_access_key     TEXT NOT NULL,
                    aws_secret_key     TEXT NOT NULL,
                    aws_region         TEXT NOT NULL,
                    aws_session_token  TEXT,
                    model_api_key      TEXT
                )
                "#,
            ),
            (
                "settings table",
                r#"
                CREATE TABLE IF NOT EXISTS settings (
                    id            INTEGER PRIMARY KEY CHECK (id = 1),
                    model         TEXT NOT NULL,
                    max_requests  INTEGER NOT NULL,
                    monitor_mode  INTEGER NOT NULL
                )
                "#,
            ),
            (
                "pending status index",
                "CREATE INDEX IF NOT EXISTS idx_pending_commands_status ON pending_commands(status)",
            ),
            (
                "findings scan index",
                "CREATE INDEX IF NOT EXISTS idx_findings_scan_id ON findings(scan_id)",
            ),
        ];

        for (label, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{label}: {e}")))?;
        }

        let defaults = Settings::default();
        sqlx::query(
            "INSERT OR IGNORE INTO settings (id, model, max_requests, monitor_mode) VALUES (1, ?1, ?2, ?3)",
        )
        .bind(&defaults.model)
        .bind(defaults.max_requests as i64)
        .bind(defaults.monitor_mode)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("settings seed: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn exists(&self, table: &'static str, id: &str) -> Result<bool, StoreError> {
        let sql = format!("SELECT 1 FROM {table} WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("{table} lookup: {e}")))?;
        Ok(row.is_some())
    }

    // --- Row mapping ---

    fn row_to_command(row: &SqliteRow) -> Result<PendingCommand, StoreError> {
        let status: String = column(row, "status")?;
        Ok(PendingCommand {
            id: column(row, "id")?,
            command: column(row, "command")?,
            status: status.parse()?,
            created_at: timestamp(row, "created_at")?,
        })
    }

    fn row_to_work_unit(row: &SqliteRow) -> Result<WorkUnit, StoreError> {
        let kind: String = column(row, "kind")?;
        let status: String = column(row, "status")?;
        let payload: String = column(row, "payload")?;
        Ok(WorkUnit {
            id: column(row, "id")?,
            kind: kind.parse()?,
            status: status.parse()?,
            payload: serde_json::from_str(&payload)
                .map_err(|e| StoreError::QueryFailed(format!("payload column: {e}")))?,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        })
    }

    fn row_to_finding(row: &SqliteRow) -> Result<Finding, StoreError> {
        Ok(Finding {
            id: column(row, "id")?,
            scan_id: column(row, "scan_id")?,
            resource: column(row, "resource")?,
            resource_name: column(row, "resource_name")?,
            resource_arn: column(row, "resource_arn")?,
            severity: column(row, "severity")?,
            message: column(row, "message")?,
            issue: column(row, "issue")?,
            details: column(row, "details")?,
            fixed: column(row, "fixed")?,
            consent: column(row, "consent")?,
            solution: column(row, "solution")?,
            created_at: timestamp(row, "created_at")?,
        })
    }

    fn row_to_chat(row: &SqliteRow) -> Result<ChatRecord, StoreError> {
        let status: String = column(row, "status")?;
        let replied_at: Option<String> = column(row, "replied_at")?;
        Ok(ChatRecord {
            id: column(row, "id")?,
            user_message: column(row, "user_message")?,
            ai_response: column(row, "ai_response")?,
            status: status.parse()?,
            created_at: timestamp(row, "created_at")?,
            replied_at: replied_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn timestamp(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = column(row, name)?;
    parse_timestamp(&raw)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

async fn insert_finding(conn: &mut SqliteConnection, finding: &Finding) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO findings (id, scan_id, resource, resource_name, resource_arn, severity,
                              message, issue, details, fixed, consent, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10)
        "#,
    )
    .bind(&finding.id)
    .bind(&finding.scan_id)
    .bind(&finding.resource)
    .bind(&finding.resource_name)
    .bind(&finding.resource_arn)
    .bind(&finding.severity)
    .bind(&finding.message)
    .bind(&finding.issue)
    .bind(&finding.details)
    .bind(finding.created_at.to_rfc3339())
    .execute(conn)
    .await
    .map_err(|e| StoreError::Storage(format!("INSERT finding failed: {e}")))?;
    Ok(())
}

#[async_trait]
impl PersistQueueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    // --- Pending commands ---

    async fn create_pending_command(&self, command: &str) -> Result<PendingCommand, StoreError> {
        let pending = PendingCommand {
            id: Uuid::new_v4().to_string(),
            command: command.to_string(),
            status: CommandStatus::Pending,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO pending_commands (id, command, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&pending.id)
        .bind(&pending.command)
        .bind(pending.status.as_str())
        .bind(pending.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT pending command failed: {e}")))?;

        debug!(command_id = %pending.id, "Queued command for approval");
        Ok(pending)
    }

    async fn get_pending_command(&self, id: &str) -> Result<Option<PendingCommand>, StoreError> {
        let row = sqlx::query("SELECT * FROM pending_commands WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET pending command: {e}")))?;

        row.as_ref().map(Self::row_to_command).transpose()
    }

    async fn set_pending_command_status(&self, id: &str, status: CommandStatus) -> Result<(), StoreError> {
        // Conditional write: only the first decision lands
        let result = sqlx::query(
            "UPDATE pending_commands SET status = ?1, decided_at = ?2 WHERE id = ?3 AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE pending command failed: {e}")))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        if self.exists("pending_commands", id).await? {
            Err(StoreError::AlreadyProcessed(id.to_string()))
        } else {
            Err(StoreError::NotFound {
                kind: "command",
                id: id.to_string(),
            })
        }
    }

    async fn list_pending_commands(&self) -> Result<Vec<PendingCommand>, StoreError> {
        let rows = sqlx::query("SELECT * FROM pending_commands WHERE status = 'pending' ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST pending commands: {e}")))?;

        rows.iter().map(Self::row_to_command).collect()
    }

    // --- Work units ---

    async fn create_work_unit(&self, kind: WorkKind, payload: serde_json::Value) -> Result<WorkUnit, StoreError> {
        let now = Utc::now();
        let unit = WorkUnit {
            id: Uuid::new_v4().to_string(),
            kind,
            status: WorkStatus::Pending,
            payload,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO work_units (id, kind, status, payload, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&unit.id)
        .bind(unit.kind.as_str())
        .bind(unit.status.as_str())
        .bind(unit.payload.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT work unit failed: {e}")))?;

        Ok(unit)
    }

    async fn get_work_unit(&self, id: &str) -> Result<Option<WorkUnit>, StoreError> {
        let row = sqlx::query("SELECT * FROM work_units WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET work unit: {e}")))?;

        row.as_ref().map(Self::row_to_work_unit).transpose()
    }

    async fn set_work_unit_status(&self, id: &str, status: WorkStatus) -> Result<bool, StoreError> {
        let predecessors = status.predecessors();

        if !predecessors.is_empty() {
            let placeholders: Vec<String> = (0..predecessors.len()).map(|i| format!("?{}", i + 4)).collect();
            let sql = format!(
                "UPDATE work_units SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status IN ({})",
                placeholders.join(", ")
            );

            let mut query = sqlx::query(&sql)
                .bind(status.as_str())
                .bind(Utc::now().to_rfc3339())
                .bind(id);
            for previous in predecessors {
                query = query.bind(previous.as_str());
            }

            let result = query
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Storage(format!("UPDATE work unit failed: {e}")))?;

            if result.rows_affected() > 0 {
                return Ok(true);
            }
        }

        if self.exists("work_units", id).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound {
                kind: "work unit",
                id: id.to_string(),
            })
        }
    }

    // --- Findings ---

    async fn append_finding(&self, scan_id: &str, finding: NewFinding) -> Result<Finding, StoreError> {
        let stored = Finding::recorded(scan_id, finding);
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to acquire connection: {e}")))?;
        insert_finding(&mut conn, &stored).await?;
        Ok(stored)
    }

    async fn append_findings(&self, scan_id: &str, findings: Vec<NewFinding>) -> Result<Vec<Finding>, StoreError> {
        let stored: Vec<Finding> = findings.into_iter().map(|f| Finding::recorded(scan_id, f)).collect();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;
        for finding in &stored {
            insert_finding(&mut tx, finding).await?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT findings failed: {e}")))?;

        debug!(scan_id, count = stored.len(), "Findings committed");
        Ok(stored)
    }

    async fn get_finding(&self, id: &str) -> Result<Option<Finding>, StoreError> {
        let row = sqlx::query("SELECT * FROM findings WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET finding: {e}")))?;

        row.as_ref().map(Self::row_to_finding).transpose()
    }

    async fn list_findings(&self) -> Result<Vec<Finding>, StoreError> {
        let rows = sqlx::query("SELECT * FROM findings ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST findings: {e}")))?;

        rows.iter().map(Self::row_to_finding).collect()
    }

    async fn update_finding(&self, id: &str, update: FindingUpdate) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE findings SET
                fixed    = COALESCE(?1, fixed),
                consent  = COALESCE(?2, consent),
                solution = COALESCE(?3, solution)
            WHERE id = ?4
            "#,
        )
        .bind(update.fixed)
        .bind(update.consent)
        .bind(update.solution)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE finding failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    // --- Chat ---

    async fn create_chat_message(&self, user_message: &str) -> Result<ChatRecord, StoreError> {
        let record = ChatRecord {
            id: Uuid::new_v4().to_string(),
            user_message: user_message.to_string(),
            ai_response: None,
            status: WorkStatus::Pending,
            created_at: Utc::now(),
            replied_at: None,
        };

        sqlx::query(
            "INSERT INTO chat_messages (id, user_message, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.id)
        .bind(&record.user_message)
        .bind(record.status.as_str())
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chat message failed: {e}")))?;

        Ok(record)
    }

    async fn get_chat_message(&self, id: &str) -> Result<Option<ChatRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_messages WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET chat message: {e}")))?;

        row.as_ref().map(Self::row_to_chat).transpose()
    }

    async fn start_chat_message(&self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE chat_messages SET status = 'running' WHERE id = ?1 AND status = 'pending'")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE chat message failed: {e}")))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.exists("chat_messages", id).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound {
                kind: "chat message",
                id: id.to_string(),
            })
        }
    }

    async fn complete_chat_message(&self, id: &str, response: &str, status: WorkStatus) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages SET ai_response = ?1, status = ?2, replied_at = ?3
            WHERE id = ?4 AND status IN ('pending', 'running')
            "#,
        )
        .bind(response)
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE chat message failed: {e}")))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.exists("chat_messages", id).await? {
            Ok(false)
        } else {
            Err(StoreError::NotFound {
                kind: "chat message",
                id: id.to_string(),
            })
        }
    }

    async fn get_chat_history(&self) -> Result<Vec<ChatRecord>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chat_messages ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("LIST chat messages: {e}")))?;

        rows.iter().map(Self::row_to_chat).collect()
    }

    async fn clear_chat_history(&self) -> Result<usize, StoreError> {
        let result = sqlx::query("DELETE FROM chat_messages")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("CLEAR chat failed: {e}")))?;

        Ok(result.rows_affected() as usize)
    }

    // --- Credentials & settings ---

    async fn store_credentials(&self, credentials: Credentials) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO credentials (id, aws_access_key, aws_secret_key, aws_region, aws_session_token, model_api_key)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                aws_access_key = excluded.aws_access_key,
                aws_secret_key = excluded.aws_secret_key,
                aws_region = excluded.aws_region,
                aws_session_token = excluded.aws_session_token,
                model_api_key = excluded.model_api_key
            "#,
        )
        .bind(&credentials.aws_access_key)
        .bind(&credentials.aws_secret_key)
        .bind(&credentials.aws_region)
        .bind(&credentials.aws_session_token)
        .bind(&credentials.model_api_key)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT credentials failed: {e}")))?;

        Ok(())
    }

    async fn get_credentials(&self) -> Result<Option<Credentials>, StoreError> {
        let row = sqlx::query("SELECT * FROM credentials WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET credentials: {e}")))?;

        row.map(|r| -> Result<Credentials, StoreError> {
            Ok(Credentials {
                aws_access_key: column(&r, "aws_access_key")?,
                aws_secret_key: column(&r, "aws_secret_key")?,
                aws_region: column(&r, "aws_region")?,
                aws_session_token: column(&r, "aws_session_token")?,
                model_api_key: column(&r, "model_api_key")?,
            })
        })
        .transpose()
    }

    async fn get_settings(&self) -> Result<Settings, StoreError> {
        let row = sqlx::query("SELECT * FROM settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("GET settings: {e}")))?;

        let Some(row) = row else {
            return Ok(Settings::default());
        };

        let max_requests: i64 = column(&row, "max_requests")?;
        Ok(Settings {
            model: column(&row, "model")?,
            max_requests: u32::try_from(max_requests)
                .map_err(|e| StoreError::QueryFailed(format!("max_requests column: {e}")))?,
            monitor_mode: column(&row, "monitor_mode")?,
        })
    }

    async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, StoreError> {
        sqlx::query(
            r#"
            UPDATE settings SET
                model        = COALESCE(?1, model),
                max_requests = COALESCE(?2, max_requests),
                monitor_mode = COALESCE(?3, monitor_mode)
            WHERE id = 1
            "#,
        )
        .bind(patch.model)
        .bind(patch.max_requests.map(i64::from))
        .bind(patch.monitor_mode)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE settings failed: {e}")))?;

        self.get_settings().await
    }
}
