//! SQLite adapter for governance storage.
//!
//! This adapter is the durable backend used by the operator CLI. Task payloads
//! are stored as JSON text and never interpreted here.

use crate::traits::{
    AccountFilter, AccountStore, LookupFilter, LookupStore, QueryWindow, TaskStore,
};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use govern_types::{
    Account, AccountChanges, AccountId, EntityKind, EntryStatus, LookupEntry, LookupEntryId,
    LookupPatch, NewAccount, NewLookupEntry, NewTask, Resolution, Role, SecretHash, Task,
    TaskId, TaskPayload, TaskStatus, TaskType,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, role, email, full_name, department, \
     created_by, created_at, updated_at";
const LOOKUP_COLUMNS: &str =
    "id, data_type, code, value, description, status, created_by, created_at, updated_at";
const TASK_COLUMNS: &str = "id, task_type, entity_type, entity_id, payload, status, created_by, \
     created_at, updated_at, approved_by, approved_at, failure_detail";

/// SQLite-backed storage adapter.
#[derive(Clone)]
pub struct SqliteGovernanceStorage {
    pool: SqlitePool,
}

impl SqliteGovernanceStorage {
    /// Connect to SQLite and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 5).await
    }

    /// Connect with explicit pool parameters.
    ///
    /// Every connection to `sqlite::memory:` opens its own database, so memory
    /// URLs are pinned to a single connection that is never recycled.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
    ) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StorageError::InvalidInput(format!("invalid sqlite url: {e}")))?
            .create_if_missing(true);

        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect sqlite: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                email TEXT,
                full_name TEXT,
                department TEXT,
                created_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS lookup_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                data_type TEXT NOT NULL,
                code TEXT NOT NULL,
                value TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_by TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (data_type, code)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_type TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id INTEGER,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                approved_by TEXT,
                approved_at TEXT,
                failure_detail TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks (status, created_at)",
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for SqliteGovernanceStorage {
    async fn create_account(
        &self,
        account: NewAccount,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Account> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts
                (username, password_hash, role, email, full_name, department, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.username)
        .bind(account.secret.as_str())
        .bind(account.role.as_str())
        .bind(&account.email)
        .bind(&account.full_name)
        .bind(&account.department)
        .bind(&account.created_by)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(Account {
            id: AccountId(result.last_insert_rowid()),
            username: account.username,
            secret: account.secret,
            role: account.role,
            email: account.email,
            full_name: account.full_name,
            department: account.department,
            created_by: account.created_by,
            created_at,
            updated_at: created_at,
        })
    }

    async fn update_account(
        &self,
        id: AccountId,
        changes: AccountChanges,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE accounts SET updated_at = ");
        builder.push_bind(updated_at);
        if let Some(secret) = changes.secret {
            builder
                .push(", password_hash = ")
                .push_bind(secret.as_str().to_string());
        }
        if let Some(role) = changes.role {
            builder.push(", role = ").push_bind(role.as_str());
        }
        if let Some(email) = changes.email {
            builder.push(", email = ").push_bind(email);
        }
        if let Some(full_name) = changes.full_name {
            builder.push(", full_name = ").push_bind(full_name);
        }
        if let Some(department) = changes.department {
            builder.push(", department = ").push_bind(department);
        }
        builder.push(" WHERE id = ").push_bind(id.0);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_account(&self, id: AccountId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_account(&self, id: AccountId) -> StorageResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(account_row_to_record).transpose()
    }

    async fn find_account_by_username(&self, username: &str) -> StorageResult<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(account_row_to_record).transpose()
    }

    async fn list_accounts(&self, filter: AccountFilter) -> StorageResult<Vec<Account>> {
        let role = filter.role.map(|role| role.as_str());
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE (? IS NULL OR role = ?) ORDER BY id"
        ))
        .bind(role)
        .bind(role)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(account_row_to_record).collect()
    }
}

#[async_trait]
impl LookupStore for SqliteGovernanceStorage {
    async fn create_lookup_entry(
        &self,
        entry: NewLookupEntry,
        created_at: DateTime<Utc>,
    ) -> StorageResult<LookupEntry> {
        let result = sqlx::query(
            r#"
            INSERT INTO lookup_entries
                (data_type, code, value, description, status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.data_type)
        .bind(&entry.code)
        .bind(&entry.value)
        .bind(&entry.description)
        .bind(entry.status.as_str())
        .bind(&entry.created_by)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        Ok(LookupEntry {
            id: LookupEntryId(result.last_insert_rowid()),
            data_type: entry.data_type,
            code: entry.code,
            value: entry.value,
            description: entry.description,
            status: entry.status,
            created_by: entry.created_by,
            created_at,
            updated_at: created_at,
        })
    }

    async fn update_lookup_entry(
        &self,
        id: LookupEntryId,
        patch: LookupPatch,
        updated_at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE lookup_entries SET updated_at = ");
        builder.push_bind(updated_at);
        if let Some(value) = patch.value {
            builder.push(", value = ").push_bind(value);
        }
        if let Some(description) = patch.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(status) = patch.status {
            builder.push(", status = ").push_bind(status.as_str());
        }
        builder.push(" WHERE id = ").push_bind(id.0);

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_lookup_entry(&self, id: LookupEntryId) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM lookup_entries WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_lookup_entry(&self, id: LookupEntryId) -> StorageResult<Option<LookupEntry>> {
        let row = sqlx::query(&format!(
            "SELECT {LOOKUP_COLUMNS} FROM lookup_entries WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(lookup_row_to_record).transpose()
    }

    async fn list_lookup_entries(&self, filter: LookupFilter) -> StorageResult<Vec<LookupEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {LOOKUP_COLUMNS} FROM lookup_entries \
             WHERE (? IS NULL OR data_type = ?) ORDER BY data_type, code"
        ))
        .bind(filter.data_type.as_deref())
        .bind(filter.data_type.as_deref())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(lookup_row_to_record).collect()
    }

    async fn distinct_data_types(&self) -> StorageResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT data_type FROM lookup_entries ORDER BY data_type")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(|row| {
                row.try_get::<String, _>("data_type")
                    .map_err(|e| StorageError::Backend(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl TaskStore for SqliteGovernanceStorage {
    async fn insert_task(&self, task: NewTask, created_at: DateTime<Utc>) -> StorageResult<Task> {
        let payload = serde_json::to_string(&task.payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO tasks
                (task_type, entity_type, entity_id, payload, status, created_by, created_at, updated_at)
            VALUES (?, ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(task.task_type().as_str())
        .bind(task.entity_kind().as_str())
        .bind(task.entity_id)
        .bind(payload)
        .bind(&task.created_by)
        .bind(created_at)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Task {
            id: TaskId(result.last_insert_rowid()),
            task_type: task.task_type(),
            entity_kind: task.entity_kind(),
            entity_id: task.entity_id,
            payload: task.payload,
            status: TaskStatus::Pending,
            created_by: task.created_by,
            created_at,
            updated_at: created_at,
            approved_by: None,
            approved_at: None,
            failure_detail: None,
        })
    }

    async fn get_task(&self, id: TaskId) -> StorageResult<Option<Task>> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        row.map(task_row_to_record).transpose()
    }

    async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
        window: QueryWindow,
    ) -> StorageResult<Vec<Task>> {
        // SQLite reads a negative LIMIT as "no limit".
        let limit = if window.limit == 0 {
            -1
        } else {
            to_i64(window.limit)?
        };
        let status = status.map(|status| status.as_str());

        let rows = sqlx::query(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE (? IS NULL OR status = ?) \
             ORDER BY created_at DESC, id DESC \
             LIMIT ? OFFSET ?"
        ))
        .bind(status)
        .bind(status)
        .bind(limit)
        .bind(to_i64(window.offset)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;
        rows.into_iter().map(task_row_to_record).collect()
    }

    async fn resolve_task(
        &self,
        id: TaskId,
        resolution: Resolution,
        resolved_by: &str,
        resolved_at: DateTime<Utc>,
        failure_detail: Option<String>,
    ) -> StorageResult<()> {
        let status: TaskStatus = resolution.into();
        let result = sqlx::query(
            r#"
            UPDATE tasks
               SET status = ?,
                   approved_by = ?,
                   approved_at = ?,
                   updated_at = ?,
                   failure_detail = ?
             WHERE id = ?
               AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(resolved_by)
        .bind(resolved_at)
        .bind(resolved_at)
        .bind(failure_detail)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        if result.rows_affected() == 0 {
            let exists = self.get_task(id).await?.is_some();
            if exists {
                return Err(StorageError::InvariantViolation(format!(
                    "task {id} is no longer pending"
                )));
            }
            return Err(StorageError::NotFound(format!("task {id} not found")));
        }

        Ok(())
    }
}

fn account_row_to_record(row: SqliteRow) -> StorageResult<Account> {
    let role_raw: String = row
        .try_get("role")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let role = Role::parse(&role_raw)
        .ok_or_else(|| StorageError::Serialization(format!("unknown role `{role_raw}`")))?;
    let secret: String = row
        .try_get("password_hash")
        .map_err(|e| StorageError::Backend(e.to_string()))?;

    Ok(Account {
        id: AccountId(
            row.try_get("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        username: row
            .try_get("username")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        secret: SecretHash::from_hashed(secret),
        role,
        email: row
            .try_get("email")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        full_name: row
            .try_get("full_name")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        department: row
            .try_get("department")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_by: row
            .try_get("created_by")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn lookup_row_to_record(row: SqliteRow) -> StorageResult<LookupEntry> {
    let status_raw: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let status = EntryStatus::from_str(&status_raw)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    Ok(LookupEntry {
        id: LookupEntryId(
            row.try_get("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        data_type: row
            .try_get("data_type")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        code: row
            .try_get("code")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        value: row
            .try_get("value")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        status,
        created_by: row
            .try_get("created_by")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn task_row_to_record(row: SqliteRow) -> StorageResult<Task> {
    let task_type: String = row
        .try_get("task_type")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let entity_type: String = row
        .try_get("entity_type")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let status: String = row
        .try_get("status")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let payload: String = row
        .try_get("payload")
        .map_err(|e| StorageError::Backend(e.to_string()))?;
    let task_type =
        TaskType::from_str(&task_type).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let entity_kind = EntityKind::from_str(&entity_type)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;

    Ok(Task {
        id: TaskId(
            row.try_get("id")
                .map_err(|e| StorageError::Backend(e.to_string()))?,
        ),
        task_type,
        entity_kind,
        entity_id: row
            .try_get("entity_id")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        payload: TaskPayload::decode_stored(task_type, entity_kind, &payload),
        status: TaskStatus::from_str(&status)
            .map_err(|e| StorageError::Serialization(e.to_string()))?,
        created_by: row
            .try_get("created_by")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        approved_by: row
            .try_get("approved_by")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        approved_at: row
            .try_get("approved_at")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
        failure_detail: row
            .try_get("failure_detail")
            .map_err(|e| StorageError::Backend(e.to_string()))?,
    })
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: usize) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("window value too large".to_string()))
}
