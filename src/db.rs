//! libsql-backed permission store.
//!
//! Supports multiple backends:
//! - Local SQLite file: `path/to/db.sqlite` or `file:path` or `sqlite://path`
//! - In-memory: `:memory:`
//! - Remote Turso: `libsql://...` or `https://...` (requires TURSO_AUTH_TOKEN env var)

use libsql::{Builder, Connection, Database, Value, params};
use tokio::sync::RwLock;

use crate::store::{Denial, Grants, Principal, UserPermission};
use crate::{Error, Result};

const SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS principals (
    id TEXT PRIMARY KEY,
    email TEXT,
    role TEXT
);

CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS permissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
    PRIMARY KEY (role_id, permission_id)
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    role_id INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    PRIMARY KEY (user_id, role_id)
);

CREATE TABLE IF NOT EXISTS user_permissions (
    user_id TEXT NOT NULL REFERENCES principals(id) ON DELETE CASCADE,
    permission_id INTEGER NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
    denied INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (user_id, permission_id)
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    user_id TEXT,
    user_role TEXT,
    details TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Connect to the database.
///
/// # URL formats
/// - Local file: `mydata.db`, `file:path/to/db.sqlite`, `sqlite://path`
/// - In-memory: `:memory:`
/// - Remote Turso: `libsql://your-db.turso.io` (requires `TURSO_AUTH_TOKEN` env var)
pub async fn connect(url: &str) -> Result<Database> {
    let db = if url.starts_with("libsql://") || url.starts_with("https://") {
        let token = std::env::var("TURSO_AUTH_TOKEN")
            .map_err(|_| Error::Config("TURSO_AUTH_TOKEN not set for remote database".into()))?;
        Builder::new_remote(url.to_string(), token).build().await?
    } else if url == ":memory:" {
        Builder::new_local(":memory:").build().await?
    } else {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        Builder::new_local(path).build().await?
    };

    Ok(db)
}

/// Create the permission tables if they do not exist.
pub async fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).await?;
    Ok(())
}

fn text(value: Option<&str>) -> Value {
    match value {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

/// Permission store over a single libsql connection.
///
/// One connection is shared so that `:memory:` databases stay visible to
/// every caller. Reads hold the shared side of `lock` for their whole
/// multi-query read; every write, audit rows included, holds the exclusive
/// side, so no reader observes a transaction in progress.
pub struct Store {
    _db: Database,
    conn: Connection,
    lock: RwLock<()>,
}

impl Store {
    /// Connect, run migrations and return a ready store.
    pub async fn open(url: &str) -> Result<Self> {
        let db = connect(url).await?;
        let conn = db.connect()?;
        migrate(&conn).await?;
        Ok(Self {
            _db: db,
            conn,
            lock: RwLock::new(()),
        })
    }

    /// The underlying connection, for callers that need ad hoc queries.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of audit rows of the given event type.
    pub async fn audit_count(&self, event_type: &str) -> Result<i64> {
        let _guard = self.lock.read().await;
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM audit_logs WHERE event_type = ?1",
                params![event_type],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Ok(0),
        }
    }
}

async fn role_id(conn: &Connection, name: &str) -> Result<Option<i64>> {
    let mut rows = conn
        .query("SELECT id FROM roles WHERE name = ?1", params![name])
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row.get::<i64>(0)?)),
        None => Ok(None),
    }
}

async fn permission_id(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO permissions (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
        params![name],
    )
    .await?;
    let mut rows = conn
        .query("SELECT id FROM permissions WHERE name = ?1", params![name])
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| Error::Internal(format!("permission {name} vanished after insert")))?;
    Ok(row.get::<i64>(0)?)
}

async fn collect_names(conn: &Connection, sql: &str, principal_id: &str) -> Result<Vec<String>> {
    let mut rows = conn.query(sql, params![principal_id]).await?;
    let mut names = Vec::new();
    while let Some(row) = rows.next().await? {
        names.push(row.get::<String>(0)?);
    }
    Ok(names)
}

impl crate::store::Store for Store {
    async fn principal(&self, id: &str) -> Result<Option<Principal>> {
        let _guard = self.lock.read().await;
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, role FROM principals WHERE id = ?1",
                params![id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Principal {
                id: row.get::<String>(0)?,
                email: row.get::<Option<String>>(1)?,
                role: row.get::<Option<String>>(2)?,
            })),
            None => Ok(None),
        }
    }

    async fn grants(&self, principal_id: &str) -> Result<Grants> {
        let _guard = self.lock.read().await;
        let roles = collect_names(
            &self.conn,
            "SELECT r.name FROM user_roles ur \
             JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = ?1 ORDER BY r.name",
            principal_id,
        )
        .await?;

        let role_permissions = collect_names(
            &self.conn,
            "SELECT p.name FROM user_roles ur \
             JOIN role_permissions rp ON rp.role_id = ur.role_id \
             JOIN permissions p ON p.id = rp.permission_id \
             WHERE ur.user_id = ?1",
            principal_id,
        )
        .await?;

        let mut rows = self
            .conn
            .query(
                "SELECT p.name, up.denied FROM user_permissions up \
                 JOIN permissions p ON p.id = up.permission_id \
                 WHERE up.user_id = ?1",
                params![principal_id],
            )
            .await?;
        let mut user_permissions = Vec::new();
        while let Some(row) = rows.next().await? {
            user_permissions.push(UserPermission {
                name: row.get::<String>(0)?,
                denied: row.get::<i64>(1)? != 0,
            });
        }

        Ok(Grants {
            roles,
            role_permissions,
            user_permissions,
        })
    }

    async fn record_denial(&self, denial: &Denial) -> Result<()> {
        let details = serde_json::json!({
            "required": denial.required,
            "mode": denial.mode,
            "path": denial.path,
        });
        let _guard = self.lock.write().await;
        self.conn
            .execute(
                "INSERT INTO audit_logs (event_type, user_id, user_role, details, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params::Params::Positional(vec![
                    Value::Text("permission_denied".into()),
                    Value::Text(denial.principal_id.clone()),
                    text(denial.role.as_deref()),
                    Value::Text(details.to_string()),
                    Value::Text(jiff::Timestamp::now().to_string()),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn upsert_principal(&self, principal: &Principal) -> Result<()> {
        let _guard = self.lock.write().await;
        self.conn
            .execute(
                "INSERT INTO principals (id, email, role) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(id) DO UPDATE SET email = excluded.email, role = excluded.role",
                libsql::params::Params::Positional(vec![
                    Value::Text(principal.id.clone()),
                    text(principal.email.as_deref()),
                    text(principal.role.as_deref()),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn upsert_role(&self, name: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        self.conn
            .execute(
                "INSERT INTO roles (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
                params![name],
            )
            .await?;
        Ok(())
    }

    async fn set_user_permission(&self, principal_id: &str, permission: &str, denied: bool) -> Result<()> {
        let _guard = self.lock.write().await;
        let permission_id = permission_id(&self.conn, permission).await?;
        self.conn
            .execute(
                "INSERT INTO user_permissions (user_id, permission_id, denied) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(user_id, permission_id) DO UPDATE SET denied = excluded.denied",
                params![principal_id, permission_id, i64::from(denied)],
            )
            .await?;
        Ok(())
    }

    async fn remove_user_permission(&self, principal_id: &str, permission: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let removed = self
            .conn
            .execute(
                "DELETE FROM user_permissions WHERE user_id = ?1 AND permission_id = \
                 (SELECT id FROM permissions WHERE name = ?2)",
                params![principal_id, permission],
            )
            .await?;
        Ok(removed > 0)
    }

    async fn assign_role(&self, principal_id: &str, role: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        let role_id = role_id(&self.conn, role)
            .await?
            .ok_or_else(|| Error::NotFound(format!("role {role}")))?;
        self.conn
            .execute(
                "INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2) \
                 ON CONFLICT(user_id, role_id) DO NOTHING",
                params![principal_id, role_id],
            )
            .await?;
        Ok(())
    }

    async fn unassign_role(&self, principal_id: &str, role: &str) -> Result<bool> {
        let _guard = self.lock.write().await;
        let removed = self
            .conn
            .execute(
                "DELETE FROM user_roles WHERE user_id = ?1 AND role_id = \
                 (SELECT id FROM roles WHERE name = ?2)",
                params![principal_id, role],
            )
            .await?;
        Ok(removed > 0)
    }

    async fn replace_role_permissions(&self, role: &str, permissions: &[String]) -> Result<()> {
        let _guard = self.lock.write().await;
        let tx = self.conn.transaction().await?;
        let role_id = role_id(&tx, role)
            .await?
            .ok_or_else(|| Error::NotFound(format!("role {role}")))?;

        tx.execute(
            "DELETE FROM role_permissions WHERE role_id = ?1",
            params![role_id],
        )
        .await?;
        for name in permissions {
            let permission_id = permission_id(&tx, name).await?;
            tx.execute(
                "INSERT INTO role_permissions (role_id, permission_id) VALUES (?1, ?2) \
                 ON CONFLICT(role_id, permission_id) DO NOTHING",
                params![role_id, permission_id],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
