use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::services::LockoutPolicy;
use crate::users::repo_types::{DatabaseReport, NewUser, RecentUser, User};

/// Timestamp columns are cast so tables created with plain `TIMESTAMP` decode too.
const USER_COLUMNS: &str = "id, nombre, email, telefono, fecha_nacimiento, \
     password_hash, activo, intentos_login, \
     bloqueado_hasta::timestamptz AS bloqueado_hasta, \
     ultimo_acceso::timestamptz AS ultimo_acceso, \
     fecha_registro::timestamptz AS fecha_registro, acepta_newsletter";

/// Persistence seam for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn email_exists(&self, email: &str) -> anyhow::Result<bool>;
    /// Returns `None` when the email is already taken.
    async fn create(&self, user: NewUser) -> anyhow::Result<Option<User>>;
    /// Bumps the failure counter for `email`. No-op when no such account exists.
    async fn record_failed_login(&self, email: &str, policy: &LockoutPolicy)
        -> anyhow::Result<()>;
    /// Resets the failure counter and stamps the last access time.
    async fn record_successful_login(&self, id: Uuid) -> anyhow::Result<()>;
    /// Replaces a plaintext credential with its hash.
    async fn upgrade_credential(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
    async fn report(&self, recent: i64) -> anyhow::Result<DatabaseReport>;
    /// Deletes accounts whose stored password is in the legacy format.
    async fn delete_legacy_credentials(&self) -> anyhow::Result<u64>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn email_exists(&self, email: &str) -> anyhow::Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.db)
                .await
                .context("check email")?;
        Ok(exists)
    }

    async fn create(&self, user: NewUser) -> anyhow::Result<Option<User>> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (nombre, email, telefono, fecha_nacimiento, password_hash, acepta_newsletter)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.birth_date)
        .bind(&user.password_hash)
        .bind(user.newsletter_opt_in)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(Some(u)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn record_failed_login(
        &self,
        email: &str,
        policy: &LockoutPolicy,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET intentos_login = intentos_login + 1,
                   bloqueado_hasta = CASE
                       WHEN $2::int IS NOT NULL AND intentos_login + 1 >= $2::int
                       THEN now() + ($3::bigint * interval '1 minute')
                       ELSE bloqueado_hasta
                   END
             WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(policy.threshold)
        .bind(policy.duration.whole_minutes())
        .execute(&self.db)
        .await
        .context("record failed login")?;
        Ok(())
    }

    async fn record_successful_login(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE users SET intentos_login = 0, ultimo_acceso = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("record successful login")?;
        Ok(())
    }

    async fn upgrade_credential(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("upgrade credential")?;
        Ok(())
    }

    async fn report(&self, recent: i64) -> anyhow::Result<DatabaseReport> {
        let version: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&self.db)
            .await
            .context("select version")?;

        let users_exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT FROM information_schema.tables
                 WHERE table_name = 'users'
            )
            "#,
        )
        .fetch_one(&self.db)
        .await
        .context("check users table")?;

        if !users_exists {
            return Ok(DatabaseReport {
                version,
                users_exists,
                users_count: 0,
                recent_users: Vec::new(),
            });
        }

        let users_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await
            .context("count users")?;

        let recent_users = sqlx::query_as::<_, RecentUser>(
            r#"
            SELECT id, nombre, email,
                   fecha_registro::timestamptz AS fecha_registro, activo
              FROM users
             ORDER BY fecha_registro DESC
             LIMIT $1
            "#,
        )
        .bind(recent)
        .fetch_all(&self.db)
        .await
        .context("list recent users")?;

        Ok(DatabaseReport {
            version,
            users_exists,
            users_count,
            recent_users,
        })
    }

    async fn delete_legacy_credentials(&self) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM users
             WHERE password_hash ~ '^[A-Z]'
                OR length(password_hash) < 6
            "#,
        )
        .execute(&self.db)
        .await
        .context("delete legacy credentials")?;
        Ok(res.rows_affected())
    }
}
