use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool, Row,
};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument};

/// Bundled schema migrations, applied in version order.
const MIGRATIONS: &[(i64, &str, &str)] = &[
    (1, "init", include_str!("../../migrations/0001_init.sql")),
    (
        2,
        "game_indexes",
        include_str!("../../migrations/0002_game_indexes.sql"),
    ),
];

#[derive(Clone)]
pub struct Db {
    pub pool: PgPool,
}

impl Db {
    // SECURITY: never include raw DSNs in tracing spans (they may contain credentials).
    #[instrument(skip(database_url))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self> {
        let mut connect_options = PgConnectOptions::from_str(database_url)?;

        // Ensure TLS is enabled when DSN contains sslmode=require
        if database_url.contains("sslmode=require") && !database_url.contains("sslmode=disable") {
            connect_options = connect_options.ssl_mode(PgSslMode::Require);
        }

        // PgBouncer txn mode safe
        if !crate::util::env::env_flag("USE_PREPARED", false) {
            connect_options = connect_options.statement_cache_capacity(0);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(connect_options)
            .await
            .context("connecting to postgres")?;
        info!(max_connections, "connected to db");

        let db = Self { pool };
        if auto_migrate {
            info!("running migrations (AUTO_MIGRATE=on)");
            db.run_migrations().await?;
        } else {
            info!("AUTO_MIGRATE disabled; skipping migrations");
        }
        Ok(db)
    }

    /// Apply any bundled migration not yet recorded in `_monitor_migrations`.
    pub async fn run_migrations(&self) -> Result<()> {
        // raw_sql avoids prepared statements under PgBouncer
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _monitor_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT,
                installed_at TIMESTAMPTZ DEFAULT now()
             )",
        )
        .execute(&self.pool)
        .await?;

        let applied_rows = sqlx::raw_sql("SELECT version FROM _monitor_migrations")
            .fetch_all(&self.pool)
            .await?;
        let mut applied: HashSet<i64> = HashSet::new();
        for r in applied_rows {
            applied.insert(r.try_get::<i64, _>(0)?);
        }

        for &(version, desc, sql) in MIGRATIONS {
            if applied.contains(&version) {
                continue;
            }
            info!(version, desc, "applying migration");
            let mut tx = self.pool.begin().await?;
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("migration {version}_{desc} failed"))?;
            sqlx::query("INSERT INTO _monitor_migrations(version, description) VALUES ($1, $2)")
                .persistent(false)
                .bind(version)
                .bind(desc)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            applied.insert(version);
        }

        info!(latest = MIGRATIONS.last().map(|m| m.0).unwrap_or_default(), "migrations up-to-date");
        Ok(())
    }
}
