use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use common::{Error, NewStrategy, Result, StrategyPatch, StrategyRecord};
use strategy::StrategyCatalog;

/// Durable store of strategy identity, enabled flag and configuration.
///
/// Names are immutable and unique; rows are never deleted in normal
/// operation — strategies are disabled instead. The registry stores the
/// configuration document opaquely; shape validation belongs to the owning
/// strategy implementation at tick time.
#[derive(Clone)]
pub struct StrategyRegistry {
    db: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct Row {
    id: i64,
    name: String,
    description: String,
    enabled: bool,
    config: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Row {
    fn into_record(self) -> Result<StrategyRecord> {
        Ok(StrategyRecord {
            id: self.id,
            name: self.name,
            description: self.description,
            enabled: self.enabled,
            config: serde_json::from_str(&self.config)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl StrategyRegistry {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<StrategyRecord>> {
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id, name, description, enabled, config, created_at, updated_at
             FROM strategies ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Row::into_record).collect()
    }

    pub async fn list_enabled(&self) -> Result<Vec<StrategyRecord>> {
        let rows: Vec<Row> = sqlx::query_as(
            "SELECT id, name, description, enabled, config, created_at, updated_at
             FROM strategies WHERE enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Row::into_record).collect()
    }

    pub async fn get(&self, name: &str) -> Result<StrategyRecord> {
        let row: Option<Row> = sqlx::query_as(
            "SELECT id, name, description, enabled, config, created_at, updated_at
             FROM strategies WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        row.ok_or_else(|| Error::NotFound(name.to_string()))?
            .into_record()
    }

    pub async fn create(&self, new: NewStrategy) -> Result<StrategyRecord> {
        let config = serde_json::to_string(&new.config)?;
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO strategies (name, description, enabled, config, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.enabled)
        .bind(&config)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => self.get(&new.name).await,
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(Error::DuplicateName(new.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a partial update. The name itself is immutable.
    pub async fn update(&self, name: &str, patch: StrategyPatch) -> Result<StrategyRecord> {
        let mut record = self.get(name).await?;
        if let Some(enabled) = patch.enabled {
            record.enabled = enabled;
        }
        if let Some(description) = patch.description {
            record.description = description;
        }
        if let Some(config) = patch.config {
            record.config = config;
        }

        let config = serde_json::to_string(&record.config)?;
        sqlx::query(
            "UPDATE strategies SET description = ?1, enabled = ?2, config = ?3, updated_at = ?4
             WHERE name = ?5",
        )
        .bind(&record.description)
        .bind(record.enabled)
        .bind(&config)
        .bind(Utc::now())
        .bind(name)
        .execute(&self.db)
        .await?;

        self.get(name).await
    }

    /// Insert a disabled row with the reference config for any catalog entry
    /// missing from the table, so a fresh install shows every implementation
    /// without trading until an operator enables it.
    pub async fn seed_builtin(&self, catalog: &StrategyCatalog) -> Result<()> {
        for spec in catalog.specs() {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM strategies WHERE name = ?1")
                .bind(spec.name)
                .fetch_optional(&self.db)
                .await?;
            if exists.is_some() {
                continue;
            }

            self.create(NewStrategy {
                name: spec.name.to_string(),
                description: String::new(),
                enabled: false,
                config: (spec.default_config)(),
            })
            .await?;
            info!(strategy = spec.name, "Seeded registry row (disabled)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn test_db() -> SqlitePool {
        // One connection: a pooled in-memory database is per-connection.
        let db = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("../../migrations").run(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn create_get_and_list_round_trip() {
        let registry = StrategyRegistry::new(test_db().await);

        let created = registry
            .create(NewStrategy {
                name: "btc_15m_high_confidence".into(),
                description: "expiry sniper".into(),
                enabled: true,
                config: json!({"position_pct": 0.05}),
            })
            .await
            .unwrap();
        assert!(created.enabled);
        assert_eq!(created.config["position_pct"], json!(0.05));

        let fetched = registry.get("btc_15m_high_confidence").await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_name_is_a_typed_error() {
        let registry = StrategyRegistry::new(test_db().await);
        let new = NewStrategy {
            name: "dup".into(),
            description: String::new(),
            enabled: false,
            config: json!({}),
        };
        registry.create(new.clone()).await.unwrap();
        match registry.create(new).await {
            Err(Error::DuplicateName(name)) => assert_eq!(name, "dup"),
            other => panic!("expected DuplicateName, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_strategy_is_not_found() {
        let registry = StrategyRegistry::new(test_db().await);
        assert!(matches!(
            registry.get("ghost").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.update("ghost", StrategyPatch::default()).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_patches_only_provided_fields() {
        let registry = StrategyRegistry::new(test_db().await);
        registry
            .create(NewStrategy {
                name: "s".into(),
                description: "before".into(),
                enabled: true,
                config: json!({"a": 1}),
            })
            .await
            .unwrap();

        let updated = registry
            .update(
                "s",
                StrategyPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.enabled);
        assert_eq!(updated.description, "before");
        assert_eq!(updated.config, json!({"a": 1}));

        let updated = registry
            .update(
                "s",
                StrategyPatch {
                    config: Some(json!({"a": 2})),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.config, json!({"a": 2}));
        assert!(!updated.enabled);
    }

    #[tokio::test]
    async fn seeding_is_idempotent_and_disabled() {
        let registry = StrategyRegistry::new(test_db().await);
        let catalog = strategy::StrategyCatalog::builtin();

        registry.seed_builtin(&catalog).await.unwrap();
        registry.seed_builtin(&catalog).await.unwrap();

        let rows = registry.list().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].enabled);
        assert_eq!(rows[0].config["market_series"], json!("KXBTC"));
    }
}
