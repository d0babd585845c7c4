use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use market_core::ConfigType;

use crate::models::ConfigRow;

/// Serialize a JSON value with object keys sorted at every level, so
/// structurally equal payloads always fingerprint identically.
pub fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let fields: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", fields.join(","))
        }
        other => other.to_string(),
    }
}

/// SHA-256 over the canonical serialization, hex encoded.
pub fn content_hash(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

/// Versioned configuration store over `analysis_configurations`.
///
/// Configs are immutable once referenced: `ensure` either finds an active
/// row with the same content hash or inserts a new `(name, version)` row.
#[derive(Clone)]
pub struct ConfigRepository {
    pool: SqlitePool,
}

impl ConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Find-or-create a config row addressed by content hash.
    pub async fn ensure(
        &self,
        name: &str,
        config_type: ConfigType,
        description: Option<&str>,
        payload: &serde_json::Value,
    ) -> Result<ConfigRow, sqlx::Error> {
        let hash = content_hash(payload);

        if let Some(existing) = self.find_by_hash(config_type, &hash).await? {
            return Ok(existing);
        }

        let next_version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM analysis_configurations WHERE name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        let row: ConfigRow = sqlx::query_as(
            r#"
            INSERT INTO analysis_configurations
                (name, description, config_type, config_data, version, is_active, content_hash)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(config_type.as_str())
        .bind(payload.to_string())
        .bind(next_version)
        .bind(&hash)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            name,
            config_type = config_type.as_str(),
            version = row.version,
            hash = %&hash[..12],
            "created configuration"
        );
        Ok(row)
    }

    pub async fn find_by_hash(
        &self,
        config_type: ConfigType,
        hash: &str,
    ) -> Result<Option<ConfigRow>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT * FROM analysis_configurations
            WHERE config_type = ? AND content_hash = ? AND is_active = 1
            ORDER BY version DESC LIMIT 1
            "#,
        )
        .bind(config_type.as_str())
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<ConfigRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM analysis_configurations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn list_by_type(
        &self,
        config_type: ConfigType,
        active_only: bool,
    ) -> Result<Vec<ConfigRow>, sqlx::Error> {
        if active_only {
            sqlx::query_as(
                "SELECT * FROM analysis_configurations WHERE config_type = ? AND is_active = 1 ORDER BY name, version",
            )
            .bind(config_type.as_str())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as(
                "SELECT * FROM analysis_configurations WHERE config_type = ? ORDER BY name, version",
            )
            .bind(config_type.as_str())
            .fetch_all(&self.pool)
            .await
        }
    }

    /// Soft-deactivate; the row stays for runs that reference it.
    pub async fn deactivate(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE analysis_configurations SET is_active = 0, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MarketDb;
    use serde_json::json;

    #[test]
    fn hash_ignores_key_order() {
        let a = json!({"ma_short": 9, "ma_long": 50, "nested": {"x": 1, "y": 2}});
        let b = json!({"nested": {"y": 2, "x": 1}, "ma_long": 50, "ma_short": 9});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_distinguishes_values() {
        let a = json!({"ma_short": 9});
        let b = json!({"ma_short": 10});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn canonical_json_sorts_recursively() {
        let value = json!({"b": [{"z": 1, "a": 2}], "a": true});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":true,"b":[{"a":2,"z":1}]}"#
        );
    }

    #[tokio::test]
    async fn ensure_reuses_structurally_equal_payloads() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = ConfigRepository::new(db.pool().clone());

        let first = repo
            .ensure(
                "default-indicators",
                ConfigType::Indicator,
                Some("defaults"),
                &json!({"ma_short": 9, "ma_long": 50}),
            )
            .await
            .unwrap();
        let second = repo
            .ensure(
                "default-indicators",
                ConfigType::Indicator,
                None,
                &json!({"ma_long": 50, "ma_short": 9}),
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.version, 1);
    }

    #[tokio::test]
    async fn changed_payload_bumps_version() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = ConfigRepository::new(db.pool().clone());

        let v1 = repo
            .ensure(
                "default-indicators",
                ConfigType::Indicator,
                None,
                &json!({"ma_short": 9}),
            )
            .await
            .unwrap();
        let v2 = repo
            .ensure(
                "default-indicators",
                ConfigType::Indicator,
                None,
                &json!({"ma_short": 12}),
            )
            .await
            .unwrap();

        assert_ne!(v1.id, v2.id);
        assert_eq!(v2.version, 2);

        let all = repo
            .list_by_type(ConfigType::Indicator, true)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn deactivated_configs_are_not_reused() {
        let db = MarketDb::in_memory().await.unwrap();
        let repo = ConfigRepository::new(db.pool().clone());
        let payload = json!({"min_score_threshold": 10.0});

        let v1 = repo
            .ensure("analysis", ConfigType::Analysis, None, &payload)
            .await
            .unwrap();
        repo.deactivate(v1.id).await.unwrap();

        let v2 = repo
            .ensure("analysis", ConfigType::Analysis, None, &payload)
            .await
            .unwrap();
        assert_ne!(v1.id, v2.id);
        assert_eq!(v2.version, 2);

        // The deactivated row is still readable for old runs.
        let row = repo.get(v1.id).await.unwrap().unwrap();
        assert!(!row.is_active);
    }
}
