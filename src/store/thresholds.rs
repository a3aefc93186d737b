use super::{store_err, Store};
use crate::core::error::Result;
use crate::core::types::AdaptiveThresholds;
use libsql::params;
use tracing::debug;

impl Store {
    pub async fn get_thresholds(&self) -> Result<AdaptiveThresholds> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT min_importance, min_confidence, category_bonuses FROM adaptive_thresholds WHERE id = 1",
                (),
            )
            .await
            .map_err(store_err)?;

        match rows.next().await.map_err(store_err)? {
            Some(row) => {
                let bonuses_json: String = row.get(2).map_err(store_err)?;
                Ok(AdaptiveThresholds {
                    min_importance_to_store: row.get(0).map_err(store_err)?,
                    min_confidence_to_store: row.get(1).map_err(store_err)?,
                    category_bonuses: serde_json::from_str(&bonuses_json).unwrap_or_default(),
                })
            }
            None => Ok(AdaptiveThresholds::default()),
        }
    }

    /// Replace the singleton thresholds row. The whole tuple is written in
    /// one statement so readers never observe a half-applied adaptation.
    pub async fn set_thresholds(&self, thresholds: &AdaptiveThresholds) -> Result<()> {
        let _guard = self.write_guard().await;
        let bonuses_json = serde_json::to_string(&thresholds.category_bonuses)
            .unwrap_or_else(|_| "{}".to_string());
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO adaptive_thresholds (id, min_importance, min_confidence, category_bonuses, updated_at)
            VALUES (1, ?, ?, ?, strftime('%s', 'now'))
            ON CONFLICT(id) DO UPDATE SET
                min_importance = excluded.min_importance,
                min_confidence = excluded.min_confidence,
                category_bonuses = excluded.category_bonuses,
                updated_at = excluded.updated_at
            "#,
            params![
                thresholds.min_importance_to_store,
                thresholds.min_confidence_to_store,
                bonuses_json,
            ],
        )
        .await
        .map_err(store_err)?;

        debug!(
            "thresholds persisted: importance >= {:.2}, confidence >= {:.2}",
            thresholds.min_importance_to_store, thresholds.min_confidence_to_store
        );
        Ok(())
    }
}
