use super::{store_err, ts_to_datetime, Store};
use crate::core::error::{CrawlError, Result};
use crate::core::types::{CategorizationRule, RuleType};
use libsql::params;
use tracing::info;

impl Store {
    /// Active (or all) rules ordered for evaluation: priority ascending,
    /// then oldest first so long-standing rules win ties.
    pub async fn list_rules(&self, active_only: bool) -> Result<Vec<CategorizationRule>> {
        let sql = if active_only {
            r#"
            SELECT rule_name, rule_type, pattern, category, subcategory,
                   confidence_boost, priority, active, created_at
            FROM categorization_rules WHERE active = 1
            ORDER BY priority ASC, created_at ASC
            "#
        } else {
            r#"
            SELECT rule_name, rule_type, pattern, category, subcategory,
                   confidence_boost, priority, active, created_at
            FROM categorization_rules
            ORDER BY priority ASC, created_at ASC
            "#
        };

        let conn = self.connect()?;
        let mut rows = conn.query(sql, ()).await.map_err(store_err)?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await.map_err(store_err)? {
            rules.push(row_to_rule(&row)?);
        }
        Ok(rules)
    }

    /// Create a rule. Fails with `BadInput` when the name is taken; rule
    /// names are the stable identity callers use to deactivate later.
    pub async fn insert_rule(&self, rule: &CategorizationRule) -> Result<()> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;

        let mut existing = conn
            .query(
                "SELECT 1 FROM categorization_rules WHERE rule_name = ?",
                params![rule.rule_name.clone()],
            )
            .await
            .map_err(store_err)?;
        if existing.next().await.map_err(store_err)?.is_some() {
            return Err(CrawlError::BadInput(format!(
                "rule '{}' already exists",
                rule.rule_name
            )));
        }

        conn.execute(
            r#"
            INSERT INTO categorization_rules
                (rule_name, rule_type, pattern, category, subcategory,
                 confidence_boost, priority, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                rule.rule_name.clone(),
                rule.rule_type.as_str(),
                rule.pattern.clone(),
                rule.category.clone(),
                rule.subcategory.clone(),
                rule.confidence_boost,
                rule.priority,
                rule.active as i64,
                rule.created_at.timestamp(),
            ],
        )
        .await
        .map_err(store_err)?;

        info!("added categorization rule '{}'", rule.rule_name);
        Ok(())
    }

    /// Update an existing rule's pattern and classification in place.
    pub async fn upsert_rule(&self, rule: &CategorizationRule) -> Result<()> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO categorization_rules
                (rule_name, rule_type, pattern, category, subcategory,
                 confidence_boost, priority, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(rule_name) DO UPDATE SET
                rule_type = excluded.rule_type,
                pattern = excluded.pattern,
                category = excluded.category,
                subcategory = excluded.subcategory,
                confidence_boost = excluded.confidence_boost,
                priority = excluded.priority,
                active = excluded.active
            "#,
            params![
                rule.rule_name.clone(),
                rule.rule_type.as_str(),
                rule.pattern.clone(),
                rule.category.clone(),
                rule.subcategory.clone(),
                rule.confidence_boost,
                rule.priority,
                rule.active as i64,
                rule.created_at.timestamp(),
            ],
        )
        .await
        .map_err(store_err)?;
        Ok(())
    }

    /// Rules are never deleted outright; deactivation preserves history.
    pub async fn deactivate_rule(&self, rule_name: &str) -> Result<bool> {
        let _guard = self.write_guard().await;
        let conn = self.connect()?;
        let changed = conn
            .execute(
                "UPDATE categorization_rules SET active = 0 WHERE rule_name = ?",
                params![rule_name],
            )
            .await
            .map_err(store_err)?;
        Ok(changed > 0)
    }
}

fn row_to_rule(row: &libsql::Row) -> Result<CategorizationRule> {
    let rule_type_raw: String = row.get(1).map_err(store_err)?;
    let active_raw: i64 = row.get(7).map_err(store_err)?;
    Ok(CategorizationRule {
        rule_name: row.get(0).map_err(store_err)?,
        rule_type: RuleType::parse_str(&rule_type_raw).unwrap_or(RuleType::Keyword),
        pattern: row.get(2).map_err(store_err)?,
        category: row.get(3).map_err(store_err)?,
        subcategory: row.get(4).ok(),
        confidence_boost: row.get(5).map_err(store_err)?,
        priority: row.get(6).map_err(store_err)?,
        active: active_raw != 0,
        created_at: ts_to_datetime(row.get(8).map_err(store_err)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(name: &str, priority: i64) -> CategorizationRule {
        CategorizationRule {
            rule_name: name.to_string(),
            rule_type: RuleType::Keyword,
            pattern: "python".to_string(),
            category: "programming".to_string(),
            subcategory: Some("python".to_string()),
            confidence_boost: 0.1,
            priority,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_names() {
        let store = Store::open(":memory:").await.unwrap();
        store.insert_rule(&rule("py", 5)).await.unwrap();
        let err = store.insert_rule(&rule("py", 1)).await.unwrap_err();
        assert!(matches!(err, CrawlError::BadInput(_)));
    }

    #[tokio::test]
    async fn rules_ordered_by_priority_then_age() {
        let store = Store::open(":memory:").await.unwrap();
        store.insert_rule(&rule("late", 5)).await.unwrap();
        store.insert_rule(&rule("urgent", 1)).await.unwrap();

        let rules = store.list_rules(true).await.unwrap();
        assert_eq!(rules[0].rule_name, "urgent");
        assert_eq!(rules[1].rule_name, "late");
    }

    #[tokio::test]
    async fn upsert_updates_in_place() {
        let store = Store::open(":memory:").await.unwrap();
        store.insert_rule(&rule("py", 5)).await.unwrap();

        let mut updated = rule("py", 2);
        updated.pattern = "python3".to_string();
        store.upsert_rule(&updated).await.unwrap();

        let rules = store.list_rules(true).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].pattern, "python3");
        assert_eq!(rules[0].priority, 2);
    }

    #[tokio::test]
    async fn deactivation_hides_from_active_listing() {
        let store = Store::open(":memory:").await.unwrap();
        store.insert_rule(&rule("py", 5)).await.unwrap();
        assert!(store.deactivate_rule("py").await.unwrap());
        assert!(store.list_rules(true).await.unwrap().is_empty());
        // Still present in the full listing — history is kept.
        let all = store.list_rules(false).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].active);
        // Unknown names are a no-op, not an error.
        assert!(!store.deactivate_rule("nope").await.unwrap());
    }
}
