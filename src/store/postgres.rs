use async_trait::async_trait;

use super::{codec, parse_departments, seed, InventoryStore, ReasonUpdate, RequisitionStore};
use crate::{
    database::Database,
    errors::StoreError,
    models::{Department, InventoryItem, InventoryRecord, RequestStatus, Requisition, RequisitionRecord},
    utils::{credential_matches, hash_password},
};

const REQUISITION_COLUMNS: &str =
    "id, department, requester, date, status, remarks, description, items, event_date, rejection_reason";

/// Read-only access to the stock registry database.
#[derive(Clone)]
pub struct PgInventoryStore {
    db: Database,
}

impl PgInventoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, StoreError> {
        let records = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT
                id::text AS id,
                name,
                category,
                par_stock::bigint AS par_stock,
                uom,
                unit_cost::numeric AS unit_cost,
                stock_json::text AS stock_json
            FROM inventory
            "#,
        )
        .fetch_all(&self.db)
        .await
        .map_err(|e| {
            log::error!("failed to fetch inventory: {}", e);
            StoreError::from(e)
        })?;

        Ok(crate::models::inventory::in_stock(records))
    }

    async fn fetch_departments(&self) -> Result<Vec<Department>, StoreError> {
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT value_json::text FROM config WHERE key = 'system_config'",
        )
        .fetch_optional(&self.db)
        .await;

        match row {
            Ok(Some(Some(raw))) => Ok(parse_departments(&raw)),
            Ok(_) => Ok(Vec::new()),
            // Registries without a config table simply have no department list.
            Err(sqlx::Error::Database(e)) => {
                log::warn!("department config unavailable: {}", e);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Read/write access to the requisitions database.
#[derive(Clone)]
pub struct PgRequisitionStore {
    db: Database,
    default_admin_secret: String,
}

impl PgRequisitionStore {
    pub fn new(db: Database, default_admin_secret: impl Into<String>) -> Self {
        Self {
            db,
            default_admin_secret: default_admin_secret.into(),
        }
    }

    async fn insert_record(&self, record: &RequisitionRecord) -> Result<u64, StoreError> {
        // Re-inserting the same submission is a no-op update; a different requisition
        // holding the id leaves the row alone and reports zero rows.
        let result = sqlx::query(
            r#"
            INSERT INTO requisitions (
                id, department, requester, date, status, remarks, description, items, event_date, rejection_reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                remarks = EXCLUDED.remarks,
                description = EXCLUDED.description,
                items = EXCLUDED.items,
                event_date = EXCLUDED.event_date,
                rejection_reason = EXCLUDED.rejection_reason
            WHERE requisitions.department = EXCLUDED.department
              AND requisitions.requester = EXCLUDED.requester
              AND requisitions.date = EXCLUDED.date
            "#,
        )
        .bind(&record.id)
        .bind(&record.department)
        .bind(&record.requester)
        .bind(&record.date)
        .bind(&record.status)
        .bind(&record.remarks)
        .bind(&record.description)
        .bind(&record.items)
        .bind(&record.event_date)
        .bind(&record.rejection_reason)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RequisitionStore for PgRequisitionStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS requisitions (
                id TEXT PRIMARY KEY,
                department TEXT,
                requester TEXT,
                date TEXT,
                status TEXT,
                remarks TEXT,
                description TEXT,
                items TEXT,
                event_date TEXT,
                rejection_reason TEXT
            )
            "#,
        )
        .execute(&self.db)
        .await?;

        // Tables created by earlier releases lack these columns.
        for column in ["event_date", "rejection_reason"] {
            sqlx::query(&format!(
                "ALTER TABLE requisitions ADD COLUMN IF NOT EXISTS {} TEXT",
                column
            ))
            .execute(&self.db)
            .await?;
        }

        sqlx::query("CREATE TABLE IF NOT EXISTS app_config (key TEXT PRIMARY KEY, value TEXT)")
            .execute(&self.db)
            .await?;

        let stored = sqlx::query_scalar::<_, Option<String>>(
            "SELECT value FROM app_config WHERE key = $1",
        )
        .bind(seed::ADMIN_PASSWORD_KEY)
        .fetch_optional(&self.db)
        .await?;

        if stored.is_none() {
            let hash = hash_password(&self.default_admin_secret)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            sqlx::query(
                "INSERT INTO app_config (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
            )
            .bind(seed::ADMIN_PASSWORD_KEY)
            .bind(hash)
            .execute(&self.db)
            .await?;
            log::info!("seeded default admin credential");
        }

        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM requisitions")
            .fetch_one(&self.db)
            .await?;

        if count == 0 {
            for requisition in seed::example_requisitions() {
                self.insert_record(&codec::encode_record(&requisition)?).await?;
            }
            log::info!("seeded example requisitions");
        }

        Ok(())
    }

    async fn fetch_requisitions(&self) -> Result<Vec<Requisition>, StoreError> {
        let records = sqlx::query_as::<_, RequisitionRecord>(&format!(
            "SELECT {} FROM requisitions ORDER BY date DESC",
            REQUISITION_COLUMNS
        ))
        .fetch_all(&self.db)
        .await
        .map_err(|e| {
            log::error!("failed to fetch requisitions: {}", e);
            StoreError::from(e)
        })?;

        Ok(codec::decode_records(records))
    }

    async fn insert_requisition(&self, requisition: &Requisition) -> Result<(), StoreError> {
        let record = codec::encode_record(requisition)?;
        if self.insert_record(&record).await? == 0 {
            return Err(StoreError::Conflict(requisition.id.clone()));
        }
        Ok(())
    }

    async fn update_requisition(&self, requisition: &Requisition) -> Result<(), StoreError> {
        let record = codec::encode_record(requisition)?;
        let result = sqlx::query(
            r#"
            UPDATE requisitions
            SET department = $1, requester = $2, date = $3, status = $4, remarks = $5,
                description = $6, items = $7, event_date = $8, rejection_reason = $9
            WHERE id = $10
            "#,
        )
        .bind(&record.department)
        .bind(&record.requester)
        .bind(&record.date)
        .bind(&record.status)
        .bind(&record.remarks)
        .bind(&record.description)
        .bind(&record.items)
        .bind(&record.event_date)
        .bind(&record.rejection_reason)
        .bind(&record.id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(requisition.id.clone()));
        }
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        status: RequestStatus,
        reason: ReasonUpdate,
    ) -> Result<(), StoreError> {
        let query = match reason {
            ReasonUpdate::Keep => sqlx::query("UPDATE requisitions SET status = $1 WHERE id = $2")
                .bind(status.as_str())
                .bind(id),
            ReasonUpdate::Clear => sqlx::query(
                "UPDATE requisitions SET status = $1, rejection_reason = NULL WHERE id = $2",
            )
            .bind(status.as_str())
            .bind(id),
            ReasonUpdate::Set(reason) => sqlx::query(
                "UPDATE requisitions SET status = $1, rejection_reason = $2 WHERE id = $3",
            )
            .bind(status.as_str())
            .bind(reason)
            .bind(id),
        };

        let result = query.execute(&self.db).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn verify_admin_credential(&self, secret: &str) -> Result<bool, StoreError> {
        let stored = sqlx::query_scalar::<_, Option<String>>(
            "SELECT value FROM app_config WHERE key = $1",
        )
        .bind(seed::ADMIN_PASSWORD_KEY)
        .fetch_optional(&self.db)
        .await?;

        Ok(match stored.flatten() {
            Some(value) => credential_matches(secret, &value),
            None => secret == self.default_admin_secret,
        })
    }
}
