use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteworks_core::domain::settings::{CompanySettings, SettingsUpdate};

use super::{decimal_column, now_rfc3339, timestamp_column, RepositoryError, SettingsRepository};
use crate::DbPool;

const SETTINGS_SELECT: &str = "SELECT company_name, company_address, company_logo, tax_rate,
        currency, quotation_prefix, terms_and_conditions, updated_at
 FROM company_settings WHERE id = 1";

pub struct SqlSettingsRepository {
    pool: DbPool,
}

impl SqlSettingsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_settings(row: &SqliteRow) -> Result<CompanySettings, RepositoryError> {
    Ok(CompanySettings {
        company_name: row.try_get("company_name")?,
        company_address: row.try_get("company_address")?,
        company_logo: row.try_get("company_logo")?,
        tax_rate: decimal_column(row, "tax_rate")?,
        currency: row.try_get("currency")?,
        quotation_prefix: row.try_get("quotation_prefix")?,
        terms_and_conditions: row.try_get("terms_and_conditions")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

#[async_trait::async_trait]
impl SettingsRepository for SqlSettingsRepository {
    async fn get(&self) -> Result<CompanySettings, RepositoryError> {
        let row = sqlx::query(SETTINGS_SELECT).fetch_optional(&self.pool).await?;
        match row {
            Some(ref row) => row_to_settings(row),
            None => Ok(CompanySettings::default()),
        }
    }

    async fn update(&self, update: SettingsUpdate) -> Result<CompanySettings, RepositoryError> {
        update.validate()?;
        let mut tx = self.pool.begin().await?;

        // Seeds the single row with column defaults on first write.
        sqlx::query(
            "INSERT INTO company_settings (id, updated_at) VALUES (1, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(now_rfc3339())
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(SETTINGS_SELECT).fetch_one(&mut *tx).await?;
        let mut settings = row_to_settings(&row)?;
        update.apply_to(&mut settings);

        sqlx::query(
            "UPDATE company_settings
             SET company_name = ?, company_address = ?, company_logo = ?, tax_rate = ?,
                 currency = ?, quotation_prefix = ?, terms_and_conditions = ?, updated_at = ?
             WHERE id = 1",
        )
        .bind(&settings.company_name)
        .bind(&settings.company_address)
        .bind(&settings.company_logo)
        .bind(settings.tax_rate.to_string())
        .bind(&settings.currency)
        .bind(&settings.quotation_prefix)
        .bind(&settings.terms_and_conditions)
        .bind(settings.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(settings)
    }
}
