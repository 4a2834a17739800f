use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use quoteworks_core::domain::material::{
    Material, MaterialFilter, MaterialId, MaterialPatch, NewMaterial,
};

use super::component::recompute_components_using;
use super::{
    decimal_column, like_pattern, now_rfc3339, timestamp_column, MaterialRepository, Page,
    PageRequest, RepositoryError,
};
use crate::DbPool;

const MATERIAL_COLUMNS: &str = "id, name, description, unit, unit_cost, stock_qty, \
                                classification, created_at, updated_at";

const FILTER_CLAUSE: &str = "WHERE (? IS NULL OR classification = ?)
       AND (? IS NULL OR lower(name) LIKE ? OR lower(description) LIKE ?)";

pub struct SqlMaterialRepository {
    pool: DbPool,
}

impl SqlMaterialRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_material(row: &SqliteRow) -> Result<Material, RepositoryError> {
    Ok(Material {
        id: MaterialId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        unit: row.try_get("unit")?,
        unit_cost: decimal_column(row, "unit_cost")?,
        stock_qty: decimal_column(row, "stock_qty")?,
        classification: row.try_get("classification")?,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

fn bind_filter<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    filter: &'q MaterialFilter,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    let keyword = filter.keyword.as_deref().map(like_pattern);
    query
        .bind(filter.classification.as_deref())
        .bind(filter.classification.as_deref())
        .bind(keyword.clone())
        .bind(keyword.clone())
        .bind(keyword)
}

#[async_trait::async_trait]
impl MaterialRepository for SqlMaterialRepository {
    async fn list(&self, filter: &MaterialFilter) -> Result<Vec<Material>, RepositoryError> {
        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials {FILTER_CLAUSE} ORDER BY id");
        let rows = bind_filter(sqlx::query(&sql), filter).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_material).collect()
    }

    async fn list_page(
        &self,
        filter: &MaterialFilter,
        page: PageRequest,
    ) -> Result<Page<Material>, RepositoryError> {
        let count_sql = format!("SELECT COUNT(*) AS total FROM materials {FILTER_CLAUSE}");
        let total: i64 = bind_filter(sqlx::query(&count_sql), filter)
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;

        let sql = format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials {FILTER_CLAUSE} ORDER BY id LIMIT ? OFFSET ?"
        );
        let rows = bind_filter(sqlx::query(&sql), filter)
            .bind(i64::from(page.page_size))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            items: rows.iter().map(row_to_material).collect::<Result<Vec<_>, _>>()?,
            total: total.max(0) as u64,
            page: page.page,
            page_size: page.page_size,
        })
    }

    async fn find_by_id(&self, id: MaterialId) -> Result<Option<Material>, RepositoryError> {
        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_material).transpose()
    }

    async fn create(&self, material: NewMaterial) -> Result<Material, RepositoryError> {
        material.validate()?;
        let now = now_rfc3339();

        let result = sqlx::query(
            "INSERT INTO materials (name, description, unit, unit_cost, stock_qty,
                                    classification, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(material.name.trim())
        .bind(&material.description)
        .bind(material.unit.trim())
        .bind(material.unit_cost.to_string())
        .bind(material.stock_qty.to_string())
        .bind(&material.classification)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = MaterialId(result.last_insert_rowid());
        self.find_by_id(id).await?.ok_or_else(|| RepositoryError::not_found("material", id))
    }

    async fn update(
        &self,
        id: MaterialId,
        patch: MaterialPatch,
    ) -> Result<Material, RepositoryError> {
        patch.validate()?;
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = ?");
        let row = sqlx::query(&sql).bind(id.0).fetch_optional(&mut *tx).await?;
        let mut material = match row {
            Some(ref row) => row_to_material(row)?,
            None => return Err(RepositoryError::not_found("material", id)),
        };

        let cost_changed = patch.changes_unit_cost(&material);
        patch.apply_to(&mut material);
        let now = now_rfc3339();

        sqlx::query(
            "UPDATE materials
             SET name = ?, description = ?, unit = ?, unit_cost = ?, stock_qty = ?,
                 classification = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&material.name)
        .bind(&material.description)
        .bind(&material.unit)
        .bind(material.unit_cost.to_string())
        .bind(material.stock_qty.to_string())
        .bind(&material.classification)
        .bind(&now)
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        if cost_changed {
            let touched = recompute_components_using(&mut *tx, id).await?;
            tracing::debug!(material_id = id.0, components = touched, "recomputed component totals");
        }

        let row = sqlx::query(&sql).bind(id.0).fetch_one(&mut *tx).await?;
        let updated = row_to_material(&row)?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: MaterialId) -> Result<(), RepositoryError> {
        let in_use: i64 = sqlx::query(
            "SELECT COUNT(*) AS uses FROM component_materials WHERE material_id = ?",
        )
        .bind(id.0)
        .fetch_one(&self.pool)
        .await?
        .try_get("uses")?;
        if in_use > 0 {
            return Err(RepositoryError::Conflict(format!(
                "material {id} is used by {in_use} component(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM materials WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("material", id));
        }
        Ok(())
    }
}
