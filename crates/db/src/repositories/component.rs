use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use quoteworks_core::domain::component::{
    component_cost, Component, ComponentFilter, ComponentId, ComponentMaterial,
    ComponentMaterialInput, ComponentPatch, NewComponent,
};
use quoteworks_core::domain::material::{Material, MaterialId};
use quoteworks_core::rollup::RollupCatalog;

use super::material::row_to_material;
use super::{
    decimal_column, like_pattern, now_rfc3339, timestamp_column, ComponentRepository,
    RepositoryError,
};
use crate::DbPool;

const COMPONENT_COLUMNS: &str = "id, name, description, total_cost, created_at, updated_at";

pub struct SqlComponentRepository {
    pool: DbPool,
}

impl SqlComponentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_component(
    row: &SqliteRow,
    materials: Vec<ComponentMaterial>,
) -> Result<Component, RepositoryError> {
    Ok(Component {
        id: ComponentId(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        total_cost: decimal_column(row, "total_cost")?,
        materials,
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

fn row_to_component_material(row: &SqliteRow) -> Result<ComponentMaterial, RepositoryError> {
    Ok(ComponentMaterial {
        material_id: MaterialId(row.try_get("material_id")?),
        material_name: row.try_get("material_name")?,
        unit: row.try_get("unit")?,
        unit_cost: decimal_column(row, "unit_cost")?,
        quantity: decimal_column(row, "quantity")?,
    })
}

async fn load_component_materials(
    conn: &mut SqliteConnection,
    component_id: Option<ComponentId>,
) -> Result<BTreeMap<ComponentId, Vec<ComponentMaterial>>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT cm.component_id, cm.material_id, cm.quantity,
                m.name AS material_name, m.unit, m.unit_cost
         FROM component_materials cm
         JOIN materials m ON m.id = cm.material_id
         WHERE (? IS NULL OR cm.component_id = ?)
         ORDER BY cm.component_id, cm.material_id",
    )
    .bind(component_id.map(|id| id.0))
    .bind(component_id.map(|id| id.0))
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: BTreeMap<ComponentId, Vec<ComponentMaterial>> = BTreeMap::new();
    for row in &rows {
        let owner = ComponentId(row.try_get("component_id")?);
        grouped.entry(owner).or_default().push(row_to_component_material(row)?);
    }
    Ok(grouped)
}

async fn fetch_component(
    conn: &mut SqliteConnection,
    id: ComponentId,
) -> Result<Option<Component>, RepositoryError> {
    let sql = format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE id = ?");
    let Some(row) = sqlx::query(&sql).bind(id.0).fetch_optional(&mut *conn).await? else {
        return Ok(None);
    };
    let mut materials = load_component_materials(conn, Some(id)).await?;
    row_to_component(&row, materials.remove(&id).unwrap_or_default()).map(Some)
}

/// Resolves each input against the current material prices and returns the
/// resolved pairs with their cost. Unknown materials are reported as not found.
async fn resolve_inputs(
    conn: &mut SqliteConnection,
    inputs: &[ComponentMaterialInput],
) -> Result<(Vec<ComponentMaterial>, Decimal), RepositoryError> {
    let mut resolved = Vec::with_capacity(inputs.len());
    for input in inputs {
        let row = sqlx::query(
            "SELECT id, name, description, unit, unit_cost, stock_qty, classification,
                    created_at, updated_at
             FROM materials WHERE id = ?",
        )
        .bind(input.material_id.0)
        .fetch_optional(&mut *conn)
        .await?;
        let material = match row {
            Some(ref row) => row_to_material(row)?,
            None => return Err(RepositoryError::not_found("material", input.material_id)),
        };
        resolved.push(ComponentMaterial::resolve(&material, input.quantity));
    }
    resolved.sort_by_key(|pair| pair.material_id);
    let total = component_cost(&resolved)?;
    Ok((resolved, total))
}

async fn write_component_materials(
    conn: &mut SqliteConnection,
    component_id: ComponentId,
    materials: &[ComponentMaterial],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM component_materials WHERE component_id = ?")
        .bind(component_id.0)
        .execute(&mut *conn)
        .await?;
    for pair in materials {
        sqlx::query(
            "INSERT INTO component_materials (component_id, material_id, quantity)
             VALUES (?, ?, ?)",
        )
        .bind(component_id.0)
        .bind(pair.material_id.0)
        .bind(pair.quantity.to_string())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Recomputes the stored total of every component that uses `material_id`
/// from current material prices. Returns how many components were updated.
pub(crate) async fn recompute_components_using(
    conn: &mut SqliteConnection,
    material_id: MaterialId,
) -> Result<usize, RepositoryError> {
    let ids: Vec<i64> = sqlx::query(
        "SELECT DISTINCT component_id FROM component_materials WHERE material_id = ?
         ORDER BY component_id",
    )
    .bind(material_id.0)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(|row| row.try_get::<i64, _>("component_id"))
    .collect::<Result<_, _>>()?;

    let now = now_rfc3339();
    for id in &ids {
        let component_id = ComponentId(*id);
        let mut materials = load_component_materials(conn, Some(component_id)).await?;
        let total = component_cost(&materials.remove(&component_id).unwrap_or_default())?;
        sqlx::query("UPDATE components SET total_cost = ?, updated_at = ? WHERE id = ?")
            .bind(total.to_string())
            .bind(&now)
            .bind(component_id.0)
            .execute(&mut *conn)
            .await?;
    }
    Ok(ids.len())
}

#[async_trait::async_trait]
impl ComponentRepository for SqlComponentRepository {
    async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>, RepositoryError> {
        let name = filter.name.as_deref().map(like_pattern);
        let description = filter.description.as_deref().map(like_pattern);
        let sql = format!(
            "SELECT {COMPONENT_COLUMNS} FROM components
             WHERE (? IS NULL OR lower(name) LIKE ?)
               AND (? IS NULL OR lower(description) LIKE ?)
             ORDER BY id"
        );

        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&sql)
            .bind(name.clone())
            .bind(name)
            .bind(description.clone())
            .bind(description)
            .fetch_all(&mut *conn)
            .await?;
        let mut materials = load_component_materials(&mut conn, None).await?;

        rows.iter()
            .map(|row| -> Result<Component, RepositoryError> {
                let id = ComponentId(row.try_get("id")?);
                row_to_component(row, materials.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn find_by_id(&self, id: ComponentId) -> Result<Option<Component>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_component(&mut conn, id).await
    }

    async fn create(&self, component: NewComponent) -> Result<Component, RepositoryError> {
        component.validate()?;
        let mut tx = self.pool.begin().await?;

        let (materials, total) = resolve_inputs(&mut tx, &component.materials).await?;
        let now = now_rfc3339();
        let result = sqlx::query(
            "INSERT INTO components (name, description, total_cost, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(component.name.trim())
        .bind(&component.description)
        .bind(total.to_string())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let id = ComponentId(result.last_insert_rowid());
        write_component_materials(&mut tx, id, &materials).await?;
        let created = fetch_component(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("component", id))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update(
        &self,
        id: ComponentId,
        patch: ComponentPatch,
    ) -> Result<Component, RepositoryError> {
        patch.validate()?;
        let mut tx = self.pool.begin().await?;

        let Some(mut current) = fetch_component(&mut tx, id).await? else {
            return Err(RepositoryError::not_found("component", id));
        };
        if let Some(name) = patch.name {
            current.name = name.trim().to_owned();
        }
        if let Some(description) = patch.description {
            current.description = description;
        }
        if let Some(inputs) = patch.materials {
            let (materials, _) = resolve_inputs(&mut tx, &inputs).await?;
            write_component_materials(&mut tx, id, &materials).await?;
            current.materials = materials;
        }
        current.recompute_total()?;
        current.updated_at = Utc::now();

        sqlx::query(
            "UPDATE components SET name = ?, description = ?, total_cost = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&current.name)
        .bind(&current.description)
        .bind(current.total_cost.to_string())
        .bind(current.updated_at.to_rfc3339())
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        let updated = fetch_component(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("component", id))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: ComponentId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM components WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::not_found("component", id));
        }
        Ok(())
    }

    async fn load_catalog(&self, ids: &[ComponentId]) -> Result<RollupCatalog, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let mut components = Vec::with_capacity(ids.len());
        let mut materials: BTreeMap<MaterialId, Material> = BTreeMap::new();

        let mut wanted = ids.to_vec();
        wanted.sort();
        wanted.dedup();
        for id in wanted {
            let Some(component) = fetch_component(&mut conn, id).await? else {
                continue;
            };
            for pair in &component.materials {
                if materials.contains_key(&pair.material_id) {
                    continue;
                }
                let row = sqlx::query(
                    "SELECT id, name, description, unit, unit_cost, stock_qty, classification,
                            created_at, updated_at
                     FROM materials WHERE id = ?",
                )
                .bind(pair.material_id.0)
                .fetch_optional(&mut *conn)
                .await?;
                if let Some(ref row) = row {
                    materials.insert(pair.material_id, row_to_material(row)?);
                }
            }
            components.push(component);
        }

        Ok(RollupCatalog::new(components, materials.into_values().collect()))
    }
}
