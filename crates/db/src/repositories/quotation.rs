use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use quoteworks_core::domain::component::ComponentId;
use quoteworks_core::domain::material::MaterialId;
use quoteworks_core::domain::quotation::{
    NewQuotation, Quotation, QuotationDetailsPatch, QuotationFilter, QuotationId, QuotationItem,
    QuotationMaterial, QuotationNumber, QuotationStatus,
};
use quoteworks_core::domain::user::UserId;
use quoteworks_core::errors::DomainError;
use quoteworks_core::lifecycle::QuotationAction;
use quoteworks_core::rollup::RollupResult;

use super::{
    add_usage, decimal_column, like_pattern, now_rfc3339, timestamp_column, QuotationRepository,
    RepositoryError, MAX_NUMBER_ATTEMPTS,
};
use crate::DbPool;

const HEADER_COLUMNS: &str = "id, owner_id, quotation_no, title, description, client_name, \
                              status, total_cost, created_at, updated_at";

/// Next free number of the day, computed by SQLite inside the insert so the
/// read and the write happen under the same write lock. Binds: day prefix,
/// day prefix length + 1, sequence offset, LIKE pattern.
const NEXT_NUMBER_SQL: &str = "? || printf('%04d',
        (SELECT COALESCE(MAX(CAST(substr(quotation_no, ?) AS INTEGER)), 0) + 1 + ?
         FROM quotations WHERE quotation_no LIKE ?))";

pub struct SqlQuotationRepository {
    pool: DbPool,
}

impl SqlQuotationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(raw: &str) -> Result<QuotationStatus, RepositoryError> {
    QuotationStatus::from_str(raw)
        .map_err(|_| RepositoryError::Decode(format!("unknown quotation status `{raw}`")))
}

fn row_to_header(row: &SqliteRow) -> Result<Quotation, RepositoryError> {
    let status: String = row.try_get("status")?;
    Ok(Quotation {
        id: QuotationId(row.try_get("id")?),
        owner_id: UserId(row.try_get("owner_id")?),
        number: QuotationNumber(row.try_get("quotation_no")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        client_name: row.try_get("client_name")?,
        status: parse_status(&status)?,
        total_cost: decimal_column(row, "total_cost")?,
        items: Vec::new(),
        materials: Vec::new(),
        created_at: timestamp_column(row, "created_at")?,
        updated_at: timestamp_column(row, "updated_at")?,
    })
}

fn row_to_item(row: &SqliteRow) -> Result<QuotationItem, RepositoryError> {
    let position: i64 = row.try_get("position")?;
    let quantity: i64 = row.try_get("quantity")?;
    Ok(QuotationItem {
        position: u32::try_from(position)
            .map_err(|_| RepositoryError::Decode(format!("item position {position}")))?,
        component_id: ComponentId(row.try_get("component_id")?),
        component_name: row.try_get("component_name")?,
        length: decimal_column(row, "length")?,
        width: decimal_column(row, "width")?,
        height: decimal_column(row, "height")?,
        quantity: u32::try_from(quantity)
            .map_err(|_| RepositoryError::Decode(format!("item quantity {quantity}")))?,
        unit_cost: decimal_column(row, "unit_cost")?,
        total_cost: decimal_column(row, "total_cost")?,
    })
}

fn row_to_quotation_material(row: &SqliteRow) -> Result<QuotationMaterial, RepositoryError> {
    Ok(QuotationMaterial {
        material_id: MaterialId(row.try_get("material_id")?),
        material_name: row.try_get("material_name")?,
        unit: row.try_get("unit")?,
        unit_cost: decimal_column(row, "unit_cost")?,
        quantity: decimal_column(row, "quantity")?,
        total_cost: decimal_column(row, "total_cost")?,
    })
}

async fn fetch_quotation(
    conn: &mut SqliteConnection,
    id: QuotationId,
) -> Result<Option<Quotation>, RepositoryError> {
    let sql = format!("SELECT {HEADER_COLUMNS} FROM quotations WHERE id = ?");
    let Some(row) = sqlx::query(&sql).bind(id.0).fetch_optional(&mut *conn).await? else {
        return Ok(None);
    };
    let mut quotation = row_to_header(&row)?;

    let items = sqlx::query(
        "SELECT position, component_id, component_name, length, width, height, quantity,
                unit_cost, total_cost
         FROM quotation_items WHERE quotation_id = ? ORDER BY position",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?;
    quotation.items = items.iter().map(row_to_item).collect::<Result<Vec<_>, _>>()?;

    let materials = sqlx::query(
        "SELECT material_id, material_name, unit, unit_cost, quantity, total_cost
         FROM quotation_materials WHERE quotation_id = ? ORDER BY material_id",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?;
    quotation.materials =
        materials.iter().map(row_to_quotation_material).collect::<Result<Vec<_>, _>>()?;

    Ok(Some(quotation))
}

async fn current_status(
    conn: &mut SqliteConnection,
    id: QuotationId,
) -> Result<QuotationStatus, RepositoryError> {
    let row = sqlx::query("SELECT status FROM quotations WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;
    match row {
        Some(row) => parse_status(&row.try_get::<String, _>("status")?),
        None => Err(RepositoryError::not_found("quotation", id)),
    }
}

/// Takes the write lock on a draft quotation by touching `updated_at`. Fails
/// with NotFound, or NotPermittedInState when the quotation left `draft`.
async fn lock_draft(
    conn: &mut SqliteConnection,
    id: QuotationId,
    action: QuotationAction,
    now: &str,
) -> Result<(), RepositoryError> {
    let result =
        sqlx::query("UPDATE quotations SET updated_at = ? WHERE id = ? AND status = 'draft'")
            .bind(now)
            .bind(id.0)
            .execute(&mut *conn)
            .await?;
    if result.rows_affected() == 1 {
        return Ok(());
    }
    let status = current_status(conn, id).await?;
    Err(DomainError::NotPermittedInState { status, action }.into())
}

struct NumberBinds {
    day_prefix: String,
    offset: i64,
}

fn number_binds(number_prefix: &str, attempt: u32) -> NumberBinds {
    NumberBinds {
        day_prefix: QuotationNumber::day_prefix(number_prefix, Utc::now().date_naive()),
        offset: i64::from(attempt),
    }
}

async fn insert_header(
    conn: &mut SqliteConnection,
    owner_id: UserId,
    header: &NewQuotation,
    total_cost: Decimal,
    number_prefix: &str,
) -> Result<QuotationId, RepositoryError> {
    let sql = format!(
        "INSERT INTO quotations (owner_id, quotation_no, title, description, client_name,
                                 status, total_cost, created_at, updated_at)
         VALUES (?, {NEXT_NUMBER_SQL}, ?, ?, ?, 'draft', ?, ?, ?)"
    );
    let now = now_rfc3339();

    for attempt in 0..MAX_NUMBER_ATTEMPTS {
        let binds = number_binds(number_prefix, attempt);
        let result = sqlx::query(&sql)
            .bind(owner_id.0)
            .bind(&binds.day_prefix)
            .bind(binds.day_prefix.len() as i64 + 1)
            .bind(binds.offset)
            .bind(format!("{}%", binds.day_prefix))
            .bind(&header.title)
            .bind(&header.description)
            .bind(&header.client_name)
            .bind(total_cost.to_string())
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .map_err(RepositoryError::from);

        match result {
            Ok(done) => return Ok(QuotationId(done.last_insert_rowid())),
            Err(error) if error.is_unique_violation() => {
                tracing::debug!(attempt, prefix = %binds.day_prefix, "quotation number taken, retrying");
            }
            Err(error) => return Err(error),
        }
    }

    Err(RepositoryError::Conflict(format!(
        "could not allocate a quotation number after {MAX_NUMBER_ATTEMPTS} attempts"
    )))
}

async fn copy_header(
    conn: &mut SqliteConnection,
    source: QuotationId,
    owner_id: UserId,
    number_prefix: &str,
) -> Result<QuotationId, RepositoryError> {
    let sql = format!(
        "INSERT INTO quotations (owner_id, quotation_no, title, description, client_name,
                                 status, total_cost, created_at, updated_at)
         SELECT ?, {NEXT_NUMBER_SQL}, title, description, client_name, 'draft', total_cost, ?, ?
         FROM quotations WHERE id = ?"
    );
    let now = now_rfc3339();

    for attempt in 0..MAX_NUMBER_ATTEMPTS {
        let binds = number_binds(number_prefix, attempt);
        let result = sqlx::query(&sql)
            .bind(owner_id.0)
            .bind(&binds.day_prefix)
            .bind(binds.day_prefix.len() as i64 + 1)
            .bind(binds.offset)
            .bind(format!("{}%", binds.day_prefix))
            .bind(&now)
            .bind(&now)
            .bind(source.0)
            .execute(&mut *conn)
            .await
            .map_err(RepositoryError::from);

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                return Err(RepositoryError::not_found("quotation", source));
            }
            Ok(done) => return Ok(QuotationId(done.last_insert_rowid())),
            Err(error) if error.is_unique_violation() => {
                tracing::debug!(attempt, prefix = %binds.day_prefix, "quotation number taken, retrying");
            }
            Err(error) => return Err(error),
        }
    }

    Err(RepositoryError::Conflict(format!(
        "could not allocate a quotation number after {MAX_NUMBER_ATTEMPTS} attempts"
    )))
}

async fn write_rollup(
    conn: &mut SqliteConnection,
    id: QuotationId,
    rolled: &RollupResult,
) -> Result<(), RepositoryError> {
    for item in &rolled.items {
        sqlx::query(
            "INSERT INTO quotation_items (quotation_id, position, component_id, component_name,
                                          length, width, height, quantity, unit_cost, total_cost)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(i64::from(item.position))
        .bind(item.component_id.0)
        .bind(&item.component_name)
        .bind(item.length.to_string())
        .bind(item.width.to_string())
        .bind(item.height.to_string())
        .bind(i64::from(item.quantity))
        .bind(item.unit_cost.to_string())
        .bind(item.total_cost.to_string())
        .execute(&mut *conn)
        .await?;
    }

    for material in &rolled.materials {
        sqlx::query(
            "INSERT INTO quotation_materials (quotation_id, material_id, material_name, unit,
                                              unit_cost, quantity, total_cost)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.0)
        .bind(material.material_id.0)
        .bind(&material.material_name)
        .bind(&material.unit)
        .bind(material.unit_cost.to_string())
        .bind(material.quantity.to_string())
        .bind(material.total_cost.to_string())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl QuotationRepository for SqlQuotationRepository {
    async fn create(
        &self,
        owner_id: UserId,
        header: NewQuotation,
        number_prefix: &str,
        rolled: Option<RollupResult>,
    ) -> Result<Quotation, RepositoryError> {
        header.validate()?;
        let header = header.sanitized();
        let total = rolled.as_ref().map_or(Decimal::ZERO, |rolled| rolled.total_cost);

        let mut tx = self.pool.begin().await?;
        let id = insert_header(&mut tx, owner_id, &header, total, number_prefix).await?;
        if let Some(rolled) = &rolled {
            write_rollup(&mut tx, id, rolled).await?;
        }
        let created = fetch_quotation(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_quotation(&mut conn, id).await
    }

    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError> {
        let owner = filter.owner_id.map(|owner| owner.0);
        let status = filter.status.map(|status| status.as_str());
        let client = filter.client_name.as_deref().map(like_pattern);
        let day = filter.created_on.map(|day| day.format("%Y-%m-%d").to_string());
        let sql = format!(
            "SELECT {HEADER_COLUMNS} FROM quotations
             WHERE (? IS NULL OR owner_id = ?)
               AND (? IS NULL OR status = ?)
               AND (? IS NULL OR lower(client_name) LIKE ?)
               AND (? IS NULL OR substr(created_at, 1, 10) = ?)
             ORDER BY created_at DESC, id DESC"
        );

        let rows = sqlx::query(&sql)
            .bind(owner)
            .bind(owner)
            .bind(status)
            .bind(status)
            .bind(client.clone())
            .bind(client)
            .bind(day.clone())
            .bind(day)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_header).collect()
    }

    async fn update_details(
        &self,
        id: QuotationId,
        patch: QuotationDetailsPatch,
    ) -> Result<Quotation, RepositoryError> {
        patch.validate()?;
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;
        lock_draft(&mut tx, id, QuotationAction::EditDetails, &now).await?;

        let mut quotation = fetch_quotation(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        patch.apply_to(&mut quotation);

        sqlx::query("UPDATE quotations SET title = ?, description = ?, client_name = ? WHERE id = ?")
            .bind(&quotation.title)
            .bind(&quotation.description)
            .bind(&quotation.client_name)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        let updated = fetch_quotation(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn replace_items(
        &self,
        id: QuotationId,
        rolled: RollupResult,
    ) -> Result<Quotation, RepositoryError> {
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;
        lock_draft(&mut tx, id, QuotationAction::ReplaceItems, &now).await?;

        sqlx::query("DELETE FROM quotation_items WHERE quotation_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM quotation_materials WHERE quotation_id = ?")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        write_rollup(&mut tx, id, &rolled).await?;
        sqlx::query("UPDATE quotations SET total_cost = ? WHERE id = ?")
            .bind(rolled.total_cost.to_string())
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        let updated = fetch_quotation(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn set_status(
        &self,
        id: QuotationId,
        expected: QuotationStatus,
        next: QuotationStatus,
    ) -> Result<Quotation, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("UPDATE quotations SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
                .bind(next.as_str())
                .bind(now_rfc3339())
                .bind(id.0)
                .bind(expected.as_str())
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            let actual = current_status(&mut tx, id).await?;
            return Err(RepositoryError::Conflict(format!(
                "quotation {id} is {actual}, expected {expected}"
            )));
        }

        let updated = fetch_quotation(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, id: QuotationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM quotations WHERE id = ? AND status = 'draft'")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(());
        }

        let mut conn = self.pool.acquire().await?;
        let status = current_status(&mut conn, id).await?;
        Err(DomainError::NotPermittedInState { status, action: QuotationAction::Delete }.into())
    }

    async fn duplicate(
        &self,
        id: QuotationId,
        owner_id: UserId,
        number_prefix: &str,
    ) -> Result<Quotation, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let copy = copy_header(&mut tx, id, owner_id, number_prefix).await?;

        sqlx::query(
            "INSERT INTO quotation_items (quotation_id, position, component_id, component_name,
                                          length, width, height, quantity, unit_cost, total_cost)
             SELECT ?, position, component_id, component_name, length, width, height, quantity,
                    unit_cost, total_cost
             FROM quotation_items WHERE quotation_id = ? ORDER BY position",
        )
        .bind(copy.0)
        .bind(id.0)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "INSERT INTO quotation_materials (quotation_id, material_id, material_name, unit,
                                              unit_cost, quantity, total_cost)
             SELECT ?, material_id, material_name, unit, unit_cost, quantity, total_cost
             FROM quotation_materials WHERE quotation_id = ? ORDER BY material_id",
        )
        .bind(copy.0)
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

        let duplicated = fetch_quotation(&mut tx, copy)
            .await?
            .ok_or_else(|| RepositoryError::not_found("quotation", copy))?;
        tx.commit().await?;
        Ok(duplicated)
    }

    async fn material_usage(&self) -> Result<BTreeMap<MaterialId, Decimal>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT qm.material_id, qm.quantity
             FROM quotation_materials qm
             JOIN quotations q ON q.id = qm.quotation_id
             WHERE q.status <> 'rejected'",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut usage: BTreeMap<MaterialId, Decimal> = BTreeMap::new();
        for row in &rows {
            let material_id = MaterialId(row.try_get("material_id")?);
            add_usage(&mut usage, material_id, decimal_column(row, "quantity")?)?;
        }
        Ok(usage)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use quoteworks_core::domain::component::ComponentId;
    use quoteworks_core::domain::material::MaterialId;
    use quoteworks_core::domain::quotation::{
        NewQuotation, QuotationDetailsPatch, QuotationFilter, QuotationId, QuotationItem,
        QuotationMaterial, QuotationNumber, QuotationStatus,
    };
    use quoteworks_core::domain::user::{NewUser, Role, UserId};
    use quoteworks_core::errors::DomainError;
    use quoteworks_core::rollup::RollupResult;

    use super::SqlQuotationRepository;
    use crate::repositories::{QuotationRepository, RepositoryError, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> (sqlx::SqlitePool, UserId) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let owner = SqlUserRepository::new(pool.clone())
            .create(NewUser {
                name: "Dana".to_string(),
                email: "dana@example.com".to_string(),
                contact: String::new(),
                role: Role::User,
            })
            .await
            .expect("create owner");
        (pool, owner.id)
    }

    fn header(title: &str) -> NewQuotation {
        NewQuotation {
            title: title.to_string(),
            description: String::new(),
            client_name: "Acme <b>Ltd</b>".to_string(),
        }
    }

    fn rolled(total: i64) -> RollupResult {
        RollupResult {
            items: vec![QuotationItem {
                position: 1,
                component_id: ComponentId(1),
                component_name: "Shelf".to_string(),
                length: Decimal::from(2),
                width: Decimal::from(2),
                height: Decimal::ONE,
                quantity: 3,
                unit_cost: Decimal::from(total / 3),
                total_cost: Decimal::from(total),
            }],
            materials: vec![QuotationMaterial {
                material_id: MaterialId(1),
                material_name: "Pine".to_string(),
                unit: "m".to_string(),
                unit_cost: Decimal::from(5),
                quantity: Decimal::from(total / 5),
                total_cost: Decimal::from(total),
            }],
            total_cost: Decimal::from(total),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_numbers_per_day() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let today = Utc::now().date_naive();

        let first = repo.create(owner, header("First"), "QT", None).await.expect("first");
        let second = repo.create(owner, header("Second"), "QT", None).await.expect("second");

        assert_eq!(first.number, QuotationNumber::generate("QT", today, 1));
        assert_eq!(second.number, QuotationNumber::generate("QT", today, 2));
        assert_eq!(first.status, QuotationStatus::Draft);
        assert_eq!(first.client_name, "Acme bLtdb");
        assert_eq!(first.total_cost, Decimal::ZERO);
    }

    #[tokio::test]
    async fn create_with_rollup_persists_snapshot_rows() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);

        let created =
            repo.create(owner, header("Kitchen"), "QT", Some(rolled(120))).await.expect("create");
        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");

        assert_eq!(found.total_cost, Decimal::from(120));
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].quantity, 3);
        assert_eq!(found.materials[0].quantity, Decimal::from(24));
    }

    #[tokio::test]
    async fn replace_items_is_rejected_once_issued() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let created = repo.create(owner, header("Kitchen"), "QT", None).await.expect("create");
        repo.set_status(created.id, QuotationStatus::Draft, QuotationStatus::Issued)
            .await
            .expect("issue");

        let error = repo.replace_items(created.id, rolled(60)).await.expect_err("locked");
        assert!(matches!(
            error,
            RepositoryError::Domain(DomainError::NotPermittedInState {
                status: QuotationStatus::Issued,
                ..
            })
        ));
        let found = repo.find_by_id(created.id).await.expect("find").expect("exists");
        assert!(found.items.is_empty());
    }

    #[tokio::test]
    async fn set_status_with_stale_expectation_is_a_conflict() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let created = repo.create(owner, header("Kitchen"), "QT", None).await.expect("create");

        let error = repo
            .set_status(created.id, QuotationStatus::Issued, QuotationStatus::Accepted)
            .await
            .expect_err("stale");
        assert!(matches!(error, RepositoryError::Conflict(_)));

        let missing = repo
            .set_status(QuotationId(404), QuotationStatus::Draft, QuotationStatus::Issued)
            .await
            .expect_err("missing");
        assert!(matches!(missing, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_details_sanitizes_client_name() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let created = repo.create(owner, header("Kitchen"), "QT", None).await.expect("create");

        let patch = QuotationDetailsPatch {
            client_name: Some("  O'Brien   &  Sons ".to_string()),
            ..Default::default()
        };
        let updated = repo.update_details(created.id, patch).await.expect("update");
        assert_eq!(updated.client_name, "O'Brien Sons");
        assert_eq!(updated.title, "Kitchen");
    }

    #[tokio::test]
    async fn delete_only_removes_drafts() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let draft = repo.create(owner, header("Draft"), "QT", Some(rolled(30))).await.expect("draft");
        let issued = repo.create(owner, header("Issued"), "QT", None).await.expect("issued");
        repo.set_status(issued.id, QuotationStatus::Draft, QuotationStatus::Issued)
            .await
            .expect("issue");

        repo.delete(draft.id).await.expect("delete draft");
        assert!(repo.find_by_id(draft.id).await.expect("find").is_none());

        let error = repo.delete(issued.id).await.expect_err("issued is locked");
        assert!(matches!(error, RepositoryError::Domain(DomainError::NotPermittedInState { .. })));
    }

    #[tokio::test]
    async fn list_filters_and_usage_skips_rejected() {
        let (pool, owner) = setup().await;
        let repo = SqlQuotationRepository::new(pool);
        let kept = repo.create(owner, header("Kept"), "QT", Some(rolled(60))).await.expect("kept");
        let rejected =
            repo.create(owner, header("Lost"), "QT", Some(rolled(120))).await.expect("lost");
        repo.set_status(rejected.id, QuotationStatus::Draft, QuotationStatus::Issued)
            .await
            .expect("issue");
        repo.set_status(rejected.id, QuotationStatus::Issued, QuotationStatus::Rejected)
            .await
            .expect("reject");

        let drafts = repo
            .list(&QuotationFilter { status: Some(QuotationStatus::Draft), ..Default::default() })
            .await
            .expect("list drafts");
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].id, kept.id);

        let today = QuotationFilter {
            created_on: Some(Utc::now().date_naive()),
            ..QuotationFilter::owned_by(owner)
        };
        assert_eq!(repo.list(&today).await.expect("list today").len(), 2);

        let usage = repo.material_usage().await.expect("usage");
        assert_eq!(usage.get(&MaterialId(1)), Some(&Decimal::from(12)));
    }
}
