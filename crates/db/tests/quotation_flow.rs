use std::sync::Arc;

use rust_decimal::Decimal;

use quoteworks_core::domain::component::{ComponentId, ComponentMaterialInput, NewComponent};
use quoteworks_core::domain::material::{MaterialId, MaterialPatch, NewMaterial};
use quoteworks_core::domain::quotation::{NewQuotation, Quotation, QuotationId, QuotationStatus};
use quoteworks_core::domain::user::{NewUser, Role, UserId};
use quoteworks_core::errors::ApplicationError;
use quoteworks_core::rollup::{DeterministicRollupEngine, ItemRequest, RollupEngine};
use quoteworks_db::repositories::{
    ComponentRepository, MaterialRepository, QuotationRepository, SqlComponentRepository,
    SqlMaterialRepository, SqlQuotationRepository, SqlUserRepository, UserRepository,
};
use quoteworks_db::{connect_with_settings, migrations, DbPool};

type FlowResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

struct Fixture {
    pool: DbPool,
    owner: UserId,
    shelf: ComponentId,
    pine: MaterialId,
}

impl Fixture {
    fn quotations(&self) -> SqlQuotationRepository {
        SqlQuotationRepository::new(self.pool.clone())
    }

    /// Loads the catalog for `items`, rolls them up and writes them onto `id`.
    async fn replace(&self, id: QuotationId, items: &[ItemRequest]) -> FlowResult<Quotation> {
        let ids: Vec<ComponentId> = items.iter().map(|item| item.component_id).collect();
        let catalog = SqlComponentRepository::new(self.pool.clone())
            .load_catalog(&ids)
            .await
            .map_err(|error| error.to_string())?;
        let rolled = DeterministicRollupEngine
            .roll_up(items, &catalog)
            .map_err(|error| error.to_string())?;
        self.quotations().replace_items(id, rolled).await.map_err(|error| error.to_string())
    }
}

/// Catalog from the worked example: component C uses material M1, 2 units at $5.
async fn fixture(pool: DbPool) -> FlowResult<Fixture> {
    migrations::run_pending(&pool).await.map_err(|error| error.to_string())?;

    let owner = SqlUserRepository::new(pool.clone())
        .create(NewUser {
            name: "Kai".to_string(),
            email: "kai@example.com".to_string(),
            contact: String::new(),
            role: Role::User,
        })
        .await
        .map_err(|error| error.to_string())?;

    let pine = SqlMaterialRepository::new(pool.clone())
        .create(NewMaterial {
            name: "M1".to_string(),
            description: "Pine board".to_string(),
            unit: "m".to_string(),
            unit_cost: Decimal::from(5),
            stock_qty: Decimal::from(20),
            classification: "wood".to_string(),
        })
        .await
        .map_err(|error| error.to_string())?;

    let shelf = SqlComponentRepository::new(pool.clone())
        .create(NewComponent {
            name: "C".to_string(),
            description: "Shelf".to_string(),
            materials: vec![ComponentMaterialInput {
                material_id: pine.id,
                quantity: Decimal::from(2),
            }],
        })
        .await
        .map_err(|error| error.to_string())?;

    Ok(Fixture { pool, owner: owner.id, shelf: shelf.id, pine: pine.id })
}

async fn memory_fixture() -> FlowResult<Fixture> {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| error.to_string())?;
    fixture(pool).await
}

fn item(component_id: ComponentId, height: i64, quantity: i64) -> ItemRequest {
    ItemRequest {
        component_id,
        length: Decimal::from(2),
        width: Decimal::from(2),
        height: Decimal::from(height),
        quantity,
    }
}

async fn draft(fixture: &Fixture) -> FlowResult<Quotation> {
    fixture
        .quotations()
        .create(
            fixture.owner,
            NewQuotation { title: "Garage shelving".to_string(), ..Default::default() },
            "QT",
            None,
        )
        .await
        .map_err(|error| error.to_string())
}

#[tokio::test]
async fn worked_example_is_persisted_with_its_breakdown() -> FlowResult {
    let fixture = memory_fixture().await?;
    let quotation = draft(&fixture).await?;

    let updated = fixture.replace(quotation.id, &[item(fixture.shelf, 1, 3)]).await?;

    require_eq!(updated.total_cost, Decimal::from(120));
    require_eq!(updated.items.len(), 1);
    require_eq!(updated.items[0].unit_cost, Decimal::from(40));
    require_eq!(updated.items[0].total_cost, Decimal::from(120));
    require_eq!(updated.materials.len(), 1);
    require_eq!(updated.materials[0].material_id, fixture.pine);
    require_eq!(updated.materials[0].quantity, Decimal::from(24));
    require_eq!(updated.materials[0].total_cost, Decimal::from(120));
    Ok(())
}

#[tokio::test]
async fn replacing_twice_with_the_same_items_is_idempotent() -> FlowResult {
    let fixture = memory_fixture().await?;
    let quotation = draft(&fixture).await?;
    let items = [item(fixture.shelf, 1, 3), item(fixture.shelf, 2, 1)];

    let first = fixture.replace(quotation.id, &items).await?;
    let second = fixture.replace(quotation.id, &items).await?;

    require_eq!(first.items, second.items);
    require_eq!(first.materials, second.materials);
    require_eq!(first.total_cost, second.total_cost);
    require_eq!(second.materials.len(), 1);
    Ok(())
}

#[tokio::test]
async fn invalid_item_leaves_existing_rows_untouched() -> FlowResult {
    let fixture = memory_fixture().await?;
    let quotation = draft(&fixture).await?;
    fixture.replace(quotation.id, &[item(fixture.shelf, 1, 3)]).await?;

    let outcome = fixture.replace(quotation.id, &[item(fixture.shelf, 0, 1)]).await;
    require!(outcome.is_err(), "zero height should be rejected");

    let stored = fixture
        .quotations()
        .find_by_id(quotation.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("quotation should exist")?;
    require_eq!(stored.total_cost, Decimal::from(120));
    require_eq!(stored.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_component_maps_to_not_found() -> FlowResult {
    let fixture = memory_fixture().await?;
    let catalog = SqlComponentRepository::new(fixture.pool.clone())
        .load_catalog(&[ComponentId(999)])
        .await
        .map_err(|error| error.to_string())?;

    let error = DeterministicRollupEngine
        .roll_up(&[item(ComponentId(999), 1, 1)], &catalog)
        .map_err(ApplicationError::from)
        .err()
        .ok_or("roll-up should fail")?;
    require!(matches!(error, ApplicationError::NotFound { entity: "component", .. }));
    Ok(())
}

#[tokio::test]
async fn duplicate_of_accepted_quotation_is_a_fresh_draft() -> FlowResult {
    let fixture = memory_fixture().await?;
    let repo = fixture.quotations();
    let quotation = draft(&fixture).await?;
    fixture.replace(quotation.id, &[item(fixture.shelf, 1, 3)]).await?;
    for (from, to) in [
        (QuotationStatus::Draft, QuotationStatus::Issued),
        (QuotationStatus::Issued, QuotationStatus::Accepted),
    ] {
        repo.set_status(quotation.id, from, to).await.map_err(|error| error.to_string())?;
    }

    let copy =
        repo.duplicate(quotation.id, fixture.owner, "QT").await.map_err(|error| error.to_string())?;
    let original = repo
        .find_by_id(quotation.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("original should exist")?;

    require_eq!(copy.status, QuotationStatus::Draft);
    require!(copy.number != original.number, "duplicate must get a fresh number");
    require_eq!(copy.total_cost, original.total_cost);
    require_eq!(copy.items, original.items);
    require_eq!(copy.materials, original.materials);
    require_eq!(original.status, QuotationStatus::Accepted);
    Ok(())
}

#[tokio::test]
async fn price_change_does_not_touch_existing_snapshots() -> FlowResult {
    let fixture = memory_fixture().await?;
    let quotation = draft(&fixture).await?;
    fixture.replace(quotation.id, &[item(fixture.shelf, 1, 3)]).await?;

    SqlMaterialRepository::new(fixture.pool.clone())
        .update(fixture.pine, MaterialPatch { unit_cost: Some(Decimal::from(6)), ..Default::default() })
        .await
        .map_err(|error| error.to_string())?;

    let component = SqlComponentRepository::new(fixture.pool.clone())
        .find_by_id(fixture.shelf)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("component should exist")?;
    require_eq!(component.total_cost, Decimal::from(12));

    let stored = fixture
        .quotations()
        .find_by_id(quotation.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("quotation should exist")?;
    require_eq!(stored.total_cost, Decimal::from(120));
    require_eq!(stored.materials[0].unit_cost, Decimal::from(5));
    Ok(())
}

#[tokio::test]
async fn deleting_a_referenced_material_is_a_conflict() -> FlowResult {
    let fixture = memory_fixture().await?;
    let error = SqlMaterialRepository::new(fixture.pool.clone())
        .delete(fixture.pine)
        .await
        .err()
        .ok_or("delete should fail")?;
    require!(matches!(ApplicationError::from(error), ApplicationError::Conflict(_)));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_replaces_leave_exactly_one_input() -> FlowResult {
    let dir = tempfile::tempdir().map_err(|error| error.to_string())?;
    let url = format!("sqlite://{}", dir.path().join("flow.db").display());
    let pool = connect_with_settings(&url, 4, 30).await.map_err(|error| error.to_string())?;
    let fixture = Arc::new(fixture(pool).await?);
    let quotation = draft(&fixture).await?;

    let small = vec![item(fixture.shelf, 1, 1)];
    let large = vec![item(fixture.shelf, 1, 2), item(fixture.shelf, 2, 5)];
    let (left, right) = {
        let (a, b) = (Arc::clone(&fixture), Arc::clone(&fixture));
        let (small, large) = (small.clone(), large.clone());
        let id = quotation.id;
        tokio::join!(
            tokio::spawn(async move { a.replace(id, &small).await }),
            tokio::spawn(async move { b.replace(id, &large).await }),
        )
    };
    left.map_err(|error| error.to_string())??;
    right.map_err(|error| error.to_string())??;

    let stored = fixture
        .quotations()
        .find_by_id(quotation.id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or("quotation should exist")?;
    let expected_small = Decimal::from(40);
    let expected_large = Decimal::from(40 * 2 + 80 * 5);

    if stored.total_cost == expected_small {
        require_eq!(stored.items.len(), 1);
        require_eq!(stored.materials[0].quantity, Decimal::from(8));
    } else {
        require_eq!(stored.total_cost, expected_large);
        require_eq!(stored.items.len(), 2);
        require_eq!(stored.materials[0].quantity, Decimal::from(16 + 80));
    }
    let item_total: Decimal = stored.items.iter().map(|item| item.total_cost).sum();
    require_eq!(item_total, stored.total_cost);
    Ok(())
}
