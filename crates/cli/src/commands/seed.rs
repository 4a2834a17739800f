use quoteworks_core::config::LoadOptions;
use quoteworks_core::domain::component::{ComponentFilter, ComponentMaterialInput, NewComponent};
use quoteworks_core::domain::material::{Material, MaterialFilter, NewMaterial};
use quoteworks_core::domain::user::{NewUser, Role};
use quoteworks_db::repositories::{
    ComponentRepository, MaterialRepository, RepositoryError, SqlComponentRepository,
    SqlMaterialRepository, SqlUserRepository, UserRepository,
};
use quoteworks_db::{connect_with_config, migrations, DbPool};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{
    prepare, CommandResult, Failure, EXIT_DB_CONNECTIVITY, EXIT_MIGRATION, EXIT_SEED,
};

pub const DEMO_ADMIN_EMAIL: &str = "admin@quoteworks.local";
const DEMO_COMPONENT: &str = "Wall shelf";

struct DemoMaterial {
    name: &'static str,
    description: &'static str,
    unit: &'static str,
    unit_cost: Decimal,
    stock_qty: Decimal,
    classification: &'static str,
}

fn demo_materials() -> [DemoMaterial; 4] {
    [
        DemoMaterial {
            name: "Pine board",
            description: "Planed pine, 18mm",
            unit: "m",
            unit_cost: Decimal::new(500, 2),
            stock_qty: Decimal::from(200),
            classification: "wood",
        },
        DemoMaterial {
            name: "Plywood sheet",
            description: "Birch plywood, 2440x1220",
            unit: "sheet",
            unit_cost: Decimal::new(3250, 2),
            stock_qty: Decimal::from(40),
            classification: "wood",
        },
        DemoMaterial {
            name: "Steel bracket",
            description: "Galvanized shelf bracket",
            unit: "pcs",
            unit_cost: Decimal::new(120, 2),
            stock_qty: Decimal::from(500),
            classification: "hardware",
        },
        DemoMaterial {
            name: "Wood screw",
            description: "4x40 countersunk",
            unit: "pcs",
            unit_cost: Decimal::new(5, 2),
            stock_qty: Decimal::from(5000),
            classification: "hardware",
        },
    ]
}

/// How many demo rows were inserted by this run; rerunning yields zeros.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub users_created: usize,
    pub materials_created: usize,
    pub components_created: usize,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let (config, runtime) = match prepare(options) {
        Ok(prepared) => prepared,
        Err(failure) => return CommandResult::from_failure("seed", failure),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(|error| {
            Failure::new("db_connectivity", error.to_string(), EXIT_DB_CONNECTIVITY)
        })?;
        let seeded = match migrations::run_pending(&pool).await {
            Ok(()) => seed_demo_data(&pool)
                .await
                .map_err(|error| Failure::new("seed_execution", error.to_string(), EXIT_SEED)),
            Err(error) => Err(Failure::new("migration", error.to_string(), EXIT_MIGRATION)),
        };
        pool.close().await;
        seeded
    });

    match result {
        Ok(summary) => {
            let message = if summary == SeedSummary::default() {
                "demo data already present".to_string()
            } else {
                "demo data loaded".to_string()
            };
            CommandResult::success_with("seed", message, serde_json::to_value(&summary).ok())
        }
        Err(failure) => CommandResult::from_failure("seed", failure),
    }
}

/// Inserts the demo admin, materials and a component, skipping rows that
/// already exist by e-mail or name.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
    let users = SqlUserRepository::new(pool.clone());
    let materials = SqlMaterialRepository::new(pool.clone());
    let components = SqlComponentRepository::new(pool.clone());
    let mut summary = SeedSummary::default();

    if users.find_by_email(DEMO_ADMIN_EMAIL).await?.is_none() {
        users
            .create(NewUser {
                name: "Demo Admin".to_string(),
                email: DEMO_ADMIN_EMAIL.to_string(),
                contact: String::new(),
                role: Role::Admin,
            })
            .await?;
        summary.users_created += 1;
    }

    let mut catalog = Vec::new();
    for demo in demo_materials() {
        let material = match find_material(&materials, demo.name).await? {
            Some(existing) => existing,
            None => {
                summary.materials_created += 1;
                materials
                    .create(NewMaterial {
                        name: demo.name.to_string(),
                        description: demo.description.to_string(),
                        unit: demo.unit.to_string(),
                        unit_cost: demo.unit_cost,
                        stock_qty: demo.stock_qty,
                        classification: demo.classification.to_string(),
                    })
                    .await?
            }
        };
        catalog.push(material);
    }

    let existing = components
        .list(&ComponentFilter { name: Some(DEMO_COMPONENT.to_string()), description: None })
        .await?;
    if !existing.iter().any(|component| component.name == DEMO_COMPONENT) {
        let quantities = [("Pine board", 2), ("Steel bracket", 2), ("Wood screw", 8)];
        let inputs = quantities
            .iter()
            .filter_map(|(name, quantity)| {
                catalog.iter().find(|material| material.name == *name).map(|material| {
                    ComponentMaterialInput {
                        material_id: material.id,
                        quantity: Decimal::from(*quantity),
                    }
                })
            })
            .collect();
        components
            .create(NewComponent {
                name: DEMO_COMPONENT.to_string(),
                description: "Pine shelf on two brackets".to_string(),
                materials: inputs,
            })
            .await?;
        summary.components_created += 1;
    }

    Ok(summary)
}

async fn find_material(
    materials: &SqlMaterialRepository,
    name: &str,
) -> Result<Option<Material>, RepositoryError> {
    let filter = MaterialFilter { keyword: Some(name.to_string()), classification: None };
    let found = MaterialRepository::list(materials, &filter).await?;
    Ok(found.into_iter().find(|material| material.name == name))
}

#[cfg(test)]
mod tests {
    use quoteworks_core::domain::component::ComponentFilter;
    use quoteworks_db::repositories::{ComponentRepository, SqlComponentRepository};
    use quoteworks_db::{connect_with_settings, migrations};
    use rust_decimal::Decimal;

    use super::{seed_demo_data, SeedSummary};

    #[tokio::test]
    async fn seeding_twice_inserts_the_demo_rows_once() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let first = seed_demo_data(&pool).await.expect("first seed");
        assert_eq!(
            first,
            SeedSummary { users_created: 1, materials_created: 4, components_created: 1 }
        );

        let second = seed_demo_data(&pool).await.expect("second seed");
        assert_eq!(second, SeedSummary::default());

        let components = SqlComponentRepository::new(pool.clone())
            .list(&ComponentFilter::default())
            .await
            .expect("components");
        assert_eq!(components.len(), 1);
        // 2 x 5.00 + 2 x 1.20 + 8 x 0.05
        assert_eq!(components[0].total_cost, Decimal::new(1280, 2));

        pool.close().await;
    }
}
