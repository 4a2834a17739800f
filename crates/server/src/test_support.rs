use std::sync::Arc;

use chrono::Utc;
use quoteworks_core::audit::InMemoryAuditSink;
use quoteworks_core::domain::component::{ComponentId, ComponentMaterialInput, NewComponent};
use quoteworks_core::domain::material::{MaterialId, NewMaterial};
use quoteworks_core::domain::user::{Actor, Role, User, UserId};
use quoteworks_core::rollup::ItemRequest;
use quoteworks_core::{DeterministicRollupEngine, LifecycleEngine};
use quoteworks_db::repositories::{
    ComponentRepository, InMemoryCatalogRepository, InMemoryQuotationRepository,
    InMemorySettingsRepository, InMemoryUserRepository, MaterialRepository,
};
use rust_decimal::Decimal;

use crate::identity::RequestContext;
use crate::pdf::PdfGenerator;
use crate::state::AppState;

/// In-memory application with an admin, two regular users and the catalog
/// from the worked example: component "C" uses 2 units of "M1" at $5.
pub struct Harness {
    pub state: AppState,
    pub audit: InMemoryAuditSink,
    pub admin: User,
    pub user: User,
    pub other: User,
    pub pine: MaterialId,
    pub shelf: ComponentId,
}

impl Harness {
    pub async fn new() -> Self {
        let catalog = Arc::new(InMemoryCatalogRepository::default());
        let users = Arc::new(InMemoryUserRepository::default());
        let audit = InMemoryAuditSink::default();

        let admin = user(1, "Ada", Role::Admin);
        let regular = user(2, "Kai", Role::User);
        let other = user(3, "Noor", Role::User);
        for seeded in [&admin, &regular, &other] {
            users.insert(seeded.clone()).await;
        }

        let pine = MaterialRepository::create(
            catalog.as_ref(),
            NewMaterial {
                name: "M1".to_string(),
                description: "Pine board".to_string(),
                unit: "m".to_string(),
                unit_cost: Decimal::from(5),
                stock_qty: Decimal::from(20),
                classification: "wood".to_string(),
            },
        )
        .await
        .expect("seed material");
        let shelf = ComponentRepository::create(
            catalog.as_ref(),
            NewComponent {
                name: "C".to_string(),
                description: "Shelf".to_string(),
                materials: vec![ComponentMaterialInput {
                    material_id: pine.id,
                    quantity: Decimal::from(2),
                }],
            },
        )
        .await
        .expect("seed component");

        let state = AppState {
            materials: catalog.clone(),
            components: catalog,
            quotations: Arc::new(InMemoryQuotationRepository::default()),
            users,
            settings: Arc::new(InMemorySettingsRepository::default()),
            lifecycle: LifecycleEngine,
            rollup: DeterministicRollupEngine,
            audit: Arc::new(audit.clone()),
            pdf: Arc::new(PdfGenerator::html_only().expect("embedded template")),
            gateway_token: None,
        };

        Self { state, audit, admin, user: regular, other, pine: pine.id, shelf: shelf.id }
    }

    pub fn admin_ctx(&self) -> RequestContext {
        context(&self.admin)
    }

    pub fn user_ctx(&self) -> RequestContext {
        context(&self.user)
    }

    pub fn other_ctx(&self) -> RequestContext {
        context(&self.other)
    }
}

pub fn item(component_id: ComponentId, height: i64, quantity: i64) -> ItemRequest {
    ItemRequest {
        component_id,
        length: Decimal::from(2),
        width: Decimal::from(2),
        height: Decimal::from(height),
        quantity,
    }
}

fn user(id: i64, name: &str, role: Role) -> User {
    let now = Utc::now();
    User {
        id: UserId(id),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        contact: String::new(),
        role,
        created_at: now,
        updated_at: now,
    }
}

fn context(user: &User) -> RequestContext {
    RequestContext {
        actor: Actor::from(user),
        correlation_id: format!("test-{}", user.id),
    }
}
