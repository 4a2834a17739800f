use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use quoteworks_core::domain::component::{
    component_cost, Component, ComponentFilter, ComponentId, ComponentMaterial,
    ComponentMaterialInput, ComponentPatch, NewComponent,
};
use quoteworks_core::domain::material::{
    Material, MaterialFilter, MaterialId, MaterialPatch, NewMaterial,
};
use quoteworks_core::domain::quotation::{
    NewQuotation, Quotation, QuotationDetailsPatch, QuotationFilter, QuotationId, QuotationNumber,
    QuotationStatus,
};
use quoteworks_core::domain::settings::{CompanySettings, SettingsUpdate};
use quoteworks_core::domain::user::{normalize_email, NewUser, Role, User, UserId, UserPatch};
use quoteworks_core::errors::DomainError;
use quoteworks_core::lifecycle::QuotationAction;
use quoteworks_core::rollup::{RollupCatalog, RollupResult};

use super::{
    add_usage, ComponentRepository, MaterialRepository, Page, PageRequest, QuotationRepository,
    RepositoryError, SettingsRepository, UserRepository,
};

#[derive(Default)]
struct CatalogState {
    materials: BTreeMap<MaterialId, Material>,
    components: BTreeMap<ComponentId, Component>,
    next_material_id: i64,
    next_component_id: i64,
}

impl CatalogState {
    fn resolve(
        &self,
        inputs: &[ComponentMaterialInput],
    ) -> Result<Vec<ComponentMaterial>, RepositoryError> {
        let mut resolved = inputs
            .iter()
            .map(|input| {
                self.materials
                    .get(&input.material_id)
                    .map(|material| ComponentMaterial::resolve(material, input.quantity))
                    .ok_or_else(|| RepositoryError::not_found("material", input.material_id))
            })
            .collect::<Result<Vec<_>, _>>()?;
        resolved.sort_by_key(|pair| pair.material_id);
        Ok(resolved)
    }

    fn name_taken<'a>(mut names: impl Iterator<Item = &'a str>, name: &str) -> bool {
        names.any(|existing| existing == name)
    }
}

/// Materials and components share one store so price changes and reference
/// checks see a consistent catalog.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    state: RwLock<CatalogState>,
}

#[async_trait::async_trait]
impl MaterialRepository for InMemoryCatalogRepository {
    async fn list(&self, filter: &MaterialFilter) -> Result<Vec<Material>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.materials.values().filter(|material| filter.matches(material)).cloned().collect())
    }

    async fn list_page(
        &self,
        filter: &MaterialFilter,
        page: PageRequest,
    ) -> Result<Page<Material>, RepositoryError> {
        let matching = MaterialRepository::list(self, filter).await?;
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok(Page { items, total, page: page.page, page_size: page.page_size })
    }

    async fn find_by_id(&self, id: MaterialId) -> Result<Option<Material>, RepositoryError> {
        Ok(self.state.read().await.materials.get(&id).cloned())
    }

    async fn create(&self, material: NewMaterial) -> Result<Material, RepositoryError> {
        material.validate()?;
        let mut state = self.state.write().await;
        let name = material.name.trim().to_owned();
        if CatalogState::name_taken(state.materials.values().map(|m| m.name.as_str()), &name) {
            return Err(RepositoryError::Conflict(format!("material `{name}` already exists")));
        }

        state.next_material_id += 1;
        let now = Utc::now();
        let created = Material {
            id: MaterialId(state.next_material_id),
            name,
            description: material.description,
            unit: material.unit.trim().to_owned(),
            unit_cost: material.unit_cost,
            stock_qty: material.stock_qty,
            classification: material.classification,
            created_at: now,
            updated_at: now,
        };
        state.materials.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: MaterialId,
        patch: MaterialPatch,
    ) -> Result<Material, RepositoryError> {
        patch.validate()?;
        let mut state = self.state.write().await;
        let mut material =
            state.materials.get(&id).cloned().ok_or_else(|| RepositoryError::not_found("material", id))?;

        let cost_changed = patch.changes_unit_cost(&material);
        patch.apply_to(&mut material);
        material.updated_at = Utc::now();

        if cost_changed {
            let mut components = state.components.clone();
            for component in components.values_mut() {
                let mut touched = false;
                for pair in component.materials.iter_mut().filter(|pair| pair.material_id == id) {
                    pair.unit_cost = material.unit_cost;
                    touched = true;
                }
                if touched {
                    component.recompute_total()?;
                    component.updated_at = material.updated_at;
                }
            }
            state.components = components;
        }
        state.materials.insert(id, material.clone());
        for component in state.components.values_mut() {
            for pair in component.materials.iter_mut().filter(|pair| pair.material_id == id) {
                pair.material_name = material.name.clone();
                pair.unit = material.unit.clone();
            }
        }
        Ok(material)
    }

    async fn delete(&self, id: MaterialId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let users = state
            .components
            .values()
            .filter(|component| component.materials.iter().any(|pair| pair.material_id == id))
            .count();
        if users > 0 {
            return Err(RepositoryError::Conflict(format!(
                "material {id} is used by {users} component(s)"
            )));
        }
        state.materials.remove(&id).map(|_| ()).ok_or_else(|| RepositoryError::not_found("material", id))
    }
}

#[async_trait::async_trait]
impl ComponentRepository for InMemoryCatalogRepository {
    async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .components
            .values()
            .filter(|component| filter.matches(component))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: ComponentId) -> Result<Option<Component>, RepositoryError> {
        Ok(self.state.read().await.components.get(&id).cloned())
    }

    async fn create(&self, component: NewComponent) -> Result<Component, RepositoryError> {
        component.validate()?;
        let mut state = self.state.write().await;
        let name = component.name.trim().to_owned();
        if CatalogState::name_taken(state.components.values().map(|c| c.name.as_str()), &name) {
            return Err(RepositoryError::Conflict(format!("component `{name}` already exists")));
        }

        let materials = state.resolve(&component.materials)?;
        let total_cost = component_cost(&materials)?;
        state.next_component_id += 1;
        let now = Utc::now();
        let created = Component {
            id: ComponentId(state.next_component_id),
            name,
            description: component.description,
            total_cost,
            materials,
            created_at: now,
            updated_at: now,
        };
        state.components.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: ComponentId,
        patch: ComponentPatch,
    ) -> Result<Component, RepositoryError> {
        patch.validate()?;
        let mut state = self.state.write().await;
        let mut component = state
            .components
            .get(&id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found("component", id))?;

        if let Some(name) = patch.name {
            component.name = name.trim().to_owned();
        }
        if let Some(description) = patch.description {
            component.description = description;
        }
        if let Some(inputs) = patch.materials {
            component.materials = state.resolve(&inputs)?;
        }
        component.recompute_total()?;
        component.updated_at = Utc::now();
        state.components.insert(id, component.clone());
        Ok(component)
    }

    async fn delete(&self, id: ComponentId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state
            .components
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::not_found("component", id))
    }

    async fn load_catalog(&self, ids: &[ComponentId]) -> Result<RollupCatalog, RepositoryError> {
        let state = self.state.read().await;
        let components: Vec<Component> =
            ids.iter().filter_map(|id| state.components.get(id)).cloned().collect();
        let materials: Vec<Material> = components
            .iter()
            .flat_map(|component| component.materials.iter())
            .filter_map(|pair| state.materials.get(&pair.material_id))
            .cloned()
            .collect();
        Ok(RollupCatalog::new(components, materials))
    }
}

#[derive(Default)]
struct QuotationState {
    quotations: BTreeMap<QuotationId, Quotation>,
    next_id: i64,
}

impl QuotationState {
    fn next_number(&self, prefix: &str) -> QuotationNumber {
        let today = Utc::now().date_naive();
        let day_prefix = QuotationNumber::day_prefix(prefix, today);
        let highest = self
            .quotations
            .values()
            .filter(|quotation| quotation.number.as_str().starts_with(&day_prefix))
            .filter_map(|quotation| quotation.number.sequence())
            .max()
            .unwrap_or(0);
        QuotationNumber::generate(prefix, today, highest + 1)
    }

    fn insert_draft(&mut self, mut quotation: Quotation, prefix: &str) -> Quotation {
        self.next_id += 1;
        let now = Utc::now();
        quotation.id = QuotationId(self.next_id);
        quotation.number = self.next_number(prefix);
        quotation.status = QuotationStatus::Draft;
        quotation.created_at = now;
        quotation.updated_at = now;
        self.quotations.insert(quotation.id, quotation.clone());
        quotation
    }

    fn draft_mut(
        &mut self,
        id: QuotationId,
        action: QuotationAction,
    ) -> Result<&mut Quotation, RepositoryError> {
        let quotation =
            self.quotations.get_mut(&id).ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        if !quotation.is_draft() {
            return Err(DomainError::NotPermittedInState { status: quotation.status, action }.into());
        }
        Ok(quotation)
    }
}

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    state: RwLock<QuotationState>,
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn create(
        &self,
        owner_id: UserId,
        header: NewQuotation,
        number_prefix: &str,
        rolled: Option<RollupResult>,
    ) -> Result<Quotation, RepositoryError> {
        header.validate()?;
        let header = header.sanitized();
        let rolled = rolled.unwrap_or(RollupResult {
            items: Vec::new(),
            materials: Vec::new(),
            total_cost: Decimal::ZERO,
        });
        let now = Utc::now();
        let draft = Quotation {
            id: QuotationId(0),
            owner_id,
            number: QuotationNumber(String::new()),
            title: header.title,
            description: header.description,
            client_name: header.client_name,
            status: QuotationStatus::Draft,
            total_cost: rolled.total_cost,
            items: rolled.items,
            materials: rolled.materials,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.write().await;
        Ok(state.insert_draft(draft, number_prefix))
    }

    async fn find_by_id(&self, id: QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        Ok(self.state.read().await.quotations.get(&id).cloned())
    }

    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError> {
        let state = self.state.read().await;
        let mut headers: Vec<Quotation> = state
            .quotations
            .values()
            .filter(|quotation| filter.matches(quotation))
            .map(|quotation| Quotation {
                items: Vec::new(),
                materials: Vec::new(),
                ..quotation.clone()
            })
            .collect();
        headers.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(headers)
    }

    async fn update_details(
        &self,
        id: QuotationId,
        patch: QuotationDetailsPatch,
    ) -> Result<Quotation, RepositoryError> {
        patch.validate()?;
        let mut state = self.state.write().await;
        let quotation = state.draft_mut(id, QuotationAction::EditDetails)?;
        patch.apply_to(quotation);
        quotation.updated_at = Utc::now();
        Ok(quotation.clone())
    }

    async fn replace_items(
        &self,
        id: QuotationId,
        rolled: RollupResult,
    ) -> Result<Quotation, RepositoryError> {
        let mut state = self.state.write().await;
        let quotation = state.draft_mut(id, QuotationAction::ReplaceItems)?;
        quotation.items = rolled.items;
        quotation.materials = rolled.materials;
        quotation.total_cost = rolled.total_cost;
        quotation.updated_at = Utc::now();
        Ok(quotation.clone())
    }

    async fn set_status(
        &self,
        id: QuotationId,
        expected: QuotationStatus,
        next: QuotationStatus,
    ) -> Result<Quotation, RepositoryError> {
        let mut state = self.state.write().await;
        let quotation =
            state.quotations.get_mut(&id).ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        if quotation.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "quotation {id} is {}, expected {expected}",
                quotation.status
            )));
        }
        quotation.status = next;
        quotation.updated_at = Utc::now();
        Ok(quotation.clone())
    }

    async fn delete(&self, id: QuotationId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.draft_mut(id, QuotationAction::Delete)?;
        state.quotations.remove(&id);
        Ok(())
    }

    async fn duplicate(
        &self,
        id: QuotationId,
        owner_id: UserId,
        number_prefix: &str,
    ) -> Result<Quotation, RepositoryError> {
        let mut state = self.state.write().await;
        let source =
            state.quotations.get(&id).cloned().ok_or_else(|| RepositoryError::not_found("quotation", id))?;
        Ok(state.insert_draft(Quotation { owner_id, ..source }, number_prefix))
    }

    async fn material_usage(&self) -> Result<BTreeMap<MaterialId, Decimal>, RepositoryError> {
        let state = self.state.read().await;
        let mut usage: BTreeMap<MaterialId, Decimal> = BTreeMap::new();
        for quotation in state.quotations.values() {
            if quotation.status == QuotationStatus::Rejected {
                continue;
            }
            for row in &quotation.materials {
                add_usage(&mut usage, row.material_id, row.quantity)?;
            }
        }
        Ok(usage)
    }
}

#[derive(Default)]
struct UserState {
    users: HashMap<UserId, User>,
    next_id: i64,
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    state: RwLock<UserState>,
}

impl InMemoryUserRepository {
    /// Inserts a user with a fixed id; used to seed identities in tests.
    pub async fn insert(&self, user: User) {
        let mut state = self.state.write().await;
        state.next_id = state.next_id.max(user.id.0);
        state.users.insert(user.id, user);
    }
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let email = normalize_email(email);
        Ok(self.state.read().await.users.values().find(|user| user.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        user.validate()?;
        let email = normalize_email(&user.email);
        let mut state = self.state.write().await;
        if state.users.values().any(|existing| existing.email == email) {
            return Err(RepositoryError::Conflict(format!("email `{email}` is already registered")));
        }

        state.next_id += 1;
        let now = Utc::now();
        let created = User {
            id: UserId(state.next_id),
            name: user.name.trim().to_owned(),
            email,
            contact: user.contact,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_profile(&self, id: UserId, patch: UserPatch) -> Result<User, RepositoryError> {
        patch.validate()?;
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| RepositoryError::not_found("user", id))?;
        patch.apply_to(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        let user = state.users.get_mut(&id).ok_or_else(|| RepositoryError::not_found("user", id))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: UserId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.users.remove(&id).map(|_| ()).ok_or_else(|| RepositoryError::not_found("user", id))
    }
}

#[derive(Default)]
pub struct InMemorySettingsRepository {
    settings: RwLock<Option<CompanySettings>>,
}

#[async_trait::async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self) -> Result<CompanySettings, RepositoryError> {
        Ok(self.settings.read().await.clone().unwrap_or_default())
    }

    async fn update(&self, update: SettingsUpdate) -> Result<CompanySettings, RepositoryError> {
        update.validate()?;
        let mut guard = self.settings.write().await;
        let mut settings = guard.clone().unwrap_or_default();
        update.apply_to(&mut settings);
        *guard = Some(settings.clone());
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use quoteworks_core::domain::component::{ComponentMaterialInput, NewComponent};
    use quoteworks_core::domain::material::{MaterialPatch, NewMaterial};
    use quoteworks_core::domain::quotation::{NewQuotation, QuotationStatus};
    use quoteworks_core::domain::settings::SettingsUpdate;
    use quoteworks_core::domain::user::UserId;
    use quoteworks_core::errors::DomainError;

    use crate::repositories::{
        ComponentRepository, InMemoryCatalogRepository, InMemoryQuotationRepository,
        InMemorySettingsRepository, MaterialRepository, QuotationRepository, RepositoryError,
        SettingsRepository,
    };

    fn pine() -> NewMaterial {
        NewMaterial {
            name: "Pine".to_string(),
            description: String::new(),
            unit: "m".to_string(),
            unit_cost: Decimal::from(5),
            stock_qty: Decimal::from(10),
            classification: "wood".to_string(),
        }
    }

    #[tokio::test]
    async fn in_memory_catalog_recomputes_components_on_price_change() {
        let repo = InMemoryCatalogRepository::default();
        let material = MaterialRepository::create(&repo, pine()).await.expect("material");
        let component = ComponentRepository::create(
            &repo,
            NewComponent {
                name: "Shelf".to_string(),
                description: String::new(),
                materials: vec![ComponentMaterialInput {
                    material_id: material.id,
                    quantity: Decimal::from(2),
                }],
            },
        )
        .await
        .expect("component");
        assert_eq!(component.total_cost, Decimal::from(10));

        MaterialRepository::update(
            &repo,
            material.id,
            MaterialPatch { unit_cost: Some(Decimal::from(8)), ..Default::default() },
        )
        .await
        .expect("price change");

        let reloaded = ComponentRepository::find_by_id(&repo, component.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(reloaded.total_cost, Decimal::from(16));

        let error = MaterialRepository::delete(&repo, material.id).await.expect_err("in use");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn in_memory_price_overflow_leaves_catalog_unchanged() {
        let repo = InMemoryCatalogRepository::default();
        let material = MaterialRepository::create(&repo, pine()).await.expect("material");
        let component = ComponentRepository::create(
            &repo,
            NewComponent {
                name: "Shelf".to_string(),
                description: String::new(),
                materials: vec![ComponentMaterialInput {
                    material_id: material.id,
                    quantity: Decimal::from(3),
                }],
            },
        )
        .await
        .expect("component");

        let error = MaterialRepository::update(
            &repo,
            material.id,
            MaterialPatch { unit_cost: Some(Decimal::MAX), ..Default::default() },
        )
        .await
        .expect_err("overflow");
        assert!(matches!(error, RepositoryError::Domain(DomainError::Validation(_))));

        let reloaded = ComponentRepository::find_by_id(&repo, component.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(reloaded.total_cost, Decimal::from(15));
        let unchanged = MaterialRepository::find_by_id(&repo, material.id)
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(unchanged.unit_cost, Decimal::from(5));
    }

    #[tokio::test]
    async fn in_memory_quotations_follow_the_draft_lock() {
        let repo = InMemoryQuotationRepository::default();
        let created = repo
            .create(
                UserId(1),
                NewQuotation { title: "Desk".to_string(), ..Default::default() },
                "QT",
                None,
            )
            .await
            .expect("create");
        assert_eq!(created.number.sequence(), Some(1));

        repo.set_status(created.id, QuotationStatus::Draft, QuotationStatus::Issued)
            .await
            .expect("issue");
        let error = repo.delete(created.id).await.expect_err("locked");
        assert!(matches!(error, RepositoryError::Domain(DomainError::NotPermittedInState { .. })));

        let copy = repo.duplicate(created.id, UserId(2), "QT").await.expect("duplicate");
        assert_eq!(copy.status, QuotationStatus::Draft);
        assert_eq!(copy.owner_id, UserId(2));
        assert_eq!(copy.number.sequence(), Some(2));
    }

    #[tokio::test]
    async fn in_memory_settings_start_from_defaults() {
        let repo = InMemorySettingsRepository::default();
        assert_eq!(repo.get().await.expect("get").quotation_prefix, "QT");

        repo.update(SettingsUpdate::QuotationPrefix("INV".to_string())).await.expect("update");
        assert_eq!(repo.get().await.expect("get").quotation_prefix, "INV");
    }
}
