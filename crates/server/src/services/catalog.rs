use quoteworks_core::audit::{AuditCategory, AuditOutcome};
use quoteworks_core::domain::component::{
    Component, ComponentFilter, ComponentId, ComponentPatch, NewComponent,
};
use quoteworks_core::domain::material::{
    Material, MaterialFilter, MaterialId, MaterialPatch, NewMaterial,
};
use quoteworks_core::errors::ApplicationError;
use quoteworks_db::repositories::{Page, PageRequest};
use tracing::info;

use crate::identity::RequestContext;
use crate::state::AppState;

type ServiceResult<T> = Result<T, ApplicationError>;

pub async fn list_materials(
    state: &AppState,
    ctx: &RequestContext,
    filter: MaterialFilter,
) -> ServiceResult<Vec<Material>> {
    ctx.actor.require_admin()?;
    Ok(state.materials.list(&filter).await?)
}

pub async fn get_material(
    state: &AppState,
    ctx: &RequestContext,
    id: MaterialId,
) -> ServiceResult<Material> {
    ctx.actor.require_admin()?;
    find_material(state, id).await
}

pub async fn create_material(
    state: &AppState,
    ctx: &RequestContext,
    material: NewMaterial,
) -> ServiceResult<Material> {
    ctx.actor.require_admin()?;
    let created = state.materials.create(material).await?;
    info!(
        event_name = "catalog.material_created",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        material_id = %created.id,
        "material created"
    );
    Ok(created)
}

/// A unit cost change recomputes every component that uses the material;
/// quotations keep their snapshot.
pub async fn update_material(
    state: &AppState,
    ctx: &RequestContext,
    id: MaterialId,
    patch: MaterialPatch,
) -> ServiceResult<Material> {
    ctx.actor.require_admin()?;
    let current = find_material(state, id).await?;
    let cost_changed = patch.changes_unit_cost(&current);

    let updated = state.materials.update(id, patch).await?;
    if cost_changed {
        state.audit.emit(
            ctx.audit(None)
                .event(
                    "catalog.material_cost_changed",
                    AuditCategory::Catalog,
                    AuditOutcome::Success,
                )
                .with_metadata("material_id", id.to_string())
                .with_metadata("from", current.unit_cost.to_string())
                .with_metadata("to", updated.unit_cost.to_string()),
        );
    }
    Ok(updated)
}

pub async fn delete_material(
    state: &AppState,
    ctx: &RequestContext,
    id: MaterialId,
) -> ServiceResult<()> {
    ctx.actor.require_admin()?;
    state.materials.delete(id).await?;
    info!(
        event_name = "catalog.material_deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        material_id = %id,
        "material deleted"
    );
    Ok(())
}

/// Read-only catalog for every signed-in user.
pub async fn browse_products(
    state: &AppState,
    filter: MaterialFilter,
    page: PageRequest,
) -> ServiceResult<Page<Material>> {
    Ok(state.materials.list_page(&filter, page).await?)
}

pub async fn get_product(state: &AppState, id: MaterialId) -> ServiceResult<Material> {
    find_material(state, id).await
}

pub async fn list_components(
    state: &AppState,
    ctx: &RequestContext,
    filter: ComponentFilter,
) -> ServiceResult<Vec<Component>> {
    ctx.actor.require_admin()?;
    Ok(state.components.list(&filter).await?)
}

pub async fn get_component(
    state: &AppState,
    ctx: &RequestContext,
    id: ComponentId,
) -> ServiceResult<Component> {
    ctx.actor.require_admin()?;
    state
        .components
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("component", id))
}

pub async fn create_component(
    state: &AppState,
    ctx: &RequestContext,
    component: NewComponent,
) -> ServiceResult<Component> {
    ctx.actor.require_admin()?;
    let created = state.components.create(component).await?;
    info!(
        event_name = "catalog.component_created",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        component_id = %created.id,
        total_cost = %created.total_cost,
        "component created"
    );
    Ok(created)
}

pub async fn update_component(
    state: &AppState,
    ctx: &RequestContext,
    id: ComponentId,
    patch: ComponentPatch,
) -> ServiceResult<Component> {
    ctx.actor.require_admin()?;
    let updated = state.components.update(id, patch).await?;
    info!(
        event_name = "catalog.component_updated",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        component_id = %id,
        total_cost = %updated.total_cost,
        "component updated"
    );
    Ok(updated)
}

pub async fn delete_component(
    state: &AppState,
    ctx: &RequestContext,
    id: ComponentId,
) -> ServiceResult<()> {
    ctx.actor.require_admin()?;
    state.components.delete(id).await?;
    info!(
        event_name = "catalog.component_deleted",
        correlation_id = %ctx.correlation_id,
        actor_id = %ctx.actor.user_id,
        component_id = %id,
        "component deleted"
    );
    Ok(())
}

async fn find_material(state: &AppState, id: MaterialId) -> ServiceResult<Material> {
    state.materials.find_by_id(id).await?.ok_or_else(|| ApplicationError::not_found("material", id))
}
