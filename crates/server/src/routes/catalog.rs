use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use quoteworks_core::domain::component::{
    Component, ComponentFilter, ComponentId, ComponentPatch, NewComponent,
};
use quoteworks_core::domain::material::{
    Material, MaterialFilter, MaterialId, MaterialPatch, NewMaterial,
};
use quoteworks_db::repositories::{Page, PageRequest};
use serde::Deserialize;

use crate::error::ApiError;
use crate::identity::RequestContext;
use crate::services::catalog as service;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MaterialQuery {
    pub name: Option<String>,
    pub classification: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub keyword: Option<String>,
    pub classification: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComponentQuery {
    pub name: Option<String>,
    pub description: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

pub async fn list_materials(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<MaterialQuery>,
) -> Result<Json<Vec<Material>>, ApiError> {
    let filter = MaterialFilter {
        keyword: non_empty(query.name),
        classification: non_empty(query.classification),
    };
    let materials =
        service::list_materials(&state, &ctx, filter).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(materials))
}

pub async fn get_material(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Material>, ApiError> {
    let material = service::get_material(&state, &ctx, MaterialId(id))
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(material))
}

pub async fn create_material(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(material): Json<NewMaterial>,
) -> Result<(StatusCode, Json<Material>), ApiError> {
    let created =
        service::create_material(&state, &ctx, material).await.map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_material(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<MaterialPatch>,
) -> Result<Json<Material>, ApiError> {
    let updated = service::update_material(&state, &ctx, MaterialId(id), patch)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(updated))
}

pub async fn delete_material(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service::delete_material(&state, &ctx, MaterialId(id))
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn browse_products(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<Material>>, ApiError> {
    let filter = MaterialFilter {
        keyword: non_empty(query.keyword),
        classification: non_empty(query.classification),
    };
    let page = PageRequest::new(query.page, query.page_size);
    let products =
        service::browse_products(&state, filter, page).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(products))
}

pub async fn get_product(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Material>, ApiError> {
    let product =
        service::get_product(&state, MaterialId(id)).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(product))
}

pub async fn list_components(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<ComponentQuery>,
) -> Result<Json<Vec<Component>>, ApiError> {
    let filter = ComponentFilter {
        name: non_empty(query.name),
        description: non_empty(query.description),
    };
    let components =
        service::list_components(&state, &ctx, filter).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(components))
}

pub async fn get_component(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Component>, ApiError> {
    let component = service::get_component(&state, &ctx, ComponentId(id))
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(component))
}

pub async fn create_component(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(component): Json<NewComponent>,
) -> Result<(StatusCode, Json<Component>), ApiError> {
    let created = service::create_component(&state, &ctx, component)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_component(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<ComponentPatch>,
) -> Result<Json<Component>, ApiError> {
    let updated = service::update_component(&state, &ctx, ComponentId(id), patch)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(updated))
}

pub async fn delete_component(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service::delete_component(&state, &ctx, ComponentId(id))
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(StatusCode::NO_CONTENT)
}
