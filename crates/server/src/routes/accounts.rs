use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quoteworks_core::domain::settings::{CompanyInfo, CompanySettings, SettingsUpdate};
use quoteworks_core::domain::user::{NewUser, Role, User, UserId, UserPatch};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ApiError;
use crate::identity::RequestContext;
use crate::services::accounts as service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct TaxRequest {
    pub tax_rate: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CurrencyRequest {
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct PrefixRequest {
    pub prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct TermsRequest {
    pub terms: String,
}

pub async fn list_users(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = service::list_users(&state, &ctx).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(users))
}

pub async fn get_user(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user =
        service::get_user(&state, &ctx, UserId(id)).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(user))
}

pub async fn create_user(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(user): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let created =
        service::create_user(&state, &ctx, user).await.map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_user(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let user = service::update_user(&state, &ctx, UserId(id), patch)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(user))
}

pub async fn change_role(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<RoleRequest>,
) -> Result<Json<User>, ApiError> {
    let user = service::change_role(&state, &ctx, UserId(id), request.role)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(user))
}

pub async fn delete_user(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service::delete_user(&state, &ctx, UserId(id)).await.map_err(|error| ctx.fail(error))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<User>, ApiError> {
    let user = service::me(&state, &ctx).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(user))
}

pub async fn update_profile(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let user =
        service::update_profile(&state, &ctx, patch).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(user))
}

pub async fn settings(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<CompanySettings>, ApiError> {
    let settings = service::settings(&state, &ctx).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(settings))
}

async fn apply_settings(
    ctx: RequestContext,
    state: AppState,
    update: SettingsUpdate,
) -> Result<Json<CompanySettings>, ApiError> {
    let settings =
        service::update_settings(&state, &ctx, update).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(settings))
}

pub async fn update_company(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(info): Json<CompanyInfo>,
) -> Result<Json<CompanySettings>, ApiError> {
    apply_settings(ctx, state, SettingsUpdate::Company(info)).await
}

pub async fn update_tax(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(request): Json<TaxRequest>,
) -> Result<Json<CompanySettings>, ApiError> {
    apply_settings(ctx, state, SettingsUpdate::TaxRate(request.tax_rate)).await
}

pub async fn update_currency(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(request): Json<CurrencyRequest>,
) -> Result<Json<CompanySettings>, ApiError> {
    apply_settings(ctx, state, SettingsUpdate::Currency(request.currency)).await
}

pub async fn update_quotation_prefix(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(request): Json<PrefixRequest>,
) -> Result<Json<CompanySettings>, ApiError> {
    apply_settings(ctx, state, SettingsUpdate::QuotationPrefix(request.prefix)).await
}

pub async fn update_terms(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(request): Json<TermsRequest>,
) -> Result<Json<CompanySettings>, ApiError> {
    apply_settings(ctx, state, SettingsUpdate::Terms(request.terms)).await
}
