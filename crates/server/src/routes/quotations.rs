use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::NaiveDate;
use quoteworks_core::domain::quotation::{
    NewQuotation, Quotation, QuotationDetailsPatch, QuotationFilter, QuotationId, QuotationStatus,
};
use quoteworks_core::errors::ApplicationError;
use quoteworks_core::rollup::ItemRequest;
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::identity::RequestContext;
use crate::services::quotations as service;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceItemsRequest {
    pub items: Vec<ItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

/// Search parameters; `date` is the creation day as `YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
pub struct QuotationQuery {
    pub client: Option<String>,
    pub status: Option<String>,
    pub date: Option<String>,
}

impl QuotationQuery {
    fn into_filter(self) -> Result<QuotationFilter, ApplicationError> {
        let status =
            non_empty(self.status).map(|raw| raw.parse::<QuotationStatus>()).transpose()?;
        let created_on = non_empty(self.date)
            .map(|raw| {
                NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    ApplicationError::validation(format!("date `{raw}` must be YYYY-MM-DD"))
                })
            })
            .transpose()?;
        Ok(QuotationFilter {
            owner_id: None,
            client_name: non_empty(self.client),
            status,
            created_on,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

pub async fn create(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<Quotation>), ApiError> {
    let header = NewQuotation {
        title: request.title,
        description: request.description,
        client_name: request.client_name,
    };
    let quotation = service::create(&state, &ctx, header, request.items)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn create_draft(
    ctx: RequestContext,
    State(state): State<AppState>,
    Json(header): Json<NewQuotation>,
) -> Result<(StatusCode, Json<Quotation>), ApiError> {
    let quotation =
        service::create_draft(&state, &ctx, header).await.map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(quotation)))
}

pub async fn list(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<QuotationQuery>,
) -> Result<Json<Vec<Quotation>>, ApiError> {
    let filter = query.into_filter().map_err(|error| ctx.fail(error))?;
    let quotations =
        service::list_own(&state, &ctx, filter).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(quotations))
}

pub async fn search(
    ctx: RequestContext,
    State(state): State<AppState>,
    Query(query): Query<QuotationQuery>,
) -> Result<Json<Vec<Quotation>>, ApiError> {
    let filter = query.into_filter().map_err(|error| ctx.fail(error))?;
    let quotations =
        service::search(&state, &ctx, filter).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(quotations))
}

pub async fn get(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Quotation>, ApiError> {
    let quotation =
        service::get(&state, &ctx, QuotationId(id)).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(quotation))
}

pub async fn update(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<QuotationDetailsPatch>,
) -> Result<Json<Quotation>, ApiError> {
    let quotation = service::update_details(&state, &ctx, QuotationId(id), patch)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(quotation))
}

pub async fn delete(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    service::delete(&state, &ctx, QuotationId(id)).await.map_err(|error| ctx.fail(error))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn replace_items(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ReplaceItemsRequest>,
) -> Result<Json<Quotation>, ApiError> {
    let quotation = service::replace_items(&state, &ctx, QuotationId(id), request.items)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(quotation))
}

pub async fn change_status(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<Quotation>, ApiError> {
    let requested = request
        .status
        .parse::<QuotationStatus>()
        .map_err(|error| ctx.fail(ApplicationError::from(error)))?;
    let quotation = service::change_status(&state, &ctx, QuotationId(id), requested)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(quotation))
}

pub async fn duplicate(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Quotation>), ApiError> {
    let copy =
        service::duplicate(&state, &ctx, QuotationId(id)).await.map_err(|error| ctx.fail(error))?;
    Ok((StatusCode::CREATED, Json(copy)))
}

/// PDF when a converter is available, printable HTML otherwise.
pub async fn document(
    ctx: RequestContext,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let document =
        service::document(&state, &ctx, QuotationId(id)).await.map_err(|error| ctx.fail(error))?;
    let rendered = state
        .pdf
        .generate(&document)
        .await
        .map_err(|error| ctx.fail(ApplicationError::Configuration(error.to_string())))?;

    info!(
        event_name = "document.generated",
        correlation_id = %ctx.correlation_id,
        quotation_id = %id,
        quotation_no = %document.number,
        actor_id = %ctx.actor.user_id,
        "quotation document generated"
    );
    Ok(rendered.into_response(&document.file_stem()))
}
