pub mod accounts;
pub mod catalog;
pub mod quotations;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use quoteworks_core::reports::{MaterialUsageRow, SalesReport};

use crate::error::ApiError;
use crate::identity::RequestContext;
use crate::services::reports as report_service;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/me", get(accounts::me))
        .route("/api/me/profile", put(accounts::update_profile))
        .route("/api/admin/users", get(accounts::list_users).post(accounts::create_user))
        .route(
            "/api/admin/users/{id}",
            get(accounts::get_user).put(accounts::update_user).delete(accounts::delete_user),
        )
        .route("/api/admin/users/{id}/role", put(accounts::change_role))
        .route(
            "/api/admin/materials",
            get(catalog::list_materials).post(catalog::create_material),
        )
        .route(
            "/api/admin/materials/{id}",
            get(catalog::get_material)
                .put(catalog::update_material)
                .delete(catalog::delete_material),
        )
        .route("/api/products", get(catalog::browse_products))
        .route("/api/products/{id}", get(catalog::get_product))
        .route(
            "/api/admin/components",
            get(catalog::list_components).post(catalog::create_component),
        )
        .route(
            "/api/admin/components/{id}",
            get(catalog::get_component)
                .put(catalog::update_component)
                .delete(catalog::delete_component),
        )
        .route("/api/quotations", get(quotations::list).post(quotations::create))
        .route("/api/quotations/draft", post(quotations::create_draft))
        .route(
            "/api/quotations/{id}",
            get(quotations::get).put(quotations::update).delete(quotations::delete),
        )
        .route("/api/quotations/{id}/items", put(quotations::replace_items))
        .route("/api/quotations/{id}/status", put(quotations::change_status))
        .route("/api/quotations/{id}/duplicate", post(quotations::duplicate))
        .route("/api/quotations/{id}/document", get(quotations::document))
        .route("/api/admin/quotations", get(quotations::search))
        .route("/api/admin/reports/sales", get(sales_report))
        .route("/api/admin/reports/material-usage", get(material_usage_report))
        .route("/api/admin/settings", get(accounts::settings))
        .route("/api/admin/settings/company", put(accounts::update_company))
        .route("/api/admin/settings/tax", put(accounts::update_tax))
        .route("/api/admin/settings/currency", put(accounts::update_currency))
        .route("/api/admin/settings/quotation-prefix", put(accounts::update_quotation_prefix))
        .route("/api/admin/settings/terms", put(accounts::update_terms))
        .with_state(state)
}

async fn sales_report(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<SalesReport>, ApiError> {
    let report = report_service::sales(&state, &ctx).await.map_err(|error| ctx.fail(error))?;
    Ok(Json(report))
}

async fn material_usage_report(
    ctx: RequestContext,
    State(state): State<AppState>,
) -> Result<Json<Vec<MaterialUsageRow>>, ApiError> {
    let rows = report_service::material_usage_report(&state, &ctx)
        .await
        .map_err(|error| ctx.fail(error))?;
    Ok(Json(rows))
}
