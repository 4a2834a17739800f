use quoteworks_core::domain::material::MaterialFilter;
use quoteworks_core::domain::quotation::QuotationFilter;
use quoteworks_core::errors::ApplicationError;
use quoteworks_core::reports::{material_usage, MaterialUsageRow, SalesReport};

use crate::identity::RequestContext;
use crate::state::AppState;

pub async fn sales(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<SalesReport, ApplicationError> {
    ctx.actor.require_admin()?;
    let quotations = state.quotations.list(&QuotationFilter::default()).await?;
    SalesReport::from_quotations(&quotations)
}

pub async fn material_usage_report(
    state: &AppState,
    ctx: &RequestContext,
) -> Result<Vec<MaterialUsageRow>, ApplicationError> {
    ctx.actor.require_admin()?;
    let materials = state.materials.list(&MaterialFilter::default()).await?;
    let usage = state.quotations.material_usage().await?;
    Ok(material_usage(&materials, &usage))
}
