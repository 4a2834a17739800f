//! Quotation use cases: owner scoping, roll-up, lifecycle guard and
//! persistence, in that order.

use quoteworks_core::document::QuotationDocument;
use quoteworks_core::domain::quotation::{
    NewQuotation, Quotation, QuotationDetailsPatch, QuotationFilter, QuotationId, QuotationStatus,
};
use quoteworks_core::errors::ApplicationError;
use quoteworks_core::lifecycle::QuotationAction;
use quoteworks_core::rollup::{ItemRequest, RollupResult};
use quoteworks_core::ComponentId;
use tracing::info;

use crate::identity::RequestContext;
use crate::state::AppState;

type ServiceResult<T> = Result<T, ApplicationError>;

/// Creates a draft and stores its rolled-up items in one step.
pub async fn create(
    state: &AppState,
    ctx: &RequestContext,
    header: NewQuotation,
    items: Vec<ItemRequest>,
) -> ServiceResult<Quotation> {
    header.validate()?;
    let rolled = roll_up(state, ctx, None, &items).await?;
    let prefix = state.settings.get().await?.quotation_prefix;

    let quotation =
        state.quotations.create(ctx.actor.user_id, header, &prefix, Some(rolled)).await?;
    info!(
        event_name = "quotation.created",
        correlation_id = %ctx.correlation_id,
        quotation_id = %quotation.id,
        quotation_no = %quotation.number,
        actor_id = %ctx.actor.user_id,
        items = quotation.items.len(),
        total_cost = %quotation.total_cost,
        "quotation created"
    );
    Ok(quotation)
}

pub async fn create_draft(
    state: &AppState,
    ctx: &RequestContext,
    header: NewQuotation,
) -> ServiceResult<Quotation> {
    let prefix = state.settings.get().await?.quotation_prefix;
    let quotation = state.quotations.create(ctx.actor.user_id, header, &prefix, None).await?;
    info!(
        event_name = "quotation.draft_created",
        correlation_id = %ctx.correlation_id,
        quotation_id = %quotation.id,
        quotation_no = %quotation.number,
        actor_id = %ctx.actor.user_id,
        "empty draft created"
    );
    Ok(quotation)
}

/// Loads a quotation the caller may see. Other users' quotations are
/// reported as missing.
pub async fn get(
    state: &AppState,
    ctx: &RequestContext,
    id: QuotationId,
) -> ServiceResult<Quotation> {
    let quotation = state
        .quotations
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("quotation", id))?;
    if !ctx.actor.can_access(quotation.owner_id) {
        return Err(ApplicationError::not_found("quotation", id));
    }
    Ok(quotation)
}

/// The caller's own quotations, narrowed by `filter`.
pub async fn list_own(
    state: &AppState,
    ctx: &RequestContext,
    filter: QuotationFilter,
) -> ServiceResult<Vec<Quotation>> {
    let filter = QuotationFilter { owner_id: Some(ctx.actor.user_id), ..filter };
    Ok(state.quotations.list(&filter).await?)
}

pub async fn search(
    state: &AppState,
    ctx: &RequestContext,
    filter: QuotationFilter,
) -> ServiceResult<Vec<Quotation>> {
    ctx.actor.require_admin()?;
    Ok(state.quotations.list(&filter).await?)
}

pub async fn update_details(
    state: &AppState,
    ctx: &RequestContext,
    id: QuotationId,
    patch: QuotationDetailsPatch,
) -> ServiceResult<Quotation> {
    let current = get(state, ctx, id).await?;
    state.lifecycle.ensure_permitted(current.status, QuotationAction::EditDetails)?;
    Ok(state.quotations.update_details(id, patch).await?)
}

/// Recomputes the quotation from `items` and swaps the stored breakdown.
/// Nothing is written when any item fails validation.
pub async fn replace_items(
    state: &AppState,
    ctx: &RequestContext,
    id: QuotationId,
    items: Vec<ItemRequest>,
) -> ServiceResult<Quotation> {
    let current = get(state, ctx, id).await?;
    state.lifecycle.ensure_permitted(current.status, QuotationAction::ReplaceItems)?;

    let rolled = roll_up(state, ctx, Some(id), &items).await?;
    let quotation = state.quotations.replace_items(id, rolled).await?;
    info!(
        event_name = "quotation.items_replaced",
        correlation_id = %ctx.correlation_id,
        quotation_id = %id,
        actor_id = %ctx.actor.user_id,
        items = quotation.items.len(),
        total_cost = %quotation.total_cost,
        "quotation items replaced"
    );
    Ok(quotation)
}

/// Validates the transition against the status the caller saw, then writes
/// it only if the stored status still matches.
pub async fn change_status(
    state: &AppState,
    ctx: &RequestContext,
    id: QuotationId,
    requested: QuotationStatus,
) -> ServiceResult<Quotation> {
    let current = get(state, ctx, id).await?;
    let outcome = state.lifecycle.apply_with_audit(
        current.status,
        requested,
        state.audit.as_ref(),
        &ctx.audit(Some(id)),
    )?;

    let quotation = state.quotations.set_status(id, outcome.from, outcome.to).await?;
    info!(
        event_name = "quotation.status_changed",
        correlation_id = %ctx.correlation_id,
        quotation_id = %id,
        actor_id = %ctx.actor.user_id,
        from = outcome.from.as_str(),
        to = outcome.to.as_str(),
        terminal = outcome.terminal,
        "quotation status changed"
    );
    Ok(quotation)
}

pub async fn delete(state: &AppState, ctx: &RequestContext, id: QuotationId) -> ServiceResult<()> {
    let current = get(state, ctx, id).await?;
    state.lifecycle.ensure_permitted(current.status, QuotationAction::Delete)?;
    state.quotations.delete(id).await?;
    info!(
        event_name = "quotation.deleted",
        correlation_id = %ctx.correlation_id,
        quotation_id = %id,
        actor_id = %ctx.actor.user_id,
        "quotation deleted"
    );
    Ok(())
}

/// Copies any quotation the caller can see into a new draft they own.
pub async fn duplicate(
    state: &AppState,
    ctx: &RequestContext,
    id: QuotationId,
) -> ServiceResult<Quotation> {
    let source = get(state, ctx, id).await?;
    state.lifecycle.ensure_permitted(source.status, QuotationAction::Duplicate)?;
    let prefix = state.settings.get().await?.quotation_prefix;

    let copy = state.quotations.duplicate(id, ctx.actor.user_id, &prefix).await?;
    info!(
        event_name = "quotation.duplicated",
        correlation_id = %ctx.correlation_id,
        quotation_id = %copy.id,
        source_quotation_id = %id,
        actor_id = %ctx.actor.user_id,
        "quotation duplicated"
    );
    Ok(copy)
}

pub async fn document(
    state: &AppState,
    ctx: &RequestContext,
    id: QuotationId,
) -> ServiceResult<QuotationDocument> {
    let quotation = get(state, ctx, id).await?;
    let settings = state.settings.get().await?;
    QuotationDocument::assemble(&quotation, &settings)
}

async fn roll_up(
    state: &AppState,
    ctx: &RequestContext,
    quotation_id: Option<QuotationId>,
    items: &[ItemRequest],
) -> ServiceResult<RollupResult> {
    let ids: Vec<ComponentId> = items.iter().map(|item| item.component_id).collect();
    let catalog = state.components.load_catalog(&ids).await?;
    let rolled = state.rollup.roll_up_with_audit(
        items,
        &catalog,
        state.audit.as_ref(),
        &ctx.audit(quotation_id),
    )?;
    Ok(rolled)
}
