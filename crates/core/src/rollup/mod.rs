//! Cost roll-up: turns submitted line items plus a catalog snapshot into
//! priced items, an aggregated material breakdown and a quotation total.

pub mod catalog;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::component::ComponentId;
use crate::domain::material::MaterialId;
use crate::domain::quotation::{QuotationItem, QuotationMaterial};
use crate::errors::{ApplicationError, DomainError};

pub use self::catalog::RollupCatalog;

/// A line item as submitted by a caller, before validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRequest {
    pub component_id: ComponentId,
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub quantity: i64,
}

impl ItemRequest {
    /// `None` when length × width × height does not fit in a `Decimal`.
    pub fn volume(&self) -> Option<Decimal> {
        self.length.checked_mul(self.width)?.checked_mul(self.height)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupResult {
    pub items: Vec<QuotationItem>,
    pub materials: Vec<QuotationMaterial>,
    pub total_cost: Decimal,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RollupError {
    #[error("at least one item is required")]
    NoItems,
    #[error("item {position}: {reason}")]
    InvalidItem { position: usize, reason: String },
    #[error("component {0} not found")]
    UnknownComponent(ComponentId),
    #[error("material {material_id} referenced by component {component_id} not found")]
    UnknownMaterial { component_id: ComponentId, material_id: MaterialId },
    #[error("item {position}: cost exceeds the supported range")]
    Overflow { position: usize },
}

impl From<RollupError> for ApplicationError {
    fn from(error: RollupError) -> Self {
        match error {
            RollupError::UnknownComponent(id) => ApplicationError::not_found("component", id),
            RollupError::UnknownMaterial { material_id, .. } => {
                ApplicationError::not_found("material", material_id)
            }
            other => ApplicationError::Domain(DomainError::Validation(other.to_string())),
        }
    }
}

pub trait RollupEngine: Send + Sync {
    fn roll_up(
        &self,
        items: &[ItemRequest],
        catalog: &RollupCatalog,
    ) -> Result<RollupResult, RollupError>;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicRollupEngine;

impl RollupEngine for DeterministicRollupEngine {
    fn roll_up(
        &self,
        items: &[ItemRequest],
        catalog: &RollupCatalog,
    ) -> Result<RollupResult, RollupError> {
        roll_up(items, catalog)
    }
}

impl DeterministicRollupEngine {
    pub fn roll_up_with_audit<S>(
        &self,
        items: &[ItemRequest],
        catalog: &RollupCatalog,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<RollupResult, RollupError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.roll_up(items, catalog);
        let event = match &result {
            Ok(rolled) => audit
                .event("rollup.computed", AuditCategory::Rollup, AuditOutcome::Success)
                .with_metadata("items", rolled.items.len().to_string())
                .with_metadata("materials", rolled.materials.len().to_string())
                .with_metadata("total_cost", rolled.total_cost.to_string()),
            Err(error) => audit
                .event("rollup.rejected", AuditCategory::Rollup, AuditOutcome::Rejected)
                .with_metadata("error", error.to_string()),
        };
        sink.emit(event);
        result
    }
}

/// Rejects an empty list, non-positive dimensions and quantities outside
/// `1..=u32::MAX`. Positions in errors are 1-based.
pub fn validate_items(items: &[ItemRequest]) -> Result<(), RollupError> {
    if items.is_empty() {
        return Err(RollupError::NoItems);
    }

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        let dimensions = [("length", item.length), ("width", item.width), ("height", item.height)];
        for (label, value) in dimensions {
            if value <= Decimal::ZERO {
                return Err(RollupError::InvalidItem {
                    position,
                    reason: format!("{label} must be greater than zero"),
                });
            }
        }
        if item.quantity < 1 || item.quantity > i64::from(u32::MAX) {
            return Err(RollupError::InvalidItem {
                position,
                reason: format!("quantity must be a whole number between 1 and {}", u32::MAX),
            });
        }
    }
    Ok(())
}

pub fn roll_up(
    items: &[ItemRequest],
    catalog: &RollupCatalog,
) -> Result<RollupResult, RollupError> {
    validate_items(items)?;

    let mut rolled_items = Vec::with_capacity(items.len());
    let mut material_totals: BTreeMap<MaterialId, Decimal> = BTreeMap::new();

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        let overflow = || RollupError::Overflow { position };
        let component = catalog
            .find_component(item.component_id)
            .ok_or(RollupError::UnknownComponent(item.component_id))?;
        let volume = item.volume().ok_or_else(overflow)?;
        let quantity = Decimal::from(item.quantity);
        let unit_cost = component.total_cost.checked_mul(volume).ok_or_else(overflow)?;
        let total_cost = unit_cost.checked_mul(quantity).ok_or_else(overflow)?;

        for pair in &component.materials {
            let used = pair
                .quantity
                .checked_mul(volume)
                .and_then(|per_unit| per_unit.checked_mul(quantity))
                .ok_or_else(overflow)?;
            let entry = material_totals.entry(pair.material_id).or_insert(Decimal::ZERO);
            *entry = entry.checked_add(used).ok_or_else(overflow)?;
        }

        rolled_items.push(QuotationItem {
            position: u32::try_from(position).unwrap_or(u32::MAX),
            component_id: component.id,
            component_name: component.name.clone(),
            length: item.length,
            width: item.width,
            height: item.height,
            quantity: u32::try_from(item.quantity).unwrap_or(u32::MAX),
            unit_cost,
            total_cost,
        });
    }

    let mut materials = Vec::with_capacity(material_totals.len());
    for (material_id, quantity) in material_totals {
        let first_user = items.iter().position(|item| {
            catalog.find_component(item.component_id).is_some_and(|component| {
                component.materials.iter().any(|pair| pair.material_id == material_id)
            })
        });
        let material = catalog.find_material(material_id).ok_or_else(|| {
            let component_id = first_user.map_or(ComponentId(0), |index| items[index].component_id);
            RollupError::UnknownMaterial { component_id, material_id }
        })?;
        let total_cost = material
            .unit_cost
            .checked_mul(quantity)
            .ok_or(RollupError::Overflow { position: first_user.map_or(1, |index| index + 1) })?;
        materials.push(QuotationMaterial {
            material_id,
            material_name: material.name.clone(),
            unit: material.unit.clone(),
            unit_cost: material.unit_cost,
            quantity,
            total_cost,
        });
    }

    let total_cost = rolled_items.iter().try_fold(Decimal::ZERO, |total, item| {
        total
            .checked_add(item.total_cost)
            .ok_or(RollupError::Overflow { position: item.position as usize })
    })?;

    Ok(RollupResult { items: rolled_items, materials, total_cost })
}
