use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::material::{Material, MaterialId};
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub i64);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One `(material, quantity)` pair of a bill of materials, resolved against the
/// current material record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMaterial {
    pub material_id: MaterialId,
    pub material_name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
}

impl ComponentMaterial {
    pub fn resolve(material: &Material, quantity: Decimal) -> Self {
        Self {
            material_id: material.id,
            material_name: material.name.clone(),
            unit: material.unit.clone(),
            unit_cost: material.unit_cost,
            quantity,
        }
    }

    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_cost(&self) -> Option<Decimal> {
        self.unit_cost.checked_mul(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub description: String,
    pub total_cost: Decimal,
    pub materials: Vec<ComponentMaterial>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Component {
    pub fn recompute_total(&mut self) -> Result<(), DomainError> {
        self.total_cost = component_cost(&self.materials)?;
        Ok(())
    }
}

/// Σ unit_cost × quantity over a component's material set.
pub fn component_cost(materials: &[ComponentMaterial]) -> Result<Decimal, DomainError> {
    materials.iter().try_fold(Decimal::ZERO, |total, pair| {
        pair.line_cost().and_then(|line| total.checked_add(line)).ok_or_else(|| {
            DomainError::Validation(format!(
                "cost of material {} exceeds the supported range",
                pair.material_id
            ))
        })
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMaterialInput {
    pub material_id: MaterialId,
    pub quantity: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComponent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub materials: Vec<ComponentMaterialInput>,
}

impl NewComponent {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation("component name is required".to_owned()));
        }
        validate_material_inputs(&self.materials)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub materials: Option<Vec<ComponentMaterialInput>>,
}

impl ComponentPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(DomainError::Validation("component name cannot be blank".to_owned()));
        }
        match &self.materials {
            Some(materials) => validate_material_inputs(materials),
            None => Ok(()),
        }
    }
}

fn validate_material_inputs(materials: &[ComponentMaterialInput]) -> Result<(), DomainError> {
    if materials.is_empty() {
        return Err(DomainError::Validation("at least one material is required".to_owned()));
    }

    let mut seen = HashSet::with_capacity(materials.len());
    for input in materials {
        if input.quantity <= Decimal::ZERO {
            return Err(DomainError::Validation(format!(
                "quantity for material {} must be greater than zero",
                input.material_id
            )));
        }
        if !seen.insert(input.material_id) {
            return Err(DomainError::Validation(format!(
                "material {} is listed more than once",
                input.material_id
            )));
        }
    }
    Ok(())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComponentFilter {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl ComponentFilter {
    pub fn matches(&self, component: &Component) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_deref()
                .map_or(true, |needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
        };
        contains(&component.name, &self.name) && contains(&component.description, &self.description)
    }
}
