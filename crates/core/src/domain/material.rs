use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub i64);

impl std::fmt::Display for MaterialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub unit_cost: Decimal,
    pub stock_qty: Decimal,
    pub classification: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit: String,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub stock_qty: Decimal,
    #[serde(default)]
    pub classification: String,
}

impl NewMaterial {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() || self.unit.trim().is_empty() {
            return Err(DomainError::Validation("name and unit are required".to_owned()));
        }
        ensure_non_negative(self.unit_cost, self.stock_qty)
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub unit_cost: Option<Decimal>,
    pub stock_qty: Option<Decimal>,
    pub classification: Option<String>,
}

impl MaterialPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&self.name) || blank(&self.unit) {
            return Err(DomainError::Validation("name and unit cannot be blank".to_owned()));
        }
        ensure_non_negative(
            self.unit_cost.unwrap_or(Decimal::ZERO),
            self.stock_qty.unwrap_or(Decimal::ZERO),
        )
    }

    pub fn changes_unit_cost(&self, current: &Material) -> bool {
        self.unit_cost.is_some_and(|cost| cost != current.unit_cost)
    }

    pub fn apply_to(self, material: &mut Material) {
        if let Some(name) = self.name {
            material.name = name.trim().to_owned();
        }
        if let Some(description) = self.description {
            material.description = description;
        }
        if let Some(unit) = self.unit {
            material.unit = unit.trim().to_owned();
        }
        if let Some(unit_cost) = self.unit_cost {
            material.unit_cost = unit_cost;
        }
        if let Some(stock_qty) = self.stock_qty {
            material.stock_qty = stock_qty;
        }
        if let Some(classification) = self.classification {
            material.classification = classification;
        }
    }
}

fn ensure_non_negative(unit_cost: Decimal, stock_qty: Decimal) -> Result<(), DomainError> {
    if unit_cost.is_sign_negative() || stock_qty.is_sign_negative() {
        return Err(DomainError::Validation(
            "unit cost and stock quantity must be non-negative".to_owned(),
        ));
    }
    Ok(())
}

/// Filters shared by the admin search and the user-facing catalog listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaterialFilter {
    pub keyword: Option<String>,
    pub classification: Option<String>,
}

impl MaterialFilter {
    pub fn matches(&self, material: &Material) -> bool {
        let classification_ok = self
            .classification
            .as_deref()
            .map_or(true, |classification| material.classification == classification);
        let keyword_ok = self.keyword.as_deref().map_or(true, |keyword| {
            let keyword = keyword.to_lowercase();
            material.name.to_lowercase().contains(&keyword)
                || material.description.to_lowercase().contains(&keyword)
        });
        classification_ok && keyword_ok
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{Material, MaterialFilter, MaterialId, MaterialPatch, NewMaterial};

    fn steel() -> Material {
        Material {
            id: MaterialId(1),
            name: "Steel sheet".to_owned(),
            description: "2mm cold rolled".to_owned(),
            unit: "m2".to_owned(),
            unit_cost: Decimal::new(1250, 2),
            stock_qty: Decimal::from(40),
            classification: "metal".to_owned(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn new_material_requires_name_and_unit() {
        let material = NewMaterial { name: "Oak".to_owned(), ..NewMaterial::default() };
        assert!(material.validate().is_err());
    }

    #[test]
    fn new_material_rejects_negative_cost() {
        let material = NewMaterial {
            name: "Oak".to_owned(),
            unit: "m3".to_owned(),
            unit_cost: Decimal::new(-1, 0),
            ..NewMaterial::default()
        };
        assert!(material.validate().is_err());
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut material = steel();
        let patch = MaterialPatch { unit_cost: Some(Decimal::new(1300, 2)), ..Default::default() };
        assert!(patch.changes_unit_cost(&material));

        patch.apply_to(&mut material);
        assert_eq!(material.unit_cost, Decimal::new(1300, 2));
        assert_eq!(material.name, "Steel sheet");
    }

    #[test]
    fn filter_matches_keyword_in_description_case_insensitively() {
        let filter = MaterialFilter { keyword: Some("COLD".to_owned()), classification: None };
        assert!(filter.matches(&steel()));

        let filter = MaterialFilter { keyword: None, classification: Some("wood".to_owned()) };
        assert!(!filter.matches(&steel()));
    }
}
