use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::material::{Material, MaterialId};
use crate::domain::quotation::{Quotation, QuotationStatus};
use crate::errors::ApplicationError;
use crate::money::round_money;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub status: QuotationStatus,
    pub count: usize,
    pub total_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesReport {
    pub quotation_count: usize,
    pub total_amount: Decimal,
    pub by_status: Vec<StatusSummary>,
}

impl SalesReport {
    /// Fails with a conflict when a total does not fit in a `Decimal`.
    pub fn from_quotations(quotations: &[Quotation]) -> Result<Self, ApplicationError> {
        let by_status = QuotationStatus::ALL
            .into_iter()
            .map(|status| {
                let matching: Vec<&Quotation> =
                    quotations.iter().filter(|quotation| quotation.status == status).collect();
                let total = sum_totals(matching.iter().copied())?;
                Ok(StatusSummary {
                    status,
                    count: matching.len(),
                    total_amount: round_money(total),
                })
            })
            .collect::<Result<Vec<_>, ApplicationError>>()?;
        let total = sum_totals(quotations.iter())?;

        Ok(Self {
            quotation_count: quotations.len(),
            total_amount: round_money(total),
            by_status,
        })
    }
}

fn sum_totals<'a>(
    quotations: impl Iterator<Item = &'a Quotation>,
) -> Result<Decimal, ApplicationError> {
    quotations.fold(Ok(Decimal::ZERO), |total, quotation| {
        total?.checked_add(quotation.total_cost).ok_or_else(|| {
            ApplicationError::Conflict("sales total exceeds the supported range".to_owned())
        })
    })
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialUsageRow {
    pub material_id: MaterialId,
    pub material_name: String,
    pub unit: String,
    pub used_quantity: Decimal,
    pub stock_qty: Decimal,
    pub shortfall: Decimal,
}

/// One row per material, in id order. `usage` holds the aggregated quantity
/// over every quotation that is not rejected; absent materials count as zero.
pub fn material_usage(
    materials: &[Material],
    usage: &BTreeMap<MaterialId, Decimal>,
) -> Vec<MaterialUsageRow> {
    let mut rows: Vec<MaterialUsageRow> = materials
        .iter()
        .map(|material| {
            let used = usage.get(&material.id).copied().unwrap_or(Decimal::ZERO);
            let shortfall = (used - material.stock_qty).max(Decimal::ZERO);
            MaterialUsageRow {
                material_id: material.id,
                material_name: material.name.clone(),
                unit: material.unit.clone(),
                used_quantity: used.normalize(),
                stock_qty: material.stock_qty.normalize(),
                shortfall: shortfall.normalize(),
            }
        })
        .collect();
    rows.sort_by_key(|row| row.material_id);
    rows
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{material_usage, SalesReport};
    use crate::domain::material::{Material, MaterialId};
    use crate::domain::quotation::{Quotation, QuotationId, QuotationNumber, QuotationStatus};
    use crate::domain::user::UserId;
    use crate::errors::ApplicationError;

    fn quotation(id: i64, status: QuotationStatus, total: Decimal) -> Quotation {
        Quotation {
            id: QuotationId(id),
            owner_id: UserId(1),
            number: QuotationNumber(format!("QT-20260101-{id:04}")),
            title: "t".to_owned(),
            description: String::new(),
            client_name: String::new(),
            status,
            total_cost: total,
            items: Vec::new(),
            materials: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn material(id: i64, stock: i64) -> Material {
        Material {
            id: MaterialId(id),
            name: format!("M{id}"),
            description: String::new(),
            unit: "kg".to_owned(),
            unit_cost: Decimal::ONE,
            stock_qty: Decimal::from(stock),
            classification: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sales_report_totals_by_status() {
        let report = SalesReport::from_quotations(&[
            quotation(1, QuotationStatus::Draft, Decimal::new(10_005, 3)),
            quotation(2, QuotationStatus::Issued, Decimal::from(20)),
            quotation(3, QuotationStatus::Issued, Decimal::from(5)),
        ])
        .expect("report");

        assert_eq!(report.quotation_count, 3);
        assert_eq!(report.total_amount, Decimal::new(3501, 2));
        let issued = &report.by_status[1];
        assert_eq!(issued.status, QuotationStatus::Issued);
        assert_eq!(issued.count, 2);
        assert_eq!(issued.total_amount, Decimal::from(25));
        assert_eq!(report.by_status.len(), 4);
    }

    #[test]
    fn sales_total_out_of_range_is_a_conflict() {
        let error = SalesReport::from_quotations(&[
            quotation(1, QuotationStatus::Draft, Decimal::MAX),
            quotation(2, QuotationStatus::Issued, Decimal::ONE),
        ])
        .expect_err("overflow");
        assert!(matches!(error, ApplicationError::Conflict(_)));
    }

    #[test]
    fn material_usage_reports_shortfall_against_stock() {
        let usage = BTreeMap::from([(MaterialId(2), Decimal::from(12))]);
        let rows = material_usage(&[material(2, 10), material(1, 3)], &usage);

        assert_eq!(rows[0].material_id, MaterialId(1));
        assert_eq!(rows[0].used_quantity, Decimal::ZERO);
        assert_eq!(rows[0].shortfall, Decimal::ZERO);
        assert_eq!(rows[1].shortfall, Decimal::from(2));
    }
}
