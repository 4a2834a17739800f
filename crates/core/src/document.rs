//! Presentation model for rendered quotations. All amounts are rounded and
//! formatted here so templates only place strings.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::quotation::Quotation;
use crate::domain::settings::CompanySettings;
use crate::errors::ApplicationError;
use crate::money::{apply_tax, format_money, format_quantity};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCompany {
    pub name: String,
    pub address: String,
    pub logo: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentItem {
    pub position: u32,
    pub component_name: String,
    pub dimensions: String,
    pub quantity: u32,
    pub unit_cost: String,
    pub total_cost: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMaterial {
    pub name: String,
    pub unit: String,
    pub quantity: String,
    pub unit_cost: String,
    pub total_cost: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationDocument {
    pub number: String,
    pub title: String,
    pub description: String,
    pub client_name: String,
    pub status: String,
    pub date: String,
    pub currency: String,
    pub company: DocumentCompany,
    pub items: Vec<DocumentItem>,
    pub materials: Vec<DocumentMaterial>,
    pub subtotal: String,
    pub tax_rate_percent: String,
    pub tax: String,
    pub total: String,
    pub show_tax: bool,
    pub terms: String,
}

impl QuotationDocument {
    pub fn assemble(
        quotation: &Quotation,
        settings: &CompanySettings,
    ) -> Result<Self, ApplicationError> {
        let breakdown = apply_tax(quotation.total_cost, settings.tax_rate).ok_or_else(|| {
            ApplicationError::Conflict(format!(
                "total of quotation {} exceeds the supported range once taxed",
                quotation.number
            ))
        })?;

        let items = quotation
            .items
            .iter()
            .map(|item| DocumentItem {
                position: item.position,
                component_name: item.component_name.clone(),
                dimensions: format!(
                    "{} x {} x {}",
                    format_quantity(item.length),
                    format_quantity(item.width),
                    format_quantity(item.height)
                ),
                quantity: item.quantity,
                unit_cost: format_money(item.unit_cost),
                total_cost: format_money(item.total_cost),
            })
            .collect();

        let materials = quotation
            .materials
            .iter()
            .map(|row| DocumentMaterial {
                name: row.material_name.clone(),
                unit: row.unit.clone(),
                quantity: format_quantity(row.quantity),
                unit_cost: format_money(row.unit_cost),
                total_cost: format_money(row.total_cost),
            })
            .collect();

        Ok(Self {
            number: quotation.number.to_string(),
            title: quotation.title.clone(),
            description: quotation.description.clone(),
            client_name: quotation.client_name.clone(),
            status: quotation.status.to_string(),
            date: quotation.created_at.format("%Y-%m-%d").to_string(),
            currency: settings.currency.clone(),
            company: DocumentCompany {
                name: settings.company_name.clone(),
                address: settings.company_address.clone(),
                logo: settings.company_logo.clone(),
            },
            items,
            materials,
            subtotal: format_money(breakdown.subtotal),
            tax_rate_percent: format_quantity(breakdown.tax_rate * Decimal::ONE_HUNDRED),
            tax: format_money(breakdown.tax),
            total: format_money(breakdown.total),
            show_tax: !settings.tax_rate.is_zero(),
            terms: settings.terms_and_conditions.clone(),
        })
    }

    pub fn file_stem(&self) -> String {
        format!("quotation_{}", self.number)
    }
}
