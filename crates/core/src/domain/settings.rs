use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const DEFAULT_QUOTATION_PREFIX: &str = "QT";
pub const DEFAULT_CURRENCY: &str = "USD";

/// Single-row company settings used for numbering and documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySettings {
    pub company_name: String,
    pub company_address: String,
    pub company_logo: String,
    pub tax_rate: Decimal,
    pub currency: String,
    pub quotation_prefix: String,
    pub terms_and_conditions: String,
    pub updated_at: DateTime<Utc>,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            company_name: String::new(),
            company_address: String::new(),
            company_logo: String::new(),
            tax_rate: Decimal::ZERO,
            currency: DEFAULT_CURRENCY.to_owned(),
            quotation_prefix: DEFAULT_QUOTATION_PREFIX.to_owned(),
            terms_and_conditions: String::new(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub logo: String,
}

/// One of the independently updatable groups of settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettingsUpdate {
    Company(CompanyInfo),
    TaxRate(Decimal),
    Currency(String),
    QuotationPrefix(String),
    Terms(String),
}

impl SettingsUpdate {
    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Company(info) if info.name.trim().is_empty() => {
                Err(DomainError::Validation("company name is required".to_owned()))
            }
            Self::TaxRate(rate) if *rate < Decimal::ZERO || *rate > Decimal::ONE => {
                Err(DomainError::Validation(
                    "tax rate must be a fraction between 0 and 1".to_owned(),
                ))
            }
            Self::Currency(code)
                if code.trim().len() != 3
                    || !code.trim().chars().all(|c| c.is_ascii_alphabetic()) =>
            {
                Err(DomainError::Validation(format!(
                    "currency `{code}` must be a three letter ISO code"
                )))
            }
            Self::QuotationPrefix(prefix)
                if prefix.is_empty()
                    || prefix.len() > 16
                    || !prefix.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                Err(DomainError::Validation(
                    "quotation prefix must be 1 to 16 letters or digits".to_owned(),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn apply_to(self, settings: &mut CompanySettings) {
        match self {
            Self::Company(info) => {
                settings.company_name = info.name.trim().to_owned();
                settings.company_address = info.address;
                settings.company_logo = info.logo;
            }
            Self::TaxRate(rate) => settings.tax_rate = rate,
            Self::Currency(code) => settings.currency = code.trim().to_ascii_uppercase(),
            Self::QuotationPrefix(prefix) => settings.quotation_prefix = prefix,
            Self::Terms(terms) => settings.terms_and_conditions = terms,
        }
        settings.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{CompanyInfo, CompanySettings, SettingsUpdate};

    #[test]
    fn defaults_use_qt_prefix_and_zero_tax() {
        let settings = CompanySettings::default();
        assert_eq!(settings.quotation_prefix, "QT");
        assert_eq!(settings.tax_rate, Decimal::ZERO);
    }

    #[test]
    fn tax_rate_must_be_a_fraction() {
        assert!(SettingsUpdate::TaxRate(Decimal::new(7, 2)).validate().is_ok());
        assert!(SettingsUpdate::TaxRate(Decimal::from(7)).validate().is_err());
        assert!(SettingsUpdate::TaxRate(Decimal::new(-1, 2)).validate().is_err());
    }

    #[test]
    fn currency_is_normalized_to_upper_case() {
        let update = SettingsUpdate::Currency("eur".to_owned());
        assert!(update.validate().is_ok());

        let mut settings = CompanySettings::default();
        update.apply_to(&mut settings);
        assert_eq!(settings.currency, "EUR");
        assert!(SettingsUpdate::Currency("euro".to_owned()).validate().is_err());
    }

    #[test]
    fn prefix_rejects_separator_characters() {
        assert!(SettingsUpdate::QuotationPrefix("QT-X".to_owned()).validate().is_err());
        assert!(SettingsUpdate::QuotationPrefix("INV".to_owned()).validate().is_ok());
    }

    #[test]
    fn company_update_touches_only_company_fields() {
        let mut settings = CompanySettings::default();
        SettingsUpdate::Company(CompanyInfo {
            name: " Acme Works ".to_owned(),
            address: "1 Main St".to_owned(),
            logo: String::new(),
        })
        .apply_to(&mut settings);

        assert_eq!(settings.company_name, "Acme Works");
        assert_eq!(settings.currency, "USD");
    }
}
