use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::component::ComponentId;
use crate::domain::material::MaterialId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

pub const CLIENT_NAME_MAX_CHARS: usize = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub i64);

impl fmt::Display for QuotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Draft,
    Issued,
    Accepted,
    Rejected,
}

impl QuotationStatus {
    pub const ALL: [QuotationStatus; 4] = [Self::Draft, Self::Issued, Self::Accepted, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Issued)
                | (Self::Issued, Self::Accepted)
                | (Self::Issued, Self::Rejected)
        )
    }

    pub fn allowed_transitions(&self) -> Vec<QuotationStatus> {
        Self::ALL.into_iter().filter(|next| self.can_transition_to(*next)).collect()
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }
}

impl fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuotationStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "issued" => Ok(Self::Issued),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(DomainError::Validation(format!("unknown quotation status `{other}`"))),
        }
    }
}

/// Human readable number in the form `{prefix}-{YYYYMMDD}-{seq:04}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationNumber(pub String);

impl QuotationNumber {
    pub fn generate(prefix: &str, date: NaiveDate, sequence: u32) -> Self {
        Self(format!("{}{:04}", Self::day_prefix(prefix, date), sequence))
    }

    /// Common leading part of every number issued on `date`.
    pub fn day_prefix(prefix: &str, date: NaiveDate) -> String {
        format!("{}-{}-", prefix, date.format("%Y%m%d"))
    }

    pub fn sequence(&self) -> Option<u32> {
        self.0.rsplit_once('-').and_then(|(_, tail)| tail.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuotationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub position: u32,
    pub component_id: ComponentId,
    pub component_name: String,
    pub length: Decimal,
    pub width: Decimal,
    pub height: Decimal,
    pub quantity: u32,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationMaterial {
    pub material_id: MaterialId,
    pub material_name: String,
    pub unit: String,
    pub unit_cost: Decimal,
    pub quantity: Decimal,
    pub total_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub owner_id: UserId,
    pub number: QuotationNumber,
    pub title: String,
    pub description: String,
    pub client_name: String,
    pub status: QuotationStatus,
    pub total_cost: Decimal,
    pub items: Vec<QuotationItem>,
    pub materials: Vec<QuotationMaterial>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn is_draft(&self) -> bool {
        self.status == QuotationStatus::Draft
    }
}

/// Header fields of a new quotation; items are submitted separately.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub client_name: String,
}

impl NewQuotation {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.trim().is_empty() {
            return Err(DomainError::Validation("title is required".to_owned()));
        }
        Ok(())
    }

    pub fn sanitized(self) -> Self {
        Self {
            title: self.title.trim().to_owned(),
            description: self.description,
            client_name: sanitize_client_name(&self.client_name),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationDetailsPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub client_name: Option<String>,
}

impl QuotationDetailsPatch {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.title.as_deref().is_some_and(|title| title.trim().is_empty()) {
            return Err(DomainError::Validation("title cannot be blank".to_owned()));
        }
        Ok(())
    }

    pub fn apply_to(self, quotation: &mut Quotation) {
        if let Some(title) = self.title {
            quotation.title = title.trim().to_owned();
        }
        if let Some(description) = self.description {
            quotation.description = description;
        }
        if let Some(client_name) = self.client_name {
            quotation.client_name = sanitize_client_name(&client_name);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuotationFilter {
    pub owner_id: Option<UserId>,
    pub client_name: Option<String>,
    pub status: Option<QuotationStatus>,
    pub created_on: Option<NaiveDate>,
}

impl QuotationFilter {
    pub fn owned_by(owner_id: UserId) -> Self {
        Self { owner_id: Some(owner_id), ..Self::default() }
    }

    pub fn matches(&self, quotation: &Quotation) -> bool {
        self.owner_id.map_or(true, |owner| quotation.owner_id == owner)
            && self.status.map_or(true, |status| quotation.status == status)
            && self.created_on.map_or(true, |day| quotation.created_at.date_naive() == day)
            && self.client_name.as_deref().map_or(true, |client| {
                quotation.client_name.to_lowercase().contains(&client.to_lowercase())
            })
    }
}

/// Restricts a client name to letters, digits, whitespace and `-.,'`, then
/// collapses whitespace and caps the length. Markup characters never survive.
pub fn sanitize_client_name(input: &str) -> String {
    let kept: String = input
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '.' | ',' | '\''))
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(CLIENT_NAME_MAX_CHARS).collect::<String>().trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{
        sanitize_client_name, Quotation, QuotationDetailsPatch, QuotationFilter, QuotationId,
        QuotationNumber, QuotationStatus,
    };
    use crate::domain::user::UserId;

    fn quotation(status: QuotationStatus) -> Quotation {
        Quotation {
            id: QuotationId(1),
            owner_id: UserId(7),
            number: QuotationNumber("QT-20260105-0001".to_owned()),
            title: "Kitchen".to_owned(),
            description: String::new(),
            client_name: "Acme Ltd.".to_owned(),
            status,
            total_cost: Decimal::ZERO,
            items: Vec::new(),
            materials: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn drafts_move_forward_only() {
        assert!(QuotationStatus::Draft.can_transition_to(QuotationStatus::Issued));
        assert!(QuotationStatus::Issued.can_transition_to(QuotationStatus::Accepted));
        assert!(!QuotationStatus::Issued.can_transition_to(QuotationStatus::Draft));
        assert!(!QuotationStatus::Draft.can_transition_to(QuotationStatus::Draft));
    }

    #[test]
    fn accepted_and_rejected_are_terminal() {
        for status in [QuotationStatus::Accepted, QuotationStatus::Rejected] {
            assert!(status.is_terminal());
            for next in QuotationStatus::ALL {
                assert!(!status.can_transition_to(next), "{status} -> {next}");
            }
        }
        assert_eq!(
            QuotationStatus::Issued.allowed_transitions(),
            vec![QuotationStatus::Accepted, QuotationStatus::Rejected]
        );
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Issued".parse::<QuotationStatus>(), Ok(QuotationStatus::Issued));
        assert!("sent".parse::<QuotationStatus>().is_err());
    }

    #[test]
    fn number_carries_prefix_date_and_padded_sequence() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 5).expect("valid date");
        let number = QuotationNumber::generate("QT", date, 12);

        assert_eq!(number.as_str(), "QT-20260105-0012");
        assert_eq!(number.sequence(), Some(12));
        assert_eq!(QuotationNumber::day_prefix("QT", date), "QT-20260105-");
    }

    #[test]
    fn client_name_drops_markup_and_collapses_whitespace() {
        assert_eq!(sanitize_client_name("  <b>O'Brien</b>   &  Sons, Inc.  "), "bO'Brienb Sons, Inc.");
        assert_eq!(sanitize_client_name("<script>alert(1)</script>"), "scriptalert1script");
        assert_eq!(sanitize_client_name(""), "");
    }

    #[test]
    fn client_name_is_capped() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_client_name(&long).chars().count(), 255);
    }

    #[test]
    fn details_patch_sanitizes_client_name() {
        let mut quotation = quotation(QuotationStatus::Draft);
        QuotationDetailsPatch {
            client_name: Some("Beta  <Corp>".to_owned()),
            ..QuotationDetailsPatch::default()
        }
        .apply_to(&mut quotation);

        assert_eq!(quotation.client_name, "Beta Corp");
        assert_eq!(quotation.title, "Kitchen");
    }

    #[test]
    fn filter_combines_owner_status_and_client() {
        let quotation = quotation(QuotationStatus::Draft);
        let mut filter = QuotationFilter::owned_by(UserId(7));
        filter.client_name = Some("acme".to_owned());
        assert!(filter.matches(&quotation));

        filter.status = Some(QuotationStatus::Issued);
        assert!(!filter.matches(&quotation));
        assert!(!QuotationFilter::owned_by(UserId(8)).matches(&quotation));
    }
}
