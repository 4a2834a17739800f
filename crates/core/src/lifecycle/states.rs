use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::quotation::QuotationStatus;

/// Mutations whose availability depends on the quotation status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuotationAction {
    ReplaceItems,
    EditDetails,
    Delete,
    Duplicate,
}

impl QuotationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReplaceItems => "replace items",
            Self::EditDetails => "edit details",
            Self::Delete => "delete",
            Self::Duplicate => "duplicate",
        }
    }

    pub fn permitted_in(&self, status: QuotationStatus) -> bool {
        match self {
            Self::Duplicate => true,
            Self::ReplaceItems | Self::EditDetails | Self::Delete => {
                status == QuotationStatus::Draft
            }
        }
    }
}

impl fmt::Display for QuotationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuotationStatus,
    pub to: QuotationStatus,
    pub terminal: bool,
}
