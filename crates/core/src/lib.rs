pub mod audit;
pub mod config;
pub mod document;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod money;
pub mod reports;
pub mod rollup;

pub use domain::component::{Component, ComponentId, ComponentMaterial};
pub use domain::material::{Material, MaterialId};
pub use domain::quotation::{
    Quotation, QuotationId, QuotationItem, QuotationMaterial, QuotationNumber, QuotationStatus,
};
pub use domain::settings::CompanySettings;
pub use domain::user::{Actor, Role, User, UserId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{LifecycleEngine, QuotationAction, TransitionOutcome};
pub use rollup::{DeterministicRollupEngine, ItemRequest, RollupCatalog, RollupEngine, RollupResult};
