use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use quoteworks_core::domain::component::{
    Component, ComponentFilter, ComponentId, ComponentPatch, NewComponent,
};
use quoteworks_core::domain::material::{Material, MaterialFilter, MaterialId, MaterialPatch, NewMaterial};
use quoteworks_core::domain::quotation::{
    NewQuotation, Quotation, QuotationDetailsPatch, QuotationFilter, QuotationId, QuotationStatus,
};
use quoteworks_core::domain::settings::{CompanySettings, SettingsUpdate};
use quoteworks_core::domain::user::{NewUser, Role, User, UserId, UserPatch};
use quoteworks_core::errors::{ApplicationError, DomainError};
use quoteworks_core::rollup::{RollupCatalog, RollupResult};

pub mod component;
pub mod material;
pub mod memory;
pub mod quotation;
pub mod settings;
pub mod user;

pub use component::SqlComponentRepository;
pub use material::SqlMaterialRepository;
pub use memory::{
    InMemoryCatalogRepository, InMemoryQuotationRepository, InMemorySettingsRepository,
    InMemoryUserRepository,
};
pub use quotation::SqlQuotationRepository;
pub use settings::SqlSettingsRepository;
pub use user::SqlUserRepository;

/// Attempts at claiming a quotation number before giving up with a conflict.
pub const MAX_NUMBER_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Database(sqlx::Error::Database(error)) if error.is_unique_violation())
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(
            self,
            Self::Database(sqlx::Error::Database(error)) if error.is_foreign_key_violation()
        )
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        if error.is_unique_violation() {
            return ApplicationError::Conflict("a record with the same unique value exists".into());
        }
        if error.is_foreign_key_violation() {
            return ApplicationError::Conflict(
                "the record is referenced by other records or references a missing one".into(),
            );
        }
        match error {
            RepositoryError::NotFound { entity, id } => ApplicationError::NotFound { entity, id },
            RepositoryError::Conflict(message) => ApplicationError::Conflict(message),
            RepositoryError::Domain(error) => ApplicationError::Domain(error),
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// 1-based page; size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

#[async_trait]
pub trait MaterialRepository: Send + Sync {
    async fn list(&self, filter: &MaterialFilter) -> Result<Vec<Material>, RepositoryError>;
    async fn list_page(
        &self,
        filter: &MaterialFilter,
        page: PageRequest,
    ) -> Result<Page<Material>, RepositoryError>;
    async fn find_by_id(&self, id: MaterialId) -> Result<Option<Material>, RepositoryError>;
    async fn create(&self, material: NewMaterial) -> Result<Material, RepositoryError>;
    /// Applies the patch and, when the unit cost changes, recomputes the total
    /// of every component that uses the material, all in one transaction.
    async fn update(&self, id: MaterialId, patch: MaterialPatch)
        -> Result<Material, RepositoryError>;
    async fn delete(&self, id: MaterialId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ComponentRepository: Send + Sync {
    async fn list(&self, filter: &ComponentFilter) -> Result<Vec<Component>, RepositoryError>;
    async fn find_by_id(&self, id: ComponentId) -> Result<Option<Component>, RepositoryError>;
    async fn create(&self, component: NewComponent) -> Result<Component, RepositoryError>;
    async fn update(
        &self,
        id: ComponentId,
        patch: ComponentPatch,
    ) -> Result<Component, RepositoryError>;
    async fn delete(&self, id: ComponentId) -> Result<(), RepositoryError>;
    /// Snapshot of the given components and every material they reference.
    /// Unknown ids are left out; the roll-up reports them.
    async fn load_catalog(&self, ids: &[ComponentId]) -> Result<RollupCatalog, RepositoryError>;
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    /// Inserts a draft with a freshly claimed number and, when given, its
    /// rolled-up items and materials.
    async fn create(
        &self,
        owner_id: UserId,
        header: NewQuotation,
        number_prefix: &str,
        rolled: Option<RollupResult>,
    ) -> Result<Quotation, RepositoryError>;
    async fn find_by_id(&self, id: QuotationId) -> Result<Option<Quotation>, RepositoryError>;
    /// Header rows only; `items` and `materials` are left empty.
    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError>;
    async fn update_details(
        &self,
        id: QuotationId,
        patch: QuotationDetailsPatch,
    ) -> Result<Quotation, RepositoryError>;
    /// Deletes the existing items and materials, inserts the new ones and
    /// updates the total atomically. Fails unless the quotation is a draft.
    async fn replace_items(
        &self,
        id: QuotationId,
        rolled: RollupResult,
    ) -> Result<Quotation, RepositoryError>;
    /// Compare-and-set on the status column.
    async fn set_status(
        &self,
        id: QuotationId,
        expected: QuotationStatus,
        next: QuotationStatus,
    ) -> Result<Quotation, RepositoryError>;
    async fn delete(&self, id: QuotationId) -> Result<(), RepositoryError>;
    /// Copies header, items and material rows verbatim into a new draft.
    async fn duplicate(
        &self,
        id: QuotationId,
        owner_id: UserId,
        number_prefix: &str,
    ) -> Result<Quotation, RepositoryError>;
    /// Aggregated material quantity over every quotation that is not rejected.
    async fn material_usage(&self) -> Result<BTreeMap<MaterialId, Decimal>, RepositoryError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn update_profile(&self, id: UserId, patch: UserPatch) -> Result<User, RepositoryError>;
    async fn update_role(&self, id: UserId, role: Role) -> Result<User, RepositoryError>;
    async fn delete(&self, id: UserId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Stored settings, or the defaults when none were saved yet.
    async fn get(&self) -> Result<CompanySettings, RepositoryError>;
    async fn update(&self, update: SettingsUpdate) -> Result<CompanySettings, RepositoryError>;
}

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, RepositoryError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(raw.trim())
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

pub(crate) fn timestamp_column(
    row: &SqliteRow,
    column: &str,
) -> Result<DateTime<Utc>, RepositoryError> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column} `{raw}`: {error}")))
}

/// Adds `quantity` to a material's running usage total.
pub(crate) fn add_usage(
    usage: &mut BTreeMap<MaterialId, Decimal>,
    material_id: MaterialId,
    quantity: Decimal,
) -> Result<(), RepositoryError> {
    let total = usage.entry(material_id).or_insert(Decimal::ZERO);
    *total = total.checked_add(quantity).ok_or_else(|| {
        RepositoryError::Conflict(format!(
            "usage of material {material_id} exceeds the supported range"
        ))
    })?;
    Ok(())
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub(crate) fn like_pattern(value: &str) -> String {
    format!("%{}%", value.trim().to_lowercase())
}
