use std::sync::Arc;

use quoteworks_core::audit::AuditSink;
use quoteworks_core::config::AppConfig;
use quoteworks_core::{DeterministicRollupEngine, LifecycleEngine};
use quoteworks_db::repositories::{
    ComponentRepository, MaterialRepository, QuotationRepository, SettingsRepository,
    SqlComponentRepository, SqlMaterialRepository, SqlQuotationRepository, SqlSettingsRepository,
    SqlUserRepository, UserRepository,
};
use quoteworks_db::DbPool;
use secrecy::SecretString;

use crate::audit::TracingAuditSink;
use crate::pdf::{PdfError, PdfGenerator};

/// Shared handler state. Repositories sit behind trait objects so handlers
/// run unchanged against SQLite or the in-memory doubles.
#[derive(Clone)]
pub struct AppState {
    pub materials: Arc<dyn MaterialRepository>,
    pub components: Arc<dyn ComponentRepository>,
    pub quotations: Arc<dyn QuotationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub settings: Arc<dyn SettingsRepository>,
    pub lifecycle: LifecycleEngine,
    pub rollup: DeterministicRollupEngine,
    pub audit: Arc<dyn AuditSink>,
    pub pdf: Arc<PdfGenerator>,
    pub gateway_token: Option<Arc<SecretString>>,
}

impl AppState {
    pub fn from_pool(db_pool: DbPool, config: &AppConfig) -> Result<Self, PdfError> {
        let pdf = PdfGenerator::new(&config.documents)?;
        Ok(Self {
            materials: Arc::new(SqlMaterialRepository::new(db_pool.clone())),
            components: Arc::new(SqlComponentRepository::new(db_pool.clone())),
            quotations: Arc::new(SqlQuotationRepository::new(db_pool.clone())),
            users: Arc::new(SqlUserRepository::new(db_pool.clone())),
            settings: Arc::new(SqlSettingsRepository::new(db_pool)),
            lifecycle: LifecycleEngine,
            rollup: DeterministicRollupEngine,
            audit: Arc::new(TracingAuditSink),
            pdf: Arc::new(pdf),
            gateway_token: config.auth.gateway_token.clone().map(Arc::new),
        })
    }
}
