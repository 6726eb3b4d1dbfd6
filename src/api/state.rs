use std::sync::Arc;

use crate::alerts::AlertBus;
use crate::ingest::IngestPipeline;
use crate::storage::AnomalyStore;
use crate::tenant::TenantResolver;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestPipeline>,
    pub tenants: Arc<dyn TenantResolver>,
    pub anomalies: Arc<dyn AnomalyStore>,
    pub alerts: AlertBus,
}
