use club_recruit::config::RecruitmentConfig;
use club_recruit::recruitment::{
    AllocationStrategy, InMemoryRecruitmentStore, MemoryAuditLog, RecruitmentService,
    SystemClock,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub(crate) type AppService =
    RecruitmentService<InMemoryRecruitmentStore, MemoryAuditLog, SystemClock>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) strategy: AllocationStrategy,
}

pub(crate) fn build_service(config: &RecruitmentConfig) -> Arc<AppService> {
    Arc::new(RecruitmentService::new(
        Arc::new(InMemoryRecruitmentStore::default()),
        Arc::new(MemoryAuditLog::default()),
        Arc::new(SystemClock),
        config.clone(),
    ))
}

pub(crate) fn parse_strategy(raw: &str) -> Result<AllocationStrategy, String> {
    raw.parse::<AllocationStrategy>()
        .map_err(|err| err.to_string())
}
