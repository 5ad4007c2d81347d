use crate::config::Config;
use crate::services::{
    accounts::AccountService, email::Notifier, gateway::GatewayService, leads::LeadService,
    milestones::MilestoneService, projects::ProjectService, reports::ReportService,
    settlement::SettlementService, withdrawals::WithdrawalService,
};
use crate::store::DynStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub accounts: AccountService,
    pub leads: LeadService,
    pub projects: ProjectService,
    pub milestones: MilestoneService,
    pub settlement: SettlementService,
    pub withdrawals: WithdrawalService,
    pub reports: ReportService,
}

impl AppState {
    pub fn new(store: DynStore, config: Config) -> Self {
        let config = Arc::new(config);
        let notifier = Notifier::new(Arc::clone(&config));
        let gateway = GatewayService::new(Arc::clone(&config));

        Self {
            accounts: AccountService::new(store.clone(), Arc::clone(&config)),
            leads: LeadService::new(
                store.clone(),
                notifier.clone(),
                config.frontend_url.clone(),
            ),
            projects: ProjectService::new(store.clone()),
            milestones: MilestoneService::new(store.clone(), notifier.clone()),
            settlement: SettlementService::new(store.clone(), notifier.clone(), gateway),
            withdrawals: WithdrawalService::new(store.clone(), notifier),
            reports: ReportService::new(store),
            config,
        }
    }
}
