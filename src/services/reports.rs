// src/services/reports.rs
//
// Read side of the revenue/GST rollups. The only writers are settlement
// and project completion; everything here is a query.

use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use crate::models::{GstReport, PartnerEarnings, Revenue, Role};
use crate::store::DynStore;

#[derive(Clone)]
pub struct ReportService {
    store: DynStore,
}

impl ReportService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    pub async fn revenue_summary(&self, principal: &Principal) -> AppResult<Vec<Revenue>> {
        principal.require_role(Role::Admin)?;
        self.store.list_revenues().await
    }

    pub async fn gst_summary(&self, principal: &Principal) -> AppResult<Vec<GstReport>> {
        principal.require_role(Role::Admin)?;
        self.store.list_gst_reports().await
    }

    /// Partners can read their own figures; admins can read anyone's.
    pub async fn partner_earnings(
        &self,
        principal: &Principal,
        partner_id: Uuid,
    ) -> AppResult<PartnerEarnings> {
        if principal.role != Role::Admin && principal.id != partner_id {
            return Err(AppError::Forbidden(
                "You do not have access to these earnings".to_string(),
            ));
        }
        let partner = self
            .store
            .find_partner(partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;
        Ok(PartnerEarnings {
            id: partner.id,
            name: partner.name,
            total_earnings: partner.total_earnings,
            available_balance: partner.available_balance,
        })
    }
}
