// src/services/milestones.rs
//
// Milestone workflow: partner-submitted units of work, admin-gated
// approval. Approval is the single path that mints an invoice.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use crate::ledger;
use crate::models::{
    ApproveMilestoneRequest, Invoice, InvoiceStatus, Milestone, MilestoneStatus,
    RejectMilestoneRequest, Role, SubmitMilestoneRequest,
};
use crate::services::email::Notifier;
use crate::services::settlement::generate_invoice_number;
use crate::store::{DynStore, NewInvoice, NewMilestone, partner_updatable};

/// Payment window granted on milestone invoices.
const INVOICE_DUE_DAYS: i64 = 7;

/// Attempts before a generated invoice number collision is reported.
const INVOICE_NUMBER_RETRIES: usize = 3;

#[derive(Clone)]
pub struct MilestoneService {
    store: DynStore,
    notifier: Notifier,
}

impl MilestoneService {
    pub fn new(store: DynStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub async fn submit(
        &self,
        principal: &Principal,
        req: SubmitMilestoneRequest,
    ) -> AppResult<Milestone> {
        principal.require_role(Role::Partner)?;

        if req.cost <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Milestone cost must be a positive amount".to_string(),
            ));
        }
        if req.title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }
        let project = self
            .store
            .find_project(req.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        if project.partner_id != principal.id {
            return Err(AppError::Forbidden(
                "This project is not assigned to you".to_string(),
            ));
        }

        let milestone = self
            .store
            .create_milestone(NewMilestone {
                project_id: req.project_id,
                partner_id: principal.id,
                title: req.title,
                description: req.description,
                cost: ledger::round_money(req.cost),
                duration_days: req.duration_days,
            })
            .await?;

        for admin in self.store.list_admins().await? {
            self.notifier.cost_proposed(
                &admin.email,
                &admin.name,
                &milestone.title,
                milestone.cost,
            );
        }
        Ok(milestone)
    }

    /// Approve a pending milestone and mint its invoice in one unit. The
    /// client is billed `client_cost` (+ GST when enabled); the spread over
    /// the partner cost is platform margin, realized at settlement.
    pub async fn approve(
        &self,
        principal: &Principal,
        milestone_id: Uuid,
        req: ApproveMilestoneRequest,
    ) -> AppResult<(Milestone, Invoice)> {
        principal.require_role(Role::Admin)?;

        if req.client_cost <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Client cost must be a positive amount".to_string(),
            ));
        }
        let milestone = self.get_raw(milestone_id).await?;
        let project = self
            .store
            .find_project(milestone.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        let client_cost = ledger::round_money(req.client_cost);
        let (gst_amount, total_amount) = ledger::split_gst(client_cost, req.includes_gst);
        let due_date = Utc::now() + Duration::days(INVOICE_DUE_DAYS);

        // Invoice numbers carry a random suffix; regenerate on collision
        // rather than silently swallowing the conflict.
        let mut last_err = None;
        for _ in 0..INVOICE_NUMBER_RETRIES {
            let invoice = NewInvoice {
                invoice_number: generate_invoice_number(),
                client_id: project.client_id,
                project_id: project.id,
                milestone_id: Some(milestone_id),
                amount: client_cost,
                gst_amount,
                total_amount,
                gst_enabled: req.includes_gst,
                due_date,
            };
            match self
                .store
                .approve_milestone(milestone_id, principal.id, client_cost, invoice)
                .await
            {
                Ok((milestone, invoice)) => {
                    if let Some(client) = self.store.find_client(invoice.client_id).await? {
                        self.notifier.invoice_issued(
                            &client.email,
                            &client.name,
                            &invoice.invoice_number,
                            invoice.total_amount,
                            &invoice.due_date.format("%Y-%m-%d").to_string(),
                        );
                    }
                    if let Some(partner) = self.store.find_partner(milestone.partner_id).await? {
                        self.notifier.milestone_decided(
                            &partner.email,
                            &partner.name,
                            &milestone.title,
                            true,
                            None,
                        );
                    }
                    info!(
                        "Milestone {} approved; invoice {} for {} issued",
                        milestone.id, invoice.invoice_number, invoice.total_amount
                    );
                    return Ok((milestone, invoice));
                }
                Err(AppError::DuplicateKey(msg)) => last_err = Some(AppError::DuplicateKey(msg)),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AppError::Internal("invoice number generation failed".to_string())
        }))
    }

    pub async fn reject(
        &self,
        principal: &Principal,
        milestone_id: Uuid,
        req: RejectMilestoneRequest,
    ) -> AppResult<Milestone> {
        principal.require_role(Role::Admin)?;

        let mut milestone = self.get_raw(milestone_id).await?;
        if milestone.status != MilestoneStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Milestone cannot be rejected from status {:?}",
                milestone.status
            )));
        }
        milestone.status = MilestoneStatus::Rejected;
        milestone.approved_by_admin_id = Some(principal.id);
        self.store.save_milestone(&milestone).await?;

        if let Some(partner) = self.store.find_partner(milestone.partner_id).await? {
            self.notifier.milestone_decided(
                &partner.email,
                &partner.name,
                &milestone.title,
                false,
                req.reason.as_deref(),
            );
        }
        Ok(milestone)
    }

    /// Partner progress updates. Frozen once the milestone (or its
    /// downstream invoice) has been paid.
    pub async fn update_status(
        &self,
        principal: &Principal,
        milestone_id: Uuid,
        status: MilestoneStatus,
    ) -> AppResult<Milestone> {
        principal.require_role(Role::Partner)?;

        if !partner_updatable(status) {
            return Err(AppError::Validation(
                "Partners may only move milestones to IN_PROGRESS or COMPLETED".to_string(),
            ));
        }
        let mut milestone = self.get_raw(milestone_id).await?;
        if milestone.partner_id != principal.id {
            return Err(AppError::Forbidden(
                "This milestone is not assigned to you".to_string(),
            ));
        }
        if !matches!(
            milestone.status,
            MilestoneStatus::Approved | MilestoneStatus::InProgress | MilestoneStatus::Completed
        ) {
            return Err(AppError::Conflict(format!(
                "Milestone cannot be progressed from status {:?}",
                milestone.status
            )));
        }
        if let Some(invoice) = self.store.find_invoice_by_milestone(milestone_id).await? {
            if invoice.status == InvoiceStatus::Paid {
                return Err(AppError::Conflict(
                    "Milestone is already invoiced and paid".to_string(),
                ));
            }
        }

        milestone.status = status;
        if status == MilestoneStatus::Completed && milestone.completed_at.is_none() {
            milestone.completed_at = Some(Utc::now());
        }
        self.store.save_milestone(&milestone).await?;
        Ok(milestone)
    }

    pub async fn delete(&self, principal: &Principal, milestone_id: Uuid) -> AppResult<()> {
        principal.require_role(Role::Admin)?;
        self.store.delete_milestone(milestone_id).await
    }

    // ─── Reads ────────────────────────────────────────────────────────────

    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<Milestone>> {
        match principal.role {
            Role::Admin => self.store.list_milestones().await,
            Role::Partner => self.store.list_milestones_by_partner(principal.id).await,
            Role::Client => self.store.list_milestones_by_client(principal.id).await,
        }
    }

    pub async fn list_for_project(
        &self,
        principal: &Principal,
        project_id: Uuid,
    ) -> AppResult<Vec<Milestone>> {
        let project = self
            .store
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Client => project.client_id == principal.id,
            Role::Partner => project.partner_id == principal.id,
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this project".to_string(),
            ));
        }
        self.store.list_milestones_by_project(project_id).await
    }

    pub async fn get(&self, principal: &Principal, milestone_id: Uuid) -> AppResult<Milestone> {
        let milestone = self.get_raw(milestone_id).await?;
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Partner => milestone.partner_id == principal.id,
            Role::Client => {
                let project = self.store.find_project(milestone.project_id).await?;
                project.map(|p| p.client_id == principal.id).unwrap_or(false)
            }
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this milestone".to_string(),
            ));
        }
        Ok(milestone)
    }

    async fn get_raw(&self, milestone_id: Uuid) -> AppResult<Milestone> {
        self.store
            .find_milestone(milestone_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Milestone not found".to_string()))
    }
}
