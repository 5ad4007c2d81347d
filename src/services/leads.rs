// src/services/leads.rs
//
// Lead negotiation workflow: intake, partner assignment, partner cost
// proposal, the admin-priced client offer, and the client's decision.
// Accepting an offer is the one cross-component boundary: it converts the
// lead into a project atomically through the store.

use rand::RngCore;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use crate::ledger;
use crate::models::{
    AssignPartnerRequest, Lead, LeadStatus, Project, ProposeCostRequest, Role, SendOfferRequest,
    SubmitLeadRequest, SubmitLeadResponse, UpdateLeadStatusRequest,
};
use crate::services::email::Notifier;
use crate::store::{DynStore, NewClient, NewLead, ProjectSeed, assignable};

#[derive(Clone)]
pub struct LeadService {
    store: DynStore,
    notifier: Notifier,
    frontend_url: String,
}

/// Opaque activation token for the set-password link.
fn activation_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn timeline_days(timeline: Option<&str>) -> i32 {
    timeline
        .and_then(|t| t.split_whitespace().next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

impl LeadService {
    pub fn new(store: DynStore, notifier: Notifier, frontend_url: String) -> Self {
        Self {
            store,
            notifier,
            frontend_url,
        }
    }

    /// Public intake. Creates the client account on first contact; an
    /// existing unverified account only gets its activation link re-sent,
    /// so repeated submissions cannot mint duplicates.
    pub async fn submit(&self, req: SubmitLeadRequest) -> AppResult<SubmitLeadResponse> {
        for (field, value) in [
            ("name", &req.name),
            ("email", &req.email),
            ("phone", &req.phone),
            ("project_category", &req.project_category),
            ("project_title", &req.project_title),
            ("description", &req.description),
            ("budget_range", &req.budget_range),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} is required", field)));
            }
        }

        let client = match self.store.find_client_by_email(&req.email).await? {
            Some(existing) if existing.is_email_verified && existing.is_active => existing,
            Some(existing) => {
                let token = activation_token();
                let expires = chrono::Utc::now() + chrono::Duration::hours(24);
                self.store
                    .refresh_client_verification(existing.id, &token, expires)
                    .await?;
                let link = format!("{}/set-password?token={}", self.frontend_url, token);
                self.notifier.account_setup(&existing.email, &existing.name, &link);
                return Ok(SubmitLeadResponse {
                    message: "An unverified account with this email exists. We've re-sent the account setup link."
                        .to_string(),
                    lead_id: None,
                });
            }
            None => {
                let token = activation_token();
                let expires = chrono::Utc::now() + chrono::Duration::hours(24);
                let client = self
                    .store
                    .create_client(NewClient {
                        name: req.name.clone(),
                        email: req.email.clone(),
                        phone: req.phone.clone(),
                        company_name: req.company_name.clone(),
                        verification_token: token.clone(),
                        verification_expires: expires,
                    })
                    .await?;
                let link = format!("{}/set-password?token={}", self.frontend_url, token);
                self.notifier.account_setup(&client.email, &client.name, &link);
                client
            }
        };

        let lead = self
            .store
            .create_lead(NewLead {
                name: req.name,
                email: req.email,
                phone: req.phone,
                company_name: req.company_name,
                project_category: req.project_category,
                project_title: req.project_title,
                description: req.description,
                key_features: req.key_features,
                budget_range: req.budget_range,
                timeline: req.timeline,
                client_id: client.id,
            })
            .await?;

        info!("Lead {} submitted by {}", lead.id, lead.email);
        Ok(SubmitLeadResponse {
            message: "Project quote submitted successfully. Check your email to complete your account setup."
                .to_string(),
            lead_id: Some(lead.id),
        })
    }

    pub async fn assign_partner(
        &self,
        principal: &Principal,
        lead_id: Uuid,
        req: AssignPartnerRequest,
    ) -> AppResult<Lead> {
        principal.require_role(Role::Admin)?;

        let mut lead = self.get_raw(lead_id).await?;
        if !assignable(lead.status) {
            return Err(AppError::Conflict(format!(
                "Cannot assign a partner to a lead in status {:?}",
                lead.status
            )));
        }
        let partner = self
            .store
            .find_partner(req.partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;

        lead.assigned_partner_id = Some(partner.id);
        lead.processed_by_admin_id = Some(principal.id);
        lead.status = LeadStatus::AssignedToPartner;
        self.store.save_lead(&lead).await?;

        self.notifier
            .lead_assigned(&partner.email, &partner.name, &lead.project_title);
        Ok(lead)
    }

    pub async fn propose_cost(
        &self,
        principal: &Principal,
        lead_id: Uuid,
        req: ProposeCostRequest,
    ) -> AppResult<Lead> {
        principal.require_role(Role::Partner)?;

        if req.proposed_cost <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Proposed cost must be a positive amount".to_string(),
            ));
        }
        if req.timeline.trim().is_empty() {
            return Err(AppError::Validation("Timeline is required".to_string()));
        }

        let mut lead = self.get_raw(lead_id).await?;
        if lead.assigned_partner_id != Some(principal.id) {
            return Err(AppError::Forbidden(
                "You are not assigned to this lead".to_string(),
            ));
        }
        // Re-proposal is fine until the offer goes out to the client.
        if !matches!(
            lead.status,
            LeadStatus::AssignedToPartner | LeadStatus::PartnerOfferProposed
        ) {
            return Err(AppError::Conflict(format!(
                "Cannot submit a cost proposal for a lead in status {:?}",
                lead.status
            )));
        }

        lead.partner_proposed_cost = Some(ledger::round_money(req.proposed_cost));
        lead.partner_notes = req.notes;
        lead.timeline = Some(req.timeline);
        lead.status = LeadStatus::PartnerOfferProposed;
        self.store.save_lead(&lead).await?;

        for admin in self.store.list_admins().await? {
            self.notifier.cost_proposed(
                &admin.email,
                &admin.name,
                &lead.project_title,
                lead.partner_proposed_cost.unwrap_or_default(),
            );
        }
        Ok(lead)
    }

    pub async fn send_offer(
        &self,
        principal: &Principal,
        lead_id: Uuid,
        req: SendOfferRequest,
    ) -> AppResult<Lead> {
        principal.require_role(Role::Admin)?;

        if req.admin_margin_pct < Decimal::ZERO {
            return Err(AppError::Validation(
                "Margin percentage cannot be negative".to_string(),
            ));
        }

        let mut lead = self.get_raw(lead_id).await?;
        let partner_cost = lead.partner_proposed_cost.ok_or_else(|| {
            AppError::Conflict("No partner cost proposal exists for this lead".to_string())
        })?;
        // Re-offering after a client rejection is allowed.
        if !matches!(
            lead.status,
            LeadStatus::PartnerOfferProposed | LeadStatus::OfferRejectedByClient
        ) {
            return Err(AppError::Conflict(format!(
                "Cannot send an offer for a lead in status {:?}",
                lead.status
            )));
        }

        let (admin_margin, offer_price) =
            ledger::compute_offer(partner_cost, req.admin_margin_pct, req.includes_gst);
        lead.admin_margin = Some(admin_margin);
        lead.offer_price = Some(offer_price);
        lead.includes_gst = req.includes_gst;
        lead.processed_by_admin_id = Some(principal.id);
        lead.status = LeadStatus::OfferSentToClient;
        self.store.save_lead(&lead).await?;

        if let Some(client) = self.store.find_client(lead.client_id).await? {
            self.notifier
                .offer_sent(&client.email, &client.name, &lead.project_title, offer_price);
        }
        info!(
            "Offer sent for lead {}: cost {} margin {} price {}",
            lead.id, partner_cost, admin_margin, offer_price
        );
        Ok(lead)
    }

    /// Accept the offer and convert the lead into a project. The project's
    /// money fields are copied verbatim from the negotiated offer.
    pub async fn accept_offer(
        &self,
        principal: &Principal,
        lead_id: Uuid,
    ) -> AppResult<(Lead, Project)> {
        principal.require_role(Role::Client)?;

        let lead = self.get_raw(lead_id).await?;
        if lead.client_id != principal.id {
            return Err(AppError::Forbidden(
                "This offer does not belong to you".to_string(),
            ));
        }
        let offer_price = lead
            .offer_price
            .ok_or_else(|| AppError::Conflict("Lead has no offer to accept".to_string()))?;
        let partner_cost = lead
            .partner_proposed_cost
            .ok_or_else(|| AppError::Conflict("Lead has no partner cost".to_string()))?;
        let admin_margin = lead.admin_margin.unwrap_or(offer_price - partner_cost);
        let partner_id = lead.assigned_partner_id.ok_or_else(|| {
            AppError::Conflict("Lead has no assigned partner".to_string())
        })?;
        let gst_amount = if lead.includes_gst {
            offer_price - (partner_cost + admin_margin)
        } else {
            Decimal::ZERO
        };

        let seed = ProjectSeed {
            title: lead.project_title.clone(),
            description: lead.description.clone(),
            category: lead.project_category.clone(),
            offer_price,
            partner_cost,
            admin_margin,
            gst_enabled: lead.includes_gst,
            gst_amount,
            timeline_days: timeline_days(lead.timeline.as_deref()),
            client_id: lead.client_id,
            partner_id,
            created_by_admin_id: lead.processed_by_admin_id,
        };

        let (lead, project) = self.store.convert_lead(lead_id, seed).await?;

        for admin in self.store.list_admins().await? {
            self.notifier
                .offer_decided(&admin.email, &admin.name, &lead.project_title, true);
        }
        info!("Lead {} converted into project {}", lead.id, project.id);
        Ok((lead, project))
    }

    pub async fn reject_offer(&self, principal: &Principal, lead_id: Uuid) -> AppResult<Lead> {
        principal.require_role(Role::Client)?;

        let mut lead = self.get_raw(lead_id).await?;
        if lead.client_id != principal.id {
            return Err(AppError::Forbidden(
                "This offer does not belong to you".to_string(),
            ));
        }
        if lead.status != LeadStatus::OfferSentToClient {
            return Err(AppError::Conflict(format!(
                "Cannot reject an offer for a lead in status {:?}",
                lead.status
            )));
        }

        lead.status = LeadStatus::OfferRejectedByClient;
        self.store.save_lead(&lead).await?;

        for admin in self.store.list_admins().await? {
            self.notifier
                .offer_decided(&admin.email, &admin.name, &lead.project_title, false);
        }
        Ok(lead)
    }

    /// Admin status override: only review intake and archival moves;
    /// everything else goes through the dedicated operations.
    pub async fn update_status(
        &self,
        principal: &Principal,
        lead_id: Uuid,
        req: UpdateLeadStatusRequest,
    ) -> AppResult<Lead> {
        principal.require_role(Role::Admin)?;

        let mut lead = self.get_raw(lead_id).await?;
        let allowed = matches!(
            (lead.status, req.status),
            (LeadStatus::Pending, LeadStatus::Reviewing)
        ) || (!lead.status.is_terminal() && req.status == LeadStatus::Archived);
        if !allowed {
            return Err(AppError::Conflict(format!(
                "Cannot move a lead from {:?} to {:?}",
                lead.status, req.status
            )));
        }

        lead.status = req.status;
        lead.processed_by_admin_id = Some(principal.id);
        self.store.save_lead(&lead).await?;
        Ok(lead)
    }

    pub async fn delete(&self, principal: &Principal, lead_id: Uuid) -> AppResult<()> {
        principal.require_role(Role::Admin)?;

        let lead = self.get_raw(lead_id).await?;
        if lead.project_id.is_some() {
            return Err(AppError::Conflict(
                "Converted leads cannot be deleted, only archived".to_string(),
            ));
        }
        self.store.delete_lead(lead_id).await
    }

    // ─── Reads ────────────────────────────────────────────────────────────

    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<Lead>> {
        match principal.role {
            Role::Admin => self.store.list_leads().await,
            Role::Client => self.store.list_leads_by_client(principal.id).await,
            Role::Partner => self.store.list_leads_by_partner(principal.id).await,
        }
    }

    pub async fn get(&self, principal: &Principal, lead_id: Uuid) -> AppResult<Lead> {
        let lead = self.get_raw(lead_id).await?;
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Client => lead.client_id == principal.id,
            Role::Partner => lead.assigned_partner_id == Some(principal.id),
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this lead".to_string(),
            ));
        }
        Ok(lead)
    }

    async fn get_raw(&self, lead_id: Uuid) -> AppResult<Lead> {
        self.store
            .find_lead(lead_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))
    }
}
