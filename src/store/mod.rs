// src/store/mod.rs
//
// Persistence seam. Workflow services never touch a database handle
// directly: they are constructed with an `Arc<dyn Store>` and every
// multi-entity mutation the workflows need is a single method here, so a
// backend can make it atomic (one SQL transaction in `PgStore`, one lock
// scope in `MemStore`).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{
    Admin, Client, GstReport, Invoice, Lead, LeadStatus, Milestone, MilestoneStatus, Partner,
    Payment, PaymentMethod, Project, Revenue, Withdrawal, WithdrawalStatus,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub type DynStore = Arc<dyn Store>;

// ─── Insert payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company_name: Option<String>,
    pub verification_token: String,
    pub verification_expires: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPartner {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewLead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company_name: Option<String>,
    pub project_category: String,
    pub project_title: String,
    pub description: String,
    pub key_features: Option<String>,
    pub budget_range: String,
    pub timeline: Option<String>,
    pub client_id: Uuid,
}

/// Financial snapshot used to instantiate a Project, either from an
/// accepted offer or from manual admin creation.
#[derive(Debug, Clone)]
pub struct ProjectSeed {
    pub title: String,
    pub description: String,
    pub category: String,
    pub offer_price: Decimal,
    pub partner_cost: Decimal,
    pub admin_margin: Decimal,
    pub gst_enabled: bool,
    pub gst_amount: Decimal,
    pub timeline_days: i32,
    pub client_id: Uuid,
    pub partner_id: Uuid,
    pub created_by_admin_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewMilestone {
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cost: Decimal,
    pub duration_days: i32,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub amount: Decimal,
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
    pub gst_enabled: bool,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
    pub method: PaymentMethod,
    pub gateway_ref: Option<String>,
}

// ─── Settlement results ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementSummary {
    pub invoice_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub partner_id: Option<Uuid>,
    pub partner_credit: Decimal,
    pub admin_profit: Decimal,
    pub gst_collected: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Second delivery for an already-completed payment: no-op.
    AlreadySettled,
    /// Payment completed but the invoice total is not yet covered.
    PartiallyPaid,
    /// Payment completed with no invoice to reconcile against.
    NoInvoice,
    /// Full settlement ran: invoice and milestone paid, partner credited,
    /// rollups incremented.
    Settled(SettlementSummary),
}

#[async_trait]
pub trait Store: Send + Sync {
    // ─── Principals ───────────────────────────────────────────────────────
    async fn find_admin(&self, id: Uuid) -> AppResult<Option<Admin>>;
    async fn find_admin_by_email(&self, email: &str) -> AppResult<Option<Admin>>;
    async fn list_admins(&self) -> AppResult<Vec<Admin>>;

    async fn create_client(&self, new: NewClient) -> AppResult<Client>;
    async fn find_client(&self, id: Uuid) -> AppResult<Option<Client>>;
    async fn find_client_by_email(&self, email: &str) -> AppResult<Option<Client>>;
    async fn find_client_by_verification_token(&self, token: &str) -> AppResult<Option<Client>>;
    /// Refresh the activation token of a not-yet-verified account.
    async fn refresh_client_verification(
        &self,
        client_id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AppResult<()>;
    /// Set the password and flip the account to active/verified.
    async fn activate_client(&self, client_id: Uuid, password_hash: &str) -> AppResult<Client>;

    async fn create_partner(&self, new: NewPartner) -> AppResult<Partner>;
    async fn find_partner(&self, id: Uuid) -> AppResult<Option<Partner>>;
    async fn find_partner_by_email(&self, email: &str) -> AppResult<Option<Partner>>;

    // ─── Leads ────────────────────────────────────────────────────────────
    async fn create_lead(&self, new: NewLead) -> AppResult<Lead>;
    async fn find_lead(&self, id: Uuid) -> AppResult<Option<Lead>>;
    async fn list_leads(&self) -> AppResult<Vec<Lead>>;
    async fn list_leads_by_client(&self, client_id: Uuid) -> AppResult<Vec<Lead>>;
    async fn list_leads_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Lead>>;
    /// Full-row update for single-entity transitions (assign, propose,
    /// send offer, reject, archive). Cross-entity transitions have their
    /// own atomic methods below.
    async fn save_lead(&self, lead: &Lead) -> AppResult<()>;
    async fn delete_lead(&self, id: Uuid) -> AppResult<()>;

    /// Accept-offer conversion: guarded on the lead still being in
    /// OFFER_SENT_TO_CLIENT, creates the project and links it to the lead
    /// as one unit. `Conflict` if the lead moved on; `DuplicateKey` if it
    /// already has a project.
    async fn convert_lead(&self, lead_id: Uuid, seed: ProjectSeed) -> AppResult<(Lead, Project)>;

    // ─── Projects ─────────────────────────────────────────────────────────
    /// Manual admin creation. When `lead_id` is given the lead is linked
    /// and marked converted in the same unit, subject to the one-project-
    /// per-lead constraint.
    async fn create_project(&self, seed: ProjectSeed, lead_id: Option<Uuid>)
    -> AppResult<Project>;
    async fn find_project(&self, id: Uuid) -> AppResult<Option<Project>>;
    async fn list_projects(&self) -> AppResult<Vec<Project>>;
    async fn list_projects_by_client(&self, client_id: Uuid) -> AppResult<Vec<Project>>;
    async fn list_projects_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Project>>;
    async fn save_project(&self, project: &Project) -> AppResult<()>;
    /// Idempotent-guarded completion: `Conflict` when already COMPLETED,
    /// otherwise flips the status and adds the admin margin to the given
    /// revenue month in the same unit.
    async fn complete_project(&self, id: Uuid, month: &str) -> AppResult<Project>;
    /// Unlinks the lead (back-reference nulled, status reverted) before the
    /// project row goes away. `Conflict` while milestones still reference it.
    async fn delete_project(&self, id: Uuid) -> AppResult<()>;

    // ─── Milestones ───────────────────────────────────────────────────────
    /// Appends with the next `order` value for the project.
    async fn create_milestone(&self, new: NewMilestone) -> AppResult<Milestone>;
    async fn find_milestone(&self, id: Uuid) -> AppResult<Option<Milestone>>;
    async fn list_milestones(&self) -> AppResult<Vec<Milestone>>;
    async fn list_milestones_by_project(&self, project_id: Uuid) -> AppResult<Vec<Milestone>>;
    async fn list_milestones_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Milestone>>;
    async fn list_milestones_by_client(&self, client_id: Uuid) -> AppResult<Vec<Milestone>>;
    async fn save_milestone(&self, milestone: &Milestone) -> AppResult<()>;
    /// Approval + invoice mint as one unit, guarded on the milestone still
    /// being PENDING. `DuplicateKey` when the invoice number collides (the
    /// caller regenerates and retries).
    async fn approve_milestone(
        &self,
        milestone_id: Uuid,
        admin_id: Uuid,
        client_cost: Decimal,
        invoice: NewInvoice,
    ) -> AppResult<(Milestone, Invoice)>;
    async fn delete_milestone(&self, id: Uuid) -> AppResult<()>;

    // ─── Invoices ─────────────────────────────────────────────────────────
    async fn create_invoice(&self, new: NewInvoice) -> AppResult<Invoice>;
    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>>;
    async fn find_invoice_by_milestone(&self, milestone_id: Uuid) -> AppResult<Option<Invoice>>;
    async fn list_invoices(&self) -> AppResult<Vec<Invoice>>;
    async fn list_invoices_by_client(&self, client_id: Uuid) -> AppResult<Vec<Invoice>>;
    async fn save_invoice(&self, invoice: &Invoice) -> AppResult<()>;
    /// `Conflict` while a completed payment references the invoice; the
    /// payment must be deleted (reversing its settlement) first.
    async fn delete_invoice(&self, id: Uuid) -> AppResult<()>;

    // ─── Payments & settlement ────────────────────────────────────────────
    async fn create_payment(&self, new: NewPayment) -> AppResult<Payment>;
    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>>;
    async fn list_payments(&self) -> AppResult<Vec<Payment>>;
    async fn list_payments_by_client(&self, client_id: Uuid) -> AppResult<Vec<Payment>>;
    /// The settlement unit. Completes the payment (status-guarded, so a
    /// duplicate webhook is a no-op) and, when completed payments cover the
    /// invoice total, marks invoice and milestone PAID, credits the partner
    /// with the milestone cost, and upserts the revenue/GST rollups — all
    /// or nothing.
    async fn settle_payment(
        &self,
        payment_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<SettlementOutcome>;
    /// Gateway failure path: PENDING → FAILED, no side effects. A late
    /// failure event for a completed payment is ignored.
    async fn fail_payment(&self, payment_id: Uuid) -> AppResult<Payment>;
    /// Administrative deletion. If the payment had settled, the settlement
    /// is reversed symmetrically (invoice back to SENT, milestone back to
    /// COMPLETED, partner debited); `Conflict` when the partner balance no
    /// longer covers the debit.
    async fn delete_payment(&self, payment_id: Uuid) -> AppResult<()>;

    // ─── Withdrawals ──────────────────────────────────────────────────────
    /// Creates the PENDING request and decrements the available balance as
    /// one conditional unit; `InsufficientBalance` when the hold cannot be
    /// taken.
    async fn request_withdrawal(
        &self,
        partner_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> AppResult<Withdrawal>;
    async fn find_withdrawal(&self, id: Uuid) -> AppResult<Option<Withdrawal>>;
    async fn list_withdrawals(&self) -> AppResult<Vec<Withdrawal>>;
    async fn list_withdrawals_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Withdrawal>>;
    /// `Conflict` once PAID/REJECTED. REJECTED restores the held amount.
    async fn process_withdrawal(
        &self,
        id: Uuid,
        new_status: WithdrawalStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Withdrawal>;
    /// Restores the held amount for PENDING/APPROVED requests, then deletes.
    async fn delete_withdrawal(&self, id: Uuid) -> AppResult<()>;

    // ─── Rollups (read-only outside settlement/completion) ────────────────
    async fn list_revenues(&self) -> AppResult<Vec<Revenue>>;
    async fn list_gst_reports(&self) -> AppResult<Vec<GstReport>>;
}

/// Partner-side milestone moves allowed by the workflow.
pub fn partner_updatable(status: MilestoneStatus) -> bool {
    matches!(
        status,
        MilestoneStatus::InProgress | MilestoneStatus::Completed
    )
}

/// Lead statuses from which an admin may still (re)assign a partner.
pub fn assignable(status: LeadStatus) -> bool {
    matches!(
        status,
        LeadStatus::Pending
            | LeadStatus::Reviewing
            | LeadStatus::AssignedToPartner
            | LeadStatus::PartnerOfferProposed
    )
}
