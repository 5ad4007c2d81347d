// src/store/memory.rs
//
// In-memory `Store` backend for the test suite. Every compound operation
// runs under one lock scope, mirroring the transaction boundaries of the
// Postgres backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    Admin, Client, GstReport, Invoice, InvoiceStatus, Lead, LeadStatus, Milestone,
    MilestoneStatus, Partner, Payment, PaymentStatus, Project, ProjectStatus, Revenue, Withdrawal,
    WithdrawalStatus,
};

use super::{
    NewClient, NewInvoice, NewLead, NewMilestone, NewPartner, NewPayment, ProjectSeed,
    SettlementOutcome, SettlementSummary, Store,
};

#[derive(Default)]
struct MemInner {
    admins: HashMap<Uuid, Admin>,
    clients: HashMap<Uuid, Client>,
    partners: HashMap<Uuid, Partner>,
    leads: HashMap<Uuid, Lead>,
    projects: HashMap<Uuid, Project>,
    milestones: HashMap<Uuid, Milestone>,
    invoices: HashMap<Uuid, Invoice>,
    payments: HashMap<Uuid, Payment>,
    withdrawals: HashMap<Uuid, Withdrawal>,
    revenues: HashMap<String, Revenue>,
    gst_reports: HashMap<String, GstReport>,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding helpers for tests.

    pub async fn seed_admin(&self, name: &str, email: &str) -> Admin {
        let now = Utc::now();
        let admin = Admin {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .admins
            .insert(admin.id, admin.clone());
        admin
    }

    pub async fn seed_client(&self, name: &str, email: &str) -> Client {
        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            phone: "0400000000".to_string(),
            company_name: None,
            password_hash: Some("hash".to_string()),
            is_active: true,
            is_email_verified: true,
            verification_token: None,
            verification_expires: None,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .clients
            .insert(client.id, client.clone());
        client
    }

    pub async fn seed_partner(&self, name: &str, email: &str, balance: Decimal) -> Partner {
        let now = Utc::now();
        let partner = Partner {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            is_active: true,
            total_earnings: balance,
            available_balance: balance,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .lock()
            .await
            .partners
            .insert(partner.id, partner.clone());
        partner
    }
}

fn upsert_revenue(inner: &mut MemInner, month: &str, amount: Decimal, now: DateTime<Utc>) {
    inner
        .revenues
        .entry(month.to_string())
        .and_modify(|r| {
            r.amount += amount;
            r.updated_at = now;
        })
        .or_insert_with(|| Revenue {
            id: Uuid::new_v4(),
            month: month.to_string(),
            amount,
            created_at: now,
            updated_at: now,
        });
}

fn upsert_gst(inner: &mut MemInner, period: &str, collected: Decimal, now: DateTime<Utc>) {
    inner
        .gst_reports
        .entry(period.to_string())
        .and_modify(|g| {
            g.gst_collected += collected;
            g.updated_at = now;
        })
        .or_insert_with(|| GstReport {
            id: Uuid::new_v4(),
            period: period.to_string(),
            gst_collected: collected,
            gst_paid: Decimal::ZERO,
            status: "PENDING".to_string(),
            due_date: now,
            created_at: now,
            updated_at: now,
        });
}

fn insert_project(inner: &mut MemInner, seed: ProjectSeed, lead_id: Option<Uuid>) -> Project {
    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        title: seed.title,
        description: seed.description,
        category: seed.category,
        status: ProjectStatus::Pending,
        offer_price: seed.offer_price,
        partner_cost: seed.partner_cost,
        admin_margin: seed.admin_margin,
        gst_enabled: seed.gst_enabled,
        gst_amount: seed.gst_amount,
        timeline_days: seed.timeline_days,
        client_id: seed.client_id,
        partner_id: seed.partner_id,
        created_by_admin_id: seed.created_by_admin_id,
        lead_id,
        created_at: now,
        updated_at: now,
    };
    inner.projects.insert(project.id, project.clone());
    project
}

#[async_trait]
impl Store for MemStore {
    // ─── Principals ───────────────────────────────────────────────────────

    async fn find_admin(&self, id: Uuid) -> AppResult<Option<Admin>> {
        Ok(self.inner.lock().await.admins.get(&id).cloned())
    }

    async fn find_admin_by_email(&self, email: &str) -> AppResult<Option<Admin>> {
        let inner = self.inner.lock().await;
        Ok(inner.admins.values().find(|a| a.email == email).cloned())
    }

    async fn list_admins(&self) -> AppResult<Vec<Admin>> {
        Ok(self.inner.lock().await.admins.values().cloned().collect())
    }

    async fn create_client(&self, new: NewClient) -> AppResult<Client> {
        let mut inner = self.inner.lock().await;
        if inner.clients.values().any(|c| c.email == new.email) {
            return Err(AppError::DuplicateKey(format!(
                "client email '{}' already exists",
                new.email
            )));
        }
        let now = Utc::now();
        let client = Client {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            company_name: new.company_name,
            password_hash: None,
            is_active: false,
            is_email_verified: false,
            verification_token: Some(new.verification_token),
            verification_expires: Some(new.verification_expires),
            created_at: now,
            updated_at: now,
        };
        inner.clients.insert(client.id, client.clone());
        Ok(client)
    }

    async fn find_client(&self, id: Uuid) -> AppResult<Option<Client>> {
        Ok(self.inner.lock().await.clients.get(&id).cloned())
    }

    async fn find_client_by_email(&self, email: &str) -> AppResult<Option<Client>> {
        let inner = self.inner.lock().await;
        Ok(inner.clients.values().find(|c| c.email == email).cloned())
    }

    async fn find_client_by_verification_token(&self, token: &str) -> AppResult<Option<Client>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .clients
            .values()
            .find(|c| c.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn refresh_client_verification(
        &self,
        client_id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let client = inner
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
        client.verification_token = Some(token.to_string());
        client.verification_expires = Some(expires);
        client.updated_at = Utc::now();
        Ok(())
    }

    async fn activate_client(&self, client_id: Uuid, password_hash: &str) -> AppResult<Client> {
        let mut inner = self.inner.lock().await;
        let client = inner
            .clients
            .get_mut(&client_id)
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
        client.password_hash = Some(password_hash.to_string());
        client.is_active = true;
        client.is_email_verified = true;
        client.verification_token = None;
        client.verification_expires = None;
        client.updated_at = Utc::now();
        Ok(client.clone())
    }

    async fn create_partner(&self, new: NewPartner) -> AppResult<Partner> {
        let mut inner = self.inner.lock().await;
        if inner.partners.values().any(|p| p.email == new.email) {
            return Err(AppError::DuplicateKey(format!(
                "partner email '{}' already exists",
                new.email
            )));
        }
        let now = Utc::now();
        let partner = Partner {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            is_active: true,
            total_earnings: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        inner.partners.insert(partner.id, partner.clone());
        Ok(partner)
    }

    async fn find_partner(&self, id: Uuid) -> AppResult<Option<Partner>> {
        Ok(self.inner.lock().await.partners.get(&id).cloned())
    }

    async fn find_partner_by_email(&self, email: &str) -> AppResult<Option<Partner>> {
        let inner = self.inner.lock().await;
        Ok(inner.partners.values().find(|p| p.email == email).cloned())
    }

    // ─── Leads ────────────────────────────────────────────────────────────

    async fn create_lead(&self, new: NewLead) -> AppResult<Lead> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let lead = Lead {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            phone: new.phone,
            company_name: new.company_name,
            project_category: new.project_category,
            project_title: new.project_title,
            description: new.description,
            key_features: new.key_features,
            budget_range: new.budget_range,
            timeline: new.timeline,
            status: LeadStatus::Pending,
            client_id: new.client_id,
            assigned_partner_id: None,
            processed_by_admin_id: None,
            partner_proposed_cost: None,
            partner_notes: None,
            admin_margin: None,
            offer_price: None,
            includes_gst: false,
            project_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.leads.insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn find_lead(&self, id: Uuid) -> AppResult<Option<Lead>> {
        Ok(self.inner.lock().await.leads.get(&id).cloned())
    }

    async fn list_leads(&self) -> AppResult<Vec<Lead>> {
        let inner = self.inner.lock().await;
        let mut leads: Vec<_> = inner.leads.values().cloned().collect();
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leads)
    }

    async fn list_leads_by_client(&self, client_id: Uuid) -> AppResult<Vec<Lead>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .leads
            .values()
            .filter(|l| l.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn list_leads_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Lead>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .leads
            .values()
            .filter(|l| l.assigned_partner_id == Some(partner_id))
            .cloned()
            .collect())
    }

    async fn save_lead(&self, lead: &Lead) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.leads.contains_key(&lead.id) {
            return Err(AppError::NotFound("Lead not found".to_string()));
        }
        let mut updated = lead.clone();
        updated.updated_at = Utc::now();
        inner.leads.insert(lead.id, updated);
        Ok(())
    }

    async fn delete_lead(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .leads
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))
    }

    async fn convert_lead(&self, lead_id: Uuid, seed: ProjectSeed) -> AppResult<(Lead, Project)> {
        let mut inner = self.inner.lock().await;
        let lead = inner
            .leads
            .get(&lead_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;
        if lead.project_id.is_some() {
            return Err(AppError::DuplicateKey(
                "Lead is already associated with a project".to_string(),
            ));
        }
        if lead.status != LeadStatus::OfferSentToClient {
            return Err(AppError::Conflict(format!(
                "Lead cannot be converted from status {:?}",
                lead.status
            )));
        }
        let project = insert_project(&mut inner, seed, Some(lead_id));
        let lead = inner.leads.get_mut(&lead_id).expect("checked above");
        lead.project_id = Some(project.id);
        lead.status = LeadStatus::AcceptedAndConverted;
        lead.updated_at = Utc::now();
        Ok((lead.clone(), project))
    }

    // ─── Projects ─────────────────────────────────────────────────────────

    async fn create_project(
        &self,
        seed: ProjectSeed,
        lead_id: Option<Uuid>,
    ) -> AppResult<Project> {
        let mut inner = self.inner.lock().await;
        if let Some(lid) = lead_id {
            let lead = inner
                .leads
                .get(&lid)
                .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;
            if lead.project_id.is_some()
                || inner.projects.values().any(|p| p.lead_id == Some(lid))
            {
                return Err(AppError::DuplicateKey(
                    "Lead is already associated with a project".to_string(),
                ));
            }
        }
        let project = insert_project(&mut inner, seed, lead_id);
        if let Some(lid) = lead_id {
            let lead = inner.leads.get_mut(&lid).expect("checked above");
            lead.project_id = Some(project.id);
            lead.status = LeadStatus::AcceptedAndConverted;
            lead.updated_at = Utc::now();
        }
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> AppResult<Option<Project>> {
        Ok(self.inner.lock().await.projects.get(&id).cloned())
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        let inner = self.inner.lock().await;
        let mut projects: Vec<_> = inner.projects.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn list_projects_by_client(&self, client_id: Uuid) -> AppResult<Vec<Project>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .projects
            .values()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn list_projects_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Project>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .projects
            .values()
            .filter(|p| p.partner_id == partner_id)
            .cloned()
            .collect())
    }

    async fn save_project(&self, project: &Project) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.projects.contains_key(&project.id) {
            return Err(AppError::NotFound("Project not found".to_string()));
        }
        let mut updated = project.clone();
        updated.updated_at = Utc::now();
        inner.projects.insert(project.id, updated);
        Ok(())
    }

    async fn complete_project(&self, id: Uuid, month: &str) -> AppResult<Project> {
        let mut inner = self.inner.lock().await;
        let project = inner
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        if project.status == ProjectStatus::Completed {
            return Err(AppError::Conflict(
                "Project is already marked as complete".to_string(),
            ));
        }
        let now = Utc::now();
        let margin = project.admin_margin;
        upsert_revenue(&mut inner, month, margin, now);
        let project = inner.projects.get_mut(&id).expect("checked above");
        project.status = ProjectStatus::Completed;
        project.updated_at = now;
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let project = inner
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        if inner.milestones.values().any(|m| m.project_id == id) {
            return Err(AppError::Conflict(
                "Cannot delete project with existing milestones".to_string(),
            ));
        }
        if let Some(lid) = project.lead_id {
            if let Some(lead) = inner.leads.get_mut(&lid) {
                lead.project_id = None;
                lead.status = LeadStatus::OfferRejectedByClient;
                lead.updated_at = Utc::now();
            }
        }
        inner.projects.remove(&id);
        Ok(())
    }

    // ─── Milestones ───────────────────────────────────────────────────────

    async fn create_milestone(&self, new: NewMilestone) -> AppResult<Milestone> {
        let mut inner = self.inner.lock().await;
        let next_order = inner
            .milestones
            .values()
            .filter(|m| m.project_id == new.project_id)
            .map(|m| m.order)
            .max()
            .unwrap_or(0)
            + 1;
        let now = Utc::now();
        let milestone = Milestone {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            partner_id: new.partner_id,
            title: new.title,
            description: new.description,
            cost: new.cost,
            client_cost: None,
            status: MilestoneStatus::Pending,
            order: next_order,
            duration_days: new.duration_days,
            approved_by_admin_id: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.milestones.insert(milestone.id, milestone.clone());
        Ok(milestone)
    }

    async fn find_milestone(&self, id: Uuid) -> AppResult<Option<Milestone>> {
        Ok(self.inner.lock().await.milestones.get(&id).cloned())
    }

    async fn list_milestones(&self) -> AppResult<Vec<Milestone>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner.milestones.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_milestones_by_project(&self, project_id: Uuid) -> AppResult<Vec<Milestone>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner
            .milestones
            .values()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect();
        list.sort_by_key(|m| m.order);
        Ok(list)
    }

    async fn list_milestones_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Milestone>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner
            .milestones
            .values()
            .filter(|m| m.partner_id == partner_id)
            .cloned()
            .collect();
        list.sort_by_key(|m| m.order);
        Ok(list)
    }

    async fn list_milestones_by_client(&self, client_id: Uuid) -> AppResult<Vec<Milestone>> {
        let inner = self.inner.lock().await;
        let project_ids: Vec<Uuid> = inner
            .projects
            .values()
            .filter(|p| p.client_id == client_id)
            .map(|p| p.id)
            .collect();
        let mut list: Vec<_> = inner
            .milestones
            .values()
            .filter(|m| project_ids.contains(&m.project_id))
            .cloned()
            .collect();
        list.sort_by_key(|m| m.order);
        Ok(list)
    }

    async fn save_milestone(&self, milestone: &Milestone) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.milestones.contains_key(&milestone.id) {
            return Err(AppError::NotFound("Milestone not found".to_string()));
        }
        let mut updated = milestone.clone();
        updated.updated_at = Utc::now();
        inner.milestones.insert(milestone.id, updated);
        Ok(())
    }

    async fn approve_milestone(
        &self,
        milestone_id: Uuid,
        admin_id: Uuid,
        client_cost: Decimal,
        invoice: NewInvoice,
    ) -> AppResult<(Milestone, Invoice)> {
        let mut inner = self.inner.lock().await;
        let milestone = inner
            .milestones
            .get(&milestone_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Milestone not found".to_string()))?;
        if milestone.status != MilestoneStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Milestone cannot be approved from status {:?}",
                milestone.status
            )));
        }
        if inner
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::DuplicateKey(format!(
                "invoice number '{}' already exists",
                invoice.invoice_number
            )));
        }
        let now = Utc::now();
        let inv = Invoice {
            id: Uuid::new_v4(),
            invoice_number: invoice.invoice_number,
            client_id: invoice.client_id,
            project_id: invoice.project_id,
            milestone_id: invoice.milestone_id,
            amount: invoice.amount,
            gst_amount: invoice.gst_amount,
            total_amount: invoice.total_amount,
            gst_enabled: invoice.gst_enabled,
            status: InvoiceStatus::Sent,
            due_date: invoice.due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.invoices.insert(inv.id, inv.clone());
        let milestone = inner.milestones.get_mut(&milestone_id).expect("checked");
        milestone.status = MilestoneStatus::Approved;
        milestone.approved_by_admin_id = Some(admin_id);
        milestone.client_cost = Some(client_cost);
        milestone.updated_at = now;
        Ok((milestone.clone(), inv))
    }

    async fn delete_milestone(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.milestones.contains_key(&id) {
            return Err(AppError::NotFound("Milestone not found".to_string()));
        }
        if inner.invoices.values().any(|i| i.milestone_id == Some(id))
            || inner.payments.values().any(|p| p.milestone_id == Some(id))
        {
            return Err(AppError::Conflict(
                "Cannot delete milestone with existing invoices or payments".to_string(),
            ));
        }
        inner.milestones.remove(&id);
        Ok(())
    }

    // ─── Invoices ─────────────────────────────────────────────────────────

    async fn create_invoice(&self, new: NewInvoice) -> AppResult<Invoice> {
        let mut inner = self.inner.lock().await;
        if inner
            .invoices
            .values()
            .any(|i| i.invoice_number == new.invoice_number)
        {
            return Err(AppError::DuplicateKey(format!(
                "invoice number '{}' already exists",
                new.invoice_number
            )));
        }
        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            invoice_number: new.invoice_number,
            client_id: new.client_id,
            project_id: new.project_id,
            milestone_id: new.milestone_id,
            amount: new.amount,
            gst_amount: new.gst_amount,
            total_amount: new.total_amount,
            gst_enabled: new.gst_enabled,
            status: InvoiceStatus::Sent,
            due_date: new.due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self.inner.lock().await.invoices.get(&id).cloned())
    }

    async fn find_invoice_by_milestone(&self, milestone_id: Uuid) -> AppResult<Option<Invoice>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .invoices
            .values()
            .find(|i| i.milestone_id == Some(milestone_id))
            .cloned())
    }

    async fn list_invoices(&self) -> AppResult<Vec<Invoice>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner.invoices.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_invoices_by_client(&self, client_id: Uuid) -> AppResult<Vec<Invoice>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .invoices
            .values()
            .filter(|i| i.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn save_invoice(&self, invoice: &Invoice) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.invoices.contains_key(&invoice.id) {
            return Err(AppError::NotFound("Invoice not found".to_string()));
        }
        let mut updated = invoice.clone();
        updated.updated_at = Utc::now();
        inner.invoices.insert(invoice.id, updated);
        Ok(())
    }

    async fn delete_invoice(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.invoices.contains_key(&id) {
            return Err(AppError::NotFound("Invoice not found".to_string()));
        }
        if inner.payments.values().any(|p| p.invoice_id == Some(id)) {
            return Err(AppError::Conflict(
                "Cannot delete invoice with recorded payments; delete the payments first"
                    .to_string(),
            ));
        }
        inner.invoices.remove(&id);
        Ok(())
    }

    // ─── Payments & settlement ────────────────────────────────────────────

    async fn create_payment(&self, new: NewPayment) -> AppResult<Payment> {
        let mut inner = self.inner.lock().await;
        if let Some(ref gref) = new.gateway_ref {
            if inner
                .payments
                .values()
                .any(|p| p.gateway_ref.as_deref() == Some(gref))
            {
                return Err(AppError::DuplicateKey(format!(
                    "gateway reference '{}' already exists",
                    gref
                )));
            }
        }
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            client_id: new.client_id,
            project_id: new.project_id,
            milestone_id: new.milestone_id,
            invoice_id: new.invoice_id,
            amount: new.amount,
            gst_amount: new.gst_amount,
            total_amount: new.total_amount,
            method: new.method,
            status: PaymentStatus::Pending,
            gateway_ref: new.gateway_ref,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.inner.lock().await.payments.get(&id).cloned())
    }

    async fn list_payments(&self) -> AppResult<Vec<Payment>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner.payments.values().cloned().collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn list_payments_by_client(&self, client_id: Uuid) -> AppResult<Vec<Payment>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn settle_payment(
        &self,
        payment_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<SettlementOutcome> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        // Idempotency guard: a duplicate confirmation is a no-op.
        match payment.status {
            PaymentStatus::Completed => return Ok(SettlementOutcome::AlreadySettled),
            PaymentStatus::Pending => {}
            other => {
                return Err(AppError::Conflict(format!(
                    "Payment cannot be settled from status {:?}",
                    other
                )));
            }
        }

        {
            let p = inner.payments.get_mut(&payment_id).expect("checked above");
            p.status = PaymentStatus::Completed;
            p.paid_at = Some(now);
            p.updated_at = now;
        }

        // Resolve the invoice either directly or through the milestone.
        let invoice = payment
            .invoice_id
            .and_then(|iid| inner.invoices.get(&iid).cloned())
            .or_else(|| {
                payment.milestone_id.and_then(|mid| {
                    inner
                        .invoices
                        .values()
                        .find(|i| i.milestone_id == Some(mid))
                        .cloned()
                })
            });

        let Some(invoice) = invoice else {
            return Ok(SettlementOutcome::NoInvoice);
        };

        let covered: Decimal = inner
            .payments
            .values()
            .filter(|p| {
                p.status == PaymentStatus::Completed
                    && (p.invoice_id == Some(invoice.id)
                        || (p.invoice_id.is_none()
                            && invoice.milestone_id.is_some()
                            && p.milestone_id == invoice.milestone_id))
            })
            .map(|p| p.total_amount)
            .sum();

        if covered < invoice.total_amount {
            return Ok(SettlementOutcome::PartiallyPaid);
        }
        if invoice.status == InvoiceStatus::Paid {
            // Another payment already closed the invoice out.
            return Ok(SettlementOutcome::AlreadySettled);
        }

        {
            let inv = inner.invoices.get_mut(&invoice.id).expect("loaded above");
            inv.status = InvoiceStatus::Paid;
            inv.paid_at = Some(now);
            inv.updated_at = now;
        }

        let mut summary = SettlementSummary {
            invoice_id: invoice.id,
            milestone_id: invoice.milestone_id,
            partner_id: None,
            partner_credit: Decimal::ZERO,
            admin_profit: Decimal::ZERO,
            gst_collected: invoice.gst_amount,
        };

        if let Some(mid) = invoice.milestone_id {
            if let Some(milestone) = inner.milestones.get(&mid).cloned() {
                let credit = milestone.cost;
                let client_cost = milestone.client_cost.unwrap_or(invoice.amount);
                let profit = client_cost - milestone.cost;

                let m = inner.milestones.get_mut(&mid).expect("loaded above");
                m.status = MilestoneStatus::Paid;
                m.completed_at = Some(now);
                m.updated_at = now;

                if let Some(p) = inner.partners.get_mut(&milestone.partner_id) {
                    p.total_earnings += credit;
                    p.available_balance += credit;
                    p.updated_at = now;
                }

                upsert_revenue(&mut inner, &crate::ledger::revenue_month(now), profit, now);

                summary.partner_id = Some(milestone.partner_id);
                summary.partner_credit = credit;
                summary.admin_profit = profit;
            }
        }

        if invoice.gst_amount > Decimal::ZERO {
            upsert_gst(
                &mut inner,
                &crate::ledger::gst_period(now),
                invoice.gst_amount,
                now,
            );
        }

        Ok(SettlementOutcome::Settled(summary))
    }

    async fn fail_payment(&self, payment_id: Uuid) -> AppResult<Payment> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        // A late failure event after completion is ignored.
        if payment.status == PaymentStatus::Pending {
            payment.status = PaymentStatus::Failed;
            payment.updated_at = Utc::now();
        }
        Ok(payment.clone())
    }

    async fn delete_payment(&self, payment_id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let payment = inner
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status == PaymentStatus::Completed {
            let invoice = payment
                .invoice_id
                .and_then(|iid| inner.invoices.get(&iid).cloned())
                .or_else(|| {
                    payment.milestone_id.and_then(|mid| {
                        inner
                            .invoices
                            .values()
                            .find(|i| i.milestone_id == Some(mid))
                            .cloned()
                    })
                });

            if let Some(invoice) = invoice {
                if invoice.status == InvoiceStatus::Paid {
                    let now = Utc::now();
                    // Debit the partner before touching any status so a
                    // shortfall aborts the whole reversal.
                    if let Some(mid) = invoice.milestone_id {
                        if let Some(milestone) = inner.milestones.get(&mid).cloned() {
                            let credit = milestone.cost;
                            let partner = inner
                                .partners
                                .get_mut(&milestone.partner_id)
                                .ok_or_else(|| {
                                    AppError::NotFound("Partner not found".to_string())
                                })?;
                            if partner.available_balance < credit {
                                return Err(AppError::Conflict(
                                    "Cannot reverse settlement: partner balance no longer covers the credit"
                                        .to_string(),
                                ));
                            }
                            partner.available_balance -= credit;
                            partner.total_earnings -= credit;
                            partner.updated_at = now;

                            let m = inner.milestones.get_mut(&mid).expect("loaded above");
                            m.status = MilestoneStatus::Completed;
                            m.updated_at = now;
                        }
                    }
                    let inv = inner.invoices.get_mut(&invoice.id).expect("loaded above");
                    inv.status = InvoiceStatus::Sent;
                    inv.paid_at = None;
                    inv.updated_at = now;
                }
            }
        }

        inner.payments.remove(&payment_id);
        Ok(())
    }

    // ─── Withdrawals ──────────────────────────────────────────────────────

    async fn request_withdrawal(
        &self,
        partner_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> AppResult<Withdrawal> {
        let mut inner = self.inner.lock().await;
        let partner = inner
            .partners
            .get_mut(&partner_id)
            .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;
        if partner.available_balance < amount {
            return Err(AppError::InsufficientBalance {
                available: partner.available_balance,
                required: amount,
            });
        }
        let now = Utc::now();
        partner.available_balance -= amount;
        partner.updated_at = now;
        let withdrawal = Withdrawal {
            id: Uuid::new_v4(),
            partner_id,
            amount,
            status: WithdrawalStatus::Pending,
            note,
            requested_at: now,
            processed_at: None,
        };
        inner.withdrawals.insert(withdrawal.id, withdrawal.clone());
        Ok(withdrawal)
    }

    async fn find_withdrawal(&self, id: Uuid) -> AppResult<Option<Withdrawal>> {
        Ok(self.inner.lock().await.withdrawals.get(&id).cloned())
    }

    async fn list_withdrawals(&self) -> AppResult<Vec<Withdrawal>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner.withdrawals.values().cloned().collect();
        list.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(list)
    }

    async fn list_withdrawals_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .withdrawals
            .values()
            .filter(|w| w.partner_id == partner_id)
            .cloned()
            .collect())
    }

    async fn process_withdrawal(
        &self,
        id: Uuid,
        new_status: WithdrawalStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Withdrawal> {
        let mut inner = self.inner.lock().await;
        let withdrawal = inner
            .withdrawals
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Withdrawal not found".to_string()))?;
        if matches!(
            withdrawal.status,
            WithdrawalStatus::Paid | WithdrawalStatus::Rejected
        ) {
            return Err(AppError::Conflict(format!(
                "Withdrawal is already {:?} and cannot be processed further",
                withdrawal.status
            )));
        }
        if new_status == WithdrawalStatus::Rejected {
            let partner = inner
                .partners
                .get_mut(&withdrawal.partner_id)
                .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;
            partner.available_balance += withdrawal.amount;
            partner.updated_at = now;
        }
        let w = inner.withdrawals.get_mut(&id).expect("checked above");
        w.status = new_status;
        if note.is_some() {
            w.note = note;
        }
        w.processed_at = Some(now);
        Ok(w.clone())
    }

    async fn delete_withdrawal(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        let withdrawal = inner
            .withdrawals
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Withdrawal not found".to_string()))?;
        if matches!(
            withdrawal.status,
            WithdrawalStatus::Pending | WithdrawalStatus::Approved
        ) {
            if let Some(partner) = inner.partners.get_mut(&withdrawal.partner_id) {
                partner.available_balance += withdrawal.amount;
                partner.updated_at = Utc::now();
            }
        }
        inner.withdrawals.remove(&id);
        Ok(())
    }

    // ─── Rollups ──────────────────────────────────────────────────────────

    async fn list_revenues(&self) -> AppResult<Vec<Revenue>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner.revenues.values().cloned().collect();
        list.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(list)
    }

    async fn list_gst_reports(&self) -> AppResult<Vec<GstReport>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<_> = inner.gst_reports.values().cloned().collect();
        list.sort_by(|a, b| a.period.cmp(&b.period));
        Ok(list)
    }
}
