// src/store/postgres.rs
//
// Postgres `Store` backend. Compound operations run inside a single
// transaction with row locks (`FOR UPDATE`) or conditional updates, so
// concurrent settlement of one payment or concurrent withdrawal requests
// against one partner balance serialize instead of interleaving.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
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

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_unique(e: sqlx::Error, what: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::DuplicateKey(what.to_string())
        }
        _ => AppError::Database(e),
    }
}

async fn upsert_revenue(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    month: &str,
    amount: Decimal,
    now: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"INSERT INTO revenues (id, month, amount, created_at, updated_at)
           VALUES ($1, $2, $3, $4, $4)
           ON CONFLICT (month) DO UPDATE
           SET amount = revenues.amount + EXCLUDED.amount,
               updated_at = EXCLUDED.updated_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(month)
    .bind(amount)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn upsert_gst(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    period: &str,
    collected: Decimal,
    now: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"INSERT INTO gst_reports (id, period, gst_collected, gst_paid, status, due_date, created_at, updated_at)
           VALUES ($1, $2, $3, 0, 'PENDING', $4, $4, $4)
           ON CONFLICT (period) DO UPDATE
           SET gst_collected = gst_reports.gst_collected + EXCLUDED.gst_collected,
               updated_at = EXCLUDED.updated_at"#,
    )
    .bind(Uuid::new_v4())
    .bind(period)
    .bind(collected)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_project(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    seed: &ProjectSeed,
    lead_id: Option<Uuid>,
) -> AppResult<Project> {
    sqlx::query_as::<_, Project>(
        r#"INSERT INTO projects (
               id, title, description, category, status,
               offer_price, partner_cost, admin_margin, gst_enabled, gst_amount,
               timeline_days, client_id, partner_id, created_by_admin_id, lead_id
           ) VALUES ($1,$2,$3,$4,'pending',$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
           RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(&seed.title)
    .bind(&seed.description)
    .bind(&seed.category)
    .bind(seed.offer_price)
    .bind(seed.partner_cost)
    .bind(seed.admin_margin)
    .bind(seed.gst_enabled)
    .bind(seed.gst_amount)
    .bind(seed.timeline_days)
    .bind(seed.client_id)
    .bind(seed.partner_id)
    .bind(seed.created_by_admin_id)
    .bind(lead_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_unique(e, "lead is already associated with a project"))
}

async fn insert_invoice(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    new: &NewInvoice,
) -> AppResult<Invoice> {
    sqlx::query_as::<_, Invoice>(
        r#"INSERT INTO invoices (
               id, invoice_number, client_id, project_id, milestone_id,
               amount, gst_amount, total_amount, gst_enabled, status, due_date
           ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,'sent',$10)
           RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(&new.invoice_number)
    .bind(new.client_id)
    .bind(new.project_id)
    .bind(new.milestone_id)
    .bind(new.amount)
    .bind(new.gst_amount)
    .bind(new.total_amount)
    .bind(new.gst_enabled)
    .bind(new.due_date)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_unique(e, "invoice number already exists"))
}

#[async_trait]
impl Store for PgStore {
    // ─── Principals ───────────────────────────────────────────────────────

    async fn find_admin(&self, id: Uuid) -> AppResult<Option<Admin>> {
        Ok(sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_admin_by_email(&self, email: &str) -> AppResult<Option<Admin>> {
        Ok(
            sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_admins(&self) -> AppResult<Vec<Admin>> {
        Ok(
            sqlx::query_as::<_, Admin>("SELECT * FROM admins ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn create_client(&self, new: NewClient) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"INSERT INTO clients (
                   id, name, email, phone, company_name,
                   is_active, is_email_verified, verification_token, verification_expires
               ) VALUES ($1,$2,$3,$4,$5,FALSE,FALSE,$6,$7)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.company_name)
        .bind(&new.verification_token)
        .bind(new.verification_expires)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "client email already exists"))
    }

    async fn find_client(&self, id: Uuid) -> AppResult<Option<Client>> {
        Ok(
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_client_by_email(&self, email: &str) -> AppResult<Option<Client>> {
        Ok(
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_client_by_verification_token(&self, token: &str) -> AppResult<Option<Client>> {
        Ok(
            sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE verification_token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn refresh_client_verification(
        &self,
        client_id: Uuid,
        token: &str,
        expires: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE clients
               SET verification_token = $2, verification_expires = $3, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(client_id)
        .bind(token)
        .bind(expires)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Client not found".to_string()));
        }
        Ok(())
    }

    async fn activate_client(&self, client_id: Uuid, password_hash: &str) -> AppResult<Client> {
        sqlx::query_as::<_, Client>(
            r#"UPDATE clients
               SET password_hash = $2,
                   is_active = TRUE,
                   is_email_verified = TRUE,
                   verification_token = NULL,
                   verification_expires = NULL,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(client_id)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
    }

    async fn create_partner(&self, new: NewPartner) -> AppResult<Partner> {
        sqlx::query_as::<_, Partner>(
            r#"INSERT INTO partners (id, name, email, password_hash)
               VALUES ($1, $2, $3, $4)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "partner email already exists"))
    }

    async fn find_partner(&self, id: Uuid) -> AppResult<Option<Partner>> {
        Ok(
            sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_partner_by_email(&self, email: &str) -> AppResult<Option<Partner>> {
        Ok(
            sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    // ─── Leads ────────────────────────────────────────────────────────────

    async fn create_lead(&self, new: NewLead) -> AppResult<Lead> {
        Ok(sqlx::query_as::<_, Lead>(
            r#"INSERT INTO leads (
                   id, name, email, phone, company_name,
                   project_category, project_title, description, key_features,
                   budget_range, timeline, status, client_id
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,'pending',$12)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.company_name)
        .bind(&new.project_category)
        .bind(&new.project_title)
        .bind(&new.description)
        .bind(&new.key_features)
        .bind(&new.budget_range)
        .bind(&new.timeline)
        .bind(new.client_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_lead(&self, id: Uuid) -> AppResult<Option<Lead>> {
        Ok(sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_leads(&self) -> AppResult<Vec<Lead>> {
        Ok(
            sqlx::query_as::<_, Lead>("SELECT * FROM leads ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_leads_by_client(&self, client_id: Uuid) -> AppResult<Vec<Lead>> {
        Ok(sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE client_id = $1 ORDER BY created_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_leads_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Lead>> {
        Ok(sqlx::query_as::<_, Lead>(
            "SELECT * FROM leads WHERE assigned_partner_id = $1 ORDER BY created_at DESC",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_lead(&self, lead: &Lead) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE leads SET
                   name = $2, email = $3, phone = $4, company_name = $5,
                   project_category = $6, project_title = $7, description = $8,
                   key_features = $9, budget_range = $10, timeline = $11,
                   status = $12, assigned_partner_id = $13, processed_by_admin_id = $14,
                   partner_proposed_cost = $15, partner_notes = $16,
                   admin_margin = $17, offer_price = $18, includes_gst = $19,
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(lead.id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.company_name)
        .bind(&lead.project_category)
        .bind(&lead.project_title)
        .bind(&lead.description)
        .bind(&lead.key_features)
        .bind(&lead.budget_range)
        .bind(&lead.timeline)
        .bind(lead.status)
        .bind(lead.assigned_partner_id)
        .bind(lead.processed_by_admin_id)
        .bind(lead.partner_proposed_cost)
        .bind(&lead.partner_notes)
        .bind(lead.admin_margin)
        .bind(lead.offer_price)
        .bind(lead.includes_gst)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Lead not found".to_string()));
        }
        Ok(())
    }

    async fn delete_lead(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Lead not found".to_string()));
        }
        Ok(())
    }

    async fn convert_lead(&self, lead_id: Uuid, seed: ProjectSeed) -> AppResult<(Lead, Project)> {
        let mut tx = self.pool.begin().await?;

        let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 FOR UPDATE")
            .bind(lead_id)
            .fetch_optional(&mut *tx)
            .await?
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

        let project = insert_project(&mut tx, &seed, Some(lead_id)).await?;

        let lead = sqlx::query_as::<_, Lead>(
            r#"UPDATE leads
               SET project_id = $2, status = 'accepted_and_converted', updated_at = NOW()
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(lead_id)
        .bind(project.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((lead, project))
    }

    // ─── Projects ─────────────────────────────────────────────────────────

    async fn create_project(
        &self,
        seed: ProjectSeed,
        lead_id: Option<Uuid>,
    ) -> AppResult<Project> {
        let mut tx = self.pool.begin().await?;

        if let Some(lid) = lead_id {
            let lead = sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1 FOR UPDATE")
                .bind(lid)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Lead not found".to_string()))?;
            if lead.project_id.is_some() {
                return Err(AppError::DuplicateKey(
                    "Lead is already associated with a project".to_string(),
                ));
            }
        }

        let project = insert_project(&mut tx, &seed, lead_id).await?;

        if let Some(lid) = lead_id {
            sqlx::query(
                r#"UPDATE leads
                   SET project_id = $2, status = 'accepted_and_converted', updated_at = NOW()
                   WHERE id = $1"#,
            )
            .bind(lid)
            .bind(project.id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(project)
    }

    async fn find_project(&self, id: Uuid) -> AppResult<Option<Project>> {
        Ok(
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_projects(&self) -> AppResult<Vec<Project>> {
        Ok(
            sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_projects_by_client(&self, client_id: Uuid) -> AppResult<Vec<Project>> {
        Ok(sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE client_id = $1 ORDER BY created_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_projects_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Project>> {
        Ok(sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE partner_id = $1 ORDER BY created_at DESC",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_project(&self, project: &Project) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE projects SET
                   title = $2, description = $3, category = $4, status = $5,
                   offer_price = $6, partner_cost = $7, admin_margin = $8,
                   gst_enabled = $9, gst_amount = $10, timeline_days = $11,
                   updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(project.id)
        .bind(&project.title)
        .bind(&project.description)
        .bind(&project.category)
        .bind(project.status)
        .bind(project.offer_price)
        .bind(project.partner_cost)
        .bind(project.admin_margin)
        .bind(project.gst_enabled)
        .bind(project.gst_amount)
        .bind(project.timeline_days)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Project not found".to_string()));
        }
        Ok(())
    }

    async fn complete_project(&self, id: Uuid, month: &str) -> AppResult<Project> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let project =
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
        if project.status == ProjectStatus::Completed {
            return Err(AppError::Conflict(
                "Project is already marked as complete".to_string(),
            ));
        }

        let project = sqlx::query_as::<_, Project>(
            "UPDATE projects SET status = 'completed', updated_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        upsert_revenue(&mut tx, month, project.admin_margin, now).await?;

        tx.commit().await?;
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let project =
            sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        let milestone_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM milestones WHERE project_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await?;
        if milestone_count > 0 {
            return Err(AppError::Conflict(
                "Cannot delete project with existing milestones".to_string(),
            ));
        }

        // Break the lead back-reference before the project row goes away.
        if let Some(lid) = project.lead_id {
            sqlx::query(
                r#"UPDATE leads
                   SET project_id = NULL, status = 'offer_rejected_by_client', updated_at = NOW()
                   WHERE id = $1"#,
            )
            .bind(lid)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ─── Milestones ───────────────────────────────────────────────────────

    async fn create_milestone(&self, new: NewMilestone) -> AppResult<Milestone> {
        let mut tx = self.pool.begin().await?;

        let next_order: i32 = sqlx::query_scalar(
            r#"SELECT COALESCE(MAX("order"), 0) + 1 FROM milestones WHERE project_id = $1"#,
        )
        .bind(new.project_id)
        .fetch_one(&mut *tx)
        .await?;

        let milestone = sqlx::query_as::<_, Milestone>(
            r#"INSERT INTO milestones (
                   id, project_id, partner_id, title, description,
                   cost, status, "order", duration_days
               ) VALUES ($1,$2,$3,$4,$5,$6,'pending',$7,$8)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(new.project_id)
        .bind(new.partner_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.cost)
        .bind(next_order)
        .bind(new.duration_days)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(milestone)
    }

    async fn find_milestone(&self, id: Uuid) -> AppResult<Option<Milestone>> {
        Ok(
            sqlx::query_as::<_, Milestone>("SELECT * FROM milestones WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_milestones(&self) -> AppResult<Vec<Milestone>> {
        Ok(
            sqlx::query_as::<_, Milestone>("SELECT * FROM milestones ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_milestones_by_project(&self, project_id: Uuid) -> AppResult<Vec<Milestone>> {
        Ok(sqlx::query_as::<_, Milestone>(
            r#"SELECT * FROM milestones WHERE project_id = $1 ORDER BY "order" ASC"#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_milestones_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Milestone>> {
        Ok(sqlx::query_as::<_, Milestone>(
            r#"SELECT * FROM milestones WHERE partner_id = $1 ORDER BY "order" ASC"#,
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_milestones_by_client(&self, client_id: Uuid) -> AppResult<Vec<Milestone>> {
        Ok(sqlx::query_as::<_, Milestone>(
            r#"SELECT m.* FROM milestones m
               JOIN projects p ON p.id = m.project_id
               WHERE p.client_id = $1
               ORDER BY m."order" ASC"#,
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_milestone(&self, milestone: &Milestone) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE milestones SET
                   title = $2, description = $3, cost = $4, client_cost = $5,
                   status = $6, "order" = $7, duration_days = $8,
                   approved_by_admin_id = $9, completed_at = $10, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(milestone.id)
        .bind(&milestone.title)
        .bind(&milestone.description)
        .bind(milestone.cost)
        .bind(milestone.client_cost)
        .bind(milestone.status)
        .bind(milestone.order)
        .bind(milestone.duration_days)
        .bind(milestone.approved_by_admin_id)
        .bind(milestone.completed_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Milestone not found".to_string()));
        }
        Ok(())
    }

    async fn approve_milestone(
        &self,
        milestone_id: Uuid,
        admin_id: Uuid,
        client_cost: Decimal,
        invoice: NewInvoice,
    ) -> AppResult<(Milestone, Invoice)> {
        let mut tx = self.pool.begin().await?;

        let milestone =
            sqlx::query_as::<_, Milestone>("SELECT * FROM milestones WHERE id = $1 FOR UPDATE")
                .bind(milestone_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Milestone not found".to_string()))?;
        if milestone.status != MilestoneStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Milestone cannot be approved from status {:?}",
                milestone.status
            )));
        }

        let milestone = sqlx::query_as::<_, Milestone>(
            r#"UPDATE milestones
               SET status = 'approved', approved_by_admin_id = $2, client_cost = $3,
                   updated_at = NOW()
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(milestone_id)
        .bind(admin_id)
        .bind(client_cost)
        .fetch_one(&mut *tx)
        .await?;

        let invoice = insert_invoice(&mut tx, &invoice).await?;

        tx.commit().await?;
        Ok((milestone, invoice))
    }

    async fn delete_milestone(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM milestones WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Milestone not found".to_string()));
        }

        let referenced: i64 = sqlx::query_scalar(
            r#"SELECT (SELECT COUNT(*) FROM invoices WHERE milestone_id = $1)
                    + (SELECT COUNT(*) FROM payments WHERE milestone_id = $1)"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if referenced > 0 {
            return Err(AppError::Conflict(
                "Cannot delete milestone with existing invoices or payments".to_string(),
            ));
        }

        sqlx::query("DELETE FROM milestones WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ─── Invoices ─────────────────────────────────────────────────────────

    async fn create_invoice(&self, new: NewInvoice) -> AppResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let invoice = insert_invoice(&mut tx, &new).await?;
        tx.commit().await?;
        Ok(invoice)
    }

    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_invoice_by_milestone(&self, milestone_id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE milestone_id = $1")
                .bind(milestone_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_invoices(&self) -> AppResult<Vec<Invoice>> {
        Ok(
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_invoices_by_client(&self, client_id: Uuid) -> AppResult<Vec<Invoice>> {
        Ok(sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE client_id = $1 ORDER BY created_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn save_invoice(&self, invoice: &Invoice) -> AppResult<()> {
        let result = sqlx::query(
            r#"UPDATE invoices SET
                   amount = $2, gst_amount = $3, total_amount = $4, gst_enabled = $5,
                   status = $6, due_date = $7, paid_at = $8, updated_at = NOW()
               WHERE id = $1"#,
        )
        .bind(invoice.id)
        .bind(invoice.amount)
        .bind(invoice.gst_amount)
        .bind(invoice.total_amount)
        .bind(invoice.gst_enabled)
        .bind(invoice.status)
        .bind(invoice.due_date)
        .bind(invoice.paid_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Invoice not found".to_string()));
        }
        Ok(())
    }

    async fn delete_invoice(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Invoice not found".to_string()));
        }

        let payments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE invoice_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if payments > 0 {
            return Err(AppError::Conflict(
                "Cannot delete invoice with recorded payments; delete the payments first"
                    .to_string(),
            ));
        }

        sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ─── Payments & settlement ────────────────────────────────────────────

    async fn create_payment(&self, new: NewPayment) -> AppResult<Payment> {
        sqlx::query_as::<_, Payment>(
            r#"INSERT INTO payments (
                   id, client_id, project_id, milestone_id, invoice_id,
                   amount, gst_amount, total_amount, method, status, gateway_ref
               ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,'pending',$10)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(new.client_id)
        .bind(new.project_id)
        .bind(new.milestone_id)
        .bind(new.invoice_id)
        .bind(new.amount)
        .bind(new.gst_amount)
        .bind(new.total_amount)
        .bind(new.method)
        .bind(&new.gateway_ref)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique(e, "gateway reference already exists"))
    }

    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_payments(&self) -> AppResult<Vec<Payment>> {
        Ok(
            sqlx::query_as::<_, Payment>("SELECT * FROM payments ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_payments_by_client(&self, client_id: Uuid) -> AppResult<Vec<Payment>> {
        Ok(sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE client_id = $1 ORDER BY created_at DESC",
        )
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn settle_payment(
        &self,
        payment_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<SettlementOutcome> {
        let mut tx = self.pool.begin().await?;

        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

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

        // Conditional flip doubles as the idempotency guard under races.
        let flipped = sqlx::query(
            r#"UPDATE payments
               SET status = 'completed', paid_at = $2, updated_at = $2
               WHERE id = $1 AND status = 'pending'"#,
        )
        .bind(payment_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if flipped.rows_affected() == 0 {
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let invoice = if let Some(iid) = payment.invoice_id {
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
                .bind(iid)
                .fetch_optional(&mut *tx)
                .await?
        } else if let Some(mid) = payment.milestone_id {
            sqlx::query_as::<_, Invoice>(
                "SELECT * FROM invoices WHERE milestone_id = $1 FOR UPDATE",
            )
            .bind(mid)
            .fetch_optional(&mut *tx)
            .await?
        } else {
            None
        };

        let Some(invoice) = invoice else {
            tx.commit().await?;
            return Ok(SettlementOutcome::NoInvoice);
        };

        let covered: Decimal = sqlx::query_scalar(
            r#"SELECT COALESCE(SUM(total_amount), 0) FROM payments
               WHERE status = 'completed'
                 AND (invoice_id = $1
                      OR (invoice_id IS NULL AND $2::uuid IS NOT NULL AND milestone_id = $2))"#,
        )
        .bind(invoice.id)
        .bind(invoice.milestone_id)
        .fetch_one(&mut *tx)
        .await?;

        if covered < invoice.total_amount {
            tx.commit().await?;
            return Ok(SettlementOutcome::PartiallyPaid);
        }
        if invoice.status == InvoiceStatus::Paid {
            tx.commit().await?;
            return Ok(SettlementOutcome::AlreadySettled);
        }

        sqlx::query(
            "UPDATE invoices SET status = 'paid', paid_at = $2, updated_at = $2 WHERE id = $1",
        )
        .bind(invoice.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let mut summary = SettlementSummary {
            invoice_id: invoice.id,
            milestone_id: invoice.milestone_id,
            partner_id: None,
            partner_credit: Decimal::ZERO,
            admin_profit: Decimal::ZERO,
            gst_collected: invoice.gst_amount,
        };

        if let Some(mid) = invoice.milestone_id {
            let milestone =
                sqlx::query_as::<_, Milestone>("SELECT * FROM milestones WHERE id = $1 FOR UPDATE")
                    .bind(mid)
                    .fetch_optional(&mut *tx)
                    .await?;
            if let Some(milestone) = milestone {
                let credit = milestone.cost;
                let client_cost = milestone.client_cost.unwrap_or(invoice.amount);
                let profit = client_cost - milestone.cost;

                sqlx::query(
                    r#"UPDATE milestones
                       SET status = 'paid', completed_at = $2, updated_at = $2
                       WHERE id = $1"#,
                )
                .bind(mid)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    r#"UPDATE partners
                       SET total_earnings = total_earnings + $1,
                           available_balance = available_balance + $1,
                           updated_at = $3
                       WHERE id = $2"#,
                )
                .bind(credit)
                .bind(milestone.partner_id)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                upsert_revenue(&mut tx, &crate::ledger::revenue_month(now), profit, now).await?;

                summary.partner_id = Some(milestone.partner_id);
                summary.partner_credit = credit;
                summary.admin_profit = profit;
            }
        }

        if invoice.gst_amount > Decimal::ZERO {
            upsert_gst(&mut tx, &crate::ledger::gst_period(now), invoice.gst_amount, now).await?;
        }

        tx.commit().await?;
        Ok(SettlementOutcome::Settled(summary))
    }

    async fn fail_payment(&self, payment_id: Uuid) -> AppResult<Payment> {
        sqlx::query(
            "UPDATE payments SET status = 'failed', updated_at = NOW() WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment_id)
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1")
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    async fn delete_payment(&self, payment_id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let payment =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
                .bind(payment_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status == PaymentStatus::Completed {
            let invoice = if let Some(iid) = payment.invoice_id {
                sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1 FOR UPDATE")
                    .bind(iid)
                    .fetch_optional(&mut *tx)
                    .await?
            } else if let Some(mid) = payment.milestone_id {
                sqlx::query_as::<_, Invoice>(
                    "SELECT * FROM invoices WHERE milestone_id = $1 FOR UPDATE",
                )
                .bind(mid)
                .fetch_optional(&mut *tx)
                .await?
            } else {
                None
            };

            if let Some(invoice) = invoice {
                if invoice.status == InvoiceStatus::Paid {
                    if let Some(mid) = invoice.milestone_id {
                        let milestone = sqlx::query_as::<_, Milestone>(
                            "SELECT * FROM milestones WHERE id = $1 FOR UPDATE",
                        )
                        .bind(mid)
                        .fetch_optional(&mut *tx)
                        .await?;
                        if let Some(milestone) = milestone {
                            // Conditional debit: a drained balance aborts the
                            // whole reversal.
                            let debited = sqlx::query(
                                r#"UPDATE partners
                                   SET available_balance = available_balance - $1,
                                       total_earnings = total_earnings - $1,
                                       updated_at = $3
                                   WHERE id = $2 AND available_balance >= $1"#,
                            )
                            .bind(milestone.cost)
                            .bind(milestone.partner_id)
                            .bind(now)
                            .execute(&mut *tx)
                            .await?;
                            if debited.rows_affected() == 0 {
                                return Err(AppError::Conflict(
                                    "Cannot reverse settlement: partner balance no longer covers the credit"
                                        .to_string(),
                                ));
                            }

                            sqlx::query(
                                r#"UPDATE milestones
                                   SET status = 'completed', updated_at = $2
                                   WHERE id = $1 AND status = 'paid'"#,
                            )
                            .bind(mid)
                            .bind(now)
                            .execute(&mut *tx)
                            .await?;
                        }
                    }

                    sqlx::query(
                        r#"UPDATE invoices
                           SET status = 'sent', paid_at = NULL, updated_at = $2
                           WHERE id = $1"#,
                    )
                    .bind(invoice.id)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ─── Withdrawals ──────────────────────────────────────────────────────

    async fn request_withdrawal(
        &self,
        partner_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> AppResult<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        // Atomic check-and-decrement; never read-then-write.
        let held = sqlx::query(
            r#"UPDATE partners
               SET available_balance = available_balance - $1, updated_at = NOW()
               WHERE id = $2 AND available_balance >= $1"#,
        )
        .bind(amount)
        .bind(partner_id)
        .execute(&mut *tx)
        .await?;

        if held.rows_affected() == 0 {
            let available: Option<Decimal> =
                sqlx::query_scalar("SELECT available_balance FROM partners WHERE id = $1")
                    .bind(partner_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            return match available {
                Some(available) => Err(AppError::InsufficientBalance {
                    available,
                    required: amount,
                }),
                None => Err(AppError::NotFound("Partner not found".to_string())),
            };
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"INSERT INTO withdrawals (id, partner_id, amount, status, note)
               VALUES ($1, $2, $3, 'pending', $4)
               RETURNING *"#,
        )
        .bind(Uuid::new_v4())
        .bind(partner_id)
        .bind(amount)
        .bind(&note)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn find_withdrawal(&self, id: Uuid) -> AppResult<Option<Withdrawal>> {
        Ok(
            sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_withdrawals(&self) -> AppResult<Vec<Withdrawal>> {
        Ok(sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals ORDER BY requested_at DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_withdrawals_by_partner(&self, partner_id: Uuid) -> AppResult<Vec<Withdrawal>> {
        Ok(sqlx::query_as::<_, Withdrawal>(
            "SELECT * FROM withdrawals WHERE partner_id = $1 ORDER BY requested_at DESC",
        )
        .bind(partner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn process_withdrawal(
        &self,
        id: Uuid,
        new_status: WithdrawalStatus,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> AppResult<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        let withdrawal =
            sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
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
            sqlx::query(
                r#"UPDATE partners
                   SET available_balance = available_balance + $1, updated_at = $3
                   WHERE id = $2"#,
            )
            .bind(withdrawal.amount)
            .bind(withdrawal.partner_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"UPDATE withdrawals
               SET status = $2, note = COALESCE($3, note), processed_at = $4
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(id)
        .bind(new_status)
        .bind(&note)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(withdrawal)
    }

    async fn delete_withdrawal(&self, id: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let withdrawal =
            sqlx::query_as::<_, Withdrawal>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Withdrawal not found".to_string()))?;

        // Funds still on hold go back to the partner before the row is lost.
        if matches!(
            withdrawal.status,
            WithdrawalStatus::Pending | WithdrawalStatus::Approved
        ) {
            sqlx::query(
                r#"UPDATE partners
                   SET available_balance = available_balance + $1, updated_at = NOW()
                   WHERE id = $2"#,
            )
            .bind(withdrawal.amount)
            .bind(withdrawal.partner_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM withdrawals WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    // ─── Rollups ──────────────────────────────────────────────────────────

    async fn list_revenues(&self) -> AppResult<Vec<Revenue>> {
        Ok(
            sqlx::query_as::<_, Revenue>("SELECT * FROM revenues ORDER BY month ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn list_gst_reports(&self) -> AppResult<Vec<GstReport>> {
        Ok(
            sqlx::query_as::<_, GstReport>("SELECT * FROM gst_reports ORDER BY period ASC")
                .fetch_all(&self.pool)
                .await?,
        )
    }
}
