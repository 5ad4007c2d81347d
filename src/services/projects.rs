// src/services/projects.rs
//
// Project ledger: the immutable financial snapshot created when an offer
// is accepted. Money fields change only through the explicit admin
// recompute; completion feeds the monthly revenue rollup.

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use crate::ledger;
use crate::models::{
    CreateProjectRequest, Project, ProjectStatus, RecomputeProjectRequest, Role,
};
use crate::store::{DynStore, ProjectSeed};

#[derive(Clone)]
pub struct ProjectService {
    store: DynStore,
}

impl ProjectService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Manual creation path. The accept-offer conversion is the normal
    /// route; this one exists for projects negotiated off-platform.
    pub async fn create(
        &self,
        principal: &Principal,
        req: CreateProjectRequest,
    ) -> AppResult<Project> {
        principal.require_role(Role::Admin)?;

        if req.partner_cost <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Partner cost must be a positive amount".to_string(),
            ));
        }
        self.store
            .find_client(req.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
        self.store
            .find_partner(req.partner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Partner not found".to_string()))?;

        let (admin_margin, offer_price) =
            ledger::compute_offer(req.partner_cost, req.admin_margin_pct, req.gst_enabled);
        let gst_amount = if req.gst_enabled {
            offer_price - (req.partner_cost + admin_margin)
        } else {
            Decimal::ZERO
        };

        let seed = ProjectSeed {
            title: req.title,
            description: req.description,
            category: req.category,
            offer_price,
            partner_cost: req.partner_cost,
            admin_margin,
            gst_enabled: req.gst_enabled,
            gst_amount,
            timeline_days: req.timeline_days,
            client_id: req.client_id,
            partner_id: req.partner_id,
            created_by_admin_id: Some(principal.id),
        };
        self.store.create_project(seed, req.lead_id).await
    }

    /// The explicit admin recompute: the only write path to money fields
    /// after creation.
    pub async fn recompute(
        &self,
        principal: &Principal,
        project_id: Uuid,
        req: RecomputeProjectRequest,
    ) -> AppResult<Project> {
        principal.require_role(Role::Admin)?;

        if req.partner_cost <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Partner cost must be a positive amount".to_string(),
            ));
        }
        let mut project = self.get_raw(project_id).await?;
        if project.status == ProjectStatus::Completed {
            return Err(AppError::Conflict(
                "Cannot recompute a completed project".to_string(),
            ));
        }

        let (admin_margin, offer_price) =
            ledger::compute_offer(req.partner_cost, req.admin_margin_pct, req.gst_enabled);
        project.partner_cost = req.partner_cost;
        project.admin_margin = admin_margin;
        project.offer_price = offer_price;
        project.gst_enabled = req.gst_enabled;
        project.gst_amount = if req.gst_enabled {
            offer_price - (req.partner_cost + admin_margin)
        } else {
            Decimal::ZERO
        };
        self.store.save_project(&project).await?;
        info!(
            "Project {} money fields recomputed: cost {} margin {} price {}",
            project.id, project.partner_cost, project.admin_margin, project.offer_price
        );
        Ok(project)
    }

    /// Idempotent-guarded completion; realizes the admin margin as
    /// current-month revenue in the same unit.
    pub async fn mark_complete(
        &self,
        principal: &Principal,
        project_id: Uuid,
    ) -> AppResult<Project> {
        principal.require_role(Role::Admin)?;
        let month = ledger::revenue_month(chrono::Utc::now());
        let project = self.store.complete_project(project_id, &month).await?;
        info!(
            "Project {} completed; revenue {} recorded for {}",
            project.id, project.admin_margin, month
        );
        Ok(project)
    }

    /// Partner progress updates on the delivery status.
    pub async fn update_status(
        &self,
        principal: &Principal,
        project_id: Uuid,
        status: ProjectStatus,
    ) -> AppResult<Project> {
        principal.require_role(Role::Partner)?;

        if !matches!(status, ProjectStatus::Active | ProjectStatus::InProgress) {
            return Err(AppError::Validation(
                "Partners may only move projects to ACTIVE or IN_PROGRESS".to_string(),
            ));
        }
        let mut project = self.get_raw(project_id).await?;
        if project.partner_id != principal.id {
            return Err(AppError::Forbidden(
                "This project is not assigned to you".to_string(),
            ));
        }
        if matches!(
            project.status,
            ProjectStatus::Completed | ProjectStatus::Cancelled
        ) {
            return Err(AppError::Conflict(format!(
                "Project status can no longer change from {:?}",
                project.status
            )));
        }
        project.status = status;
        self.store.save_project(&project).await?;
        Ok(project)
    }

    pub async fn cancel(&self, principal: &Principal, project_id: Uuid) -> AppResult<Project> {
        principal.require_role(Role::Admin)?;
        let mut project = self.get_raw(project_id).await?;
        if project.status == ProjectStatus::Completed {
            return Err(AppError::Conflict(
                "Completed projects cannot be cancelled".to_string(),
            ));
        }
        project.status = ProjectStatus::Cancelled;
        self.store.save_project(&project).await?;
        Ok(project)
    }

    pub async fn delete(&self, principal: &Principal, project_id: Uuid) -> AppResult<()> {
        principal.require_role(Role::Admin)?;
        self.store.delete_project(project_id).await
    }

    // ─── Reads ────────────────────────────────────────────────────────────

    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<Project>> {
        match principal.role {
            Role::Admin => self.store.list_projects().await,
            Role::Client => self.store.list_projects_by_client(principal.id).await,
            Role::Partner => self.store.list_projects_by_partner(principal.id).await,
        }
    }

    pub async fn get(&self, principal: &Principal, project_id: Uuid) -> AppResult<Project> {
        let project = self.get_raw(project_id).await?;
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
        Ok(project)
    }

    async fn get_raw(&self, project_id: Uuid) -> AppResult<Project> {
        self.store
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
    }
}
