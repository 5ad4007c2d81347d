// src/models/mod.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

// ─── Roles & Claims ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
    Partner,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Client => write!(f, "client"),
            Role::Partner => write!(f, "partner"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

// ─── Status enums ─────────────────────────────────────────────────────────────

// sqlx 0.8: custom Postgres enums need #[sqlx(type_name = "...")] on the enum;
// the runtime query API decodes them without per-query casts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    Pending,
    Reviewing,
    AssignedToPartner,
    PartnerOfferProposed,
    OfferSentToClient,
    AcceptedAndConverted,
    OfferRejectedByClient,
    Archived,
}

impl LeadStatus {
    /// Terminal states admit no further transition (archival included).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LeadStatus::AcceptedAndConverted | LeadStatus::Archived
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Pending,
    Active,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "milestone_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    Pending,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Paid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Sent,
    Paid,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Stripe,
    Paypal,
    BankTransfer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "withdrawal_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Paid,
    Rejected,
}

// ─── Principals ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub company_name: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub total_earnings: Decimal,
    pub available_balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Lead ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Lead {
    pub id: Uuid,
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
    pub status: LeadStatus,
    pub client_id: Uuid,
    pub assigned_partner_id: Option<Uuid>,
    pub processed_by_admin_id: Option<Uuid>,
    pub partner_proposed_cost: Option<Decimal>,
    pub partner_notes: Option<String>,
    pub admin_margin: Option<Decimal>,
    pub offer_price: Option<Decimal>,
    pub includes_gst: bool,
    pub project_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Project ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub status: ProjectStatus,
    pub offer_price: Decimal,
    pub partner_cost: Decimal,
    pub admin_margin: Decimal,
    pub gst_enabled: bool,
    pub gst_amount: Decimal,
    pub timeline_days: i32,
    pub client_id: Uuid,
    pub partner_id: Uuid,
    pub created_by_admin_id: Option<Uuid>,
    pub lead_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Milestone ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Uuid,
    pub partner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Partner-facing cost, credited to the partner at settlement.
    pub cost: Decimal,
    /// Client-facing cost, fixed by the admin at approval time.
    pub client_cost: Option<Decimal>,
    pub status: MilestoneStatus,
    pub order: i32,
    pub duration_days: i32,
    pub approved_by_admin_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Invoice ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub amount: Decimal,
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
    pub gst_enabled: bool,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Payment ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub gst_amount: Decimal,
    pub total_amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Gateway transaction reference; doubles as the settlement idempotency key.
    pub gateway_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Withdrawal ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Withdrawal {
    pub id: Uuid,
    pub partner_id: Uuid,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    pub note: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

// ─── Rollups ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Revenue {
    pub id: Uuid,
    /// "YYYY-MM"
    pub month: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct GstReport {
    pub id: Uuid,
    /// "Qn YYYY"
    pub period: String,
    pub gst_collected: Decimal,
    pub gst_paid: Decimal,
    pub status: String,
    pub due_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Auth DTOs ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PrincipalInfo {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub principal: PrincipalInfo,
}

// ─── Lead DTOs ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitLeadRequest {
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
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitLeadResponse {
    pub message: String,
    /// Absent when an unverified account existed and only the activation
    /// email was re-sent.
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPartnerRequest {
    pub partner_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProposeCostRequest {
    pub proposed_cost: Decimal,
    pub timeline: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOfferRequest {
    /// Margin percentage, e.g. 20 means 20%.
    pub admin_margin_pct: Decimal,
    pub includes_gst: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLeadStatusRequest {
    pub status: LeadStatus,
}

// ─── Project DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub category: String,
    pub client_id: Uuid,
    pub partner_id: Uuid,
    pub partner_cost: Decimal,
    pub admin_margin_pct: Decimal,
    pub gst_enabled: bool,
    pub timeline_days: i32,
    pub lead_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectStatusRequest {
    /// Partners may only move projects to ACTIVE or IN_PROGRESS.
    pub status: ProjectStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecomputeProjectRequest {
    pub partner_cost: Decimal,
    pub admin_margin_pct: Decimal,
    pub gst_enabled: bool,
}

// ─── Milestone DTOs ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitMilestoneRequest {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub cost: Decimal,
    pub duration_days: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApproveMilestoneRequest {
    pub client_cost: Decimal,
    pub includes_gst: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectMilestoneRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateMilestoneStatusRequest {
    /// Partners may only move work to IN_PROGRESS or COMPLETED.
    pub status: MilestoneStatus,
}

// ─── Invoice & Payment DTOs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateInvoiceRequest {
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub amount: Decimal,
    pub gst_enabled: bool,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub payment: Payment,
    /// Present while the gateway still has to confirm the charge.
    pub checkout_url: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordPaymentRequest {
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
}

/// Inbound gateway webhook payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GatewayEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub metadata: GatewayEventMetadata,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GatewayEventMetadata {
    #[serde(rename = "paymentId")]
    pub payment_id: Uuid,
    #[serde(rename = "transactionRef")]
    pub transaction_ref: Option<String>,
}

// ─── Withdrawal DTOs ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestWithdrawalRequest {
    pub amount: Decimal,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProcessWithdrawalRequest {
    pub status: WithdrawalStatus,
    pub note: Option<String>,
}

// ─── Partner DTOs ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePartnerRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PartnerEarnings {
    pub id: Uuid,
    pub name: String,
    pub total_earnings: Decimal,
    pub available_balance: Decimal,
}

// ─── Misc ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
