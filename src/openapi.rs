// src/openapi.rs

use crate::handlers::leads::ConvertedLeadResponse;
use crate::handlers::milestones::ApprovedMilestoneResponse;
use crate::models::{
    ApproveMilestoneRequest, AssignPartnerRequest, AuthResponse, CreateInvoiceRequest,
    CreatePartnerRequest, CreateProjectRequest, GatewayEvent, GatewayEventMetadata, GstReport,
    InitiatePaymentRequest, InitiatePaymentResponse, Invoice, InvoiceStatus, Lead, LeadStatus,
    LoginRequest, MessageResponse, Milestone, MilestoneStatus, PartnerEarnings, Payment,
    PaymentMethod, PaymentStatus, PrincipalInfo, ProcessWithdrawalRequest, Project, ProjectStatus,
    ProposeCostRequest, RecomputeProjectRequest, RecordPaymentRequest, RejectMilestoneRequest,
    RequestWithdrawalRequest, Revenue, Role, SendOfferRequest, SetPasswordRequest,
    SubmitLeadRequest, SubmitLeadResponse, SubmitMilestoneRequest, UpdateLeadStatusRequest,
    UpdateMilestoneStatusRequest, UpdateProjectStatusRequest, Withdrawal, WithdrawalStatus,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "BrokerHub API",
        version = "1.0.0",
        description = "Lead-to-revenue workflow engine for agency-brokered projects. \
            Leads are costed by partners, priced into client offers by admins, and \
            converted into projects on acceptance. Approved milestones mint GST \
            invoices; completed payments settle invoices, milestones, partner \
            earnings, and revenue rollups as one atomic unit.",
        license(name = "MIT")
    ),
    paths(
        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::set_password,
        crate::handlers::auth::me,
        crate::handlers::auth::create_partner,
        // Leads
        crate::handlers::leads::submit_lead,
        crate::handlers::leads::list_leads,
        crate::handlers::leads::get_lead,
        crate::handlers::leads::assign_partner,
        crate::handlers::leads::propose_cost,
        crate::handlers::leads::send_offer,
        crate::handlers::leads::accept_offer,
        crate::handlers::leads::reject_offer,
        crate::handlers::leads::update_lead_status,
        crate::handlers::leads::delete_lead,
        // Projects
        crate::handlers::projects::create_project,
        crate::handlers::projects::list_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::list_project_milestones,
        crate::handlers::projects::recompute_project,
        crate::handlers::projects::complete_project,
        crate::handlers::projects::cancel_project,
        crate::handlers::projects::update_project_status,
        crate::handlers::projects::delete_project,
        // Milestones
        crate::handlers::milestones::submit_milestone,
        crate::handlers::milestones::list_milestones,
        crate::handlers::milestones::get_milestone,
        crate::handlers::milestones::approve_milestone,
        crate::handlers::milestones::reject_milestone,
        crate::handlers::milestones::update_milestone_status,
        crate::handlers::milestones::delete_milestone,
        // Invoices
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::cancel_invoice,
        crate::handlers::invoices::delete_invoice,
        // Payments
        crate::handlers::payments::initiate_payment,
        crate::handlers::payments::record_payment,
        crate::handlers::payments::list_payments,
        crate::handlers::payments::get_payment,
        crate::handlers::payments::delete_payment,
        crate::handlers::payments::payment_webhook,
        // Withdrawals
        crate::handlers::withdrawals::request_withdrawal,
        crate::handlers::withdrawals::list_withdrawals,
        crate::handlers::withdrawals::get_withdrawal,
        crate::handlers::withdrawals::process_withdrawal,
        crate::handlers::withdrawals::delete_withdrawal,
        // Finance
        crate::handlers::finance::revenue_summary,
        crate::handlers::finance::gst_summary,
        crate::handlers::finance::partner_earnings,
    ),
    components(
        schemas(
            Role, LoginRequest, SetPasswordRequest, AuthResponse, PrincipalInfo,
            CreatePartnerRequest, PartnerEarnings,
            Lead, LeadStatus, SubmitLeadRequest, SubmitLeadResponse, AssignPartnerRequest,
            ProposeCostRequest, SendOfferRequest, UpdateLeadStatusRequest, ConvertedLeadResponse,
            Project, ProjectStatus, CreateProjectRequest, RecomputeProjectRequest,
            UpdateProjectStatusRequest,
            Milestone, MilestoneStatus, SubmitMilestoneRequest, ApproveMilestoneRequest,
            RejectMilestoneRequest, UpdateMilestoneStatusRequest, ApprovedMilestoneResponse,
            Invoice, InvoiceStatus, CreateInvoiceRequest,
            Payment, PaymentStatus, PaymentMethod, InitiatePaymentRequest,
            InitiatePaymentResponse, RecordPaymentRequest, GatewayEvent, GatewayEventMetadata,
            Withdrawal, WithdrawalStatus, RequestWithdrawalRequest, ProcessWithdrawalRequest,
            Revenue, GstReport, MessageResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Login, account activation, and partner onboarding"),
        (name = "Leads", description = "Lead intake, partner costing, and client offers"),
        (name = "Projects", description = "Converted projects and their financial snapshot"),
        (name = "Milestones", description = "Partner-submitted work units and admin approval"),
        (name = "Invoices", description = "GST invoices issued against milestones"),
        (name = "Payments", description = "Payments, gateway webhook, and settlement"),
        (name = "Withdrawals", description = "Partner balance withdrawal requests"),
        (name = "Finance", description = "Revenue and GST rollups"),
    )
)]
pub struct ApiDoc;
