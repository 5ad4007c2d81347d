// src/routes/mod.rs

use crate::{
    handlers::{
        auth::{create_partner, login, me, set_password},
        finance::{gst_summary, partner_earnings, revenue_summary},
        invoices::{cancel_invoice, create_invoice, delete_invoice, get_invoice, list_invoices},
        leads::{
            accept_offer, assign_partner, delete_lead, get_lead, list_leads, propose_cost,
            reject_offer, send_offer, submit_lead, update_lead_status,
        },
        milestones::{
            approve_milestone, delete_milestone, get_milestone, list_milestones,
            reject_milestone, submit_milestone, update_milestone_status,
        },
        payments::{
            delete_payment, get_payment, initiate_payment, list_payments, payment_webhook,
            record_payment,
        },
        projects::{
            cancel_project, complete_project, create_project, delete_project, get_project,
            list_project_milestones, list_projects, recompute_project, update_project_status,
        },
        withdrawals::{
            delete_withdrawal, get_withdrawal, list_withdrawals, process_withdrawal,
            request_withdrawal,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // ─── Auth & accounts ──────────────────────────────────
        .route("/auth/login", post(login))
        .route("/auth/set-password", post(set_password))
        .route("/auth/me", get(me))
        .route("/partners", post(create_partner))
        // ─── Leads ────────────────────────────────────────────
        .route("/leads/submit", post(submit_lead))
        .route("/leads", get(list_leads))
        .route("/leads/{lead_id}", get(get_lead).delete(delete_lead))
        .route("/leads/{lead_id}/assign-partner", put(assign_partner))
        .route("/leads/{lead_id}/propose-cost", post(propose_cost))
        .route("/leads/{lead_id}/send-offer", post(send_offer))
        .route("/leads/{lead_id}/accept-offer", post(accept_offer))
        .route("/leads/{lead_id}/reject-offer", post(reject_offer))
        .route("/leads/{lead_id}/status", put(update_lead_status))
        // ─── Projects ─────────────────────────────────────────
        .route("/projects", post(create_project).get(list_projects))
        .route(
            "/projects/{project_id}",
            get(get_project).delete(delete_project),
        )
        .route(
            "/projects/{project_id}/milestones",
            get(list_project_milestones),
        )
        .route("/projects/{project_id}/recompute", put(recompute_project))
        .route("/projects/{project_id}/complete", post(complete_project))
        .route("/projects/{project_id}/cancel", post(cancel_project))
        .route("/projects/{project_id}/status", put(update_project_status))
        // ─── Milestones ───────────────────────────────────────
        .route("/milestones", post(submit_milestone).get(list_milestones))
        .route(
            "/milestones/{milestone_id}",
            get(get_milestone).delete(delete_milestone),
        )
        .route("/milestones/{milestone_id}/approve", put(approve_milestone))
        .route("/milestones/{milestone_id}/reject", put(reject_milestone))
        .route(
            "/milestones/{milestone_id}/status",
            put(update_milestone_status),
        )
        // ─── Invoices ─────────────────────────────────────────
        .route("/invoices", post(create_invoice).get(list_invoices))
        .route(
            "/invoices/{invoice_id}",
            get(get_invoice).delete(delete_invoice),
        )
        .route("/invoices/{invoice_id}/cancel", put(cancel_invoice))
        // ─── Payments ─────────────────────────────────────────
        .route("/payments/initiate", post(initiate_payment))
        .route("/payments/webhook", post(payment_webhook))
        .route("/payments", post(record_payment).get(list_payments))
        .route(
            "/payments/{payment_id}",
            get(get_payment).delete(delete_payment),
        )
        // ─── Withdrawals ──────────────────────────────────────
        .route(
            "/withdrawals",
            post(request_withdrawal).get(list_withdrawals),
        )
        .route(
            "/withdrawals/{withdrawal_id}",
            get(get_withdrawal).delete(delete_withdrawal),
        )
        .route(
            "/withdrawals/{withdrawal_id}/process",
            put(process_withdrawal),
        )
        // ─── Finance rollups ──────────────────────────────────
        .route("/finance/revenue", get(revenue_summary))
        .route("/finance/gst", get(gst_summary))
        .route(
            "/finance/partners/{partner_id}/earnings",
            get(partner_earnings),
        )
}
