// src/services/settlement.rs
//
// Invoice issuance, payment recording, and settlement. Settlement is the
// one place where money moves between ledgers: invoice and milestone flip
// to PAID, the partner is credited the partner-facing cost, and the
// revenue/GST rollups absorb the margin and the tax. The store runs it as
// a single atomic unit; this service decides when it runs.

use chrono::Utc;
use rand::Rng;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use crate::ledger;
use crate::models::{
    CreateInvoiceRequest, GatewayEvent, InitiatePaymentRequest, InitiatePaymentResponse, Invoice,
    InvoiceStatus, Payment, PaymentMethod, RecordPaymentRequest, Role,
};
use crate::services::email::Notifier;
use crate::services::gateway::GatewayService;
use crate::store::{DynStore, NewInvoice, NewPayment, SettlementOutcome};

/// Attempts before a generated invoice number collision is reported.
const INVOICE_NUMBER_RETRIES: usize = 3;

/// Date-prefixed invoice number with a random 6-digit suffix,
/// e.g. `INV-250807-493022`.
pub fn generate_invoice_number() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    format!("INV-{}-{}", Utc::now().format("%y%m%d"), suffix)
}

#[derive(Clone)]
pub struct SettlementService {
    store: DynStore,
    notifier: Notifier,
    gateway: GatewayService,
}

impl SettlementService {
    pub fn new(store: DynStore, notifier: Notifier, gateway: GatewayService) -> Self {
        Self {
            store,
            notifier,
            gateway,
        }
    }

    // ─── Invoices ─────────────────────────────────────────────────────────

    /// Manual admin invoice. The automatic path lives in milestone
    /// approval; the math is the same either way.
    pub async fn create_invoice(
        &self,
        principal: &Principal,
        req: CreateInvoiceRequest,
    ) -> AppResult<Invoice> {
        principal.require_role(Role::Admin)?;

        if req.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Invoice amount must be a positive amount".to_string(),
            ));
        }
        let client = self
            .store
            .find_client(req.client_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
        self.store
            .find_project(req.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        let amount = ledger::round_money(req.amount);
        let (gst_amount, total_amount) = ledger::split_gst(amount, req.gst_enabled);

        let mut last_err = None;
        for _ in 0..INVOICE_NUMBER_RETRIES {
            let new = NewInvoice {
                invoice_number: generate_invoice_number(),
                client_id: req.client_id,
                project_id: req.project_id,
                milestone_id: req.milestone_id,
                amount,
                gst_amount,
                total_amount,
                gst_enabled: req.gst_enabled,
                due_date: req.due_date,
            };
            match self.store.create_invoice(new).await {
                Ok(invoice) => {
                    self.notifier.invoice_issued(
                        &client.email,
                        &client.name,
                        &invoice.invoice_number,
                        invoice.total_amount,
                        &invoice.due_date.format("%Y-%m-%d").to_string(),
                    );
                    return Ok(invoice);
                }
                Err(AppError::DuplicateKey(msg)) => last_err = Some(AppError::DuplicateKey(msg)),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            AppError::Internal("invoice number generation failed".to_string())
        }))
    }

    pub async fn cancel_invoice(&self, principal: &Principal, invoice_id: Uuid) -> AppResult<Invoice> {
        principal.require_role(Role::Admin)?;

        let mut invoice = self.get_invoice_raw(invoice_id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::Conflict(
                "Paid invoices cannot be cancelled".to_string(),
            ));
        }
        invoice.status = InvoiceStatus::Cancelled;
        self.store.save_invoice(&invoice).await?;
        Ok(invoice)
    }

    pub async fn delete_invoice(&self, principal: &Principal, invoice_id: Uuid) -> AppResult<()> {
        principal.require_role(Role::Admin)?;
        self.store.delete_invoice(invoice_id).await
    }

    pub async fn list_invoices(&self, principal: &Principal) -> AppResult<Vec<Invoice>> {
        match principal.role {
            Role::Admin => self.store.list_invoices().await,
            Role::Client => self.store.list_invoices_by_client(principal.id).await,
            Role::Partner => Err(AppError::Forbidden(
                "Partners do not have access to invoices".to_string(),
            )),
        }
    }

    pub async fn get_invoice(&self, principal: &Principal, invoice_id: Uuid) -> AppResult<Invoice> {
        let invoice = self.get_invoice_raw(invoice_id).await?;
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Client => invoice.client_id == principal.id,
            Role::Partner => false,
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this invoice".to_string(),
            ));
        }
        Ok(invoice)
    }

    // ─── Payments ─────────────────────────────────────────────────────────

    /// Client-initiated payment against an invoice. Offline transfers for
    /// the exact total settle synchronously; card/wallet methods open a
    /// gateway checkout and settle later through the webhook.
    pub async fn initiate_payment(
        &self,
        principal: &Principal,
        req: InitiatePaymentRequest,
    ) -> AppResult<InitiatePaymentResponse> {
        principal.require_role(Role::Client)?;

        let invoice = self.get_invoice_raw(req.invoice_id).await?;
        if invoice.client_id != principal.id {
            return Err(AppError::Forbidden(
                "This invoice does not belong to you".to_string(),
            ));
        }
        if matches!(
            invoice.status,
            InvoiceStatus::Paid | InvoiceStatus::Cancelled
        ) {
            return Err(AppError::Conflict(
                "This invoice is already paid or cancelled".to_string(),
            ));
        }
        let amount = ledger::round_money(req.amount);
        if amount <= Decimal::ZERO || amount > invoice.total_amount {
            return Err(AppError::Validation("Invalid payment amount".to_string()));
        }

        // Partial payments carry their share of the invoice GST.
        let gst_amount = ledger::prorate(amount, invoice.total_amount, invoice.gst_amount);
        let gateway_ref = format!("PAY-{}", Uuid::new_v4());

        let payment = self
            .store
            .create_payment(NewPayment {
                client_id: principal.id,
                project_id: invoice.project_id,
                milestone_id: invoice.milestone_id,
                invoice_id: Some(invoice.id),
                amount,
                gst_amount,
                total_amount: amount,
                method: req.method,
                gateway_ref: Some(gateway_ref.clone()),
            })
            .await?;

        // Offline exact-total payments do not round-trip the gateway.
        if req.method == PaymentMethod::BankTransfer && amount == invoice.total_amount {
            self.settle(payment.id).await?;
            let payment = self.get_payment_raw(payment.id).await?;
            return Ok(InitiatePaymentResponse {
                payment,
                checkout_url: None,
            });
        }

        let client = self
            .store
            .find_client(principal.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

        let checkout = self
            .gateway
            .create_checkout(
                amount,
                &client.name,
                &client.email,
                &gateway_ref,
                &format!("Invoice {}", invoice.invoice_number),
            )
            .await;

        match checkout {
            Ok(body) => Ok(InitiatePaymentResponse {
                payment,
                checkout_url: Some(body.checkout_url),
            }),
            Err(e) => {
                // Gateway refusal leaves the payment FAILED with no
                // financial side effects.
                let _ = self.store.fail_payment(payment.id).await;
                Err(e)
            }
        }
    }

    /// Admin-recorded payment (e.g. money that arrived out of band).
    /// Recorded payments are treated as confirmed and settle immediately.
    pub async fn record_payment(
        &self,
        principal: &Principal,
        req: RecordPaymentRequest,
    ) -> AppResult<(Payment, SettlementOutcome)> {
        principal.require_role(Role::Admin)?;

        if req.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "Payment amount must be a positive amount".to_string(),
            ));
        }
        let project = self
            .store
            .find_project(req.project_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;

        let amount = ledger::round_money(req.amount);
        let (gst_amount, total_amount) = match req.invoice_id {
            Some(invoice_id) => {
                let invoice = self.get_invoice_raw(invoice_id).await?;
                (
                    ledger::prorate(amount, invoice.total_amount, invoice.gst_amount),
                    amount,
                )
            }
            None => {
                let (gst, total) = ledger::split_gst(amount, project.gst_enabled);
                (gst, total)
            }
        };

        let payment = self
            .store
            .create_payment(NewPayment {
                client_id: req.client_id,
                project_id: req.project_id,
                milestone_id: req.milestone_id,
                invoice_id: req.invoice_id,
                amount,
                gst_amount,
                total_amount,
                method: req.method,
                gateway_ref: None,
            })
            .await?;

        let outcome = self.settle(payment.id).await?;
        let payment = self.get_payment_raw(payment.id).await?;
        Ok((payment, outcome))
    }

    /// Gateway webhook entry point. Deliveries can arrive late and more
    /// than once; settlement is keyed on the payment and is a no-op the
    /// second time around.
    pub async fn handle_webhook(&self, event: GatewayEvent) -> AppResult<SettlementOutcome> {
        let payment = self.get_payment_raw(event.metadata.payment_id).await?;

        match event.event_type.as_str() {
            "payment.succeeded" => {
                let outcome = self.settle(payment.id).await?;
                if outcome == SettlementOutcome::AlreadySettled {
                    info!(
                        "Duplicate gateway confirmation for payment {} (ref {:?}) ignored",
                        payment.id, event.metadata.transaction_ref
                    );
                }
                Ok(outcome)
            }
            "payment.failed" => {
                let payment = self.store.fail_payment(payment.id).await?;
                warn!("Gateway reported payment {} as failed", payment.id);
                Ok(SettlementOutcome::NoInvoice)
            }
            other => Err(AppError::Validation(format!(
                "Unknown gateway event type '{}'",
                other
            ))),
        }
    }

    pub async fn delete_payment(&self, principal: &Principal, payment_id: Uuid) -> AppResult<()> {
        principal.require_role(Role::Admin)?;
        self.store.delete_payment(payment_id).await
    }

    pub async fn list_payments(&self, principal: &Principal) -> AppResult<Vec<Payment>> {
        match principal.role {
            Role::Admin => self.store.list_payments().await,
            Role::Client => self.store.list_payments_by_client(principal.id).await,
            Role::Partner => Err(AppError::Forbidden(
                "Partners do not have access to payments".to_string(),
            )),
        }
    }

    pub async fn get_payment(&self, principal: &Principal, payment_id: Uuid) -> AppResult<Payment> {
        let payment = self.get_payment_raw(payment_id).await?;
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Client => payment.client_id == principal.id,
            Role::Partner => false,
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this payment".to_string(),
            ));
        }
        Ok(payment)
    }

    async fn settle(&self, payment_id: Uuid) -> AppResult<SettlementOutcome> {
        let outcome = self.store.settle_payment(payment_id, Utc::now()).await?;
        if let SettlementOutcome::Settled(ref summary) = outcome {
            info!(
                "Payment {} settled: invoice {}, milestone {:?}, partner {:?} credited {}, profit {}, GST {}",
                payment_id,
                summary.invoice_id,
                summary.milestone_id,
                summary.partner_id,
                summary.partner_credit,
                summary.admin_profit,
                summary.gst_collected
            );
        }
        Ok(outcome)
    }

    async fn get_invoice_raw(&self, id: Uuid) -> AppResult<Invoice> {
        self.store
            .find_invoice(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".to_string()))
    }

    async fn get_payment_raw(&self, id: Uuid) -> AppResult<Payment> {
        self.store
            .find_payment(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }
}
