use crate::{config::Config, errors::AppError};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/// Fire-and-forget notification dispatcher. Every send happens on a
/// spawned task after the triggering state change has committed; failures
/// are logged and never fed back into workflow state.
#[derive(Clone)]
pub struct Notifier {
    config: Arc<Config>,
}

impl Notifier {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, AppError> {
        let creds = Credentials::new(
            self.config.smtp_username.clone(),
            self.config.smtp_password.clone(),
        );

        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Email(e.to_string()))?
                .credentials(creds)
                .port(self.config.smtp_port)
                .build();

        Ok(transport)
    }

    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: String,
        text_body: String,
    ) -> Result<(), AppError> {
        let from_mailbox = format!(
            "{} <{}>",
            self.config.email_from_name, self.config.email_from_address
        )
        .parse()
        .map_err(|e: lettre::address::AddressError| AppError::Email(e.to_string()))?;

        let to_mailbox = format!("{} <{}>", to_name, to_email)
            .parse()
            .map_err(|e: lettre::address::AddressError| AppError::Email(e.to_string()))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| AppError::Email(e.to_string()))?;

        let transport = self.build_transport()?;
        transport
            .send(email)
            .await
            .map_err(|e| AppError::Email(e.to_string()))?;

        info!("Notification '{}' sent to {}", subject, to_email);
        Ok(())
    }

    /// Queue a notification without blocking the caller. Core state has
    /// already committed by the time this runs.
    pub fn dispatch(&self, to_email: &str, to_name: &str, subject: &str, intro: &str, rows: Vec<(String, String)>) {
        let notifier = self.clone();
        let to_email = to_email.to_string();
        let to_name = to_name.to_string();
        let subject = subject.to_string();
        let html = build_html(&to_name, intro, &rows);
        let text = build_text(&to_name, intro, &rows);
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&to_email, &to_name, &subject, html, text).await {
                warn!("Notification to {} failed: {}", to_email, e);
            }
        });
    }

    // ─── Event templates ──────────────────────────────────────────────────

    pub fn account_setup(&self, to_email: &str, to_name: &str, set_password_link: &str) {
        self.dispatch(
            to_email,
            to_name,
            "Complete your account setup",
            "Thanks for submitting your project brief. To finish setting up your account, use the link below to set your password.",
            vec![("Set password".to_string(), set_password_link.to_string())],
        );
    }

    pub fn offer_sent(&self, to_email: &str, to_name: &str, project_title: &str, offer_price: Decimal) {
        self.dispatch(
            to_email,
            to_name,
            "Your project offer is ready",
            "We have prepared an offer for your project. Log in to review and accept it.",
            vec![
                ("Project".to_string(), project_title.to_string()),
                ("Offer price".to_string(), format!("${:.2}", offer_price)),
            ],
        );
    }

    pub fn offer_decided(&self, to_email: &str, to_name: &str, project_title: &str, accepted: bool) {
        let subject = if accepted {
            "Offer accepted"
        } else {
            "Offer rejected"
        };
        self.dispatch(
            to_email,
            to_name,
            subject,
            "The client has responded to the offer.",
            vec![
                ("Project".to_string(), project_title.to_string()),
                (
                    "Decision".to_string(),
                    if accepted { "accepted" } else { "rejected" }.to_string(),
                ),
            ],
        );
    }

    pub fn lead_assigned(&self, to_email: &str, to_name: &str, project_title: &str) {
        self.dispatch(
            to_email,
            to_name,
            "New lead assigned to you",
            "A lead has been assigned to you for costing. Please submit your proposed cost.",
            vec![("Project".to_string(), project_title.to_string())],
        );
    }

    pub fn cost_proposed(&self, to_email: &str, to_name: &str, project_title: &str, cost: Decimal) {
        self.dispatch(
            to_email,
            to_name,
            "Partner cost proposal received",
            "A partner has proposed a cost for a lead. Review it and prepare the client offer.",
            vec![
                ("Project".to_string(), project_title.to_string()),
                ("Proposed cost".to_string(), format!("${:.2}", cost)),
            ],
        );
    }

    pub fn milestone_decided(
        &self,
        to_email: &str,
        to_name: &str,
        milestone_title: &str,
        approved: bool,
        reason: Option<&str>,
    ) {
        let mut rows = vec![
            ("Milestone".to_string(), milestone_title.to_string()),
            (
                "Decision".to_string(),
                if approved { "approved" } else { "rejected" }.to_string(),
            ),
        ];
        if let Some(reason) = reason {
            rows.push(("Reason".to_string(), reason.to_string()));
        }
        self.dispatch(
            to_email,
            to_name,
            if approved {
                "Milestone approved"
            } else {
                "Milestone rejected"
            },
            "An admin has reviewed your milestone submission.",
            rows,
        );
    }

    pub fn invoice_issued(
        &self,
        to_email: &str,
        to_name: &str,
        invoice_number: &str,
        total_amount: Decimal,
        due_date: &str,
    ) {
        self.dispatch(
            to_email,
            to_name,
            "New invoice issued",
            "An invoice has been issued for your project. Please arrange payment by the due date.",
            vec![
                ("Invoice".to_string(), invoice_number.to_string()),
                ("Total".to_string(), format!("${:.2}", total_amount)),
                ("Due".to_string(), due_date.to_string()),
            ],
        );
    }

    pub fn withdrawal_processed(
        &self,
        to_email: &str,
        to_name: &str,
        amount: Decimal,
        status: &str,
    ) {
        self.dispatch(
            to_email,
            to_name,
            "Withdrawal request processed",
            "Your withdrawal request has been processed.",
            vec![
                ("Amount".to_string(), format!("${:.2}", amount)),
                ("Status".to_string(), status.to_string()),
            ],
        );
    }
}

fn build_html(name: &str, intro: &str, rows: &[(String, String)]) -> String {
    let row_html: String = rows
        .iter()
        .map(|(k, v)| format!("<tr><td>{}</td><td>{}</td></tr>", k, v))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <style>
    body {{ font-family: Arial, sans-serif; background: #f4f4f4; color: #333; }}
    .container {{ max-width: 600px; margin: 30px auto; background: #fff; border-radius: 8px; overflow: hidden; box-shadow: 0 2px 8px rgba(0,0,0,0.1); }}
    .header {{ background: #1a56db; color: #fff; padding: 24px 32px; }}
    .header h1 {{ margin: 0; font-size: 22px; }}
    .body {{ padding: 24px 32px; }}
    table {{ width: 100%; border-collapse: collapse; margin-bottom: 16px; }}
    td {{ padding: 8px 4px; border-bottom: 1px solid #f1f1f1; }}
    td:last-child {{ text-align: right; font-weight: 600; }}
    .footer {{ background: #f9fafb; padding: 16px 32px; font-size: 12px; color: #6b7280; text-align: center; }}
  </style>
</head>
<body>
<div class="container">
  <div class="header"><h1>BrokerHub</h1></div>
  <div class="body">
    <p>Dear <strong>{name}</strong>,</p>
    <p>{intro}</p>
    <table>{rows}</table>
  </div>
  <div class="footer">
    <p>This is an automated message. Please do not reply to this email.</p>
  </div>
</div>
</body>
</html>"#,
        name = name,
        intro = intro,
        rows = row_html,
    )
}

fn build_text(name: &str, intro: &str, rows: &[(String, String)]) -> String {
    let row_text: String = rows
        .iter()
        .map(|(k, v)| format!("{}: {}\n", k, v))
        .collect();
    format!(
        "Dear {name},\n\n{intro}\n\n{rows}\nThis is an automated message.",
        name = name,
        intro = intro,
        rows = row_text,
    )
}
