// src/services/accounts.rs
//
// The thin account edge around the workflow core: role-scoped login, the
// set-password activation flow started by lead intake, and partner
// onboarding. The core itself only ever sees the resulting principal.

use bcrypt::{DEFAULT_COST, hash, verify};
use std::sync::Arc;

use crate::auth::{Principal, generate_token};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::models::{
    AuthResponse, CreatePartnerRequest, LoginRequest, Partner, PrincipalInfo, Role,
    SetPasswordRequest,
};
use crate::store::{DynStore, NewPartner};

#[derive(Clone)]
pub struct AccountService {
    store: DynStore,
    config: Arc<Config>,
}

impl AccountService {
    pub fn new(store: DynStore, config: Arc<Config>) -> Self {
        Self { store, config }
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        if req.email.trim().is_empty() || req.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());

        let (id, name, email, password_hash) = match req.role {
            Role::Admin => {
                let admin = self
                    .store
                    .find_admin_by_email(&req.email)
                    .await?
                    .ok_or_else(invalid)?;
                (admin.id, admin.name, admin.email, admin.password_hash)
            }
            Role::Partner => {
                let partner = self
                    .store
                    .find_partner_by_email(&req.email)
                    .await?
                    .ok_or_else(invalid)?;
                if !partner.is_active {
                    return Err(AppError::Forbidden("Account is deactivated".to_string()));
                }
                (partner.id, partner.name, partner.email, partner.password_hash)
            }
            Role::Client => {
                let client = self
                    .store
                    .find_client_by_email(&req.email)
                    .await?
                    .ok_or_else(invalid)?;
                if !client.is_active {
                    return Err(AppError::Forbidden(
                        "Account is not activated yet. Check your email for the setup link."
                            .to_string(),
                    ));
                }
                let hash = client.password_hash.ok_or_else(invalid)?;
                (client.id, client.name, client.email, hash)
            }
        };

        let valid =
            verify(&req.password, &password_hash).map_err(|e| AppError::Internal(e.to_string()))?;
        if !valid {
            return Err(invalid());
        }

        let token = generate_token(
            id,
            &name,
            req.role,
            &self.config.jwt_secret,
            self.config.jwt_expiry_hours,
        )?;
        Ok(AuthResponse {
            token,
            principal: PrincipalInfo {
                id,
                name,
                email,
                role: req.role,
            },
        })
    }

    /// Completes the activation flow begun at lead submission: the emailed
    /// token sets the password and flips the account active.
    pub async fn set_password(&self, req: SetPasswordRequest) -> AppResult<AuthResponse> {
        if req.password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        let client = self
            .store
            .find_client_by_verification_token(&req.token)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid or expired token".to_string()))?;
        let expired = client
            .verification_expires
            .map(|at| at < chrono::Utc::now())
            .unwrap_or(true);
        if expired {
            return Err(AppError::Validation(
                "This setup link has expired. Submit the form again to receive a new one."
                    .to_string(),
            ));
        }

        let password_hash =
            hash(&req.password, DEFAULT_COST).map_err(|e| AppError::Internal(e.to_string()))?;
        let client = self.store.activate_client(client.id, &password_hash).await?;

        let token = generate_token(
            client.id,
            &client.name,
            Role::Client,
            &self.config.jwt_secret,
            self.config.jwt_expiry_hours,
        )?;
        Ok(AuthResponse {
            token,
            principal: PrincipalInfo {
                id: client.id,
                name: client.name,
                email: client.email,
                role: Role::Client,
            },
        })
    }

    pub async fn me(&self, principal: &Principal) -> AppResult<PrincipalInfo> {
        let email = match principal.role {
            Role::Admin => self
                .store
                .find_admin(principal.id)
                .await?
                .map(|a| a.email),
            Role::Client => self
                .store
                .find_client(principal.id)
                .await?
                .map(|c| c.email),
            Role::Partner => self
                .store
                .find_partner(principal.id)
                .await?
                .map(|p| p.email),
        }
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        Ok(PrincipalInfo {
            id: principal.id,
            name: principal.name.clone(),
            email,
            role: principal.role,
        })
    }

    pub async fn create_partner(
        &self,
        principal: &Principal,
        req: CreatePartnerRequest,
    ) -> AppResult<Partner> {
        principal.require_role(Role::Admin)?;

        if req.name.trim().is_empty() || req.email.trim().is_empty() {
            return Err(AppError::Validation(
                "Name and email are required".to_string(),
            ));
        }
        if req.password.len() < 8 {
            return Err(AppError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        let password_hash =
            hash(&req.password, DEFAULT_COST).map_err(|e| AppError::Internal(e.to_string()))?;
        self.store
            .create_partner(NewPartner {
                name: req.name,
                email: req.email,
                password_hash,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::leads::LeadService;
    use crate::services::leads::tests::notifier;
    use crate::store::{Store, memory::MemStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn set_password_activates_submitted_client() {
        let store = Arc::new(MemStore::new());
        let accounts = AccountService::new(
            Arc::clone(&store) as DynStore,
            Arc::new(Config::test()),
        );
        let leads = LeadService::new(
            Arc::clone(&store) as DynStore,
            notifier(),
            "http://localhost:3000".to_string(),
        );

        leads
            .submit(crate::models::SubmitLeadRequest {
                name: "Jane".to_string(),
                email: "jane@example.com".to_string(),
                phone: "0400000000".to_string(),
                company_name: None,
                project_category: "web".to_string(),
                project_title: "Site".to_string(),
                description: "Build it".to_string(),
                key_features: None,
                budget_range: "5k".to_string(),
                timeline: None,
            })
            .await
            .unwrap();

        let client = store
            .find_client_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        let token = client.verification_token.unwrap();

        let auth = accounts
            .set_password(SetPasswordRequest {
                token,
                password: "correct-horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(auth.principal.role, Role::Client);

        // Token is single-use.
        let client = store
            .find_client_by_email("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(client.is_active);
        assert!(client.verification_token.is_none());

        // And the password now logs in.
        let auth = accounts
            .login(LoginRequest {
                email: "jane@example.com".to_string(),
                password: "correct-horse".to_string(),
                role: Role::Client,
            })
            .await
            .unwrap();
        assert_eq!(auth.principal.email, "jane@example.com");
    }

    #[tokio::test]
    async fn login_rejects_wrong_password_and_inactive_accounts() {
        let store = Arc::new(MemStore::new());
        let accounts = AccountService::new(
            Arc::clone(&store) as DynStore,
            Arc::new(Config::test()),
        );
        let admin = crate::auth::Principal {
            id: store.seed_admin("A", "a@example.com").await.id,
            name: "A".to_string(),
            role: Role::Admin,
        };

        let partner = accounts
            .create_partner(
                &admin,
                CreatePartnerRequest {
                    name: "Pat".to_string(),
                    email: "pat@example.com".to_string(),
                    password: "hunter2hunter2".to_string(),
                },
            )
            .await
            .unwrap();

        let err = accounts
            .login(LoginRequest {
                email: partner.email.clone(),
                password: "wrong".to_string(),
                role: Role::Partner,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let auth = accounts
            .login(LoginRequest {
                email: partner.email,
                password: "hunter2hunter2".to_string(),
                role: Role::Partner,
            })
            .await
            .unwrap();
        assert_eq!(auth.principal.id, partner.id);
    }
}
