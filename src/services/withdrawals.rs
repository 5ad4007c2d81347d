// src/services/withdrawals.rs
//
// Earnings & withdrawal ledger. A request takes an optimistic hold on the
// partner balance; only admin processing finalizes it, and a rejection
// puts the hold back.

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::auth::Principal;
use crate::errors::{AppError, AppResult};
use crate::ledger;
use crate::models::{
    ProcessWithdrawalRequest, RequestWithdrawalRequest, Role, Withdrawal, WithdrawalStatus,
};
use crate::services::email::Notifier;
use crate::store::DynStore;

#[derive(Clone)]
pub struct WithdrawalService {
    store: DynStore,
    notifier: Notifier,
}

impl WithdrawalService {
    pub fn new(store: DynStore, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    pub async fn request(
        &self,
        principal: &Principal,
        req: RequestWithdrawalRequest,
    ) -> AppResult<Withdrawal> {
        principal.require_role(Role::Partner)?;

        if req.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "A positive withdrawal amount is required".to_string(),
            ));
        }
        let amount = ledger::round_money(req.amount);
        let withdrawal = self
            .store
            .request_withdrawal(principal.id, amount, req.note)
            .await?;
        info!(
            "Partner {} requested withdrawal {} for {}",
            principal.id, withdrawal.id, amount
        );
        Ok(withdrawal)
    }

    pub async fn process(
        &self,
        principal: &Principal,
        withdrawal_id: Uuid,
        req: ProcessWithdrawalRequest,
    ) -> AppResult<Withdrawal> {
        principal.require_role(Role::Admin)?;

        if !matches!(
            req.status,
            WithdrawalStatus::Approved | WithdrawalStatus::Paid | WithdrawalStatus::Rejected
        ) {
            return Err(AppError::Validation(
                "Withdrawals can only be processed to APPROVED, PAID or REJECTED".to_string(),
            ));
        }
        let withdrawal = self
            .store
            .process_withdrawal(withdrawal_id, req.status, req.note, chrono::Utc::now())
            .await?;

        if let Some(partner) = self.store.find_partner(withdrawal.partner_id).await? {
            self.notifier.withdrawal_processed(
                &partner.email,
                &partner.name,
                withdrawal.amount,
                &format!("{:?}", withdrawal.status),
            );
        }
        Ok(withdrawal)
    }

    pub async fn delete(&self, principal: &Principal, withdrawal_id: Uuid) -> AppResult<()> {
        principal.require_role(Role::Admin)?;
        self.store.delete_withdrawal(withdrawal_id).await
    }

    pub async fn list(&self, principal: &Principal) -> AppResult<Vec<Withdrawal>> {
        match principal.role {
            Role::Admin => self.store.list_withdrawals().await,
            Role::Partner => self.store.list_withdrawals_by_partner(principal.id).await,
            Role::Client => Err(AppError::Forbidden(
                "Clients do not have access to withdrawals".to_string(),
            )),
        }
    }

    pub async fn get(&self, principal: &Principal, withdrawal_id: Uuid) -> AppResult<Withdrawal> {
        let withdrawal = self
            .store
            .find_withdrawal(withdrawal_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Withdrawal not found".to_string()))?;
        let allowed = match principal.role {
            Role::Admin => true,
            Role::Partner => withdrawal.partner_id == principal.id,
            Role::Client => false,
        };
        if !allowed {
            return Err(AppError::Forbidden(
                "You do not have access to this withdrawal".to_string(),
            ));
        }
        Ok(withdrawal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::leads::tests::{admin_principal, notifier, partner_principal};
    use crate::store::{Store, memory::MemStore};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn service(store: &Arc<MemStore>) -> WithdrawalService {
        WithdrawalService::new(Arc::clone(store) as DynStore, notifier())
    }

    #[tokio::test]
    async fn request_holds_balance_and_rejection_restores_it() {
        let store = Arc::new(MemStore::new());
        let svc = service(&store);
        let partner = store.seed_partner("P", "p@example.com", dec!(500)).await;
        let admin = store.seed_admin("A", "a@example.com").await;

        let withdrawal = svc
            .request(
                &partner_principal(partner.id),
                RequestWithdrawalRequest {
                    amount: dec!(500),
                    note: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);
        assert_eq!(
            store
                .find_partner(partner.id)
                .await
                .unwrap()
                .unwrap()
                .available_balance,
            dec!(0)
        );

        let rejected = svc
            .process(
                &admin_principal(admin.id),
                withdrawal.id,
                ProcessWithdrawalRequest {
                    status: WithdrawalStatus::Rejected,
                    note: Some("Bank details missing".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(
            store
                .find_partner(partner.id)
                .await
                .unwrap()
                .unwrap()
                .available_balance,
            dec!(500)
        );
    }

    #[tokio::test]
    async fn overdraw_fails_and_leaves_balance_untouched() {
        let store = Arc::new(MemStore::new());
        let svc = service(&store);
        let partner = store.seed_partner("P", "p@example.com", dec!(500)).await;

        let err = svc
            .request(
                &partner_principal(partner.id),
                RequestWithdrawalRequest {
                    amount: dec!(600),
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientBalance {
                available,
                required,
            } if available == dec!(500) && required == dec!(600)
        ));
        assert_eq!(
            store
                .find_partner(partner.id)
                .await
                .unwrap()
                .unwrap()
                .available_balance,
            dec!(500)
        );
        assert!(store.list_withdrawals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn paid_and_rejected_are_final() {
        let store = Arc::new(MemStore::new());
        let svc = service(&store);
        let partner = store.seed_partner("P", "p@example.com", dec!(500)).await;
        let admin = store.seed_admin("A", "a@example.com").await;

        let withdrawal = svc
            .request(
                &partner_principal(partner.id),
                RequestWithdrawalRequest {
                    amount: dec!(200),
                    note: None,
                },
            )
            .await
            .unwrap();

        // Approval keeps the hold in place.
        svc.process(
            &admin_principal(admin.id),
            withdrawal.id,
            ProcessWithdrawalRequest {
                status: WithdrawalStatus::Approved,
                note: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            store
                .find_partner(partner.id)
                .await
                .unwrap()
                .unwrap()
                .available_balance,
            dec!(300)
        );

        svc.process(
            &admin_principal(admin.id),
            withdrawal.id,
            ProcessWithdrawalRequest {
                status: WithdrawalStatus::Paid,
                note: None,
            },
        )
        .await
        .unwrap();

        let err = svc
            .process(
                &admin_principal(admin.id),
                withdrawal.id,
                ProcessWithdrawalRequest {
                    status: WithdrawalStatus::Rejected,
                    note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // Paying out did not touch the (already held) balance.
        assert_eq!(
            store
                .find_partner(partner.id)
                .await
                .unwrap()
                .unwrap()
                .available_balance,
            dec!(300)
        );
    }

    #[tokio::test]
    async fn deleting_pending_request_returns_the_hold() {
        let store = Arc::new(MemStore::new());
        let svc = service(&store);
        let partner = store.seed_partner("P", "p@example.com", dec!(500)).await;
        let admin = store.seed_admin("A", "a@example.com").await;

        let withdrawal = svc
            .request(
                &partner_principal(partner.id),
                RequestWithdrawalRequest {
                    amount: dec!(400),
                    note: None,
                },
            )
            .await
            .unwrap();

        svc.delete(&admin_principal(admin.id), withdrawal.id)
            .await
            .unwrap();
        assert_eq!(
            store
                .find_partner(partner.id)
                .await
                .unwrap()
                .unwrap()
                .available_balance,
            dec!(500)
        );
    }

    #[tokio::test]
    async fn balance_never_goes_negative_across_sequences() {
        let store = Arc::new(MemStore::new());
        let svc = service(&store);
        let partner = store.seed_partner("P", "p@example.com", dec!(300)).await;
        let p = partner_principal(partner.id);

        for amount in [dec!(100), dec!(100), dec!(100), dec!(100)] {
            let _ = svc
                .request(
                    &p,
                    RequestWithdrawalRequest {
                        amount,
                        note: None,
                    },
                )
                .await;
        }
        let balance = store
            .find_partner(partner.id)
            .await
            .unwrap()
            .unwrap()
            .available_balance;
        assert!(balance >= dec!(0));
        assert_eq!(balance, dec!(0));
        assert_eq!(store.list_withdrawals().await.unwrap().len(), 3);
    }
}
