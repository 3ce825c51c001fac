use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use crate::{
    errors::WalletError,
    session::SessionManager,
    types::{Amount, RequestStatus, TokenId, VerificationRequest},
};

#[derive(Debug, Default)]
pub struct VerificationRequestBook {
    requests: Mutex<Vec<VerificationRequest>>,
}

impl VerificationRequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<VerificationRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request(
        &self,
        session: &SessionManager,
        credential_id: TokenId,
        staked_amount: Option<Amount>,
    ) -> Result<VerificationRequest, WalletError> {
        let requested_by = session.address().ok_or(WalletError::NoSession)?;
        if staked_amount.map_or(false, Amount::is_zero) {
            return Err(WalletError::Validation(
                "staked amount must be greater than zero".to_string(),
            ));
        }

        let request = VerificationRequest {
            id: cuid::cuid2(),
            credential_id,
            requested_by,
            requested_at: Utc::now(),
            status: RequestStatus::Pending,
            staked_amount,
        };
        log::info!("verification of credential {} requested as {}", credential_id, request.id);
        self.lock().push(request.clone());
        Ok(request)
    }

    pub fn get(&self, id: &str) -> Option<VerificationRequest> {
        self.lock().iter().find(|request| request.id == id).cloned()
    }

    pub fn list(&self) -> Vec<VerificationRequest> {
        self.lock().clone()
    }

    pub fn pending(&self) -> Vec<VerificationRequest> {
        self.lock().iter().filter(|request| !request.status.is_terminal()).cloned().collect()
    }

    /// Submits the decision on chain and closes the request once confirmed.
    pub async fn resolve(
        &self,
        session: &SessionManager,
        id: &str,
        approved: bool,
    ) -> Result<VerificationRequest, WalletError> {
        let active = session.active()?;
        let request = self.get(id).ok_or_else(|| WalletError::RequestNotFound(id.to_string()))?;
        if request.status.is_terminal() {
            return Err(WalletError::RequestAlreadyResolved(id.to_string()));
        }

        active.client.verify_credential(&active.address, request.credential_id, approved).await?;

        let mut requests = self.lock();
        let request = requests
            .iter_mut()
            .find(|request| request.id == id)
            .ok_or_else(|| WalletError::RequestNotFound(id.to_string()))?;
        if request.status.is_terminal() {
            return Err(WalletError::RequestAlreadyResolved(id.to_string()));
        }
        request.status = if approved { RequestStatus::Approved } else { RequestStatus::Rejected };
        log::info!("verification request {} resolved as {:?}", id, request.status);
        Ok(request.clone())
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        client::MockLatency, config::WalletConfig, session::MemorySessionStore,
        types::CredentialStatus,
    };

    async fn mock_session() -> SessionManager {
        let mut session = SessionManager::new(
            WalletConfig::default().with_mock(true),
            None,
            Arc::new(MemorySessionStore::default()),
        )
        .with_mock_latency(MockLatency::none());
        session.connect().await.unwrap();
        session
    }

    #[actix_rt::test]
    async fn test_request_then_approve() {
        let session = mock_session().await;
        let book = VerificationRequestBook::new();

        let request = book.request(&session, TokenId(2), Some(Amount::from_tokens(10))).unwrap();
        assert_eq!(book.pending().len(), 1);

        let resolved = book.resolve(&session, &request.id, true).await.unwrap();

        assert_eq!(resolved.status, RequestStatus::Approved);
        assert!(book.pending().is_empty());
        let client = session.client().unwrap();
        let credential = client.credential(&session.address().unwrap(), TokenId(2)).await.unwrap();
        assert_eq!(credential.status, CredentialStatus::Verified);
    }

    #[actix_rt::test]
    async fn test_resolving_twice_is_rejected() {
        let session = mock_session().await;
        let book = VerificationRequestBook::new();
        let request = book.request(&session, TokenId(2), None).unwrap();

        book.resolve(&session, &request.id, false).await.unwrap();
        let again = book.resolve(&session, &request.id, true).await;

        assert!(matches!(again, Err(WalletError::RequestAlreadyResolved(_))));
        assert_eq!(book.get(&request.id).unwrap().status, RequestStatus::Rejected);
    }

    #[actix_rt::test]
    async fn test_failed_submission_leaves_request_pending() {
        let session = mock_session().await;
        let book = VerificationRequestBook::new();
        let request = book.request(&session, TokenId(1), None).unwrap();

        let result = book.resolve(&session, &request.id, true).await;

        assert!(matches!(result, Err(WalletError::CredentialAlreadyResolved(TokenId(1)))));
        assert_eq!(book.get(&request.id).unwrap().status, RequestStatus::Pending);
    }

    #[actix_rt::test]
    async fn test_unknown_request() {
        let session = mock_session().await;
        let book = VerificationRequestBook::new();

        let result = book.resolve(&session, "missing", true).await;

        assert!(matches!(result, Err(WalletError::RequestNotFound(id)) if id == "missing"));
    }

    #[actix_rt::test]
    async fn test_requests_need_a_session() {
        let session = SessionManager::new(
            WalletConfig::default(),
            None,
            Arc::new(MemorySessionStore::default()),
        );
        let book = VerificationRequestBook::new();

        assert!(matches!(book.request(&session, TokenId(1), None), Err(WalletError::NoSession)));
        assert!(matches!(
            book.request(&mock_session().await, TokenId(1), Some(Amount::ZERO)),
            Err(WalletError::Validation(_))
        ));
    }
}
