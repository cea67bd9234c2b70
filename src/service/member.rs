use crate::connection::ResourceProvider;
use crate::error::{Error, ErrorKind, Result};
use crate::repository::{Member, MemberRepository};
use crate::tx::{TransactionCoordinator, TransactionOutcome};

use std::collections::HashSet;

/// Recipient ids that may never receive a transfer unless configured otherwise.
pub const DEFAULT_RESERVED_IDS: &[&str] = &["ex"];

/// Member operations, each one a single unit of work.
pub struct MemberService<P> {
    coordinator: TransactionCoordinator<P>,
    repository: MemberRepository,
    reserved_ids: HashSet<String>,
}

impl<P: ResourceProvider> MemberService<P> {
    pub fn new(coordinator: TransactionCoordinator<P>, repository: MemberRepository) -> Self {
        Self {
            coordinator,
            repository,
            reserved_ids: DEFAULT_RESERVED_IDS.iter().map(|id| id.to_string()).collect(),
        }
    }

    /// Replace the set of recipient ids a transfer is refused for.
    pub fn with_reserved_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn coordinator(&self) -> &TransactionCoordinator<P> {
        &self.coordinator
    }

    pub fn repository(&self) -> &MemberRepository {
        &self.repository
    }

    /// Move `amount` from `from_id` to `to_id`.
    ///
    /// Both balances change or neither does. The recipient is checked after
    /// the sender has been debited, so a refused recipient exercises the
    /// rollback of an already-applied statement.
    pub async fn transfer(&self, from_id: &str, to_id: &str, amount: i64) -> Result<TransactionOutcome> {
        let repo = self.repository.clone();
        let from = from_id.to_string();
        let to = to_id.to_string();
        let recipient_reserved = self.reserved_ids.contains(to_id);

        log::info!("Transfer {} from {} to {}", amount, from, to);
        self.coordinator
            .run_in_transaction(move |conn| {
                Box::pin(async move {
                    if from == to {
                        return Err(Error::Validation(format!(
                            "cannot transfer from member '{}' to itself",
                            from
                        )));
                    }

                    let from_member = repo.find_by_id(conn, &from).await?;
                    let to_member = repo.find_by_id(conn, &to).await?;

                    let debited = from_member
                        .amount
                        .checked_sub(amount)
                        .ok_or_else(|| amount_overflow(&from))?;
                    repo.update_amount(conn, &from, debited).await?;
                    if recipient_reserved {
                        return Err(Error::Validation(format!(
                            "member '{}' cannot receive transfers",
                            to
                        )));
                    }
                    let credited = to_member
                        .amount
                        .checked_add(amount)
                        .ok_or_else(|| amount_overflow(&to))?;
                    repo.update_amount(conn, &to, credited).await?;
                    Ok(())
                })
            })
            .await?;

        Ok(TransactionOutcome::Committed)
    }

    /// Insert a member in its own transaction.
    ///
    /// If the id is taken, retries once under a freshly generated id derived
    /// from it and returns the member as stored.
    pub async fn create(&self, id: &str, amount: i64) -> Result<Member> {
        match self.insert(Member::new(id, amount)).await {
            Err(err) if err.root_kind() == ErrorKind::DuplicateKey => {
                let retry = Member::new(format!("{}{}", id, id_suffix()), amount);
                log::info!("Member id {} already taken, retrying as {}", id, retry.id);
                self.insert(retry).await
            }
            other => other,
        }
    }

    pub async fn find(&self, id: &str) -> Result<Member> {
        let repo = self.repository.clone();
        let id = id.to_string();
        self.coordinator
            .run_in_transaction(move |conn| Box::pin(async move { repo.find_by_id(conn, &id).await }))
            .await
    }

    pub async fn members(&self) -> Result<Vec<Member>> {
        let repo = self.repository.clone();
        self.coordinator
            .run_in_transaction(move |conn| Box::pin(async move { repo.find_all(conn).await }))
            .await
    }

    async fn insert(&self, member: Member) -> Result<Member> {
        let repo = self.repository.clone();
        self.coordinator
            .run_in_transaction(move |conn| Box::pin(async move { repo.insert(conn, &member).await }))
            .await
    }
}

fn amount_overflow(id: &str) -> Error {
    Error::Validation(format!("amount overflow for member '{}'", id))
}

fn id_suffix() -> String {
    let mut suffix = uuid::Uuid::new_v4().simple().to_string();
    suffix.truncate(8);
    suffix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionConfig, DirectProvider};
    use crate::facade::Database;
    use std::sync::Arc;

    async fn service() -> MemberService<DirectProvider> {
        let db = Database::new();
        let repo = MemberRepository::default();
        repo.migrate(&db).unwrap();
        let provider = DirectProvider::new(db, ConnectionConfig::default()).unwrap();
        let service = MemberService::new(TransactionCoordinator::new(Arc::new(provider)), repo);
        service.create("A", 10_000).await.unwrap();
        service.create("B", 10_000).await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_transfer_to_self_is_refused() {
        let service = service().await;

        let err = service.transfer("A", "A", 100).await.unwrap_err();
        assert_eq!(err.root_kind(), ErrorKind::Validation);
        assert_eq!(service.find("A").await.unwrap().amount, 10_000);
    }

    #[tokio::test]
    async fn test_transfer_to_missing_member() {
        let service = service().await;

        let err = service.transfer("A", "Z", 100).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailed);
        assert_eq!(err.root_kind(), ErrorKind::NotFound);
        assert_eq!(service.find("A").await.unwrap().amount, 10_000);
    }

    #[tokio::test]
    async fn test_custom_reserved_ids() {
        let service = service().await.with_reserved_ids(["B"]);

        assert!(service.transfer("A", "B", 1).await.is_err());
        assert!(service.transfer("B", "A", 1).await.is_ok());
    }

    #[tokio::test]
    async fn test_transfer_overflow_rolls_back() {
        let service = service().await;
        service.create("C", i64::MAX - 10).await.unwrap();

        let err = service.transfer("A", "C", 100).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionFailed);
        assert_eq!(err.root_kind(), ErrorKind::Validation);
        assert_eq!(service.find("A").await.unwrap().amount, 10_000);
        assert_eq!(service.find("C").await.unwrap().amount, i64::MAX - 10);
    }

    #[tokio::test]
    async fn test_transfer_underflow_rolls_back() {
        let service = service().await;
        service.create("C", i64::MIN + 10).await.unwrap();

        let err = service.transfer("C", "A", 100).await.unwrap_err();
        assert_eq!(err.root_kind(), ErrorKind::Validation);
        assert_eq!(service.find("C").await.unwrap().amount, i64::MIN + 10);
        assert_eq!(service.find("A").await.unwrap().amount, 10_000);
    }

    #[tokio::test]
    async fn test_create_retries_duplicate_id() {
        let service = service().await;

        let member = service.create("A", 5).await.unwrap();
        assert_ne!(member.id, "A");
        assert!(member.id.starts_with('A'));
        assert_eq!(service.members().await.unwrap().len(), 3);
    }
}
