/// Transfer tests
///
/// End-to-end behavior of `MemberService::transfer` over a pooled store.
/// Run with: cargo test --test transfer_tests

use memberdb::{
    ConnectionConfig, ConnectionPool, Database, Error, ErrorKind, Member, MemberRepository,
    MemberService, Statement, TransactionCoordinator, TransactionOutcome, Value, codes,
};
use std::sync::Arc;
use std::time::Duration;

async fn service_with(members: &[(&str, i64)]) -> MemberService<ConnectionPool> {
    let db = Database::new();
    let repository = MemberRepository::default();
    repository.migrate(&db).unwrap();

    let pool = ConnectionPool::new(db, ConnectionConfig::default()).unwrap();
    let service = MemberService::new(TransactionCoordinator::new(Arc::new(pool)), repository);

    for (id, amount) in members {
        service.create(id, *amount).await.unwrap();
    }
    service
}

async fn balance(service: &MemberService<ConnectionPool>, id: &str) -> i64 {
    service.find(id).await.unwrap().amount
}

#[tokio::test]
async fn test_transfer_moves_money() {
    let service = service_with(&[("memberA", 10_000), ("memberB", 10_000)]).await;

    let outcome = service.transfer("memberA", "memberB", 2_000).await.unwrap();

    assert_eq!(outcome, TransactionOutcome::Committed);
    assert_eq!(balance(&service, "memberA").await, 8_000);
    assert_eq!(balance(&service, "memberB").await, 12_000);
}

#[tokio::test]
async fn test_transfer_to_reserved_member_rolls_back() {
    let service = service_with(&[("memberA", 10_000), ("ex", 10_000)]).await;

    let err = service.transfer("memberA", "ex", 2_000).await.unwrap_err();

    assert!(matches!(err, Error::TransactionFailed { .. }));
    assert_eq!(err.root_kind(), ErrorKind::Validation);
    // The sender was debited inside the unit before the check failed.
    assert_eq!(balance(&service, "memberA").await, 10_000);
    assert_eq!(balance(&service, "ex").await, 10_000);
}

#[tokio::test]
async fn test_transfer_conserves_total() {
    let service = service_with(&[("A", 7_345), ("B", 1_200)]).await;

    for amount in [1, 500, 9_000, 0, 33] {
        service.transfer("A", "B", amount).await.unwrap();
        service.transfer("B", "A", amount / 2).await.unwrap();
    }

    let total: i64 = service.members().await.unwrap().iter().map(|m| m.amount).sum();
    assert_eq!(total, 7_345 + 1_200);
}

#[tokio::test]
async fn test_transfer_from_missing_member() {
    let service = service_with(&[("B", 10)]).await;

    let err = service.transfer("nobody", "B", 5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    assert_eq!(err.root_kind(), ErrorKind::NotFound);
    assert_eq!(balance(&service, "B").await, 10);
}

#[tokio::test]
async fn test_transfer_returns_connections() {
    let service = service_with(&[("A", 10), ("B", 10)]).await;

    service.transfer("A", "B", 1).await.unwrap();
    let _ = service.transfer("A", "ex", 1).await;

    let stats = service.coordinator().provider().stats();
    assert_eq!(stats.active, 0);
    assert!(stats.idle >= 1);
}

#[tokio::test]
async fn test_create_assigns_new_id_on_duplicate() {
    let service = service_with(&[("A", 10)]).await;

    let created = service.create("A", 99).await.unwrap();
    assert_ne!(created.id, "A");

    let members = service.members().await.unwrap();
    assert!(members.contains(&Member::new("A", 10)));
    assert!(members.contains(&created));
}

#[tokio::test]
async fn test_statement_timeout_rolls_back_transfer() {
    let db = Database::new();
    let repository = MemberRepository::default();
    repository.migrate(&db).unwrap();
    let config = ConnectionConfig::default()
        .statement_timeout(Duration::from_millis(50))
        .lock_timeout(Duration::from_secs(5));
    let pool = ConnectionPool::new(db.clone(), config).unwrap();
    let service = MemberService::new(TransactionCoordinator::new(Arc::new(pool)), repository.clone());
    service.create("A", 10_000).await.unwrap();
    service.create("B", 10_000).await.unwrap();

    // Another transaction keeps B locked past the statement timeout.
    let mut holder = db.connect(&ConnectionConfig::default()).unwrap();
    holder.begin().unwrap();
    holder
        .execute(
            &Statement::update_by_key("member", &["money"]),
            &[Value::Integer(1), Value::from("B")],
        )
        .await
        .unwrap();

    let err = service.transfer("A", "B", 2_000).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionFailed);
    assert_eq!(err.root_kind(), ErrorKind::Store);
    assert_eq!(err.native_code(), Some(codes::STATEMENT_CANCELED));

    let (outcome, result) = service
        .coordinator()
        .run_in_transaction_with_outcome(move |conn| {
            Box::pin(async move { repository.find_by_id(conn, "B").await })
        })
        .await;
    assert_eq!(outcome, TransactionOutcome::RolledBack);
    assert_eq!(result.unwrap_err().native_code(), Some(codes::STATEMENT_CANCELED));

    holder.rollback().unwrap();
    assert_eq!(balance(&service, "A").await, 10_000);
    assert_eq!(balance(&service, "B").await, 10_000);
    assert_eq!(db.active_transactions(), 0);
}

#[tokio::test]
async fn test_transfer_overflow_leaves_balances() {
    let service = service_with(&[("A", 10_000), ("B", i64::MAX - 10)]).await;

    let err = service.transfer("A", "B", 100).await.unwrap_err();

    assert_eq!(err.root_kind(), ErrorKind::Validation);
    assert_eq!(balance(&service, "A").await, 10_000);
    assert_eq!(balance(&service, "B").await, i64::MAX - 10);
}
