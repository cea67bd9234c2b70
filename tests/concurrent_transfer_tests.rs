/// Concurrent transfer tests
///
/// Transfers run as independent tasks against one pool.
/// Run with: cargo test --test concurrent_transfer_tests

use memberdb::{
    ConnectionConfig, ConnectionPool, Database, ErrorKind, MemberRepository, MemberService,
    TransactionCoordinator, TransactionOutcome, codes,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

async fn shared_service(
    members: &[(&str, i64)],
    config: ConnectionConfig,
) -> Arc<MemberService<ConnectionPool>> {
    let db = Database::new();
    let repository = MemberRepository::default();
    repository.migrate(&db).unwrap();

    let pool = ConnectionPool::new(db, config).unwrap();
    let service = MemberService::new(TransactionCoordinator::new(Arc::new(pool)), repository);
    for (id, amount) in members {
        service.create(id, *amount).await.unwrap();
    }
    Arc::new(service)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_pair_loses_no_update() {
    let config = ConnectionConfig::default()
        .max_connections(8)
        .lock_timeout(Duration::from_secs(5));
    let service = shared_service(&[("A", 10_000), ("B", 10_000)], config).await;

    let tasks = 20;
    let barrier = Arc::new(Barrier::new(tasks));
    let mut handles = vec![];

    for _ in 0..tasks {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            service.transfer("A", "B", 100).await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(service.find("A").await.unwrap().amount, 10_000 - 20 * 100);
    assert_eq!(service.find("B").await.unwrap().amount, 10_000 + 20 * 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disjoint_pairs_both_succeed() {
    let config = ConnectionConfig::default().max_connections(4);
    let service =
        shared_service(&[("A", 100), ("B", 100), ("C", 100), ("D", 100)], config).await;

    let first = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.transfer("A", "B", 30).await })
    };
    let second = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.transfer("C", "D", 40).await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let balances: Vec<i64> = service
        .members()
        .await
        .unwrap()
        .into_iter()
        .map(|member| member.amount)
        .collect();
    assert_eq!(balances, vec![70, 130, 60, 140]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_directions_conserve_total() {
    let config = ConnectionConfig::default()
        .max_connections(8)
        .lock_timeout(Duration::from_millis(200));
    let service = shared_service(&[("A", 5_000), ("B", 5_000)], config).await;

    let mut handles = vec![];
    for i in 0..16 {
        let service = Arc::clone(&service);
        let (from, to) = if i % 2 == 0 { ("A", "B") } else { ("B", "A") };
        handles.push(tokio::spawn(async move { service.transfer(from, to, 10).await }));
    }

    // Lock waits may time out when the two directions cross; a timed-out
    // transfer rolls back entirely.
    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(outcome) => {
                assert_eq!(outcome, TransactionOutcome::Committed);
                committed += 1;
            }
            Err(err) => {
                assert_eq!(err.root_kind(), ErrorKind::Store);
                assert_eq!(err.native_code(), Some(codes::LOCK_TIMEOUT));
            }
        }
    }
    assert!(committed > 0);

    let total: i64 = service
        .members()
        .await
        .unwrap()
        .iter()
        .map(|member| member.amount)
        .sum();
    assert_eq!(total, 10_000);
}
