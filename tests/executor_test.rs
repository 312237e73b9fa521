//! Integration tests for executor resolution and routing.

mod support;

use db_uow::db::{BatchResults, Context, ExecutorKind, Manager, Queryable, StoreContext};
use db_uow::error::{DbError, ErrorKind};
use db_uow::models::{CopyTarget, QueryParam, Statement};
use db_uow::uow::UnitOfWork;
use support::RecordingStore;
use tokio_test::{assert_err, assert_ok};

fn root() -> StoreContext<RecordingStore> {
    Context::new()
}

fn one_row() -> Vec<Vec<QueryParam>> {
    vec![vec![QueryParam::Int(1), QueryParam::from("a")]]
}

fn columns() -> Vec<String> {
    vec!["id".to_string(), "name".to_string()]
}

#[tokio::test]
async fn test_batch_takes_precedence_over_transaction() {
    let store = RecordingStore::new();
    let uow = UnitOfWork::new(Manager::new(store.clone()));

    let ctx = uow.begin_with_transaction_and_batch(&root()).await.unwrap();
    let mut executor = uow.executor(&ctx);
    assert_eq!(executor.kind(), ExecutorKind::Batch);

    let result = assert_ok!(executor.execute("INSERT INTO t VALUES (1)", &[]).await);
    let rows = assert_ok!(executor.query("SELECT 1", &[]).await);
    assert_eq!(result.rows_affected, 0);
    assert!(rows.is_empty());

    let queued: Vec<String> = ctx
        .batch()
        .unwrap()
        .statements()
        .into_iter()
        .map(|s| s.sql)
        .collect();
    assert_eq!(queued, vec!["INSERT INTO t VALUES (1)", "SELECT 1"]);
    assert_eq!(store.log(), vec!["begin"]);

    assert_ok!(uow.commit(&ctx).await);
    assert_eq!(
        store.log(),
        vec![
            "begin",
            "tx1.send_batch 2",
            "results.next 0",
            "results.next 1",
            "results.close",
            "tx1.commit",
        ]
    );
}

#[tokio::test]
async fn test_empty_context_resolves_to_pool() {
    let store = RecordingStore::new();
    let manager = Manager::new(store.clone());

    let mut executor = manager.resolve(&root());
    assert_eq!(executor.kind(), ExecutorKind::Pool);

    let result = assert_ok!(executor.execute("UPDATE t SET n = 1", &[]).await);
    let row = assert_ok!(executor.query_one("SELECT 1", &[]).await);

    assert_eq!(result.rows_affected, 1);
    assert_eq!(row.unwrap()["sql"], "SELECT 1");
    assert_eq!(
        store.log(),
        vec!["pool.execute UPDATE t SET n = 1", "pool.query_one SELECT 1"]
    );
}

#[tokio::test]
async fn test_transaction_context_routes_to_transaction() {
    let store = RecordingStore::new();
    let manager = Manager::new(store.clone());

    let tx = manager.begin().await.unwrap();
    let ctx = manager.attach_transaction(&root(), tx);
    let mut executor = manager.resolve(&ctx);
    assert_eq!(executor.kind(), ExecutorKind::Transaction);

    assert_ok!(executor.query("SELECT 1", &[]).await);
    let copied = assert_ok!(
        executor
            .copy_in(&CopyTarget::table("t"), &columns(), &one_row())
            .await
    );

    assert_eq!(copied, 1);
    assert_eq!(
        store.log(),
        vec!["begin", "tx1.query SELECT 1", "tx1.copy_in \"t\" 1"]
    );
}

#[tokio::test]
async fn test_resolution_makes_no_store_call() {
    let store = RecordingStore::new();
    let manager = Manager::new(store.clone());

    let batch_ctx = manager.attach_batch(&root(), manager.new_batch());
    assert_eq!(manager.resolve(&root()).kind(), ExecutorKind::Pool);
    assert_eq!(manager.resolve(&batch_ctx).kind(), ExecutorKind::Batch);

    assert!(store.log().is_empty());
}

#[tokio::test]
async fn test_extract_reports_attached_scope() {
    let store = RecordingStore::new();
    let manager = Manager::new(store.clone());

    let tx = manager.begin().await.unwrap();
    let tx_id = tx.id().to_string();
    let ctx = manager.attach_transaction(&root(), tx);

    assert_eq!(
        manager.extract_transaction(&ctx).map(|t| t.id().to_string()),
        Some(tx_id)
    );
    assert!(manager.extract_batch(&ctx).is_none());
    assert!(manager.extract_transaction(&root()).is_none());
}

#[tokio::test]
async fn test_copy_in_batch_is_rejected_and_leaves_queue_untouched() {
    let store = RecordingStore::new();
    let uow = UnitOfWork::new(Manager::new(store.clone()));

    let ctx = uow.begin_with_transaction_and_batch(&root()).await.unwrap();
    let mut executor = uow.executor(&ctx);
    assert_ok!(executor.execute("INSERT INTO t VALUES (1)", &[]).await);

    let err = assert_err!(
        executor
            .copy_in(&CopyTarget::new(["public", "t"]), &columns(), &one_row())
            .await
    );

    assert!(matches!(err, DbError::UnsupportedBulkCopyInBatch { .. }));
    assert_eq!(err.kind(), ErrorKind::UnsupportedBulkCopyInBatch);
    assert_eq!(ctx.batch().unwrap().len(), 1);
    assert_eq!(store.count("copy_in"), 0);
}

#[tokio::test]
async fn test_send_batch_inside_batch_is_a_no_op() {
    let store = RecordingStore::new();
    let manager = Manager::new(store.clone());

    let batch = manager.new_batch();
    let ctx = manager.attach_batch(&root(), batch.clone());
    let mut executor = manager.resolve(&ctx);

    let mut results = executor
        .send_batch(&[Statement::new("INSERT INTO t VALUES (1)")])
        .await;

    assert_err!(results.next().await);
    assert_ok!(results.close().await);
    assert!(batch.is_empty());
    assert!(store.log().is_empty());
}

#[tokio::test]
async fn test_pool_send_batch_forwards_to_store() {
    let store = RecordingStore::new();
    let manager = Manager::new(store.clone());

    let mut executor = manager.resolve(&root());
    let mut results = executor
        .send_batch(&[Statement::new("INSERT 0"), Statement::new("INSERT 1")])
        .await;

    assert_ok!(results.next().await);
    assert_ok!(results.next().await);
    assert_ok!(results.close().await);
    assert_eq!(
        store.log(),
        vec![
            "pool.send_batch 2",
            "results.next 0",
            "results.next 1",
            "results.close",
        ]
    );
}

#[tokio::test]
async fn test_params_are_queued_with_statement() {
    let store = RecordingStore::new();
    let manager = Manager::new(store);

    let batch = manager.new_batch();
    let ctx = manager.attach_batch(&root(), batch.clone());
    let mut executor = manager.resolve(&ctx);

    assert_ok!(
        executor
            .query_one(
                "SELECT * FROM t WHERE id = $1 AND name = $2",
                &[QueryParam::Int(7), QueryParam::Null],
            )
            .await
    );

    let statements = batch.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(
        statements[0].params,
        vec![QueryParam::Int(7), QueryParam::Null]
    );
}
