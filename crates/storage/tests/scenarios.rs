//! End-to-end scenarios against a real (tempfile-backed) SQLite database,
//! one per quantified invariant/behavior this engine is responsible for.

use std::sync::Arc;

use tablesql_core::{Address, ChainId, Event, Policy, TableId, TxnEvents, TxnHash};
use tablesql_storage::{BasicSqlValidator, Executor};

const CHAIN: ChainId = ChainId(1337);

fn addr(byte: u8) -> Address {
    Address::from_hex(&format!("0x{:040x}", byte as u64)).unwrap()
}

fn txn_hash(n: u8) -> TxnHash {
    TxnHash::from_hex(&format!("{:064x}", n))
}

async fn new_executor() -> (tempfile::TempDir, Executor) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tablesql.db");
    let validator: Arc<dyn tablesql_core::SqlValidator> = Arc::new(BasicSqlValidator::new());
    let executor = Executor::open(path.to_str().unwrap(), validator, std::time::Duration::from_secs(5)).unwrap();
    (dir, executor)
}

fn raw_conn(dir: &tempfile::TempDir) -> rusqlite::Connection {
    rusqlite::Connection::open(dir.path().join("tablesql.db")).unwrap()
}

#[tokio::test]
async fn create_then_insert_happy_path() {
    let (dir, executor) = new_executor().await;
    let owner = addr(1);

    let mut scope = executor.new_block_scope(CHAIN, 1, 0, 1_700_000_000).await.unwrap();
    let outcome = scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(1),
            events: vec![
                Event::CreateTable {
                    table_id: Some(TableId::from_u64(1)),
                    owner,
                    statement: "CREATE TABLE foo_1337 (id INTEGER PRIMARY KEY, name TEXT)".to_string(),
                },
                Event::RunSql {
                    is_owner: true,
                    caller: owner,
                    table_id: TableId::from_u64(1),
                    statement: "INSERT INTO foo_1337_1 (id, name) VALUES (1, 'hello')".to_string(),
                    policy: Policy::default(),
                },
            ],
        })
        .await
        .unwrap();

    assert!(outcome.error.is_none());
    scope.set_last_processed_height(1).await.unwrap();
    scope.commit().await.unwrap();

    let conn = raw_conn(&dir);
    let row = tablesql_storage::registry::lookup(&conn, CHAIN, &TableId::from_u64(1)).unwrap().unwrap();
    assert_eq!(row.prefix, "foo");
    assert_eq!(tablesql_storage::registry::physical_row_count(&conn, "foo_1337_1").unwrap(), 1);
}

#[tokio::test]
async fn failing_event_rolls_back_only_its_transaction() {
    let (dir, executor) = new_executor().await;
    let owner = addr(2);

    let mut scope = executor.new_block_scope(CHAIN, 1, 0, 1_700_000_000).await.unwrap();
    scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(1),
            events: vec![Event::CreateTable {
                table_id: Some(TableId::from_u64(1)),
                owner,
                statement: "CREATE TABLE bar_1337 (id INTEGER PRIMARY KEY, name TEXT)".to_string(),
            }],
        })
        .await
        .unwrap();

    let outcome = scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(2),
            events: vec![
                Event::RunSql {
                    is_owner: true,
                    caller: owner,
                    table_id: TableId::from_u64(1),
                    statement: "INSERT INTO bar_1337_1 (id, name) VALUES (1, 'x')".to_string(),
                    policy: Policy::default(),
                },
                Event::RunSql {
                    is_owner: true,
                    caller: owner,
                    table_id: TableId::from_u64(99),
                    statement: "INSERT INTO bar_1337_99 (id, name) VALUES (1, 'y')".to_string(),
                    policy: Policy::default(),
                },
            ],
        })
        .await
        .unwrap();

    assert!(outcome.error.is_some());
    assert_eq!(outcome.error_event_idx, Some(1));
    scope.set_last_processed_height(1).await.unwrap();
    scope.commit().await.unwrap();

    let conn = raw_conn(&dir);
    assert_eq!(tablesql_storage::registry::physical_row_count(&conn, "bar_1337_1").unwrap(), 0);
}

#[tokio::test]
async fn row_count_limit_rejects_excess_insert() {
    let (dir, executor) = new_executor().await;
    let owner = addr(3);
    let max_rows = 1;

    let mut scope = executor.new_block_scope(CHAIN, 1, max_rows, 1_700_000_000).await.unwrap();
    scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(1),
            events: vec![
                Event::CreateTable {
                    table_id: Some(TableId::from_u64(1)),
                    owner,
                    statement: "CREATE TABLE baz_1337 (id INTEGER PRIMARY KEY)".to_string(),
                },
                Event::RunSql {
                    is_owner: true,
                    caller: owner,
                    table_id: TableId::from_u64(1),
                    statement: "INSERT INTO baz_1337_1 (id) VALUES (1)".to_string(),
                    policy: Policy::default(),
                },
            ],
        })
        .await
        .unwrap();

    let outcome = scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(2),
            events: vec![Event::RunSql {
                is_owner: true,
                caller: owner,
                table_id: TableId::from_u64(1),
                statement: "INSERT INTO baz_1337_1 (id) VALUES (2)".to_string(),
                policy: Policy::default(),
            }],
        })
        .await
        .unwrap();

    assert!(matches!(outcome.error, Some(tablesql_core::EventErrorCode::RowCountLimit { before: 1, after: 2 })));
    scope.set_last_processed_height(1).await.unwrap();
    scope.commit().await.unwrap();

    let conn = raw_conn(&dir);
    assert_eq!(tablesql_storage::registry::physical_row_count(&conn, "baz_1337_1").unwrap(), 1);
}

#[tokio::test]
async fn controller_with_check_rejects_unauditable_write() {
    let (dir, executor) = new_executor().await;
    let owner = addr(4);
    let controller = addr(5);
    let caller = addr(6);

    let mut scope = executor.new_block_scope(CHAIN, 1, 0, 1_700_000_000).await.unwrap();
    scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(1),
            events: vec![
                Event::CreateTable {
                    table_id: Some(TableId::from_u64(1)),
                    owner,
                    statement: "CREATE TABLE gated_1337 (id INTEGER PRIMARY KEY, status TEXT, val INTEGER)".to_string(),
                },
                Event::RunSql {
                    is_owner: true,
                    caller: owner,
                    table_id: TableId::from_u64(1),
                    statement: "INSERT INTO gated_1337_1 (id, status, val) VALUES (1, 'pending', 0)".to_string(),
                    policy: Policy::default(),
                },
                Event::SetController {
                    table_id: TableId::from_u64(1),
                    controller,
                },
            ],
        })
        .await
        .unwrap();

    let policy = Policy {
        allow_update: true,
        with_check: "status = 'approved'".to_string(),
        ..Policy::default()
    };
    let outcome = scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(2),
            events: vec![Event::RunSql {
                is_owner: false,
                caller,
                table_id: TableId::from_u64(1),
                statement: "UPDATE gated_1337_1 SET val = 5 WHERE id = 1".to_string(),
                policy,
            }],
        })
        .await
        .unwrap();

    assert!(matches!(
        outcome.error,
        Some(tablesql_core::EventErrorCode::PolicyWithCheck { affected: 1, audited: 0 })
    ));
    scope.set_last_processed_height(1).await.unwrap();
    scope.commit().await.unwrap();

    let conn = raw_conn(&dir);
    let val: i64 = conn.query_row("SELECT val FROM gated_1337_1 WHERE id = 1", [], |r| r.get(0)).unwrap();
    assert_eq!(val, 0);
}

#[tokio::test]
async fn transfer_table_moves_privileges() {
    let (dir, executor) = new_executor().await;
    let owner = addr(7);
    let new_owner = addr(8);

    let mut scope = executor.new_block_scope(CHAIN, 1, 0, 1_700_000_000).await.unwrap();
    scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(1),
            events: vec![
                Event::CreateTable {
                    table_id: Some(TableId::from_u64(1)),
                    owner,
                    statement: "CREATE TABLE xfer_1337 (id INTEGER PRIMARY KEY)".to_string(),
                },
                Event::TransferTable {
                    table_id: TableId::from_u64(1),
                    from: owner,
                    to: new_owner,
                },
            ],
        })
        .await
        .unwrap();
    scope.set_last_processed_height(1).await.unwrap();
    scope.commit().await.unwrap();

    let conn = raw_conn(&dir);
    let row = tablesql_storage::registry::lookup(&conn, CHAIN, &TableId::from_u64(1)).unwrap().unwrap();
    assert_eq!(row.controller, new_owner.to_lowercase_hex());

    let old_privileges = tablesql_storage::acl_store::get(&conn, CHAIN, &TableId::from_u64(1), &owner).unwrap();
    let new_privileges = tablesql_storage::acl_store::get(&conn, CHAIN, &TableId::from_u64(1), &new_owner).unwrap();
    assert_eq!(old_privileges, tablesql_core::Privileges::NONE);
    assert_eq!(new_privileges, tablesql_core::Privileges::ALL);
}

#[tokio::test]
async fn set_controller_binds_then_unbinds() {
    let (dir, executor) = new_executor().await;
    let owner = addr(9);
    let controller = addr(10);

    let mut scope = executor.new_block_scope(CHAIN, 1, 0, 1_700_000_000).await.unwrap();
    scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(1),
            events: vec![
                Event::CreateTable {
                    table_id: Some(TableId::from_u64(1)),
                    owner,
                    statement: "CREATE TABLE ctl_1337 (id INTEGER PRIMARY KEY)".to_string(),
                },
                Event::SetController {
                    table_id: TableId::from_u64(1),
                    controller,
                },
            ],
        })
        .await
        .unwrap();
    scope.set_last_processed_height(1).await.unwrap();
    scope.commit().await.unwrap();

    {
        let conn = raw_conn(&dir);
        assert_eq!(tablesql_storage::controller::get(&conn, CHAIN, &TableId::from_u64(1)).unwrap(), Some(controller));
    }

    let mut scope = executor.new_block_scope(CHAIN, 2, 0, 1_700_000_001).await.unwrap();
    scope
        .execute_txn_events(&TxnEvents {
            txn_hash: txn_hash(2),
            events: vec![Event::SetController {
                table_id: TableId::from_u64(1),
                controller: Address::ZERO,
            }],
        })
        .await
        .unwrap();
    scope.set_last_processed_height(2).await.unwrap();
    scope.commit().await.unwrap();

    let conn = raw_conn(&dir);
    assert_eq!(tablesql_storage::controller::get(&conn, CHAIN, &TableId::from_u64(1)).unwrap(), None);
}
