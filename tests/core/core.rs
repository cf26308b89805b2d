use aimem::core::broker::{self, BrokerEvent, DbBroker};
use aimem::core::config::{self, Thresholds};
use aimem::core::db;
use aimem::core::error::AimemError;
use aimem::core::schemas;
use aimem::core::store::{REPO_MARKER_DIR, find_repo_root};
use aimem::core::time;
use rusqlite::params;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn db_init_is_repeatable_and_hardened() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().join("data");

    db::initialize_guardrails_db(&root).expect("first init");
    db::initialize_guardrails_db(&root).expect("second init");
    let db_path = db::guardrails_db_path(&root);
    assert!(db_path.ends_with(schemas::GUARDRAILS_DB_NAME));

    let conn = db::db_connect(&db_path.to_string_lossy()).expect("db connect");
    let fk_on: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("pragma foreign_keys");
    assert_eq!(fk_on, 1);
    let mode: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("pragma journal_mode");
    assert_eq!(mode.to_lowercase(), "wal");

    for table in ["projects", "structures", "guardrails", "guardrail_events", "project_dik"] {
        let n: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .expect("sqlite_master");
        assert_eq!(n, 1, "missing table {}", table);
    }

    // Events must reference a real guardrail.
    let orphan = conn.execute(
        "INSERT INTO guardrail_events(guardrail_id, event_type, dik_level, created_at) VALUES(42, 'triggered', 2.0, '0Z')",
        [],
    );
    assert!(orphan.is_err());
}

#[test]
fn broker_audits_success_and_failure() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    db::initialize_guardrails_db(root).expect("init");
    let db_path = db::guardrails_db_path(root);

    let broker = DbBroker::new(root);
    broker
        .with_conn(&db_path, "tester", Some("intent-1"), "project.insert", |conn| {
            conn.execute(
                "INSERT INTO projects(name, path, created_at) VALUES(?1, ?2, ?3)",
                params!["web", "/work/web", time::now_epoch_z()],
            )?;
            Ok(())
        })
        .expect("broker success path");

    let result: Result<(), AimemError> = broker.with_conn(&db_path, "tester", None, "project.fail", |_| {
        Err(AimemError::ValidationError("intentional".to_string()))
    });
    assert!(result.is_err());

    let events: Vec<BrokerEvent> = broker::read_audit_log(root).expect("read audit");
    let insert = events.iter().find(|e| e.op == "project.insert").expect("insert audited");
    assert_eq!(insert.status, "success");
    assert_eq!(insert.intent_ref.as_deref(), Some("intent-1"));
    assert_eq!(insert.db_id, schemas::GUARDRAILS_DB_NAME);
    let fail = events.iter().find(|e| e.op == "project.fail").expect("failure audited");
    assert_eq!(fail.status, "error");
    assert!(events.iter().all(|e| !e.event_id.is_empty()));
}

#[test]
fn audit_log_skips_garbage_lines() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    assert!(broker::read_audit_log(root).expect("no log yet").is_empty());
    db::initialize_guardrails_db(root).expect("init");
    let log = root.join(broker::AUDIT_LOG_NAME);
    let mut content = fs::read_to_string(&log).expect("read log");
    content.push_str("not json\n");
    fs::write(&log, content).expect("write log");
    assert_eq!(broker::read_audit_log(root).expect("read").len(), 1);
}

#[test]
fn broker_serializes_threads_in_one_process() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().to_path_buf();
    db::initialize_guardrails_db(&root).expect("init");
    let db_path = db::guardrails_db_path(&root);
    let broker = Arc::new(DbBroker::new(&root));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let broker = Arc::clone(&broker);
            let db_path = db_path.clone();
            std::thread::spawn(move || {
                broker.with_conn(&db_path, "tester", None, "project.insert", |conn| {
                    conn.execute(
                        "INSERT INTO projects(name, path, created_at) VALUES(?1, ?2, '0Z')",
                        params![format!("p{}", i), format!("/work/p{}", i)],
                    )?;
                    Ok(())
                })
            })
        })
        .collect();
    for h in handles {
        h.join().expect("thread").expect("insert");
    }

    let conn = db::db_connect(&db_path.to_string_lossy()).expect("connect");
    let n: i64 = conn
        .query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
        .expect("count");
    assert_eq!(n, 4);
}

#[test]
fn repo_root_is_found_by_marker() {
    let tmp = tempdir().expect("tempdir");
    let repo = tmp.path().join("repo");
    let nested = repo.join("src").join("deep");
    fs::create_dir_all(&nested).expect("mkdir");
    assert_ne!(find_repo_root(&nested), Some(repo.clone()));

    fs::create_dir_all(repo.join(REPO_MARKER_DIR)).expect("marker");
    assert_eq!(find_repo_root(&nested), Some(repo));
}

#[test]
fn config_rejects_inverted_bands() {
    let tmp = tempdir().expect("tempdir");
    fs::write(
        config::config_path(tmp.path()),
        "[thresholds]\nvindication = 0.5\npartial_match = 0.6\n",
    )
    .expect("write config");
    assert!(matches!(
        config::load_config(tmp.path()),
        Err(AimemError::ValidationError(_))
    ));

    fs::write(config::config_path(tmp.path()), "[thresholds\n").expect("write config");
    assert!(matches!(
        config::load_config(tmp.path()),
        Err(AimemError::ConfigError(_))
    ));

    fs::remove_file(config::config_path(tmp.path())).expect("rm");
    assert_eq!(config::load_config(tmp.path()).expect("defaults").thresholds, Thresholds::default());
}

#[test]
fn epoch_z_round_trips() {
    let now = time::now_secs();
    assert_eq!(time::parse_epoch_z(&time::epoch_z(now)), Some(now));
    assert_eq!(time::parse_epoch_z("yesterday"), None);
}
