use aimem::core::db;
use aimem::core::store::{Store, StoreKind};
use aimem::core::time;
use aimem::plugins::dik::get_project_dik;
use aimem::plugins::guardrails::{
    EventType, GuardrailCategory, GuardrailSource, NewGuardrail, Severity, add_guardrail,
    get_event, list_events, override_guardrail, try_vindicate_override, vindicate_override,
};
use aimem::plugins::projects::register_project;
use aimem::plugins::vindication::{
    CandidateResolution, check_file_for_vindications, expire_old, expire_old_as_of,
    mark_not_vindicated, pending_candidates, record_override_with_snapshot,
};
use rusqlite::params;
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

const ORIGINAL: &str = "function load() {\n  if (!ok) throw new Error(\"boom\");\n  return data;\n}\n";

fn setup() -> (TempDir, Store, i64, i64, String) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("data");
    db::initialize_guardrails_db(&root).unwrap();
    let store = Store {
        kind: StoreKind::User,
        root,
    };
    let project = register_project(&store, "web", tmp.path()).unwrap();
    let guardrail = add_guardrail(
        &store,
        project,
        NewGuardrail {
            category: GuardrailCategory::Design,
            rule: "Recover from transient failures with `retry`".to_string(),
            rationale: None,
            severity: Severity::Warn,
            source: GuardrailSource::Explicit,
        },
    )
    .unwrap();
    let file = tmp.path().join("load.ts");
    fs::write(&file, ORIGINAL).unwrap();
    let file = file.to_string_lossy().to_string();
    (tmp, store, project, guardrail, file)
}

fn overrides_regretted(store: &Store, project: i64) -> i64 {
    get_project_dik(store, project).unwrap().overrides_regretted
}

fn resolution(store: &Store, event: i64) -> Option<CandidateResolution> {
    get_event(store, event)
        .unwrap()
        .and_then(|e| e.candidate())
        .and_then(|c| c.resolution)
}

#[test]
fn test_adopted_suggestion_is_vindicated() {
    let (_tmp, store, project, guardrail, file) = setup();
    let event = record_override_with_snapshot(
        &store,
        guardrail,
        project,
        "throwing is fine here",
        "use retry instead of throw",
        &file,
        2,
        2,
    )
    .unwrap();
    assert_eq!(pending_candidates(&store, project, Some(&file)).unwrap().len(), 1);

    fs::write(&file, ORIGINAL.replace("throw new Error(\"boom\")", "return retry(load)")).unwrap();
    let outcomes = check_file_for_vindications(&store, project, &file).unwrap();
    assert_eq!(outcomes.len(), 1);
    let o = &outcomes[0];
    assert_eq!(o.event_id, event);
    assert!(o.result.vindicated);
    assert_eq!(o.result.confidence, 0.9);
    assert_eq!(o.new_dik_level, Some(3.0));
    assert!(o.error.is_none());

    assert_eq!(overrides_regretted(&store, project), 1);
    assert_eq!(resolution(&store, event), Some(CandidateResolution::Vindicated));
    assert!(pending_candidates(&store, project, None).unwrap().is_empty());

    // Nothing left to check on the next change.
    assert!(check_file_for_vindications(&store, project, &file).unwrap().is_empty());
    assert_eq!(overrides_regretted(&store, project), 1);
}

#[test]
fn test_unrelated_change_is_terminally_not_vindicated() {
    let (_tmp, store, project, guardrail, file) = setup();
    let event = record_override_with_snapshot(
        &store,
        guardrail,
        project,
        "no",
        "use `fetchJson` helper",
        &file,
        2,
        3,
    )
    .unwrap();

    fs::write(&file, ORIGINAL.replace("data", "cached")).unwrap();
    let outcomes = check_file_for_vindications(&store, project, &file).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(!outcomes[0].result.vindicated);
    assert_eq!(outcomes[0].new_dik_level, None);

    assert_eq!(resolution(&store, event), Some(CandidateResolution::NotVindicated));
    assert_eq!(overrides_regretted(&store, project), 0);

    // Resolved candidates cannot be vindicated afterwards.
    assert_eq!(vindicate_override(&store, event, project).unwrap(), 2.0);
    assert_eq!(overrides_regretted(&store, project), 0);
    let vindicated = list_events(&store, guardrail)
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == EventType::Vindicated)
        .count();
    assert_eq!(vindicated, 0);
}

#[test]
fn test_missing_file_leaves_candidates_pending() {
    let (_tmp, store, project, guardrail, file) = setup();
    record_override_with_snapshot(&store, guardrail, project, "no", "use retry instead of throw", &file, 1, 2)
        .unwrap();
    fs::remove_file(&file).unwrap();

    assert!(check_file_for_vindications(&store, project, &file).unwrap().is_empty());
    assert_eq!(pending_candidates(&store, project, Some(&file)).unwrap().len(), 1);
}

#[test]
fn test_snapshot_requires_a_valid_range() {
    let (_tmp, store, project, guardrail, file) = setup();
    assert!(record_override_with_snapshot(&store, guardrail, project, "no", "x", &file, 0, 2).is_err());
    assert!(record_override_with_snapshot(&store, guardrail, project, "no", "x", &file, 3, 2).is_err());
}

#[test]
fn test_resolution_happens_once() {
    let (_tmp, store, project, guardrail, file) = setup();
    let event = record_override_with_snapshot(&store, guardrail, project, "no", "add `retry`", &file, 2, 2)
        .unwrap();
    assert!(mark_not_vindicated(&store, event).unwrap());
    assert!(!mark_not_vindicated(&store, event).unwrap());
    assert_eq!(resolution(&store, event), Some(CandidateResolution::NotVindicated));
}

#[test]
fn test_expire_old_only_touches_stale_candidates() {
    let (_tmp, store, project, guardrail, file) = setup();
    let old = record_override_with_snapshot(&store, guardrail, project, "no", "add `retry`", &file, 2, 2)
        .unwrap();
    let fresh = record_override_with_snapshot(&store, guardrail, project, "no", "add `backoff`", &file, 2, 2)
        .unwrap();

    let conn = db::db_connect(&db::guardrails_db_path(&store.root).to_string_lossy()).unwrap();
    let forty_days_ago = time::epoch_z(time::now_secs() - 40 * time::SECS_PER_DAY);
    conn.execute(
        "UPDATE guardrail_events SET created_at = ?1 WHERE id = ?2",
        params![forty_days_ago, old],
    )
    .unwrap();
    drop(conn);

    assert_eq!(expire_old(&store, project, 30).unwrap(), 1);
    assert_eq!(resolution(&store, old), Some(CandidateResolution::Expired));
    assert_eq!(resolution(&store, fresh), None);

    let pending = pending_candidates(&store, project, None).unwrap();
    assert_eq!(pending.iter().map(|p| p.event_id).collect::<Vec<_>>(), vec![fresh]);
    assert_eq!(overrides_regretted(&store, project), 0);
    assert!(
        list_events(&store, guardrail)
            .unwrap()
            .iter()
            .all(|e| e.event_type != EventType::Vindicated)
    );

    // Nothing more to expire until the clock moves on.
    assert_eq!(expire_old(&store, project, 30).unwrap(), 0);
    let later = time::now_secs() + 31 * time::SECS_PER_DAY;
    assert_eq!(expire_old_as_of(&store, project, 30, later).unwrap(), 1);
    assert!(pending_candidates(&store, project, None).unwrap().is_empty());
}

#[test]
fn test_malformed_candidate_is_skipped() {
    let (_tmp, store, project, guardrail, file) = setup();
    let broken = override_guardrail(&store, guardrail, project, "no").unwrap();
    let good = record_override_with_snapshot(&store, guardrail, project, "no", "add `retry`", &file, 2, 2)
        .unwrap();

    let conn = db::db_connect(&db::guardrails_db_path(&store.root).to_string_lossy()).unwrap();
    conn.execute(
        "UPDATE guardrail_events SET metadata = '{not json' WHERE id = ?1",
        params![broken],
    )
    .unwrap();
    drop(conn);

    let pending = pending_candidates(&store, project, None).unwrap();
    assert_eq!(pending.iter().map(|p| p.event_id).collect::<Vec<_>>(), vec![good]);
}

#[test]
fn test_candidate_is_found_under_any_spelling_of_its_file() {
    let (tmp, store, project, guardrail, _file) = setup();
    let dotted = tmp.path().join(".").join("load.ts").to_string_lossy().to_string();
    let event = record_override_with_snapshot(
        &store,
        guardrail,
        project,
        "throwing is fine here",
        "use retry instead of throw",
        &dotted,
        2,
        2,
    )
    .unwrap();
    let candidate = get_event(&store, event).unwrap().and_then(|e| e.candidate()).unwrap();
    assert_eq!(candidate.file_path, "load.ts");

    let roundabout = tmp.path().join("nested").join("..").join("load.ts");
    let roundabout = roundabout.to_string_lossy().to_string();
    assert_eq!(pending_candidates(&store, project, Some(&roundabout)).unwrap().len(), 1);

    let plain = tmp.path().join("load.ts");
    fs::write(&plain, ORIGINAL.replace("throw new Error(\"boom\")", "return retry(load)")).unwrap();
    let outcomes = check_file_for_vindications(&store, project, &plain.to_string_lossy()).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].event_id, event);
    assert!(outcomes[0].result.vindicated);
    assert_eq!(resolution(&store, event), Some(CandidateResolution::Vindicated));
}

#[test]
fn test_vindicating_a_resolved_override_writes_nothing() {
    let (_tmp, store, project, guardrail, file) = setup();
    let event = record_override_with_snapshot(&store, guardrail, project, "no", "add `retry`", &file, 2, 2)
        .unwrap();

    // Another resolver got there first.
    assert!(mark_not_vindicated(&store, event).unwrap());
    assert_eq!(try_vindicate_override(&store, event, project).unwrap(), None);
    assert_eq!(overrides_regretted(&store, project), 0);

    let other = record_override_with_snapshot(&store, guardrail, project, "no", "add `backoff`", &file, 2, 2)
        .unwrap();
    assert_eq!(try_vindicate_override(&store, other, project).unwrap(), Some(3.0));
    assert_eq!(try_vindicate_override(&store, other, project).unwrap(), None);
    assert_eq!(overrides_regretted(&store, project), 1);
}
