use aimem::core::db;
use aimem::core::store::{Store, StoreKind};
use aimem::plugins::guardrails::{
    GuardrailCategory, GuardrailSource, Severity, check_guardrails, list_guardrails,
};
use aimem::plugins::importer::import_eslint_config;
use aimem::plugins::projects::register_project;
use std::fs;
use tempfile::tempdir;

const ESLINTRC: &str = r#"{
    "root": true,
    "extends": ["eslint:recommended"],
    "rules": {
        "no-eval": "error",
        "no-console": ["warn", { "allow": ["error"] }],
        "eqeqeq": 2,
        "no-var": "off",
        "semi": ["error", "always"]
    }
}"#;

#[test]
fn test_import_maps_known_rules() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("data");
    db::initialize_guardrails_db(&root).unwrap();
    let store = Store {
        kind: StoreKind::User,
        root,
    };
    let project = register_project(&store, "web", tmp.path()).unwrap();
    let config = tmp.path().join(".eslintrc.json");
    fs::write(&config, ESLINTRC).unwrap();

    let report = import_eslint_config(&store, project, &config).unwrap();
    assert_eq!(report.imported.len(), 3);
    assert_eq!(report.duplicates, 0);
    assert_eq!(report.disabled, vec!["no-var".to_string()]);
    assert_eq!(report.unknown, vec!["semi".to_string()]);

    let rules = list_guardrails(&store, project, None, false).unwrap();
    assert!(rules.iter().all(|g| g.source == GuardrailSource::Imported));
    let eval = rules
        .iter()
        .find(|g| g.category == GuardrailCategory::Security)
        .unwrap();
    assert_eq!(eval.severity, Severity::Block);
    let console = rules.iter().find(|g| g.rule.contains("console.log")).unwrap();
    assert_eq!(console.severity, Severity::Warn);

    // Re-importing adds nothing.
    let again = import_eslint_config(&store, project, &config).unwrap();
    assert!(again.imported.is_empty());
    assert_eq!(again.duplicates, 3);

    // Imported rules are enforced like any other.
    let hit = check_guardrails(&store, project, "leave a console.log(user) for now", None).unwrap();
    assert_eq!(hit.violations.len(), 1);
    assert_eq!(hit.violations[0].guardrail_id, console.id);
}

#[test]
fn test_missing_or_broken_config_is_an_error() {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("data");
    db::initialize_guardrails_db(&root).unwrap();
    let store = Store {
        kind: StoreKind::User,
        root,
    };
    let project = register_project(&store, "web", tmp.path()).unwrap();
    assert!(import_eslint_config(&store, project, &tmp.path().join("nope.json")).is_err());

    let broken = tmp.path().join("broken.json");
    fs::write(&broken, "{ rules: ").unwrap();
    assert!(import_eslint_config(&store, project, &broken).is_err());
    assert!(list_guardrails(&store, project, None, true).unwrap().is_empty());
}
