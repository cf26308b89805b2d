use aimem::core::config::Thresholds;
use aimem::core::db;
use aimem::core::store::{Store, StoreKind};
use aimem::plugins::analyzer::{analyze_project, analyze_structures, save_proposed_rules};
use aimem::plugins::dik::get_project_dik;
use aimem::plugins::guardrails::{GuardrailCategory, GuardrailSource, Severity, list_guardrails};
use aimem::plugins::projects::{CodeStructure, register_project, replace_structures};
use std::fs;
use std::path::Path;
use tempfile::{TempDir, tempdir};

fn fresh_store() -> (TempDir, Store) {
    let tmp = tempdir().unwrap();
    let root = tmp.path().join("data");
    db::initialize_guardrails_db(&root).unwrap();
    let store = Store {
        kind: StoreKind::User,
        root,
    };
    (tmp, store)
}

fn api_functions() -> Vec<CodeStructure> {
    ["getUser", "getOrder", "getCart", "getItem", "getPrice", "saveUser"]
        .iter()
        .enumerate()
        .map(|(i, name)| {
            CodeStructure::new("function", name, &format!("src/api/mod{}.ts", i), "")
        })
        .collect()
}

#[test]
fn test_naming_and_architecture_proposals() {
    let proposals = analyze_structures(
        &api_functions(),
        &[GuardrailCategory::Architecture, GuardrailCategory::Naming],
        &Thresholds::default(),
    );
    let rules: Vec<&str> = proposals.iter().map(|p| p.rule.as_str()).collect();
    assert_eq!(
        rules,
        vec![
            "Place function definitions in `api/`",
            "Functions and methods use camelCase naming",
            "Start accessor function names with the get prefix",
        ]
    );
    assert_eq!(proposals[0].evidence.len(), 3);
    assert_eq!(proposals[1].confidence, 1.0);
    assert_eq!(proposals[2].confidence, 0.6);
}

#[test]
fn test_design_and_performance_propose_nothing() {
    let proposals = analyze_structures(
        &api_functions(),
        &[GuardrailCategory::Design, GuardrailCategory::Performance],
        &Thresholds::default(),
    );
    assert!(proposals.is_empty());
    assert!(analyze_structures(&[], &GuardrailCategory::ALL, &Thresholds::default()).is_empty());
}

#[test]
fn test_security_scan_needs_enough_hits() {
    let mut structures = vec![
        CodeStructure::new("function", "listUsers", "src/routes/users.ts", "router.use(authMiddleware)"),
        CodeStructure::new("function", "listOrders", "src/routes/orders.ts", "router.use(authMiddleware)"),
    ];
    let proposals = analyze_structures(&structures, &[GuardrailCategory::Security], &Thresholds::default());
    assert_eq!(proposals.len(), 1);
    assert!(proposals[0].rule.contains("auth middleware"));

    structures.truncate(1);
    let proposals = analyze_structures(&structures, &[GuardrailCategory::Security], &Thresholds::default());
    assert!(proposals.is_empty());
}

#[test]
fn test_testing_layout_is_detected() {
    let structures = vec![
        CodeStructure::new("function", "itWorks", "src/__tests__/a.test.ts", ""),
        CodeStructure::new("function", "itFails", "src/__tests__/b.test.ts", ""),
        CodeStructure::new("function", "itRetries", "lib/__tests__/c.test.ts", ""),
        CodeStructure::new("function", "run", "src/run.ts", ""),
    ];
    let proposals = analyze_structures(&structures, &[GuardrailCategory::Testing], &Thresholds::default());
    assert_eq!(proposals.len(), 1);
    assert!(proposals[0].rule.contains("__tests__/"));
    assert_eq!(proposals[0].confidence, 1.0);
}

#[test]
fn test_analysis_is_deterministic() {
    let t = Thresholds::default();
    let a = analyze_structures(&api_functions(), &GuardrailCategory::ALL, &t);
    let b = analyze_structures(&api_functions(), &GuardrailCategory::ALL, &t);
    assert_eq!(a, b);
}

#[test]
fn test_save_skips_known_rules_and_counts_inferred() {
    let (_tmp, store) = fresh_store();
    let id = register_project(&store, "web", Path::new("/work/web")).unwrap();
    replace_structures(&store, id, &api_functions()).unwrap();

    let proposals = analyze_project(&store, id, &GuardrailCategory::ALL).unwrap();
    let saved = save_proposed_rules(&store, id, &proposals).unwrap();
    assert_eq!(saved.len(), proposals.len());
    assert_eq!(get_project_dik(&store, id).unwrap().rules_inferred, saved.len() as i64);

    let again = save_proposed_rules(&store, id, &proposals).unwrap();
    assert!(again.is_empty());
    assert_eq!(get_project_dik(&store, id).unwrap().rules_inferred, saved.len() as i64);

    let stored = list_guardrails(&store, id, None, true).unwrap();
    assert!(stored.iter().all(|g| g.source == GuardrailSource::Inferred));
    assert!(stored.iter().all(|g| g.severity == Severity::Warn && !g.confirmed));
}

#[test]
fn test_config_thresholds_change_proposals() {
    let (_tmp, store) = fresh_store();
    let id = register_project(&store, "web", Path::new("/work/web")).unwrap();
    replace_structures(&store, id, &api_functions()).unwrap();
    fs::write(
        store.root.join("config.toml"),
        "[thresholds]\nverb_prefix_min_uses = 6\n",
    )
    .unwrap();

    let proposals = analyze_project(&store, id, &[GuardrailCategory::Naming]).unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].rule, "Functions and methods use camelCase naming");
}

fn structures(kind: &str, names: &[&str], dir: &str) -> Vec<CodeStructure> {
    names
        .iter()
        .map(|name| CodeStructure::new(kind, name, &format!("{}/{}.ts", dir, name), ""))
        .collect()
}

fn rules_for(structures: &[CodeStructure], category: GuardrailCategory) -> Vec<String> {
    analyze_structures(structures, &[category], &Thresholds::default())
        .into_iter()
        .map(|p| p.rule)
        .collect()
}

#[test]
fn test_unclassified_function_names_count_toward_share() {
    let functions = structures("function", &["run", "getA", "getB", "getC", "getD"], "src");
    let proposals = analyze_structures(&functions, &[GuardrailCategory::Naming], &Thresholds::default());
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].rule, "Functions and methods use camelCase naming");
    assert_eq!(proposals[0].confidence, 0.8);
    assert!(proposals[0].rationale.starts_with("4 of 5 "));
}

#[test]
fn test_function_naming_needs_five_items() {
    let functions = structures("function", &["renderA", "renderB", "renderC", "renderD"], "src");
    assert!(rules_for(&functions, GuardrailCategory::Naming).is_empty());

    let functions = structures("function", &["renderA", "renderB", "renderC", "renderD", "renderE"], "src");
    assert_eq!(
        rules_for(&functions, GuardrailCategory::Naming),
        vec!["Functions and methods use camelCase naming"]
    );
}

#[test]
fn test_function_naming_share_of_exactly_seventy_percent_is_not_enough() {
    let names = [
        "renderA", "renderB", "renderC", "renderD", "renderE", "renderF", "renderG", "run", "stop", "go",
    ];
    assert!(rules_for(&structures("function", &names, "src"), GuardrailCategory::Naming).is_empty());

    let names = [
        "renderA", "renderB", "renderC", "renderD", "renderE", "renderF", "renderG", "renderH", "run", "go",
    ];
    assert_eq!(
        rules_for(&structures("function", &names, "src"), GuardrailCategory::Naming),
        vec!["Functions and methods use camelCase naming"]
    );
}

#[test]
fn test_class_naming_share_of_exactly_eighty_percent_is_not_enough() {
    let classes = structures("class", &["UserCard", "OrderCard", "CartCard", "ItemCard", "widget"], "src");
    assert!(rules_for(&classes, GuardrailCategory::Naming).is_empty());

    let classes = structures("class", &["UserCard", "OrderCard", "CartCard"], "src");
    assert_eq!(
        rules_for(&classes, GuardrailCategory::Naming),
        vec!["Classes and structs use PascalCase naming"]
    );
    assert!(rules_for(&classes[..2], GuardrailCategory::Naming).is_empty());
}

#[test]
fn test_architecture_dominance_boundary() {
    let mut mixed = structures("function", &["a1", "a2", "a3", "a4", "a5", "a6", "a7"], "src/models");
    mixed.extend(structures("class", &["B1", "B2", "B3"], "src/models"));
    assert!(rules_for(&mixed, GuardrailCategory::Architecture).is_empty());

    let mut mixed = structures("function", &["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8"], "src/models");
    mixed.extend(structures("class", &["B1", "B2"], "src/models"));
    assert_eq!(
        rules_for(&mixed, GuardrailCategory::Architecture),
        vec!["Place function definitions in `models/`"]
    );
}

#[test]
fn test_architecture_needs_three_occurrences() {
    let two = structures("function", &["a1", "a2"], "src/models");
    assert!(rules_for(&two, GuardrailCategory::Architecture).is_empty());

    let three = structures("function", &["a1", "a2", "a3"], "src/models");
    assert_eq!(rules_for(&three, GuardrailCategory::Architecture).len(), 1);
}

#[test]
fn test_architecture_groups_by_full_directory() {
    let mut split = structures("function", &["a1", "a2"], "src/a/utils");
    split.extend(structures("function", &["b1", "b2"], "lib/utils"));
    assert!(rules_for(&split, GuardrailCategory::Architecture).is_empty());

    split.extend(structures("function", &["b3"], "lib/utils"));
    let proposals = analyze_structures(&split, &[GuardrailCategory::Architecture], &Thresholds::default());
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].rule, "Place function definitions in `utils/`");
    assert!(proposals[0].evidence.iter().all(|p| p.starts_with("lib/utils/")));
}

#[test]
fn test_testing_layout_needs_three_files() {
    let two = vec![
        CodeStructure::new("function", "itWorks", "src/__tests__/a.test.ts", ""),
        CodeStructure::new("function", "itFails", "src/__tests__/b.test.ts", ""),
    ];
    assert!(rules_for(&two, GuardrailCategory::Testing).is_empty());

    let mut three = two;
    three.push(CodeStructure::new("function", "itRetries", "src/__tests__/c.test.ts", ""));
    assert_eq!(rules_for(&three, GuardrailCategory::Testing).len(), 1);
}

#[test]
fn test_validation_scan_needs_three_hits() {
    let mut structures = vec![
        CodeStructure::new("function", "parseBody", "src/body.ts", "validate(body)"),
        CodeStructure::new("function", "parseQuery", "src/query.ts", "sanitize(query)"),
    ];
    assert!(rules_for(&structures, GuardrailCategory::Security).is_empty());

    structures.push(CodeStructure::new("function", "renderName", "src/name.ts", "escape(name)"));
    assert_eq!(
        rules_for(&structures, GuardrailCategory::Security),
        vec!["Sanitize and validate external input before it reaches business logic"]
    );
}
