use aimem::core::broker;
use aimem::core::db;
use aimem::core::store::{Store, StoreKind};
use aimem::plugins::projects::{
    CodeStructure, detect_project, get_project, list_projects, list_structures, register_project,
    replace_structures,
};
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

#[test]
fn test_register_is_idempotent_on_path() {
    let (_tmp, store) = fresh_store();
    let a = register_project(&store, "web", Path::new("/work/web")).unwrap();
    let b = register_project(&store, "web-again", Path::new("/work/web/")).unwrap();
    assert_eq!(a, b);

    let projects = list_projects(&store).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "web");
    assert_eq!(get_project(&store, a).unwrap().unwrap().path, "/work/web");
    assert!(get_project(&store, a + 100).unwrap().is_none());
}

#[test]
fn test_detect_prefers_longest_prefix() {
    let (_tmp, store) = fresh_store();
    register_project(&store, "mono", Path::new("/work/mono")).unwrap();
    let inner = register_project(&store, "api", Path::new("/work/mono/services/api")).unwrap();

    let hit = detect_project(&store, Path::new("/work/mono/services/api/src")).unwrap();
    assert_eq!(hit.map(|p| p.id), Some(inner));

    let outer = detect_project(&store, Path::new("/work/mono/docs")).unwrap();
    assert_eq!(outer.map(|p| p.name), Some("mono".to_string()));

    // Component-wise: /work/mono-old is not inside /work/mono.
    assert!(detect_project(&store, Path::new("/work/mono-old")).unwrap().is_none());
}

#[test]
fn test_replace_structures_swaps_the_whole_set() {
    let (_tmp, store) = fresh_store();
    let id = register_project(&store, "web", Path::new("/work/web")).unwrap();

    let first = vec![
        CodeStructure::new("function", "getUser", "src/api/users.ts", "export function getUser() {}"),
        CodeStructure::new("class", "UserStore", "src/stores/user.ts", ""),
    ];
    assert_eq!(replace_structures(&store, id, &first).unwrap(), 2);
    assert_eq!(list_structures(&store, id).unwrap(), first);

    let second = vec![CodeStructure::new("function", "saveUser", "src/api/users.ts", "")];
    replace_structures(&store, id, &second).unwrap();
    assert_eq!(list_structures(&store, id).unwrap(), second);
}

#[test]
fn test_every_access_is_audited() {
    let (_tmp, store) = fresh_store();
    register_project(&store, "web", Path::new("/work/web")).unwrap();
    list_projects(&store).unwrap();

    let ops: Vec<String> = broker::read_audit_log(&store.root)
        .unwrap()
        .into_iter()
        .map(|e| e.op)
        .collect();
    assert!(ops.contains(&"guardrails.init".to_string()));
    assert!(ops.contains(&"project.register".to_string()));
    assert!(ops.contains(&"project.list".to_string()));
}
