mod helpers;

use grimoire::knowledge::store;
use grimoire::search::{SearchQuery, SearchService};
use helpers::{load, note, project, test_db, MapContent};

#[test]
fn relation_resolves_by_title_or_permalink() {
    let conn = test_db();
    let p = project(&conn, "main");
    let alice = note(&conn, p, "Alice");
    let acme = note(&conn, p, "Acme Corp");

    store::add_relation(&conn, p, alice, "Acme Corp", "works_at", None).unwrap();
    store::add_relation(&conn, p, alice, "acme-corp", "invested_in", Some("2025")).unwrap();

    let entity = load(&conn, p, alice);
    assert_eq!(entity.relations.len(), 2);
    for relation in &entity.relations {
        assert_eq!(relation.to_id, Some(acme));
        assert_eq!(relation.to_title.as_deref(), Some("Acme Corp"));
        assert!(relation.permalink.as_deref().unwrap().starts_with("alice/"));
    }
}

#[test]
fn relation_insert_is_idempotent() {
    let conn = test_db();
    let p = project(&conn, "main");
    let a = note(&conn, p, "Entity A");
    note(&conn, p, "Entity B");

    let first = store::add_relation(&conn, p, a, "Entity B", "knows", None).unwrap();
    let second = store::add_relation(&conn, p, a, "Entity B", "knows", None).unwrap();
    assert_eq!(first, second);
    assert_eq!(load(&conn, p, a).relations.len(), 1);
}

#[test]
fn forward_reference_resolves_later_and_reindexes() {
    let conn = test_db();
    let p = project(&conn, "main");
    let draft = note(&conn, p, "Draft Plan");
    store::add_relation(&conn, p, draft, "Final Plan", "precedes", None).unwrap();

    let content = MapContent::default();
    let service = SearchService::new(&conn, p, &content);
    service.reindex_all().unwrap();

    let relation = &load(&conn, p, draft).relations[0];
    assert!(!relation.is_resolved());
    let hits = service.search(&SearchQuery::title("Draft Plan → Final Plan"), 10, 0).unwrap();
    assert!(hits.is_empty());

    let target = note(&conn, p, "Final Plan");
    let changed = store::resolve_relations(&conn, p).unwrap();
    assert_eq!(changed, vec![draft]);
    for id in changed {
        service.index_entity(&load(&conn, p, id)).unwrap();
    }

    let relation = &load(&conn, p, draft).relations[0];
    assert_eq!(relation.to_id, Some(target));
    let hits = service.search(&SearchQuery::title("Draft Plan → Final Plan"), 10, 0).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].entity_id, draft);

    // nothing left to resolve
    assert!(store::resolve_relations(&conn, p).unwrap().is_empty());
}

#[test]
fn relations_do_not_resolve_across_projects() {
    let conn = test_db();
    let a = project(&conn, "a");
    let b = project(&conn, "b");
    let source = note(&conn, a, "Source");
    note(&conn, b, "Target");

    store::add_relation(&conn, a, source, "Target", "links_to", None).unwrap();
    assert!(!load(&conn, a, source).relations[0].is_resolved());
    assert!(store::resolve_relations(&conn, a).unwrap().is_empty());
}
