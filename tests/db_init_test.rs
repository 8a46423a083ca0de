mod helpers;

use helpers::test_db;

fn table_names(conn: &rusqlite::Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'index') ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn full_schema_creates_all_tables_and_indexes() {
    let conn = test_db();
    let names = table_names(&conn);

    for expected in [
        "project",
        "entity",
        "observation",
        "relation",
        "schema_meta",
        "search_index",
        "idx_entity_project",
        "idx_entity_title",
        "idx_observation_entity",
        "idx_relation_from",
        "idx_relation_to",
        "idx_relation_to_name",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
}

#[test]
fn schema_init_is_idempotent() {
    let conn = test_db();
    grimoire::db::schema::init_schema(&conn).unwrap();
    grimoire::db::schema::init_schema(&conn).unwrap();

    let versions: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(versions, 1);
}

#[test]
fn search_index_is_full_text() {
    let conn = test_db();
    conn.execute(
        "INSERT INTO search_index (id, type, title, content_stems, project_id) \
         VALUES (1, 'entity', 'Graph Traversal', 'graph traversal', 1)",
        [],
    )
    .unwrap();

    let hits: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM search_index WHERE search_index MATCH 'trav*'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(hits, 1);
}

#[test]
fn deleting_an_entity_cascades_and_unlinks() {
    let conn = test_db();
    let project = helpers::project(&conn, "main");
    let a = helpers::note(&conn, project, "Alpha");
    let b = helpers::note(&conn, project, "Beta");
    grimoire::knowledge::store::add_observation(&conn, project, a, "note", "alpha fact", &[]).unwrap();
    grimoire::knowledge::store::add_relation(&conn, project, a, "Beta", "links_to", None).unwrap();
    grimoire::knowledge::store::add_relation(&conn, project, b, "Alpha", "links_to", None).unwrap();

    grimoire::knowledge::store::delete_entity(&conn, project, a).unwrap();

    let count = |sql: &str| -> i64 { conn.query_row(sql, [], |row| row.get(0)).unwrap() };
    assert_eq!(count("SELECT COUNT(*) FROM observation"), 0);
    // b's incoming edge survives, unresolved
    assert_eq!(count("SELECT COUNT(*) FROM relation"), 1);
    assert_eq!(count("SELECT COUNT(*) FROM relation WHERE to_id IS NULL"), 1);
}
