// Test suite for save orchestration
// Covers atomicity, upsert semantics, delete ordering, translation cascade,
// audit trails, identifier rejection, backfill, and logging boundaries

use instructa_core::logging_facility::test_capture::init_test_capture;
use instructa_core::{ProjectChanges, SaveConfig, SaveResult};
use instructa_engine::commands::engine_command::handle_json_command;
use instructa_engine::commands::save::OP_SAVE_PROJECT_DATA;
use instructa_engine::{apply_changes, save_project_data};
use instructa_store::{db, migrations};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use tempfile::TempDir;

const OLD_STAMP: &str = "2000-01-01T00:00:00.000Z";

fn setup_project() -> (TempDir, Connection) {
    let temp_dir = TempDir::new().unwrap();
    let mut conn = db::open(temp_dir.path().join("project.db")).unwrap();
    migrations::apply_migrations(&mut conn).unwrap();

    // Parents before children for the foreign keys
    conn.execute_batch(&format!(
        r#"
        INSERT INTO instructions (id, name, source_language, updated_at)
        VALUES ('i1', 'Pump assembly', 'de', '{stamp}'),
               ('i2', 'Valve service', 'en', '{stamp}');
        INSERT INTO steps (id, instruction_id, step_number, title, description)
        VALUES ('s1', 'i1', 1, 'Mount housing', 'Use the M6 bolts');
        INSERT INTO substeps (id, step_id, substep_number, title)
        VALUES ('ss1', 's1', 1, 'Place bracket');
        INSERT INTO translations (id, entity_type, entity_id, language_code, field_name, text)
        VALUES ('t1', 'step', 's1', 'en', 'title', 'Mount housing'),
               ('t2', 'substep', 'ss1', 'en', 'title', 'Place bracket'),
               ('t3', 'step', 'other', 'en', 'title', 'Unrelated');
        "#,
        stamp = OLD_STAMP
    ))
    .unwrap();

    (temp_dir, conn)
}

fn batch(value: serde_json::Value) -> ProjectChanges {
    serde_json::from_value(value).unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| {
        row.get(0)
    })
    .unwrap()
}

fn text_column(conn: &Connection, table: &str, column: &str, id: &str) -> Option<String> {
    conn.query_row(
        &format!("SELECT \"{}\" FROM \"{}\" WHERE id = ?1", column, table),
        [id],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()
    .unwrap()
    .flatten()
}

fn row_exists(conn: &Connection, table: &str, id: &str) -> bool {
    conn.query_row(
        &format!("SELECT 1 FROM \"{}\" WHERE id = ?1", table),
        [id],
        |_| Ok(()),
    )
    .optional()
    .unwrap()
    .is_some()
}

fn total_rows(conn: &Connection) -> i64 {
    [
        "instructions",
        "steps",
        "substeps",
        "substep_images",
        "viewport_keyframes",
        "translations",
        "audit_steps",
        "audit_substeps",
    ]
    .iter()
    .map(|table| count(conn, table))
    .sum()
}

#[test]
fn test_renamed_step_keeps_other_columns() {
    // Given: steps has row {id: s1, name: "Old Name"}
    // When: a batch renames s1
    // Then: success, name updated, step_number untouched
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        r#"
        CREATE TABLE steps (id TEXT PRIMARY KEY, name TEXT, step_number INTEGER);
        INSERT INTO steps (id, name, step_number) VALUES ('s1', 'Old Name', 4);
        "#,
    )
    .unwrap();

    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s1", "name": "New Name" }] },
        "deleted": {}
    }));
    let result = save_project_data(&mut conn, &changes, &SaveConfig::new(["steps"]));

    assert_eq!(result, SaveResult::ok());
    assert_eq!(text_column(&conn, "steps", "name", "s1").as_deref(), Some("New Name"));
    let step_number: i64 = conn
        .query_row("SELECT step_number FROM steps WHERE id = 's1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(step_number, 4);
}

#[test]
fn test_partial_upsert_leaves_absent_columns_untouched() {
    let (_dir, mut conn) = setup_project();

    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s1", "title": "Mount housing (revised)" }] }
    }));
    let result = save_project_data(&mut conn, &changes, &SaveConfig::instruction_project());

    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        text_column(&conn, "steps", "title", "s1").as_deref(),
        Some("Mount housing (revised)")
    );
    assert_eq!(
        text_column(&conn, "steps", "description", "s1").as_deref(),
        Some("Use the M6 bolts")
    );
    assert_eq!(
        text_column(&conn, "steps", "instruction_id", "s1").as_deref(),
        Some("i1")
    );
}

#[test]
fn test_upsert_is_idempotent() {
    let (_dir, mut conn) = setup_project();
    let config = SaveConfig::new(["steps"]);
    let changes = batch(json!({
        "changed": {
            "steps": [{ "id": "s2", "instruction_id": "i1", "step_number": 2, "title": "Tighten" }]
        }
    }));

    assert!(save_project_data(&mut conn, &changes, &config).success);
    let first = instructa_store::ProjectRepo::read_row(
        &conn,
        "steps",
        &instructa_core::StorageValue::Text("s2".to_string()),
    )
    .unwrap();

    assert!(save_project_data(&mut conn, &changes, &config).success);
    let second = instructa_store::ProjectRepo::read_row(
        &conn,
        "steps",
        &instructa_core::StorageValue::Text("s2".to_string()),
    )
    .unwrap();

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(count(&conn, "steps"), 2);
}

#[test]
fn test_booleans_are_stored_as_integers() {
    let (_dir, mut conn) = setup_project();
    let changes = batch(json!({
        "changed": {
            "substeps": [
                { "id": "ss1", "is_optional": true },
                { "id": "ss2", "step_id": "s1", "substep_number": 2, "is_optional": false }
            ]
        }
    }));

    assert!(save_project_data(&mut conn, &changes, &SaveConfig::new(["substeps"])).success);

    let stored: Vec<(String, i64, String)> = conn
        .prepare("SELECT id, is_optional, typeof(is_optional) FROM substeps ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        stored,
        vec![
            ("ss1".to_string(), 1, "integer".to_string()),
            ("ss2".to_string(), 0, "integer".to_string()),
        ]
    );
}

#[test]
fn test_updated_at_only_touches_saved_instruction() {
    let (_dir, mut conn) = setup_project();
    let changes = batch(json!({
        "changed": { "instruction": [{ "id": "i1", "name": "Pump assembly v2" }] }
    }));

    assert!(save_project_data(&mut conn, &changes, &SaveConfig::default()).success);

    let touched = text_column(&conn, "instructions", "updated_at", "i1").unwrap();
    assert_ne!(touched, OLD_STAMP);
    assert!(touched.ends_with('Z'));
    assert_eq!(
        text_column(&conn, "instructions", "updated_at", "i2").as_deref(),
        Some(OLD_STAMP)
    );
}

#[test]
fn test_delete_order_prevents_foreign_key_failures() {
    let (_dir, mut conn) = setup_project();
    let config = SaveConfig::new(["substeps", "translations", "steps"]);
    // Parent listed first in the batch; the configured order still wins
    let changes = ProjectChanges::new()
        .with_deleted("steps", ["s1"])
        .with_deleted("substeps", ["ss1"]);

    let result = save_project_data(&mut conn, &changes, &config);

    assert!(result.success, "{:?}", result.error);
    assert!(!row_exists(&conn, "steps", "s1"));
    assert!(!row_exists(&conn, "substeps", "ss1"));
}

#[test]
fn test_wrong_delete_order_rolls_back_everything() {
    let (_dir, mut conn) = setup_project();
    let config = SaveConfig::new(["steps", "substeps"]);
    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s1", "title": "Changed" }] },
        "deleted": { "steps_ids": ["s1"], "substeps_ids": ["ss1"] }
    }));
    let before = total_rows(&conn);

    let result = save_project_data(&mut conn, &changes, &config);

    assert!(!result.success);
    assert!(result.error.unwrap().contains("ERR_CONSTRAINT_VIOLATION"));
    assert_eq!(total_rows(&conn), before);
    assert_eq!(
        text_column(&conn, "steps", "title", "s1").as_deref(),
        Some("Mount housing")
    );
    assert!(conn.is_autocommit());
}

#[test]
fn test_failure_mid_batch_leaves_database_unchanged() {
    // Given: a valid instruction edit followed by a step with a dangling FK
    // When: the batch is saved
    // Then: the instruction edit is rolled back along with everything else
    let (_dir, mut conn) = setup_project();
    let changes = batch(json!({
        "changed": {
            "instruction": [{ "id": "i1", "name": "Renamed" }],
            "steps": [{ "id": "s9", "instruction_id": "no-such-instruction" }]
        }
    }));
    let before = total_rows(&conn);

    let result = save_project_data(&mut conn, &changes, &SaveConfig::instruction_project());

    assert!(!result.success);
    assert_eq!(total_rows(&conn), before);
    assert_eq!(
        text_column(&conn, "instructions", "name", "i1").as_deref(),
        Some("Pump assembly")
    );
    assert_eq!(
        text_column(&conn, "instructions", "updated_at", "i1").as_deref(),
        Some(OLD_STAMP)
    );
}

#[test]
fn test_translation_cascade_follows_cleanup_flag() {
    let (_dir, mut conn) = setup_project();
    let changes = ProjectChanges::new().with_deleted("substeps", ["ss1"]);

    let keep = SaveConfig::new(["substeps"]).with_translation_cleanup(false);
    assert!(save_project_data(&mut conn, &changes, &keep).success);
    assert!(row_exists(&conn, "translations", "t2"));

    // Re-create and delete again with cleanup on
    conn.execute(
        "INSERT INTO substeps (id, step_id, substep_number) VALUES ('ss1', 's1', 1)",
        [],
    )
    .unwrap();
    assert!(save_project_data(&mut conn, &changes, &SaveConfig::new(["substeps"])).success);
    assert!(!row_exists(&conn, "translations", "t2"));
    assert!(row_exists(&conn, "translations", "t1"));
    assert!(row_exists(&conn, "translations", "t3"));
}

#[test]
fn test_audit_rows_for_create_update_delete() {
    // Given: steps audited into audit_steps
    // When: s2 is created, updated, then deleted in three saves
    // Then: exactly three audit rows, the last a full copy of the deleted row
    let (_dir, mut conn) = setup_project();
    let config = SaveConfig::instruction_project();

    let create = batch(json!({
        "changed": { "steps": [{ "id": "s2", "instruction_id": "i1", "title": "Tighten" }] }
    }));
    let update = batch(json!({
        "changed": { "steps": [{ "id": "s2", "title": "Tighten firmly" }] }
    }));
    let delete = ProjectChanges::new().with_deleted("steps", ["s2"]);

    for changes in [&create, &update, &delete] {
        let result = save_project_data(&mut conn, changes, &config);
        assert!(result.success, "{:?}", result.error);
    }

    let audit: Vec<(String, Option<String>, Option<String>, String)> = conn
        .prepare(
            "SELECT change_type, title, instruction_id, changed_at FROM audit_steps
             WHERE id = 's2' ORDER BY audit_id",
        )
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let kinds: Vec<&str> = audit.iter().map(|(kind, ..)| kind.as_str()).collect();
    assert_eq!(kinds, vec!["create", "update", "delete"]);

    // The delete snapshot is the full prior row, not just the id
    let (_, title, instruction_id, changed_at) = &audit[2];
    assert_eq!(title.as_deref(), Some("Tighten firmly"));
    assert_eq!(instruction_id.as_deref(), Some("i1"));
    assert!(!changed_at.is_empty());
}

#[test]
fn test_missing_audit_table_rolls_back_the_save() {
    // Given: steps mapped to an audit table that was never created
    // When: a new step is saved
    // Then: the save fails naming the audit table and the step is not written
    let (_dir, mut conn) = setup_project();
    let before = total_rows(&conn);
    let config = SaveConfig::new(["steps"]).with_audit_table("steps", "audit_steps_gone");
    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s7", "instruction_id": "i1", "title": "Check" }] }
    }));

    let result = save_project_data(&mut conn, &changes, &config);

    assert!(!result.success);
    let error = result.error.unwrap();
    assert!(error.contains("ERR_PERSISTENCE"), "{error}");
    assert!(error.contains("audit_steps_gone"), "{error}");
    assert!(!row_exists(&conn, "steps", "s7"));
    assert_eq!(total_rows(&conn), before);
}

#[test]
fn test_no_audit_map_writes_no_audit_rows() {
    let (_dir, mut conn) = setup_project();
    let config = SaveConfig::new(["substeps", "steps"]);
    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s1", "title": "Changed" }] },
        "deleted": { "substeps_ids": ["ss1"] }
    }));

    assert!(save_project_data(&mut conn, &changes, &config).success);
    assert_eq!(count(&conn, "audit_steps"), 0);
    assert_eq!(count(&conn, "audit_substeps"), 0);
}

#[test]
fn test_injected_table_name_is_rejected_without_mutation() {
    let (_dir, mut conn) = setup_project();
    let before = total_rows(&conn);
    let hostile = "steps\"; DROP TABLE steps; --";

    let in_changed = batch(json!({
        "changed": {
            "instruction": [{ "id": "i1", "name": "Renamed" }],
            hostile: [{ "id": "s1" }]
        }
    }));
    let result = save_project_data(&mut conn, &in_changed, &SaveConfig::instruction_project());
    assert!(!result.success);
    assert!(result.error.unwrap().contains("ERR_INVALID_IDENTIFIER"));

    let mut config = SaveConfig::instruction_project();
    config.allowed_tables.insert("x; DROP TABLE x".to_string());
    let benign = batch(json!({ "changed": { "steps": [{ "id": "s1", "title": "t" }] } }));
    assert!(!save_project_data(&mut conn, &benign, &config).success);

    assert_eq!(total_rows(&conn), before);
    assert_eq!(
        text_column(&conn, "instructions", "name", "i1").as_deref(),
        Some("Pump assembly")
    );
}

#[test]
fn test_empty_batch_is_a_no_op() {
    let (_dir, mut conn) = setup_project();
    let before = total_rows(&conn);

    let changes = batch(json!({ "changed": {}, "deleted": {} }));
    let stats = apply_changes(&mut conn, &changes, &SaveConfig::instruction_project()).unwrap();

    assert_eq!(stats, Default::default());
    assert_eq!(total_rows(&conn), before);
    assert!(save_project_data(&mut conn, &changes, &SaveConfig::default()).success);
}

#[test]
fn test_source_language_backfill_only_when_configured() {
    let (_dir, mut conn) = setup_project();
    conn.execute(
        "INSERT INTO steps (id, instruction_id, step_number) VALUES ('s_old', 'i1', 9)",
        [],
    )
    .unwrap();
    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s2", "instruction_id": "i1" }] }
    }));

    let plain = SaveConfig::new(["steps"]);
    assert!(save_project_data(&mut conn, &changes, &plain).success);
    assert_eq!(text_column(&conn, "steps", "source_language", "s_old"), None);

    let backfill = SaveConfig::new(["steps"]).with_backfill_tables(["steps"]);
    assert!(save_project_data(&mut conn, &changes, &backfill).success);
    let nulls: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM steps WHERE source_language IS NULL",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(nulls, 0);
    assert_eq!(
        text_column(&conn, "steps", "source_language", "s_old").as_deref(),
        Some("de")
    );
}

#[test]
fn test_backfill_prefers_instruction_in_batch() {
    let (_dir, mut conn) = setup_project();
    let changes = batch(json!({
        "changed": {
            "instruction": [{ "id": "i2" }],
            "steps": [{ "id": "s2", "instruction_id": "i2" }]
        }
    }));
    let config = SaveConfig::new(["steps"]).with_backfill_tables(["steps"]);

    assert!(save_project_data(&mut conn, &changes, &config).success);
    assert_eq!(
        text_column(&conn, "steps", "source_language", "s2").as_deref(),
        Some("en")
    );
}

#[test]
fn test_unknown_and_missing_tables_are_skipped() {
    let (_dir, mut conn) = setup_project();
    let config = SaveConfig::new(["steps", "legacy_notes"]);
    let changes = batch(json!({
        "changed": {
            "widgets": [{ "id": "w1" }],
            "legacy_notes": [{ "id": "n1", "body": "gone" }],
            "steps": [{ "id": "s1", "title": "Still saved", "not_a_column": 5 }]
        },
        "deleted": { "widgets_ids": ["w1"], "legacy_notes_ids": ["n1"] }
    }));

    let stats = apply_changes(&mut conn, &changes, &config).unwrap();

    assert_eq!(stats.rows_upserted, 1);
    assert_eq!(stats.rows_deleted, 0);
    assert_eq!(
        text_column(&conn, "steps", "title", "s1").as_deref(),
        Some("Still saved")
    );
}

#[test]
fn test_row_written_then_deleted_in_same_batch() {
    let (_dir, mut conn) = setup_project();
    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s2", "instruction_id": "i1" }] },
        "deleted": { "steps_ids": ["s2"] }
    }));

    assert!(save_project_data(&mut conn, &changes, &SaveConfig::new(["steps"])).success);
    assert!(!row_exists(&conn, "steps", "s2"));
}

#[test]
fn test_row_without_id_fails_the_batch() {
    let (_dir, mut conn) = setup_project();
    let changes = batch(json!({
        "changed": { "steps": [{ "id": "s1", "title": "ok" }, { "title": "no id" }] }
    }));

    let result = save_project_data(&mut conn, &changes, &SaveConfig::new(["steps"]));

    assert!(!result.success);
    assert!(result.error.unwrap().contains("ERR_INVALID_INPUT"));
    assert_eq!(
        text_column(&conn, "steps", "title", "s1").as_deref(),
        Some("Mount housing")
    );
}

#[test]
fn test_save_emits_boundary_events() {
    let capture = init_test_capture();
    let (_dir, mut conn) = setup_project();

    let ok = batch(json!({ "changed": { "steps": [{ "id": "s1", "title": "logged" }] } }));
    assert!(save_project_data(&mut conn, &ok, &SaveConfig::new(["steps"])).success);

    capture.assert_event_exists(OP_SAVE_PROJECT_DATA, "start");
    capture.assert_event_exists(OP_SAVE_PROJECT_DATA, "end");

    let bad = batch(json!({ "changed": { "bad table": [{ "id": "x" }] } }));
    assert!(!save_project_data(&mut conn, &bad, &SaveConfig::default()).success);

    let errors = capture.events_for(OP_SAVE_PROJECT_DATA, "end_error");
    assert!(errors
        .iter()
        .any(|e| e.field("err_code") == Some("ERR_INVALID_IDENTIFIER")));
    assert!(errors.iter().all(|e| e.field("duration_ms").is_some()));
}

#[test]
fn test_json_command_round_trip() {
    let (_dir, mut conn) = setup_project();
    let payload = json!({
        "command": "saveProjectData",
        "changes": {
            "changed": { "substeps": [{ "id": "ss1", "title": "From IPC" }] },
            "deleted": {}
        },
        "config": {
            "allowedTables": ["substeps"],
            "deleteOrder": ["substeps"],
            "auditTableMap": { "substeps": "audit_substeps" }
        }
    })
    .to_string();

    let response = handle_json_command(&mut conn, &payload);

    assert_eq!(response, r#"{"success":true}"#);
    assert_eq!(
        text_column(&conn, "substeps", "title", "ss1").as_deref(),
        Some("From IPC")
    );
    assert_eq!(count(&conn, "audit_substeps"), 1);
}
