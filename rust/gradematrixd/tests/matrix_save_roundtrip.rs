mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_workspace, session_key, spawn_sidecar, temp_dir};

#[test]
fn edit_save_and_reopen_persists_only_the_diff() {
    let workspace = temp_dir("gradematrix-save-roundtrip");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_workspace(&mut stdin, &mut reader, &workspace);

    let opened = request_ok(&mut stdin, &mut reader, "1", "matrix.open", session_key());
    assert_eq!(opened["status"], "IN_PROGRESS");
    assert_eq!(opened["phase"], "EDITING");
    assert_eq!(opened["students"].as_array().map(|a| a.len()), Some(2));
    assert_eq!(opened["columns"][0]["skillKey"], "reading");
    assert_eq!(opened["columns"][0]["assessmentId"], 501);

    let report = request_ok(&mut stdin, &mut reader, "2", "matrix.validate", json!({}));
    assert_eq!(report["valid"], false);
    assert_eq!(report["offendingStudents"], json!(["Ada"]));

    let blocked = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "matrix.save",
        json!({ "targetStatus": "COMPLETED" }),
        "validation_failed",
    );
    assert_eq!(blocked["details"]["offendingStudents"], json!(["Ada"]));

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "matrix.applyCell",
        json!({ "studentId": 7, "skillKey": "reading", "grade": "A" }),
    );
    assert_eq!(applied["cell"]["gradeId"], 12);
    assert_eq!(applied["dirty"], true);

    let diff = request_ok(&mut stdin, &mut reader, "5", "matrix.diff", json!({}));
    assert_eq!(
        diff["changes"],
        json!([{ "studentId": 7, "grades": [{ "assessmentId": 501, "gradeId": 12 }] }])
    );

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "matrix.save",
        json!({ "targetStatus": "IN_PROGRESS" }),
    );
    assert_eq!(saved["outcome"]["studentsSaved"], 1);
    assert_eq!(saved["outcome"]["cellsSaved"], 1);
    assert_eq!(saved["matrix"]["dirtyCells"], json!([]));

    // Nothing changed since the last save.
    let _ = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "matrix.save",
        json!({ "targetStatus": "IN_PROGRESS" }),
        "empty_change_set",
    );

    let log = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "store.saveLog",
        json!({ "sessionId": 10 }),
    );
    let entries = log["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["statusCode"], "IN_PROGRESS");
    assert_eq!(entries[0]["payload"]["conductedById"], 77);
    assert_eq!(entries[0]["payload"]["assessmentCode"], "IN_PROGRESS");

    let closed = request_ok(&mut stdin, &mut reader, "9", "matrix.close", json!({}));
    assert_eq!(closed["closed"], true);
    let reopened = request_ok(&mut stdin, &mut reader, "10", "matrix.open", session_key());
    let ada = &reopened["students"][0];
    assert_eq!(ada["studentName"], "Ada");
    assert_eq!(ada["assessmentGrades"]["reading"]["gradeName"], "A");
    assert_eq!(ada["assessmentGrades"]["writing"]["gradeId"], 13);
}

#[test]
fn unknown_grade_name_falls_back_to_ungraded() {
    let workspace = temp_dir("gradematrix-save-fallback");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_workspace(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(&mut stdin, &mut reader, "1", "matrix.open", session_key());

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "matrix.applyCell",
        json!({ "studentId": 8, "skillKey": "writing", "grade": "A-" }),
    );
    assert_eq!(applied["cell"]["gradeId"], 0);
    assert_eq!(applied["cell"]["gradeName"], "Not Graded");
    assert_eq!(applied["dirty"], true);

    let report = request_ok(&mut stdin, &mut reader, "3", "matrix.validate", json!({}));
    assert_eq!(report["offendingStudents"], json!(["Ada", "Ben"]));
}

#[test]
fn clearing_a_marks_not_added_cell_does_not_fake_a_save() {
    let workspace = temp_dir("gradematrix-save-sentinel");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    seed_workspace(&mut stdin, &mut reader, &workspace);
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "store.importSession",
        json!({
            "sessionId": 11, "tenantId": 1, "branchId": 2, "courseId": 3,
            "currentStatusId": 1, "currentStatusName": "In Progress",
            "assessmentIdMap": { "reading": 601, "writing": 602 },
            "students": [
                { "studentId": 7, "studentName": "Ada", "assessmentGrades": {
                    "reading": { "gradeId": 0, "gradeName": "Marks Not Added" },
                    "writing": { "gradeId": 13, "gradeName": "B" } } }
            ]
        }),
    );
    let mut key = session_key();
    key["sessionId"] = json!(11);
    let _ = request_ok(&mut stdin, &mut reader, "2", "matrix.open", key.clone());

    let applied = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "matrix.applyCell",
        json!({ "studentId": 7, "skillKey": "reading", "grade": 0 }),
    );
    assert_eq!(applied["cell"]["gradeName"], "Marks Not Added");
    assert_eq!(applied["dirty"], false);
    let view = request_ok(&mut stdin, &mut reader, "4", "matrix.get", json!({}));
    assert_eq!(view["dirty"], false);
    assert_eq!(view["changeCount"], 0);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "matrix.applyCell",
        json!({ "studentId": 7, "skillKey": "writing", "grade": "A" }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "matrix.save",
        json!({ "targetStatus": "IN_PROGRESS" }),
    );
    let local = &saved["matrix"]["students"][0]["assessmentGrades"];
    assert_eq!(saved["matrix"]["dirty"], false);

    let reopened = request_ok(&mut stdin, &mut reader, "7", "matrix.open", key);
    let remote = &reopened["students"][0]["assessmentGrades"];
    assert_eq!(local["reading"], remote["reading"]);
    assert_eq!(remote["reading"]["gradeName"], "Marks Not Added");
    assert_eq!(remote["writing"]["gradeId"], 12);
}
