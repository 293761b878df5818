//! E2E tests for the store lifecycle and rollup commands:
//! `moda init`, `moda import`, `moda levels`, `moda rollup`, `moda progress`.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test harness helpers
// ---------------------------------------------------------------------------

const ITEMS: &str = r#"{"id":"e1","key":"PAY-1","title":"Payments revamp","level":"Epic","status_category":"active","team":"core"}
{"id":"f1","key":"PAY-2","title":"Card vault","level":"Feature","parent_id":"e1","status_category":"active","team":"core"}
{"id":"f2","key":"PAY-3","title":"Dropped idea","level":"Feature","parent_id":"e1","status_category":"removed","team":"core"}
{"id":"s1","key":"PAY-10","title":"Tokenize cards","level":"Story","parent_id":"f1","status_category":"done","team":"core"}
{"id":"s2","key":"PAY-11","title":"Rotate keys","level":"Story","parent_id":"f1","status_category":"active","team":"web"}
{"id":"s3","key":"PAY-12","title":"Orphaned by removal","level":"Story","parent_id":"f2","status_category":"proposed","team":"core"}
{"id":"s4","key":"PAY-13","title":"Direct story","level":"Story","parent_id":"e1","status_category":"done","team":"core"}
{"id":"t1","key":"PAY-20","title":"Write migration","level":"Task","parent_id":"s2","status_category":"active","team":"core"}
"#;

fn moda_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("moda"));
    cmd.current_dir(dir);
    cmd.env("MODA_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join(".user-config"));
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project(dir: &Path) {
    moda_cmd(dir).args(["init", "--json"]).assert().success();
}

fn import_items(dir: &Path, items: &str) -> Value {
    let input = dir.join("items.jsonl");
    std::fs::write(&input, items).expect("write items");
    let output = moda_cmd(dir)
        .args(["import", "--json", "--input"])
        .arg(&input)
        .output()
        .expect("import should not crash");
    assert!(
        output.status.success(),
        "import failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON from import")
}

fn json_of(dir: &Path, args: &[&str]) -> Value {
    let output = moda_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("command should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON output")
}

fn item_ids(report: &Value) -> Vec<String> {
    report["items"]
        .as_array()
        .expect("items array")
        .iter()
        .map(|i| i["id"].as_str().expect("id").to_string())
        .collect()
}

fn seeded_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    import_items(dir.path(), ITEMS);
    dir
}

// ---------------------------------------------------------------------------
// init / import / levels
// ---------------------------------------------------------------------------

#[test]
fn init_creates_store_and_is_rerunnable() {
    let dir = TempDir::new().unwrap();
    let first = json_of(dir.path(), &["init"]);
    assert_eq!(first["levels_seeded"], 5);
    assert_eq!(first["config_written"], true);
    assert!(dir.path().join(".moda/moda.db").is_file());

    let second = json_of(dir.path(), &["init"]);
    assert_eq!(second["config_written"], false);
}

#[test]
fn commands_before_init_report_not_initialized() {
    let dir = TempDir::new().unwrap();
    let output = moda_cmd(dir.path())
        .args(["rollup", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).expect("JSON error on stderr");
    assert_eq!(err["error"]["error_code"], "E1001");
    assert!(err["error"]["suggestion"].as_str().unwrap().contains("moda init"));
}

#[test]
fn import_reports_counts() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    let report = import_items(dir.path(), &format!("{ITEMS}\nnot json\n"));
    assert_eq!(report["imported"], 8);
    assert_eq!(report["skipped_invalid"], 1);
    assert_eq!(report["items_in_store"], 8);
}

#[test]
fn import_reads_stdin() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    moda_cmd(dir.path())
        .args(["import"])
        .write_stdin(ITEMS)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported:       8"));
}

#[test]
fn import_with_unknown_level_fails_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    let input = dir.path().join("bad.jsonl");
    std::fs::write(
        &input,
        "{\"id\":\"x1\",\"title\":\"Saga item\",\"level\":\"Saga\",\"status_category\":\"active\"}\n",
    )
    .unwrap();

    moda_cmd(dir.path())
        .args(["import", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("E2002"))
        .stderr(predicate::str::contains("unknown backlog level 'Saga'"));

    let report = json_of(dir.path(), &["rollup"]);
    assert_eq!(report["summary"]["total"], 0);
}

#[test]
fn levels_lists_defaults_in_text_mode() {
    let dir = TempDir::new().unwrap();
    init_project(dir.path());
    moda_cmd(dir.path())
        .args(["levels", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("portfolio\t1\tEpic"))
        .stdout(predicate::str::contains("portfolio\t2\tFeature"))
        .stdout(predicate::str::contains("requirement\t1\tStory"));
}

// ---------------------------------------------------------------------------
// rollup
// ---------------------------------------------------------------------------

#[test]
fn rollup_all_counts_each_requirement_once() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["rollup"]);

    // s3 sits under a removed feature but is itself live and in scope.
    let mut ids = item_ids(&report);
    ids.sort();
    assert_eq!(ids, vec!["s1", "s2", "s3", "s4"]);
    assert_eq!(report["scope"], "all");
    assert_eq!(report["summary"]["total"], 4);
    assert_eq!(report["summary"]["done"], 2);
    assert_eq!(report["summary"]["active"], 1);
    assert_eq!(report["summary"]["proposed"], 1);
}

#[test]
fn rollup_skips_work_under_removed_portfolio_items() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["rollup", "--root", "e1"]);
    let mut ids = item_ids(&report);
    ids.sort();
    assert_eq!(ids, vec!["s1", "s2", "s4"]);
}

#[test]
fn rollup_from_root_walks_down_levels() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["rollup", "--root", "f1"]);
    assert_eq!(item_ids(&report), vec!["s1", "s2"]);
    assert_eq!(report["scope"], "items:f1");
    assert!((report["summary"]["percent_complete"].as_f64().unwrap() - 50.0).abs() < 1e-9);
}

#[test]
fn rollup_by_team_seeds_from_team_items() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["rollup", "--team", "web"]);
    assert_eq!(item_ids(&report), vec!["s2"]);
}

#[test]
fn rollup_uses_default_team_from_config() {
    let dir = seeded_project();
    let config_path = dir.path().join(".moda/config.toml");
    let config = std::fs::read_to_string(&config_path).unwrap();
    std::fs::write(
        &config_path,
        config.replace("# default_team = \"core\"", "default_team = \"web\""),
    )
    .unwrap();

    let report = json_of(dir.path(), &["rollup"]);
    assert_eq!(report["scope"], "team:web");
    assert_eq!(item_ids(&report), vec!["s2"]);
}

#[test]
fn rollup_summary_only_omits_items() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["rollup", "--summary-only"]);
    assert!(report.get("items").is_none());
    assert_eq!(report["summary"]["total"], 4);
}

#[test]
fn rollup_unknown_root_is_item_not_found() {
    let dir = seeded_project();
    moda_cmd(dir.path())
        .args(["rollup", "--root", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2001]"));
}

#[test]
fn rollup_from_task_root_is_rejected() {
    let dir = seeded_project();
    let output = moda_cmd(dir.path())
        .args(["rollup", "--root", "t1", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["error_code"], "E2007");
    assert_eq!(err["error"]["message"], "item 't1' is task tier and cannot seed a rollup");
}

#[test]
fn rollup_text_mode_ends_with_summary_line() {
    let dir = seeded_project();
    moda_cmd(dir.path())
        .args(["rollup", "--root", "e1", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s1\tPAY-10\tStory\tdone\tTokenize cards"))
        .stdout(predicate::str::contains("# items:e1 done/total=2/3 percent=66.7"));
}

// ---------------------------------------------------------------------------
// progress
// ---------------------------------------------------------------------------

#[test]
fn progress_for_epic_rolls_up_through_features() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["progress", "e1"]);
    assert_eq!(report["item"]["key"], "PAY-1");
    assert_eq!(report["tier"], "portfolio");
    assert_eq!(report["summary"]["total"], 3);
    assert_eq!(report["summary"]["done"], 2);
    assert_eq!(report["leaves"].as_array().unwrap().len(), 3);
}

#[test]
fn progress_for_story_is_itself() {
    let dir = seeded_project();
    let report = json_of(dir.path(), &["progress", "s1"]);
    assert_eq!(report["summary"]["total"], 1);
    assert!((report["summary"]["percent_complete"].as_f64().unwrap() - 100.0).abs() < 1e-9);
}

#[test]
fn progress_pretty_shows_bar() {
    let dir = seeded_project();
    moda_cmd(dir.path())
        .args(["progress", "f1", "--format", "pretty"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Progress: 1/2 (50%)"))
        .stdout(predicate::str::contains("████████░░░░░░░░"));
}

#[test]
fn progress_for_removed_item_is_not_found() {
    let dir = seeded_project();
    let output = moda_cmd(dir.path())
        .args(["progress", "f2", "--json"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let err: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(err["error"]["error_code"], "E2001");
    assert_eq!(err["error"]["message"], "item not found: 'f2'");
}
