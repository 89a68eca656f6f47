// Copyright 2026 Corpus Probe Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use jsonschema::JSONSchema;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn probe_cmd(config_root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("probe"));
    cmd.env("XDG_CONFIG_HOME", config_root);
    cmd.env("HOME", config_root);
    cmd.env("APPDATA", config_root);
    cmd.env_remove("PROBE_PROJECT_ID");
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn global_config_path(config_root: &Path) -> PathBuf {
    let base = if cfg!(target_os = "macos") {
        config_root.join("Library").join("Application Support")
    } else {
        config_root.to_path_buf()
    };
    base.join("corpus-probe").join("probe.toml")
}

fn load_schema() -> JSONSchema {
    let schema_text = include_str!("../schemas/response.schema.json");
    let schema_json: Value = serde_json::from_str(schema_text).expect("schema json");
    JSONSchema::options()
        .compile(&schema_json)
        .expect("compile schema")
}

fn run_json(cmd: &mut Command, cwd: &Path) -> Value {
    let output = cmd.current_dir(cwd).output().expect("run command");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("parse json")
}

fn assert_schema(schema: &JSONSchema, value: &Value) {
    if let Err(errors) = schema.validate(value) {
        let msgs: Vec<String> = errors.map(|e| e.to_string()).collect();
        panic!("schema validation failed:\n{}", msgs.join("\n"));
    }
}

fn seed_corpus(root: &Path) {
    fs::write(
        root.join("notes.md"),
        "# BigQuery notes\nLoading data into the warehouse.\n",
    )
    .expect("write notes");
    fs::write(
        root.join("pipeline.py"),
        "import os\nprint('loading data for the competition')\n",
    )
    .expect("write pipeline");
    fs::write(root.join("schema.sql"), "SELECT title FROM docs;\n").expect("write schema");
    fs::write(root.join("tiny.txt"), "short\n").expect("write tiny");
    fs::write(root.join("image.png"), "not a document at all").expect("write png");
    fs::create_dir_all(root.join("nested")).expect("nested dir");
    fs::write(root.join("nested/deep.md"), "# nested file is not scanned").expect("write deep");
}

fn titles(items: &Value) -> Vec<String> {
    items
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|item| item.get("title"))
        .filter_map(|title| title.as_str())
        .map(str::to_string)
        .collect()
}

#[test]
fn golden_cli_outputs() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_corpus(root);

    // scan
    let scan_json = run_json(probe_cmd(config_root).args(["scan", "--json"]), root);
    assert_schema(&schema, &scan_json);
    let records = scan_json.get("records").expect("records");
    assert_eq!(
        titles(records),
        vec!["notes.md", "pipeline.py", "schema.sql"]
    );
    let categories: Vec<&str> = records
        .as_array()
        .expect("records array")
        .iter()
        .filter_map(|r| r.get("category").and_then(Value::as_str))
        .collect();
    assert_eq!(categories, vec!["Documentation", "Python Code", "SQL Scripts"]);
    assert_eq!(scan_json["stats"]["skipped"], 1);

    // upload
    let upload_json = run_json(probe_cmd(config_root).args(["upload", "--json"]), root);
    assert_schema(&schema, &upload_json);
    assert_eq!(
        upload_json["table"],
        "local-project.corpus_probe.test_documents"
    );
    assert_eq!(upload_json["stats"]["uploaded"], 3);
    assert!(root.join("probe.db").exists());

    // search
    let search_json = run_json(
        probe_cmd(config_root).args(["search", "select", "--k", "2", "--json"]),
        root,
    );
    assert_schema(&schema, &search_json);
    let results = &search_json["searches"][0]["results"];
    assert_eq!(titles(results).len(), 2);
    assert_eq!(titles(results)[0], "schema.sql");
    let top = results[0]["similarity_score"].as_f64().expect("score");
    assert!(top >= 3.0, "score {top}");

    // title and text weights add up
    let search_json = run_json(
        probe_cmd(config_root).args(["search", "notes", "--json"]),
        root,
    );
    assert_schema(&schema, &search_json);
    let results = &search_json["searches"][0]["results"];
    assert_eq!(titles(results)[0], "notes.md");
    let top = results[0]["similarity_score"].as_f64().expect("score");
    assert!(top >= 5.0, "score {top}");

    // stats
    let stats_json = run_json(probe_cmd(config_root).args(["stats", "--json"]), root);
    assert_schema(&schema, &stats_json);
    assert_eq!(stats_json["table_stats"]["row_count"], 3);
    assert_eq!(stats_json["table_stats"]["categories"]["Python Code"], 1);
}

#[test]
fn plain_output_lists_files_and_results() {
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_corpus(root);

    probe_cmd(config_temp.path())
        .args(["scan"])
        .current_dir(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Found 3 files:"))
        .stdout(predicate::str::contains("pipeline.py"))
        .stdout(predicate::str::contains("tiny.txt").not());

    probe_cmd(config_temp.path())
        .args(["test", "--query", "competition", "--query", "zebra"])
        .current_dir(root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Searching for: 'competition'"))
        .stdout(predicate::str::contains("similarity_score"))
        .stdout(predicate::str::contains("Probe complete: 3 documents"));
}

#[test]
fn test_command_runs_each_query() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_corpus(root);

    let json = run_json(
        probe_cmd(config_temp.path()).args([
            "test",
            "--query",
            "data",
            "--query",
            "competition",
            "--k",
            "1",
            "--json",
        ]),
        root,
    );
    assert_schema(&schema, &json);
    let searches = json["searches"].as_array().expect("searches");
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[0]["query"], "data");
    assert_eq!(titles(&searches[0]["results"]).len(), 1);
    assert_eq!(titles(&searches[1]["results"]), vec!["pipeline.py"]);
}

#[test]
fn default_demo_queries_are_used() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_corpus(root);

    let json = run_json(probe_cmd(config_temp.path()).args(["test", "--json"]), root);
    assert_schema(&schema, &json);
    let queries: Vec<&str> = json["searches"]
        .as_array()
        .expect("searches")
        .iter()
        .filter_map(|s| s["query"].as_str())
        .collect();
    assert_eq!(
        queries,
        vec!["bigquery", "competition", "python", "data", "smart document"]
    );
}

#[test]
fn memory_backend_leaves_no_store_behind() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_corpus(root);

    let json = run_json(
        probe_cmd(config_temp.path()).args(["--backend", "memory", "test", "--json"]),
        root,
    );
    assert_schema(&schema, &json);
    assert_eq!(json["ok"], true);
    assert!(!root.join("probe.db").exists());
}

#[test]
fn empty_directory_aborts_gracefully() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("blank.txt"), "   \n").expect("write blank");

    let json = run_json(probe_cmd(config_temp.path()).args(["test", "--json"]), root);
    assert_schema(&schema, &json);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "no_documents");
    assert!(json.get("searches").is_none());
    assert!(!root.join("probe.db").exists());

    probe_cmd(config_temp.path())
        .args(["upload"])
        .current_dir(root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("no suitable files"));
}

#[test]
fn search_without_store_reports_error() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");

    let json = run_json(
        probe_cmd(config_temp.path()).args(["search", "anything", "--json"]),
        temp.path(),
    );
    assert_schema(&schema, &json);
    assert_eq!(json["ok"], false);
    assert!(
        json["error"]["message"]
            .as_str()
            .expect("message")
            .contains("store not found")
    );
}

#[test]
fn project_env_and_config_file_are_honored() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let config_root = config_temp.path();
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    seed_corpus(root);

    let config_path = global_config_path(config_root);
    fs::create_dir_all(config_path.parent().expect("config parent")).expect("config dir");
    fs::write(
        &config_path,
        "dataset = \"hackathon\"\n\n[scoring]\ndefault_k = 1\n",
    )
    .expect("write config");

    let json = run_json(
        probe_cmd(config_root)
            .env("PROBE_PROJECT_ID", "demo-project")
            .args(["test", "--query", "data", "--json"]),
        root,
    );
    assert_schema(&schema, &json);
    assert_eq!(json["table"], "demo-project.hackathon.test_documents");
    assert_eq!(json["searches"][0]["k"], 1);
    assert_eq!(titles(&json["searches"][0]["results"]).len(), 1);
}

#[test]
fn completions_are_generated() {
    let config_temp = TempDir::new().expect("config tempdir");
    probe_cmd(config_temp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("probe"));
}

#[test]
fn tiny_files_round_to_zero_and_still_validate() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("a.txt"), "short note here").expect("write a");
    fs::write(root.join("b.md"), "another small note").expect("write b");

    let json = run_json(
        probe_cmd(config_temp.path()).args(["test", "--query", "zebra", "--json"]),
        root,
    );
    assert_schema(&schema, &json);
    let results = json["searches"][0]["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    for row in results {
        assert_eq!(row["similarity_score"].as_f64(), Some(0.0));
    }
}

#[test]
fn memory_backend_warns_outside_test_runs() {
    let schema = load_schema();
    let config_temp = TempDir::new().expect("config tempdir");
    let temp = TempDir::new().expect("tempdir");

    let output = probe_cmd(config_temp.path())
        .args(["--backend", "memory", "search", "data", "--json"])
        .current_dir(temp.path())
        .output()
        .expect("run command");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("memory backend starts empty"), "stderr: {stderr}");
    let json: Value = serde_json::from_slice(&output.stdout).expect("parse json");
    assert_schema(&schema, &json);
    assert!(json["searches"][0]["results"].is_null());

    probe_cmd(config_temp.path())
        .args(["--backend", "memory", "stats"])
        .current_dir(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("has not been loaded"))
        .stderr(predicate::str::contains("memory backend starts empty"));
}
