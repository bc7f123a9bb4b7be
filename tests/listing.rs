// tests/listing.rs

use pipedag::config::{load_and_validate, ConfigFile};
use pipedag::{write_inputs, write_outputs};
use tempfile::TempDir;

const MANIFEST: &str = r#"
[process.gen]
cmd = "touch {{ outputs.a }}"
outputs = { a = "a.txt" }

[process.mid]
cmd = "cp {{ inputs.a }} {{ outputs.b }}"
inputs = { a = "a.txt" }
outputs = { b = "b.txt" }

[process.qc]
cmd = "qc {{ inputs.a }} {{ inputs.ref }}"
inputs = { a = "a.txt", ref = "data/ref.fa" }
outputs = { report = "qc.txt" }
"#;

fn config(dir: &TempDir) -> ConfigFile {
    let path = dir.path().join("Pipedag.toml");
    std::fs::write(&path, MANIFEST).unwrap();
    load_and_validate(&path).unwrap()
}

fn lines(buf: Vec<u8>) -> Vec<String> {
    String::from_utf8(buf).unwrap().lines().map(str::to_string).collect()
}

#[test]
fn inputs_list_each_path_once() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);

    let mut buf = Vec::new();
    write_inputs(&cfg, false, &mut buf).unwrap();

    let a = dir.path().join("a.txt").display().to_string();
    let reference = dir.path().join("data/ref.fa").display().to_string();
    assert_eq!(lines(buf), vec![a, reference]);
}

#[test]
fn inputs_json_has_one_object_per_declared_input() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);

    let mut buf = Vec::new();
    write_inputs(&cfg, true, &mut buf).unwrap();

    let entries: Vec<serde_json::Value> = lines(buf)
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["step"], "mid");
    assert_eq!(entries[0]["name"], "a");
    assert_eq!(
        entries[0]["path"],
        dir.path().join("a.txt").display().to_string()
    );
    assert_eq!(entries[2]["step"], "qc");
    assert_eq!(entries[2]["name"], "ref");
    assert!(entries[2].get("exists").is_none());
}

#[test]
fn outputs_json_reports_existence() {
    let dir = TempDir::new().unwrap();
    let cfg = config(&dir);
    std::fs::write(dir.path().join("a.txt"), "x").unwrap();

    let mut buf = Vec::new();
    write_outputs(&cfg, true, &mut buf).unwrap();

    let entries: Vec<serde_json::Value> = lines(buf)
        .iter()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["step"], "gen");
    assert_eq!(entries[0]["exists"], true);
    assert_eq!(entries[1]["exists"], false);
}
