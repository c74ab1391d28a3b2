//! CLI tests for `extractor init` and `extractor run`.
//!
//! The oracle is a small shell script configured through the `command`
//! backend: its first call adds one QA record, every later call completes the
//! window.

use std::fs;
use std::path::Path;
use std::process::Command;

use extractor::exit_codes;
use extractor::io::config::{ExtractorConfig, OracleBackend, load_config, write_config};
use extractor::io::result_store::{BatchSummary, load_result};
use extractor::test_support::{TestWorkspace, turn};

const ORACLE_SCRIPT: &str = r#"cat > /dev/null
count_file="$0.count"
n=$(cat "$count_file" 2>/dev/null || echo 0)
echo $((n + 1)) > "$count_file"
echo '## Thinking: scripted'
echo '```json'
if [ "$n" = 0 ]; then
  echo '{"action": "add_new_QA", "question": "Q", "answer": "A", "reasoning": "first"}'
else
  echo '{"action": "window_complete", "reasoning": "done"}'
fi
echo '```'
"#;

fn write_command_config(ws: &TestWorkspace) -> std::path::PathBuf {
    let script = ws.path().join("oracle.sh");
    fs::write(&script, ORACLE_SCRIPT).expect("write script");

    let mut cfg = ExtractorConfig {
        input_dir: ws.input_dir(),
        output_dir: ws.output_dir(),
        ..ExtractorConfig::default()
    };
    cfg.oracle.backend = OracleBackend::Command;
    cfg.oracle.command = vec!["sh".to_string(), script.display().to_string()];
    cfg.oracle.timeout_secs = 30;

    let config_path = ws.path().join("extractor.toml");
    write_config(&config_path, &cfg).expect("write config");
    config_path
}

fn run_extractor(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_extractor"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn extractor")
}

#[test]
fn init_writes_default_config_once() {
    let ws = TestWorkspace::new().expect("workspace");

    let output = run_extractor(ws.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let path = ws.path().join("extractor.toml");
    assert_eq!(load_config(&path).expect("load"), ExtractorConfig::default());

    fs::write(&path, "window_length = 512\n").expect("edit config");
    let output = run_extractor(ws.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load").window_length, 512);

    let output = run_extractor(ws.path(), &["init", "--force"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(load_config(&path).expect("load").window_length, 1024);
}

#[cfg(unix)]
#[test]
fn run_processes_directory_with_command_oracle() {
    let ws = TestWorkspace::new().expect("workspace");
    write_command_config(&ws);
    ws.write_transcript("talk.json", &[turn("主持人", "欢迎"), turn("嘉宾", "谢谢")])
        .expect("write transcript");

    let output = run_extractor(ws.path(), &["run"]);
    assert_eq!(
        output.status.code(),
        Some(exit_codes::OK),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result = load_result(&ws.output_dir().join("talk_processed.json")).expect("load");
    assert_eq!(result.total_windows, 1);
    assert_eq!(result.total_iterations, 2);
    assert_eq!(result.qa_count, 1);
    assert_eq!(result.qa_list[0].question, "Q");
    assert_eq!(result.full_actions[0].thinking_process, "scripted");
}

#[cfg(unix)]
#[test]
fn run_with_broken_file_exits_partial() {
    let ws = TestWorkspace::new().expect("workspace");
    write_command_config(&ws);
    ws.write_raw("broken.json", "[{\"speaker\": 1}]").expect("write");
    ws.write_transcript("good.json", &[turn("a", "hello")])
        .expect("write transcript");

    let output = run_extractor(ws.path(), &["run"]);
    assert_eq!(output.status.code(), Some(exit_codes::PARTIAL));

    let raw = fs::read_to_string(ws.output_dir().join("batch_summary.json")).expect("summary");
    let summary: BatchSummary = serde_json::from_str(&raw).expect("parse summary");
    assert_eq!(summary.total_files, 2);
    assert_eq!(summary.processed_files, 1);
    assert_eq!(summary.failures[0].file, "broken.json");
    assert!(ws.output_dir().join("good_processed.json").exists());
}

#[cfg(unix)]
#[test]
fn extract_writes_single_result_to_override_dir() {
    let ws = TestWorkspace::new().expect("workspace");
    write_command_config(&ws);
    let transcript = ws
        .write_transcript("solo.json", &[turn("a", "hello")])
        .expect("write transcript");
    let custom_out = ws.path().join("custom");

    let output = Command::new(env!("CARGO_BIN_EXE_extractor"))
        .current_dir(ws.path())
        .arg("extract")
        .arg(&transcript)
        .arg("--output-dir")
        .arg(&custom_out)
        .output()
        .expect("spawn extractor");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let written = custom_out.join("solo_processed.json");
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        written.display().to_string()
    );
    assert_eq!(load_result(&written).expect("load").qa_count, 1);
}
