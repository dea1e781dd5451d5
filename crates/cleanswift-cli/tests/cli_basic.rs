//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

struct Cli {
    dir: TempDir,
}

impl Cli {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_cleanswift"));
        cmd.args(args)
            .env("CLEANSWIFT_DATA_DIR", self.dir.path())
            .env("CLEANSWIFT_LOG", "off")
            .env_remove("GROQ_API_KEY");
        cmd
    }

    fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = self.command(args).output().expect("Failed to execute CLI command");
        split(output)
    }

    fn run_with_input(&self, args: &[&str], input: &str) -> (String, String, i32) {
        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("Failed to spawn CLI command");
        // The process may exit before reading everything.
        let mut stdin = child.stdin.take().expect("stdin");
        let _ = stdin.write_all(input.as_bytes());
        drop(stdin);
        split(child.wait_with_output().expect("wait for CLI"))
    }

    fn success(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
        stdout
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let stdout = self.success(args);
        serde_json::from_str(&stdout).expect("Failed to parse JSON output")
    }

    fn create_task(&self, extra: &[&str]) -> String {
        let mut args = vec!["task", "create"];
        args.extend_from_slice(extra);
        let stdout = self.success(&args);
        stdout
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Task created: "))
            .expect("task id line")
            .to_string()
    }
}

fn split(output: Output) -> (String, String, i32) {
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

#[test]
fn test_help_lists_commands() {
    let cli = Cli::new();
    let stdout = cli.success(&["--help"]);
    for command in ["task", "focus", "profile", "leaderboard", "stats", "config"] {
        assert!(stdout.contains(command), "missing {command} in help");
    }
}

#[test]
fn test_task_create_and_list_order() {
    let cli = Cli::new();
    cli.create_task(&["Garage"]);
    cli.create_task(&["Kitchen", "--priority", "1", "--estimate", "20"]);
    cli.create_task(&["Hallway", "--priority", "3"]);

    let tasks = cli.json(&["task", "list", "--json"]);
    let titles: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Kitchen", "Hallway", "Garage"]);
    assert_eq!(tasks[0]["status"], "pending");
    assert_eq!(tasks[0]["estimated_minutes"], 20);

    let table = cli.success(&["task", "list"]);
    assert!(table.contains("TITLE"));
    assert!(table.contains("Kitchen"));
}

#[test]
fn test_task_create_rejects_blank_title() {
    let cli = Cli::new();
    let (_, stderr, code) = cli.run(&["task", "create", "   "]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_task_create_from_photo() {
    let cli = Cli::new();
    let id = cli.create_task(&["--image", "/photos/kids_room-after-party.jpg"]);

    let task = cli.json(&["task", "get", &id]);
    assert_eq!(task["title"], "kids room after party");
    assert_eq!(task["priority"], 1);
    assert_eq!(task["estimated_minutes"], 30);
    assert_eq!(task["image_ref"], "/photos/kids_room-after-party.jpg");
    assert!(task["description"].as_str().unwrap().contains("analyzed"));

    let id = cli.create_task(&["Attic", "--image", "IMG_0042.jpg", "--estimate", "45"]);
    let task = cli.json(&["task", "get", &id]);
    assert_eq!(task["title"], "Attic");
    assert_eq!(task["estimated_minutes"], 45);

    let (_, stderr, code) = cli.run(&["task", "create"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("a title or --image is required"));
}

#[test]
fn test_task_create_rejects_unknown_priority() {
    let cli = Cli::new();
    let (_, stderr, code) = cli.run(&["task", "create", "Attic", "--priority", "7"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("priority"));
}

#[test]
fn test_task_start_and_get() {
    let cli = Cli::new();
    let id = cli.create_task(&["Bathroom"]);

    let stdout = cli.success(&["task", "start", &id]);
    assert!(stdout.contains("Task started"));

    let task = cli.json(&["task", "get", &id]);
    assert_eq!(task["status"], "in_progress");

    let (_, stderr, code) = cli.run(&["task", "start", &id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("Cannot start a task that is in_progress"));
}

#[test]
fn test_task_get_unknown() {
    let cli = Cli::new();
    let (_, stderr, code) = cli.run(&["task", "get", "nope"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_config_get_set() {
    let cli = Cli::new();
    assert_eq!(cli.success(&["config", "get", "session.min_work_secs"]).trim(), "10");

    cli.success(&["config", "set", "session.min_work_secs", "30"]);
    assert_eq!(cli.success(&["config", "get", "session.min_work_secs"]).trim(), "30");

    let list = cli.success(&["config", "list"]);
    assert!(list.contains("session.min_work_secs = 30"));
    assert!(list.contains("ai.api_key_env = GROQ_API_KEY"));

    cli.success(&["config", "reset"]);
    assert_eq!(cli.success(&["config", "get", "session.min_work_secs"]).trim(), "10");
}

#[test]
fn test_config_rejects_bad_values() {
    let cli = Cli::new();
    let (_, _, code) = cli.run(&["config", "get", "session.nope"]);
    assert_ne!(code, 0);

    let (_, stderr, code) = cli.run(&["config", "set", "session.min_work_secs", "9"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("must be at least 10"));

    let (_, stderr, code) = cli.run(&["config", "set", "session.tick_interval_ms", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("tick_interval_ms"));
    assert_eq!(cli.success(&["config", "get", "session.tick_interval_ms"]).trim(), "1000");
}

#[test]
fn test_profile_and_leaderboard() {
    let cli = Cli::new();
    let board = cli.json(&["leaderboard", "--json"]);
    assert_eq!(board, serde_json::json!([]));

    cli.success(&["profile", "--name", "Sam Lee"]);
    let profile = cli.json(&["profile", "--json"]);
    assert_eq!(profile["display_name"], "Sam Lee");
    assert_eq!(profile["points"], 0);

    let summary = cli.success(&["profile"]);
    assert!(summary.contains("Sam Lee (SL)"));
    assert!(summary.contains("Badge:   Beginner"));
    assert!(summary.contains("Rank:    #1 of 1"));

    let board = cli.json(&["leaderboard", "--json", "--limit", "5"]);
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["profile"]["owner_id"], "local");
}

#[test]
fn test_stats() {
    let cli = Cli::new();
    cli.create_task(&["Kitchen"]);
    let id = cli.create_task(&["Bedroom"]);
    cli.success(&["task", "start", &id]);

    let stats = cli.json(&["stats", "--range", "all", "--json"]);
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["in_progress"], 1);
    assert_eq!(stats["completion_rate"], 0);

    let summary = cli.success(&["stats"]);
    assert!(summary.contains("Completion rate:  0%"));

    let (_, _, code) = cli.run(&["stats", "--range", "year"]);
    assert_ne!(code, 0);
}

#[test]
fn test_focus_gate_blocks_immediate_completion() {
    let cli = Cli::new();
    let id = cli.create_task(&["Living room"]);

    let (stdout, stderr, code) = cli.run_with_input(&["focus", &id, "--begin"], "p\nc\nq\n");
    assert_eq!(code, 0, "focus failed: {stderr}");
    assert!(stdout.contains("Living room [in_progress]"));
    assert!(stdout.contains("not yet: worked 0s, need at least 10s"));
    assert!(stdout.contains("Completion gate not satisfied"));

    let task = cli.json(&["task", "get", &id]);
    assert_eq!(task["status"], "in_progress");
}

#[test]
fn test_focus_requires_started_task() {
    let cli = Cli::new();
    let id = cli.create_task(&["Porch"]);

    let (_, stderr, code) = cli.run_with_input(&["focus", &id], "q\n");
    assert_ne!(code, 0);
    assert!(stderr.contains("only in-progress tasks"));
}

#[test]
fn test_completions() {
    let cli = Cli::new();
    let stdout = cli.success(&["completions", "bash"]);
    assert!(stdout.contains("cleanswift"));
}
