//! Interactive focus session.
//!
//! Reads one command per line from stdin while printing session events as
//! they arrive. The session ends on completion, `q`, or end of input.

use std::sync::Arc;

use clap::Args;
use cleanswift_core::{
    ChecklistState, Event, GroqClient, SessionController, SessionError, SessionSettings,
    SessionSnapshot,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use super::{workspace, CliResult};

const HELP: &str = "commands: t toggle timer | s <n> toggle step | c complete | a <question> ask | p status | q quit";

#[derive(Args)]
pub struct FocusArgs {
    /// Task ID
    task_id: String,
    /// Start the task first if it is still pending
    #[arg(long)]
    begin: bool,
}

enum Command {
    Toggle,
    Step(usize),
    Complete,
    Ask(String),
    Print,
    Quit,
    Help,
}

fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match head {
        "t" => Ok(Command::Toggle),
        "s" => match rest.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Command::Step(n - 1)),
            _ => Err("usage: s <step number, from 1>".into()),
        },
        "c" => Ok(Command::Complete),
        "a" if !rest.is_empty() => Ok(Command::Ask(rest.to_string())),
        "a" => Err("usage: a <question>".into()),
        "p" => Ok(Command::Print),
        "q" => Ok(Command::Quit),
        "" | "h" | "?" => Ok(Command::Help),
        other => Err(format!("unknown command '{other}'")),
    }
}

pub fn run(args: FocusArgs) -> CliResult {
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(session(args));
    // A read on interactive stdin may still be parked on a blocking thread.
    runtime.shutdown_background();
    result
}

async fn session(args: FocusArgs) -> CliResult {
    let (config, db) = workspace()?;
    let ai = Arc::new(GroqClient::from_config(&config.ai)?);
    if !ai.has_api_key() {
        tracing::warn!(
            env = %config.ai.api_key_env,
            "no API key set; checklist and chat will be unavailable"
        );
    }

    let mut controller = SessionController::new(db, ai.clone(), ai)
        .with_settings(SessionSettings::from(&config.session));
    let mut events = controller.subscribe();

    let snapshot = controller.open_session(&args.task_id, args.begin).await?;
    print_snapshot(&snapshot);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.exit_session()?;
                    break;
                };
                let command = match parse(&line) {
                    Ok(command) => command,
                    Err(message) => {
                        println!("{message}");
                        continue;
                    }
                };
                if let Some(done) = apply(&mut controller, command).await? {
                    if done {
                        break;
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    // Flush what the last command published.
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    Ok(())
}

/// Run one command. Returns `Some(true)` once the session has ended.
/// User-correctable failures are printed and the session continues.
async fn apply(
    controller: &mut SessionController,
    command: Command,
) -> Result<Option<bool>, SessionError> {
    let result = match command {
        Command::Toggle => controller.toggle_timer().map(|_| None),
        Command::Step(index) => controller.toggle_step(index).map(|_| None),
        Command::Complete => controller.complete_session().map(|outcome| {
            println!(
                "Completed '{}' in {} min: +{} points ({} base, {} bonus). Total {}, level {}, {}.",
                outcome.task.title,
                outcome.task.actual_minutes.unwrap_or(0),
                outcome.award.total,
                outcome.award.base,
                outcome.award.bonus,
                outcome.profile.points,
                outcome.profile.level(),
                outcome.profile.badge(),
            );
            Some(true)
        }),
        Command::Ask(question) => controller.ask(&question).await.map(|reply| {
            println!("assistant: {reply}");
            None
        }),
        Command::Print => controller.snapshot().map(|snapshot| {
            print_snapshot(&snapshot);
            None
        }),
        Command::Quit => controller.exit_session().map(|_| Some(true)),
        Command::Help => {
            println!("{HELP}");
            Ok(None)
        }
    };

    match result {
        Ok(done) => Ok(done),
        Err(e) if e.is_recoverable() => {
            println!("{e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let task = &snapshot.task;
    println!("{} [{}]", task.title, task.status);
    println!(
        "  {} {} ({}% of estimate)",
        snapshot.elapsed_display,
        if snapshot.running { "running" } else { "paused" },
        snapshot.progress_percent
    );
    match &snapshot.checklist {
        ChecklistState::NotRequested => {}
        ChecklistState::Pending => println!("  checklist: analyzing photo..."),
        ChecklistState::Unavailable { reason } => println!("  checklist unavailable: {reason}"),
        ChecklistState::Ready { checklist } => {
            println!("  {}", checklist.summary);
            for (i, step) in checklist.steps().iter().enumerate() {
                let mark = if step.completed { "x" } else { " " };
                println!("  {:>2}. [{mark}] {}", i + 1, step.title);
            }
        }
    }
    if snapshot.gate.is_open() {
        println!("  ready to complete");
    } else {
        for unmet in &snapshot.gate.unmet {
            println!("  not yet: {unmet}");
        }
    }
    if snapshot.award_pending {
        println!("  points not yet recorded; `c` retries");
    }
}

fn print_event(event: &Event) {
    match event {
        Event::ClockStarted { elapsed_secs, .. } => println!("> timer running ({elapsed_secs}s)"),
        Event::ClockPaused { elapsed_secs, .. } => println!("> timer paused ({elapsed_secs}s)"),
        Event::ClockTicked { elapsed_secs, .. } if elapsed_secs % 60 == 0 => {
            println!("> {} min", elapsed_secs / 60);
        }
        Event::ChecklistReady { step_count, .. } => {
            println!("> checklist ready with {step_count} steps (`p` to show)");
        }
        Event::ChecklistUnavailable { reason, .. } => {
            println!("> no checklist: {reason}");
        }
        Event::StepToggled {
            index,
            completed,
            remaining,
            ..
        } => println!(
            "> step {} {} ({remaining} left)",
            index + 1,
            if *completed { "done" } else { "reopened" }
        ),
        Event::TaskStarted { task_id, .. } => println!("> task {task_id} started"),
        Event::SessionExited { elapsed_secs, .. } => {
            println!("> session closed after {elapsed_secs}s");
        }
        _ => {}
    }
}
