use chrono::Utc;
use clap::Args;
use cleanswift_core::{TaskStats, TaskStore, TimeRange};

use super::{print_table, workspace, CliResult};

#[derive(Args)]
pub struct StatsArgs {
    /// Time range: week, month or all
    #[arg(long, default_value = "week")]
    range: String,
    /// Print JSON instead of a summary
    #[arg(long)]
    json: bool,
}

pub fn run(args: StatsArgs) -> CliResult {
    let range: TimeRange = args.range.parse()?;
    let (config, db) = workspace()?;
    let tasks = db.list_tasks(&config.user.owner_id)?;
    let stats = TaskStats::compute(&tasks, range, Utc::now());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Tasks:            {}", stats.total);
    println!("  pending:        {}", stats.pending);
    println!("  in progress:    {}", stats.in_progress);
    println!("  completed:      {}", stats.completed);
    println!("Completion rate:  {}%", stats.completion_rate);
    println!("Focused minutes:  {}", stats.total_minutes);

    if !stats.recent.is_empty() {
        println!();
        let rows: Vec<Vec<String>> = stats
            .recent
            .iter()
            .map(|r| {
                vec![
                    r.label.clone(),
                    format!("{}m", r.actual_minutes),
                    format!("{}m", r.estimated_minutes),
                ]
            })
            .collect();
        print_table(&["RECENT", "ACTUAL", "ESTIMATE"], &rows);
    }
    Ok(())
}
