use clap::Args;
use cleanswift_core::leaderboard::DEFAULT_LIMIT;
use cleanswift_core::{Leaderboard, ProfileStore};

use super::{print_table, workspace, CliResult};

#[derive(Args)]
pub struct LeaderboardArgs {
    /// Number of rows to show
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub fn run(args: LeaderboardArgs) -> CliResult {
    let (config, db) = workspace()?;
    let board = Leaderboard::rank(&db.list_profiles()?);
    let top = board.top(args.limit);

    if args.json {
        println!("{}", serde_json::to_string_pretty(top)?);
        return Ok(());
    }
    if top.is_empty() {
        println!("Nobody has earned points yet.");
        return Ok(());
    }

    let me = config.user.owner_id.as_str();
    let rows: Vec<Vec<String>> = top
        .iter()
        .map(|entry| {
            let marker = if entry.profile.owner_id == me { "*" } else { "" };
            vec![
                format!("{}{marker}", entry.rank),
                entry.profile.display_name_or_fallback().to_string(),
                entry.profile.points.to_string(),
                entry.level.to_string(),
                entry.badge.label().to_string(),
            ]
        })
        .collect();
    print_table(&["RANK", "NAME", "POINTS", "LEVEL", "BADGE"], &rows);
    Ok(())
}
