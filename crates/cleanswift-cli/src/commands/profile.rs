use clap::Args;
use cleanswift_core::points::{level_progress, points_to_next_level, POINTS_PER_LEVEL};
use cleanswift_core::{Leaderboard, PersistenceError, Profile, ProfileStore};

use super::{workspace, CliResult};

#[derive(Args)]
pub struct ProfileArgs {
    /// Set your display name
    #[arg(long)]
    name: Option<String>,
    /// Set your email
    #[arg(long)]
    email: Option<String>,
    /// Print JSON instead of a summary
    #[arg(long)]
    json: bool,
}

pub fn run(args: ProfileArgs) -> CliResult {
    let (config, db) = workspace()?;
    let owner_id = config.user.owner_id.as_str();

    let mut profile = match db.load_profile(owner_id) {
        Ok(profile) => profile,
        Err(PersistenceError::NotFound { .. }) => {
            let mut fresh = Profile::new(owner_id);
            fresh.display_name = config.user.display_name.clone();
            fresh
        }
        Err(e) => return Err(e.into()),
    };

    if args.name.is_some() || args.email.is_some() {
        if let Some(name) = args.name {
            profile.display_name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
        }
        if let Some(email) = args.email {
            profile.email = Some(email.trim().to_string()).filter(|e| !e.is_empty());
        }
        profile = db.upsert_profile(&profile)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    let board = Leaderboard::rank(&db.list_profiles()?);
    println!(
        "{} ({})",
        profile.display_name_or_fallback(),
        profile.initials()
    );
    println!("Points:  {}", profile.points);
    println!(
        "Level:   {} ({}/{POINTS_PER_LEVEL}, {} to next)",
        profile.level(),
        level_progress(profile.points),
        points_to_next_level(profile.points)
    );
    println!("Badge:   {}", profile.badge());
    match board.rank_of(owner_id) {
        Some(rank) => println!("Rank:    #{rank} of {}", board.len()),
        None => println!("Rank:    unranked"),
    }
    Ok(())
}
