pub mod config;
pub mod focus;
pub mod leaderboard;
pub mod profile;
pub mod stats;
pub mod task;

use std::sync::Arc;

use cleanswift_core::{Config, Database};

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Configuration plus a shared handle to the database.
pub fn workspace() -> Result<(Config, Arc<Database>), Box<dyn std::error::Error>> {
    let (config, db) = cleanswift_core::open_workspace()?;
    Ok((config, Arc::new(db)))
}

/// Print `rows` as left-aligned columns under `headers`.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let render = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", render(headers.to_vec()));
    for row in rows {
        println!("{}", render(row.iter().map(String::as_str).collect()));
    }
}
