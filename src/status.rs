use std::path::PathBuf;

use anyhow::Result;
use colored::*;

use crate::config::Config;
use crate::progression::{ProgressionTracker, UNLOCKABLES};

pub async fn handle_status(data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let store = config.open_store()?;
    let tracker = ProgressionTracker::load(&store);
    let state = tracker.state();

    println!("{}", "Grump Status".cyan().bold());
    println!("Level: {}", state.level);
    println!("XP: {}", state.xp);

    println!("\n{}", "Features".cyan().bold());
    for item in UNLOCKABLES {
        if tracker.is_unlocked(item.id) {
            println!("{} {}", "✓".green(), item.name.green());
        } else {
            println!(
                "{} {} (annoyance {}+)",
                "·".dimmed(),
                item.name.dimmed(),
                item.min_annoyance
            );
        }
    }

    println!("\nData: {}", config.data_dir.display());
    Ok(())
}
