mod args;
mod config;
mod dirs;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use args::{Command, ManualEntry};
use chrono::DateTime;
use meter_app::{
    AppPaths, HttpPayloadFetcher, TrackingSession, UserRepository, UserStore, ensure_app_data_dir,
    reconcile,
};
use meter_core::{DEFAULT_DECIMALS, format_bytes, format_bytes_live};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = args::parse_args().map_err(|err| {
        eprintln!("{err}");
        args::print_help();
        io::Error::new(io::ErrorKind::InvalidInput, "invalid arguments")
    })?;

    let config = config::load_or_create().map_err(io::Error::other)?;
    if config.created {
        println!("Created config at {}.", config.paths.file.display());
    }

    let data_dir = match args.data_dir.or_else(|| config.config.data_dir.clone()) {
        Some(dir) => dir,
        None => dirs::resolve_data_dir().map_err(io::Error::other)?.dir,
    };

    let paths = AppPaths::new(data_dir);
    ensure_app_data_dir(&paths)?;
    let mut repo = UserRepository::open(UserStore::new(paths.users_path.clone()));

    match args.command {
        Command::List => list_users(&repo),
        Command::Add { name } => {
            let user = repo.add_user(&name)?;
            println!("Added {} ({}).", user.name, user.id);
        }
        Command::Delete { id } => {
            repo.delete_user(&id);
            println!("Deleted user {id}.");
        }
        Command::History { id } => show_history(&repo, &id)?,
        Command::ClearHistory { id } => {
            repo.clear_user_history(&id);
            println!("Cleared history for {id}.");
        }
        Command::ClearAllHistory => {
            repo.clear_all_users_history();
            println!("Cleared history for all users.");
        }
        Command::ClearAllData => {
            repo.clear_all_data();
            println!("Removed all users.");
        }
        Command::Track { id, manual } => track(&mut repo, &id, manual, &config.config).await?,
    }

    Ok(())
}

fn list_users(repo: &UserRepository) {
    if repo.users().is_empty() {
        println!("No users yet. Add one with: data-meter add <name>");
        return;
    }
    for user in repo.users() {
        println!(
            "{}  {}  {} used  ({} sessions)",
            user.id,
            user.name,
            format_bytes(user.total_usage, DEFAULT_DECIMALS),
            user.usage_history.len()
        );
    }
}

fn show_history(repo: &UserRepository, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let user = repo.get(id).ok_or_else(|| format!("no user with id {id}"))?;
    println!(
        "{}: total {}",
        user.name,
        format_bytes_live(user.total_usage, DEFAULT_DECIMALS)
    );
    for record in &user.usage_history {
        println!("  {}", history_line(record));
    }
    Ok(())
}

/// One history row. Uses the live-policy formatter so sub-byte records stay
/// visible instead of collapsing to zero.
fn history_line(record: &meter_core::UsageRecord) -> String {
    let date = DateTime::from_timestamp_millis(record.timestamp)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{}  {}",
        date,
        format_bytes_live(record.usage, DEFAULT_DECIMALS)
    )
}

async fn track(
    repo: &mut UserRepository,
    id: &str,
    manual: Vec<ManualEntry>,
    config: &config::CliConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let user = repo
        .get(id)
        .ok_or_else(|| format!("no user with id {id}"))?
        .clone();

    let interval = config.sample_interval().map_err(io::Error::other)?;
    let fetcher = Arc::new(HttpPayloadFetcher::new(config.fetch_url.clone()));
    let mut session = TrackingSession::new(&user.id, fetcher).with_sample_interval(interval);
    for entry in manual {
        session.add_manual(entry.amount, entry.unit)?;
    }
    session.start()?;
    println!(
        "Tracking data usage for {}. Press Ctrl-C to stop & save.",
        user.name
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut reported_pause = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                if !session.is_active() && !reported_pause {
                    if let Some(err) = session.last_network_error() {
                        println!("Tracking paused: {err}");
                        reported_pause = true;
                    }
                }
                println!(
                    "session: {}  (total {})",
                    format_bytes_live(session.accumulated(), DEFAULT_DECIMALS),
                    format_bytes(user.total_usage + session.accumulated(), DEFAULT_DECIMALS)
                );
            }
        }
    }

    let accumulated = session.stop().await;
    let record = reconcile(repo, &user.id, accumulated)?;
    println!(
        "Saved {} to {}.",
        format_bytes_live(record.usage, DEFAULT_DECIMALS),
        user.name
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_core::UsageRecord;

    #[test]
    fn history_line_keeps_sub_byte_records_visible() {
        let record = UsageRecord {
            timestamp: 1_700_000_000_000,
            usage: 0.25,
        };
        assert!(history_line(&record).ends_with("0.25 Bytes"));
    }

    #[test]
    fn history_line_scales_large_records() {
        let record = UsageRecord {
            timestamp: 1_700_000_000_000,
            usage: 5_244_928.0,
        };
        assert!(history_line(&record).ends_with("5 MB"));
    }
}
