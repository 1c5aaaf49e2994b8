use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use chrono::Duration;

use crate::store::entities::SessionEntity;
use crate::store::session_log::SessionLog;
use crate::utils::time::timestamp_to_db;

use super::range::{build_filter, FilterArgs};

/// `view`: print the sessions matching the filter, one tab-separated line each.
pub fn process_view_command(file: PathBuf, filter: FilterArgs) -> Result<()> {
    let log = open_filtered(&file, filter)?;
    if log.selected().is_empty() {
        println!("There are no sessions in the current selection.");
        return Ok(());
    }

    for session in log.selected() {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            timestamp_to_db(session.start),
            timestamp_to_db(session.end),
            format_duration(session.duration()),
            session.project,
            session.tags
        );
    }
    Ok(())
}

/// `summary`: print tracked time per day plus the overall total.
pub fn process_summary_command(file: PathBuf, filter: FilterArgs) -> Result<()> {
    let log = open_filtered(&file, filter)?;
    if log.selected().is_empty() {
        println!("There are no sessions in the current selection.");
        return Ok(());
    }

    for (day, total) in log.daily_totals() {
        println!("{}\t{}", day.format("%Y-%m-%d"), format_duration(total));
    }
    println!();
    println!("Total: {}", format_duration(log.total_time()));
    Ok(())
}

/// `export`: dump the sessions matching the filter as JSON lines.
pub fn process_export_command(
    file: PathBuf,
    filter: FilterArgs,
    output: Option<PathBuf>,
) -> Result<()> {
    let log = open_filtered(&file, filter)?;

    match output {
        Some(path) => {
            let mut file = std::fs::File::create(&path)?;
            write_json_lines(log.selected(), &mut file)?;
            println!(
                "Exported {} sessions to {}.",
                log.selected().len(),
                path.display()
            );
        }
        None => {
            write_json_lines(log.selected(), &mut std::io::stdout())?;
        }
    }
    Ok(())
}

fn open_filtered(file: &std::path::Path, filter: FilterArgs) -> Result<SessionLog> {
    let filter = build_filter(filter)?;
    let mut log = SessionLog::open(file)?;
    log.set_filter(filter);
    log.refresh()?;
    Ok(log)
}

pub fn write_json_lines(sessions: &[SessionEntity], writer: &mut impl Write) -> Result<()> {
    for session in sessions {
        serde_json::to_writer(&mut *writer, session)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}
