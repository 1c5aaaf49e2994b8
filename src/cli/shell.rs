use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

use crate::store::autosave::{begin_session, ActiveSession};
use crate::store::entities::SessionPatch;
use crate::store::filter::SessionFilter;
use crate::store::session_log::SessionLog;
use crate::store::shared::SharedSessionLog;
use crate::tui::{self, list::SelectMode};
use crate::utils::clock::Clock;
use crate::utils::time::{timestamp_from_db, timestamp_to_db};

use super::report::{format_duration, write_json_lines};

#[derive(Debug)]
enum ShellOutcome {
    Continue,
    Exit,
}

/// The interactive shell, the foreground of the two contexts mutating the store. The
/// other one is the autosave task held through [ActiveSession].
struct Shell {
    store: Option<SharedSessionLog>,
    active: Option<ActiveSession>,
    path: PathBuf,
    autosave_interval: Duration,
    clock: Arc<dyn Clock>,
    input: Lines<BufReader<Stdin>>,
}

/// Runs the shell until `exit` or end of input. A database given up front is loaded
/// before the first prompt.
pub async fn run_shell(
    file: Option<PathBuf>,
    autosave_interval: Duration,
    clock: Arc<dyn Clock>,
) -> Result<()> {
    let mut shell = Shell::new(autosave_interval, clock)?;

    println!("stint tracker.");
    println!("Type help or ? to list commands.");
    println!();

    if let Some(file) = file {
        if let Err(e) = shell.load(&file.display().to_string()).await {
            println!("Error: {e}");
        }
        println!();
    }

    loop {
        print!("(stint) ");
        std::io::stdout().flush()?;
        let Some(line) = shell.input.next_line().await? else {
            break;
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        debug!("Dispatching {line:?}");
        match shell.dispatch(&line).await {
            Ok(ShellOutcome::Continue) => println!(),
            Ok(ShellOutcome::Exit) => break,
            Err(e) => {
                warn!("Command {line:?} failed {e:?}");
                println!("Error: {e}");
                println!();
            }
        }
    }

    shell.shutdown().await
}

impl Shell {
    fn new(autosave_interval: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            store: None,
            active: None,
            path: std::env::current_dir()?,
            autosave_interval,
            clock,
            input: BufReader::new(tokio::io::stdin()).lines(),
        })
    }

    async fn dispatch(&mut self, line: &str) -> Result<ShellOutcome> {
        let (command, arg) = match line.split_once(' ') {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "exit" | "quit" => return Ok(ShellOutcome::Exit),
            "help" | "?" => self.help(),
            "create" => self.create(arg).await?,
            "load" => self.load(arg).await?,
            "unload" => self.unload()?,
            "start" => self.start(arg).await?,
            "stop" => self.stop().await?,
            "cancel" => self.cancel().await?,
            "status" => self.status(),
            "filter" => self.filter().await?,
            "reset" => self.reset().await?,
            "view" => self.view().await?,
            "modify" => self.modify().await?,
            "delete" => self.delete().await?,
            "summary" => self.summary().await?,
            "export" => self.export(arg).await?,
            "pwd" => println!("{}", self.path.display()),
            "cd" => self.change_dir(arg)?,
            _ => println!("Unknown command {command:?}. Type help or ? to list commands."),
        }
        Ok(ShellOutcome::Continue)
    }

    fn help(&self) {
        println!("Database:  create <file>, load <file>, unload, pwd, cd <dir>");
        println!("Tracking:  start [project], stop, cancel, status");
        println!("Browsing:  filter, reset, view, modify, delete, summary, export <file>");
        println!("Other:     help, exit");
    }

    fn resolve(&self, arg: &str) -> PathBuf {
        self.path.join(arg)
    }

    fn store(&self) -> Result<&SharedSessionLog> {
        self.store.as_ref().context("No database loaded")
    }

    fn is_active_row(&self, id: i64) -> bool {
        self.active.as_ref().is_some_and(|v| v.row_id() == id)
    }

    async fn create(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            bail!("No filename entered");
        }
        if self.active.is_some() {
            bail!("Stop the running session first");
        }
        let path = self.resolve(arg);
        let store = SharedSessionLog::new(SessionLog::create(&path)?);
        store.select_all().await?;
        self.store = Some(store);
        println!("{} successfully created.", path.display());
        Ok(())
    }

    async fn load(&mut self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            bail!("No filename entered");
        }
        if self.active.is_some() {
            bail!("Stop the running session first");
        }
        let path = self.resolve(arg);
        if !path.is_file() {
            bail!(
                "The file {} does not exist. Use create to make a new database",
                path.display()
            );
        }
        let store = SharedSessionLog::new(SessionLog::open(&path)?);
        let count = store.select_all().await?;
        self.store = Some(store);
        println!("Database {} loaded, {count} sessions.", path.display());
        Ok(())
    }

    fn unload(&mut self) -> Result<()> {
        if self.active.is_some() {
            bail!("Stop the running session first");
        }
        if self.store.take().is_none() {
            bail!("No database loaded");
        }
        println!("Database unloaded.");
        Ok(())
    }

    async fn start(&mut self, arg: &str) -> Result<()> {
        if self.active.is_some() {
            bail!("A session is already running");
        }
        let store = self.store()?.clone();

        let mut patch = SessionPatch::new();
        if !arg.is_empty() {
            patch = patch.project(arg);
        }
        let session =
            begin_session(&store, patch, self.autosave_interval, self.clock.clone()).await?;
        println!(
            "Session {} started at {}.",
            session.row_id(),
            timestamp_to_db(session.started_at())
        );
        self.active = Some(session);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let store = self.store()?.clone();
        let session = self.active.take().context("No session is running")?;

        let finished = session
            .finish(&store, SessionPatch::new(), &*self.clock)
            .await?;
        store.refresh().await?;
        println!(
            "Session {} stopped after {}.",
            finished.id,
            format_duration(finished.duration())
        );
        Ok(())
    }

    async fn cancel(&mut self) -> Result<()> {
        let store = self.store()?.clone();
        let session = self.active.take().context("No session is running")?;

        let row_id = session.row_id();
        session.cancel(&store).await?;
        store.refresh().await?;
        println!("Session {row_id} canceled.");
        Ok(())
    }

    fn status(&self) {
        match &self.active {
            Some(session) => {
                let elapsed = self.clock.now().naive_local() - session.started_at();
                println!(
                    "Session {} running since {} ({}).",
                    session.row_id(),
                    timestamp_to_db(session.started_at()),
                    format_duration(elapsed)
                );
            }
            None => println!("No session is running."),
        }
    }

    async fn filter(&mut self) -> Result<()> {
        let store = self.store()?.clone();
        let fields = store.current_filter().await?.field_strings();

        let edited =
            tokio::task::spawn_blocking(move || tui::run_form("Filter sessions", fields)).await??;
        let Some(edited) = edited else {
            println!("Filter unchanged.");
            return Ok(());
        };

        let filter = SessionFilter::from_field_strings(&edited)?;
        let count = store.set_filter(filter).await?;
        println!("{count} sessions selected.");
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        let count = self.store()?.select_all().await?;
        println!("Filter reset, {count} sessions selected.");
        Ok(())
    }

    async fn view(&self) -> Result<()> {
        let store = self.store()?.clone();
        let rows = store.format_selected().await?;
        if rows.is_empty() {
            println!("There are no sessions in the current selection.");
            return Ok(());
        }
        tokio::task::spawn_blocking(move || tui::run_list(rows, SelectMode::Off)).await??;
        Ok(())
    }

    async fn modify(&mut self) -> Result<()> {
        let store = self.store()?.clone();
        let sessions = store.selected_entities().await?;
        if sessions.is_empty() {
            println!("There are no sessions in the current selection.");
            return Ok(());
        }

        let rows = store.format_selected().await?;
        let picked =
            tokio::task::spawn_blocking(move || tui::run_list(rows, SelectMode::Single)).await??;
        let Some(index) = picked.and_then(|v| v.into_iter().next()) else {
            return Ok(());
        };
        let session = sessions
            .get(index)
            .context("Selection is out of date")?
            .clone();
        if self.is_active_row(session.id) {
            bail!("Session {} is currently running", session.id);
        }

        let fields = session.field_strings();
        let edited =
            tokio::task::spawn_blocking(move || tui::run_form("Modify session", fields)).await??;
        let Some(edited) = edited else {
            return Ok(());
        };

        store.update_row(session.id, patch_from_fields(&edited)?).await?;
        store.refresh().await?;
        println!("Session {} updated.", session.id);
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        let store = self.store()?.clone();
        let sessions = store.selected_entities().await?;
        if sessions.is_empty() {
            println!("There are no sessions in the current selection.");
            return Ok(());
        }

        let rows = store.format_selected().await?;
        let picked =
            tokio::task::spawn_blocking(move || tui::run_list(rows, SelectMode::Multi)).await??;
        let Some(picked) = picked else {
            return Ok(());
        };

        let mut ids = Vec::new();
        for index in picked {
            let session = sessions.get(index).context("Selection is out of date")?;
            if self.is_active_row(session.id) {
                println!("Session {} is currently running, skipping.", session.id);
            } else {
                ids.push(session.id);
            }
        }
        if ids.is_empty() {
            println!("Nothing selected.");
            return Ok(());
        }

        if !self.confirm(&format!("Delete {} sessions?", ids.len())).await? {
            println!("Operation canceled.");
            return Ok(());
        }

        let deleted = store.delete_rows(ids).await?;
        store.refresh().await?;
        println!("{deleted} sessions deleted.");
        Ok(())
    }

    async fn summary(&self) -> Result<()> {
        let store = self.store()?;
        let totals = store.daily_totals().await?;
        if totals.is_empty() {
            println!("There are no sessions in the current selection.");
            return Ok(());
        }
        for (day, total) in totals {
            println!("{}\t{}", day.format("%Y-%m-%d"), format_duration(total));
        }
        println!("Total: {}", format_duration(store.total_time().await?));
        Ok(())
    }

    async fn export(&self, arg: &str) -> Result<()> {
        if arg.is_empty() {
            bail!("No filename entered");
        }
        let sessions = self.store()?.selected_entities().await?;
        let path = self.resolve(arg);
        let mut file = std::fs::File::create(&path)
            .with_context(|| format!("Can't create {}", path.display()))?;
        write_json_lines(&sessions, &mut file)?;
        println!("Exported {} sessions to {}.", sessions.len(), path.display());
        Ok(())
    }

    fn change_dir(&mut self, arg: &str) -> Result<()> {
        let new_path = self.resolve(arg);
        if !new_path.is_dir() {
            bail!("The directory {} does not exist", new_path.display());
        }
        self.path = new_path;
        println!("{}", self.path.display());
        Ok(())
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool> {
        print!("{prompt} (y/n) ");
        std::io::stdout().flush()?;
        let answer = self.input.next_line().await?.unwrap_or_default();
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }

    /// Leaving the shell finishes the running session so its end time is flushed.
    async fn shutdown(&mut self) -> Result<()> {
        let Some(session) = self.active.take() else {
            return Ok(());
        };
        let store = self.store()?.clone();
        let finished = session
            .finish(&store, SessionPatch::new(), &*self.clock)
            .await?;
        println!(
            "Session {} stopped after {}.",
            finished.id,
            format_duration(finished.duration())
        );
        Ok(())
    }
}

/// All five form fields become a full patch, dates validated at this edge.
fn patch_from_fields(fields: &[String; 5]) -> Result<SessionPatch> {
    Ok(SessionPatch::new()
        .start(timestamp_from_db(&fields[0]).context("Start is not a valid timestamp")?)
        .end(timestamp_from_db(&fields[1]).context("End is not a valid timestamp")?)
        .project(fields[2].clone())
        .tags(fields[3].clone())
        .notes(fields[4].clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::utils::clock::DefaultClock;

    use super::*;

    fn test_shell(dir: &std::path::Path) -> Result<Shell> {
        let mut shell = Shell::new(Duration::from_secs(600), Arc::new(DefaultClock))?;
        shell.path = dir.to_path_buf();
        Ok(shell)
    }

    #[tokio::test]
    async fn create_load_and_unload() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;

        assert!(shell.dispatch("load test.db").await.is_err());
        shell.dispatch("create test.db").await?;
        assert!(shell.store.is_some());

        // A second create against the same file is refused.
        assert!(shell.dispatch("create test.db").await.is_err());

        shell.dispatch("unload").await?;
        assert!(shell.store.is_none());
        shell.dispatch("load test.db").await?;
        assert!(shell.store.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn commands_require_a_database() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;

        for command in ["start", "stop", "view", "summary", "filter", "unload"] {
            let err = shell.dispatch(command).await.unwrap_err();
            let message = err.to_string();
            assert!(
                message.contains("No database loaded") || message.contains("No session"),
                "{command}: {message}"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn start_and_stop_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;
        shell.dispatch("create test.db").await?;

        shell.dispatch("start deep work").await?;
        assert!(shell.active.is_some());

        // Only one session can run at a time.
        assert!(shell.dispatch("start another").await.is_err());

        shell.dispatch("stop").await?;
        assert!(shell.active.is_none());

        let row = shell.store()?.get_row(1).await?.unwrap();
        assert_eq!(row.project, "deep work");
        assert!(row.end >= row.start);

        // The selection was refreshed by stop.
        assert_eq!(shell.store()?.format_selected().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn cancel_discards_the_session() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;
        shell.dispatch("create test.db").await?;

        shell.dispatch("start").await?;
        shell.dispatch("cancel").await?;
        assert!(shell.active.is_none());
        assert_eq!(shell.store()?.get_row(1).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn unload_refuses_while_a_session_runs() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;
        shell.dispatch("create test.db").await?;
        shell.dispatch("start").await?;

        let err = shell.dispatch("unload").await.unwrap_err();
        assert!(err.to_string().contains("running session"));

        shell.dispatch("stop").await?;
        shell.dispatch("unload").await?;
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_flushes_the_running_session() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;
        shell.dispatch("create test.db").await?;
        shell.dispatch("start late work").await?;

        shell.shutdown().await?;
        assert!(shell.active.is_none());
        let row = shell.store()?.get_row(1).await?.unwrap();
        assert_eq!(row.project, "late work");
        Ok(())
    }

    #[tokio::test]
    async fn change_dir_validates_the_target() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;

        assert!(shell.dispatch("cd missing").await.is_err());

        std::fs::create_dir(dir.path().join("logs"))?;
        shell.dispatch("cd logs").await?;
        assert!(shell.path.ends_with("logs"));
        Ok(())
    }

    #[tokio::test]
    async fn export_writes_the_selection() -> Result<()> {
        let dir = tempdir()?;
        let mut shell = test_shell(dir.path())?;
        shell.dispatch("create test.db").await?;
        shell.dispatch("start focus").await?;
        shell.dispatch("stop").await?;

        shell.dispatch("export dump.jsonl").await?;
        let text = std::fs::read_to_string(dir.path().join("dump.jsonl"))?;
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("\"project\":\"focus\""));
        Ok(())
    }

    #[test]
    fn form_fields_become_a_full_patch() {
        let fields = [
            "2018-09-01 08:00:00".to_string(),
            "2018-09-01 09:30:00".to_string(),
            "dummy project".to_string(),
            "dummy tag".to_string(),
            "dummy notes".to_string(),
        ];
        let patch = patch_from_fields(&fields).unwrap();
        assert_eq!(patch.columns().len(), 5);

        let mut broken = fields;
        broken[0] = "nonsense".to_string();
        assert!(patch_from_fields(&broken).is_err());
    }
}
