use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::utils::clock::Clock;

use super::entities::{SessionEntity, SessionPatch};
use super::shared::SharedSessionLog;

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(60);

/// The background half of a running session. Every tick rewrites the end column of the
/// active row to the current time, so a crash or an abandoned terminal loses at most one
/// interval of tracked time.
struct AutosaveTask {
    store: SharedSessionLog,
    row_id: i64,
    interval: Duration,
    shutdown: CancellationToken,
    clock: Arc<dyn Clock>,
}

impl AutosaveTask {
    /// Executes the tick loop. Cancellation stops the loop between ticks; a tick whose
    /// write already started finishes it before the loop winds down.
    async fn run(self) {
        let mut tick_point = self.clock.instant();
        loop {
            tick_point += self.interval;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return;
                }
                _ = self.clock.sleep_until(tick_point) => ()
            }

            let now = self.clock.now().naive_local();
            match self.store.update_end(self.row_id, now).await {
                Ok(0) => warn!(
                    "Session {} disappeared mid-run, nothing to autosave",
                    self.row_id
                ),
                Ok(_) => debug!("Autosaved end of session {}", self.row_id),
                Err(e) => error!("Autosave of session {} failed {e:?}", self.row_id),
            }
        }
    }
}

/// The foreground's guard over the in-progress session. Holds the active row id and the
/// handle of the autosave task; finalization is ordered cancel, join, final write, so a
/// tick can never overwrite a finalized end time.
pub struct ActiveSession {
    row_id: i64,
    started_at: NaiveDateTime,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// Inserts the active row, start and end both "now", and spawns the autosave task for it.
pub async fn begin_session(
    store: &SharedSessionLog,
    patch: SessionPatch,
    interval: Duration,
    clock: Arc<dyn Clock>,
) -> Result<ActiveSession> {
    let now = clock.now().naive_local();
    let row_id = store.add_row(patch.start(now).end(now)).await?;
    debug!("Started session {row_id}");

    let shutdown = CancellationToken::new();
    let task = tokio::spawn(
        AutosaveTask {
            store: store.clone(),
            row_id,
            interval,
            shutdown: shutdown.clone(),
            clock,
        }
        .run(),
    );

    Ok(ActiveSession {
        row_id,
        started_at: now,
        shutdown,
        task,
    })
}

impl ActiveSession {
    pub fn row_id(&self) -> i64 {
        self.row_id
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.started_at
    }

    /// Stops the autosave task and waits for it to wind down. No tick can run past this
    /// point.
    async fn join_autosave(&mut self) {
        self.shutdown.cancel();
        if let Err(e) = (&mut self.task).await {
            error!("Autosave task of session {} crashed {e:?}", self.row_id);
        }
    }

    /// Finalizes the session: cancel the autosave task, wait it out, then write the
    /// final end together with whatever fields the user supplied. Returns the finished
    /// row.
    pub async fn finish(
        mut self,
        store: &SharedSessionLog,
        patch: SessionPatch,
        clock: &dyn Clock,
    ) -> Result<SessionEntity> {
        self.join_autosave().await;

        let end = clock.now().naive_local();
        let affected = store.update_row(self.row_id, patch.end(end)).await?;
        if affected == 0 {
            bail!("Session {} no longer exists", self.row_id);
        }
        store
            .get_row(self.row_id)
            .await?
            .with_context(|| format!("Session {} no longer exists", self.row_id))
    }

    /// Abandons the session: stop the autosave task and delete the in-progress row.
    pub async fn cancel(mut self, store: &SharedSessionLog) -> Result<()> {
        self.join_autosave().await;
        store.delete_rows(vec![self.row_id]).await?;
        debug!("Canceled session {}", self.row_id);
        Ok(())
    }
}
