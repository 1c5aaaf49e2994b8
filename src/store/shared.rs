use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;

use super::entities::{SessionEntity, SessionPatch};
use super::filter::SessionFilter;
use super::session_log::SessionLog;

/// The handle both mutation contexts hold: the interactive shell in the foreground and
/// the autosave task in the background. The mutex serializes every statement, the
/// blocking pool keeps rusqlite calls off the runtime workers.
#[derive(Clone)]
pub struct SharedSessionLog {
    inner: Arc<Mutex<SessionLog>>,
}

impl SharedSessionLog {
    pub fn new(log: SessionLog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(log)),
        }
    }

    /// Runs a store operation on the blocking pool while holding the lock.
    pub async fn with<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SessionLog) -> Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || operation(&mut inner.lock()))
            .await
            .context("Store task was aborted")?
    }

    pub async fn add_row(&self, patch: SessionPatch) -> Result<i64> {
        self.with(move |log| log.add_row(&patch)).await
    }

    pub async fn update_row(&self, id: i64, patch: SessionPatch) -> Result<usize> {
        self.with(move |log| log.update_row(id, &patch)).await
    }

    /// The autosave tick write. Only ever touches the end column of its row.
    pub async fn update_end(&self, id: i64, end: NaiveDateTime) -> Result<usize> {
        self.update_row(id, SessionPatch::new().end(end)).await
    }

    pub async fn delete_rows(&self, ids: Vec<i64>) -> Result<usize> {
        self.with(move |log| log.delete_rows(&ids)).await
    }

    /// Installs a filter and reruns it under a single lock acquisition, so a concurrent
    /// tick can't slip between the two steps.
    pub async fn set_filter(&self, filter: SessionFilter) -> Result<usize> {
        self.with(move |log| {
            log.set_filter(filter);
            log.refresh()
        })
        .await
    }

    pub async fn refresh(&self) -> Result<usize> {
        self.with(|log| log.refresh()).await
    }

    pub async fn select_all(&self) -> Result<usize> {
        self.with(|log| log.select_all()).await
    }

    pub async fn current_filter(&self) -> Result<SessionFilter> {
        self.with(|log| Ok(log.filter().clone())).await
    }

    pub async fn selected_entities(&self) -> Result<Vec<SessionEntity>> {
        self.with(|log| Ok(log.selected().to_vec())).await
    }

    pub async fn format_selected(&self) -> Result<Vec<String>> {
        self.with(|log| Ok(log.format_selected())).await
    }

    pub async fn get_row(&self, id: i64) -> Result<Option<SessionEntity>> {
        self.with(move |log| log.get_row(id)).await
    }

    pub async fn total_time(&self) -> Result<Duration> {
        self.with(|log| Ok(log.total_time())).await
    }

    pub async fn daily_totals(&self) -> Result<Vec<(NaiveDate, Duration)>> {
        self.with(|log| Ok(log.daily_totals())).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::NaiveDate;

    use crate::store::entities::SessionPatch;
    use crate::store::session_log::SessionLog;

    use super::SharedSessionLog;

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_mutations_serialize() -> Result<()> {
        let store = SharedSessionLog::new(SessionLog::open_in_memory()?);

        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .add_row(
                        SessionPatch::new()
                            .start(start)
                            .end(start + chrono::Duration::minutes(i))
                            .project(format!("task {i}")),
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        assert_eq!(store.select_all().await?, 16);
        Ok(())
    }
}
