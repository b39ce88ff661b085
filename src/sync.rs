use crate::device::DeviceApi;
use crate::error::{PortalError, Result};
use crate::models::SyncStatus;
use crate::transport::Transport;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Statuses the trigger endpoint answers with when a sync has started.
const TRIGGER_ACCEPTED: &[u16] = &[200, 302];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Triggered,
    Polling(SyncStatus),
    Done,
    TimedOut,
}

impl<T: Transport> DeviceApi<T> {
    /// Push the configuration to the device and wait for it to report 100%.
    pub fn synchronize(&self) -> Result<()> {
        self.synchronize_with(|_| {})
    }

    /// Like [`DeviceApi::synchronize`], reporting every state change to `observe`.
    ///
    /// Poll failures are not fatal since the device keeps syncing on its own.
    /// The loop gives up once `sync_timeout` has elapsed; the device may still
    /// finish afterwards. Each poll is cut off at the deadline as well.
    pub fn synchronize_with<F>(&self, mut observe: F) -> Result<()>
    where
        F: FnMut(&SyncState),
    {
        self.require_login()?;
        self.trigger_sync()?;
        observe(&SyncState::Triggered);

        let timeout = self.config().sync_timeout;
        let interval = self.config().poll_interval;
        let deadline = Instant::now() + timeout;

        let remaining = || deadline.saturating_duration_since(Instant::now());
        loop {
            if remaining().is_zero() {
                warn!("synchronization did not finish within {:?}", timeout);
                observe(&SyncState::TimedOut);
                return Err(PortalError::SyncTimeout(timeout));
            }
            thread::sleep(interval.min(remaining()));
            let left = remaining();
            if left.is_zero() {
                continue;
            }

            match self.poll_progress(left) {
                Ok(status) => {
                    debug!(percentage = status.percentage, state = %status.state_string, "sync progress");
                    let complete = status.is_complete();
                    observe(&SyncState::Polling(status));
                    if complete {
                        info!("synchronization complete");
                        observe(&SyncState::Done);
                        return Ok(());
                    }
                }
                Err(e) => {
                    debug!("Error occurred while synchronizing. Sync will still continue. Error: {}", e);
                }
            }
        }
    }

    fn trigger_sync(&self) -> Result<()> {
        let url = self.config().sync_url(self.device_id());
        let response = self
            .transport()
            .get(&url, &self.form_options())
            .inspect_err(|e| warn!("Error occurred while synchronizing: {}", e))?;
        if !TRIGGER_ACCEPTED.contains(&response.status) {
            return Err(PortalError::UnexpectedStatus {
                url,
                status: response.status,
            });
        }
        info!(device = self.device_id(), "synchronization started");
        Ok(())
    }

    pub fn sync_progress(&self) -> Result<SyncStatus> {
        self.poll_progress(self.config().request_timeout)
    }

    /// One progress check that gives up after `limit` at the latest.
    fn poll_progress(&self, limit: Duration) -> Result<SyncStatus> {
        let url = self.config().sync_progress_url(self.device_id());
        let options = self
            .ajax_options()
            .with_timeout(limit.min(self.config().request_timeout));
        let response = self.fetch(&url, &options)?;
        Ok(serde_json::from_str(&response.body)?)
    }
}
