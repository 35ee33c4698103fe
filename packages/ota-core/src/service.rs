use ota_config::{CheckState, NotificationStrings, StateError, StateStore};
use ota_update::{evaluate_all, BuildDate, UpdateRecord};
use ota_utils::time::get_now_unix_millis;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::connectivity::{Connectivity, SystemConnectivity};
use crate::error::{CheckError, FetchError};
use crate::fetcher::{check_for_updates, UpdateSource};
use crate::notifier::{notify_if_needed, ForegroundState, LogNotifier, Notifier};
use crate::observer::{CheckFinished, CheckObserver, ObserverManager};
use crate::queue::{RequestQueue, RequestTicket};

/// Tag every check request is registered under.
pub const CHECK_TAG: &str = "UpdateCheckService";

pub const ACTION_CHECK: &str = "com.aospextended.ota.action.CHECK";
pub const ACTION_CANCEL_CHECK: &str = "com.aospextended.ota.action.CANCEL_CHECK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    Check,
    CancelCheck,
}

impl ServiceCommand {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            ACTION_CHECK => Some(Self::Check),
            ACTION_CANCEL_CHECK => Some(Self::CancelCheck),
            _ => None,
        }
    }
}

/// Pending check started by [`UpdateCheckService::check`].
pub struct CheckHandle {
    handle: JoinHandle<Option<CheckFinished>>,
}

impl CheckHandle {
    /// Wait for the check, `None` if it was cancelled before its response.
    pub async fn wait(self) -> Option<CheckFinished> {
        match self.handle.await {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "update check task failed");
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

struct ServiceInner {
    device: String,
    installed: BuildDate,
    source: Arc<dyn UpdateSource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    connectivity: Arc<dyn Connectivity>,
    foreground: ForegroundState,
    strings: NotificationStrings,
    observers: ObserverManager,
    queue: RequestQueue,
}

pub struct UpdateCheckServiceBuilder {
    device: String,
    installed: BuildDate,
    source: Arc<dyn UpdateSource>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    connectivity: Arc<dyn Connectivity>,
    foreground: ForegroundState,
    strings: NotificationStrings,
}

impl UpdateCheckServiceBuilder {
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn foreground(mut self, foreground: ForegroundState) -> Self {
        self.foreground = foreground;
        self
    }

    pub fn strings(mut self, strings: NotificationStrings) -> Self {
        self.strings = strings;
        self
    }

    pub fn build(self) -> UpdateCheckService {
        UpdateCheckService {
            inner: Arc::new(ServiceInner {
                device: self.device,
                installed: self.installed,
                source: self.source,
                store: self.store,
                notifier: self.notifier,
                connectivity: self.connectivity,
                foreground: self.foreground,
                strings: self.strings,
                observers: ObserverManager::new(),
                queue: RequestQueue::new(),
            }),
        }
    }
}

/// Checks the update server for newer builds of the running system.
#[derive(Clone)]
pub struct UpdateCheckService {
    inner: Arc<ServiceInner>,
}

impl UpdateCheckService {
    pub fn builder(
        device: impl Into<String>,
        installed: BuildDate,
        source: Arc<dyn UpdateSource>,
        store: Arc<dyn StateStore>,
    ) -> UpdateCheckServiceBuilder {
        UpdateCheckServiceBuilder {
            device: device.into(),
            installed,
            source,
            store,
            notifier: Arc::new(LogNotifier),
            connectivity: Arc::new(SystemConnectivity::new()),
            foreground: ForegroundState::new(),
            strings: NotificationStrings::default(),
        }
    }

    pub fn device(&self) -> &str {
        &self.inner.device
    }

    pub fn installed_build_date(&self) -> &BuildDate {
        &self.inner.installed
    }

    pub fn foreground(&self) -> &ForegroundState {
        &self.inner.foreground
    }

    pub async fn register_observer(&self, observer: Arc<dyn CheckObserver>) {
        self.inner.observers.register(observer).await;
    }

    pub fn handle(&self, command: ServiceCommand) -> Result<Option<CheckHandle>, CheckError> {
        match command {
            ServiceCommand::Check => self.check().map(Some),
            ServiceCommand::CancelCheck => {
                self.cancel_check();
                Ok(None)
            }
        }
    }

    /// Start a check in the background and return immediately.
    ///
    /// A check still in flight is superseded and its results dropped.
    pub fn check(&self) -> Result<CheckHandle, CheckError> {
        if !self.inner.connectivity.is_online() {
            info!("Could not check for updates. Not connected to the network.");
            return Err(CheckError::Offline);
        }
        let ticket = self.inner.queue.register(CHECK_TAG);
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.run_check(ticket).await });
        Ok(CheckHandle { handle })
    }

    /// Abort the in-flight check, if any. Its results are never delivered.
    pub fn cancel_check(&self) -> bool {
        self.inner.queue.cancel_all(CHECK_TAG)
    }

    pub fn is_checking(&self) -> bool {
        self.inner.queue.is_live(CHECK_TAG)
    }

    /// Persist the outcome of a check, raise the notification and deliver `event`.
    ///
    /// `None` means the fetch failed: nothing is persisted.
    pub async fn record_check(&self, records: Option<&[UpdateRecord]>, event: CheckFinished) {
        self.inner.record_check(records, event).await;
    }

    pub async fn load_state(&self) -> Result<CheckState, StateError> {
        self.inner.store.load().await
    }

    /// Last known update list, re-evaluated against the installed build.
    pub async fn available_updates(&self) -> Result<Vec<UpdateRecord>, StateError> {
        let state = self.load_state().await?;
        Ok(evaluate_all(state.updates, &self.inner.installed))
    }
}

impl ServiceInner {
    async fn run_check(&self, ticket: RequestTicket) -> Option<CheckFinished> {
        let result = check_for_updates(self.source.as_ref(), &self.device, ticket.token()).await;
        self.queue.finish(&ticket);

        match result {
            Err(FetchError::Cancelled) => {
                debug!(device = %self.device, "update check cancelled");
                None
            }
            Err(e) => {
                error!(device = %self.device, error = %e, "update check failed");
                let event = CheckFinished::empty();
                self.record_check(None, event).await;
                Some(event)
            }
            Ok(records) => {
                let records = evaluate_all(records, &self.installed);
                let event = CheckFinished::from_records(&records);
                self.record_check(Some(&records), event).await;
                Some(event)
            }
        }
    }

    async fn record_check(&self, records: Option<&[UpdateRecord]>, event: CheckFinished) {
        if let Some(records) = records {
            let now = get_now_unix_millis();
            let mut state = match self.store.load().await {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "could not load check state, starting fresh");
                    CheckState::default()
                }
            };
            state.record_success(records, now);
            if let Err(e) = self.store.save(&state).await {
                warn!(error = %e, "could not persist check state");
            }

            info!(
                "The update check successfully completed at {} and found {} updates ({} newer than installed)",
                now, event.update_count, event.real_update_count
            );

            if let Err(e) = notify_if_needed(
                self.notifier.as_ref(),
                &self.foreground,
                &self.strings,
                records,
                event.real_update_count,
            )
            .await
            {
                warn!(error = %e, "could not deliver update notification");
            }
        }
        self.observers.notify_check_finished(&event).await;
    }
}
