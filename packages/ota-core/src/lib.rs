pub mod connectivity;
pub mod error;
pub mod fetcher;
pub mod notifier;
pub mod observer;
pub mod queue;
pub mod service;

pub use connectivity::{Connectivity, StaticConnectivity, SystemConnectivity};
pub use error::{CheckError, FetchError};
pub use fetcher::{check_for_updates, user_agent, HttpUpdateSource, UpdateSource};
pub use notifier::{
    build_update_notification, notifier_for, notify_if_needed, AndroidNotifier,
    ForegroundState, LogNotifier, Notifier, NotifyError, RecordingNotifier, UpdateNotification,
    EXPANDED_NOTIF_UPDATE_COUNT, SHELL_UID,
};
pub use observer::{CheckFinished, CheckObserver, ObserverManager, ACTION_CHECK_FINISHED};
pub use queue::{RequestQueue, RequestTicket};
pub use service::{
    CheckHandle, ServiceCommand, UpdateCheckService, UpdateCheckServiceBuilder,
    ACTION_CANCEL_CHECK, ACTION_CHECK, CHECK_TAG,
};
