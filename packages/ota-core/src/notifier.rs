//! Update-found notification: content, delivery backends and the
//! conditions under which it is raised.

use async_trait::async_trait;
use ota_config::{NotificationStrings, NotifierBackend};
use ota_update::UpdateRecord;
use ota_utils::time::get_now_unix_millis;
use serde::Serialize;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

/// Max. number of updates listed in the expanded notification
pub const EXPANDED_NOTIF_UPDATE_COUNT: usize = 4;

pub const UPDATE_CHANNEL_ID: &str = "ota_updates";
pub const UPDATE_NOTIFICATION_TAG: &str = "update_found";

/// `cmd notification` only accepts posts from the shell user.
pub const SHELL_UID: u32 = 2000;

/// ARGB green
pub const LIGHT_COLOR_GREEN: u32 = 0xFF00_FF00;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to run notification command: {0}")]
    Io(#[from] std::io::Error),
    #[error("notification command exited with status {0:?}")]
    Failed(Option<i32>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Default,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Secret,
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationChannel {
    pub id: String,
    pub name: String,
    pub importance: Importance,
    pub enable_lights: bool,
    pub light_color: u32,
    pub show_badge: bool,
    pub lockscreen_visibility: Visibility,
}

/// What tapping the notification opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaunchIntent {
    pub update_list_updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateNotification {
    pub channel: NotificationChannel,
    pub title: String,
    pub ticker: String,
    pub text: String,
    pub inbox_title: String,
    pub inbox_lines: Vec<String>,
    /// Badge count, all found updates and not only the newer ones
    pub number: usize,
    pub when: i64,
    pub auto_cancel: bool,
    pub local_only: bool,
    pub content_intent: LaunchIntent,
}

/// Build the update-found notification for `records`.
pub fn build_update_notification(
    records: &[UpdateRecord],
    strings: &NotificationStrings,
) -> UpdateNotification {
    let inbox_lines = records
        .iter()
        .filter(|record| record.is_newer_than_installed())
        .take(EXPANDED_NOTIF_UPDATE_COUNT)
        .map(|record| record.file_name().to_string())
        .collect();

    UpdateNotification {
        channel: NotificationChannel {
            id: UPDATE_CHANNEL_ID.to_string(),
            name: strings.app_name.clone(),
            importance: Importance::High,
            enable_lights: true,
            light_color: LIGHT_COLOR_GREEN,
            show_badge: true,
            lockscreen_visibility: Visibility::Public,
        },
        title: strings.update_found.clone(),
        ticker: strings.update_found.clone(),
        text: strings.update_found_desc.clone(),
        inbox_title: strings.update_found.clone(),
        inbox_lines,
        number: records.len(),
        when: get_now_unix_millis(),
        auto_cancel: true,
        local_only: true,
        content_intent: LaunchIntent {
            update_list_updated: true,
        },
    }
}

/// Whether the main UI is currently showing, shared with the host.
#[derive(Debug, Clone, Default)]
pub struct ForegroundState {
    active: Arc<AtomicBool>,
}

impl ForegroundState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &UpdateNotification) -> Result<(), NotifyError>;
}

/// Raise the update notification unless nothing is newer or the UI is showing.
///
/// Returns whether a notification was delivered.
pub async fn notify_if_needed(
    notifier: &dyn Notifier,
    foreground: &ForegroundState,
    strings: &NotificationStrings,
    records: &[UpdateRecord],
    real_update_count: usize,
) -> Result<bool, NotifyError> {
    if real_update_count == 0 || foreground.is_active() {
        return Ok(false);
    }
    let notification = build_update_notification(records, strings);
    notifier.notify(&notification).await?;
    Ok(true)
}

pub fn notifier_for(backend: NotifierBackend, notification_uid: u32) -> Arc<dyn Notifier> {
    match backend {
        NotifierBackend::Log => Arc::new(LogNotifier),
        NotifierBackend::Android => Arc::new(AndroidNotifier::new().with_uid(notification_uid)),
    }
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &UpdateNotification) -> Result<(), NotifyError> {
        info!(
            title = %notification.title,
            count = notification.number,
            builds = ?notification.inbox_lines,
            "{}",
            notification.text
        );
        Ok(())
    }
}

/// Posts through the Android notification service shell command,
/// run via `su` as the configured uid.
pub struct AndroidNotifier {
    tag: String,
    uid: u32,
}

impl Default for AndroidNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl AndroidNotifier {
    pub fn new() -> Self {
        Self {
            tag: UPDATE_NOTIFICATION_TAG.to_string(),
            uid: SHELL_UID,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    /// Shell command line posting `notification`, every argument single-quoted.
    pub fn post_command(&self, notification: &UpdateNotification) -> String {
        let mut cmd = format!(
            "cmd notification post -S inbox -t '{}'",
            shell_single_quote_escape(&notification.title)
        );
        for line in &notification.inbox_lines {
            cmd.push_str(&format!(" --line '{}'", shell_single_quote_escape(line)));
        }
        cmd.push_str(&format!(
            " '{}' '{}'",
            shell_single_quote_escape(&self.tag),
            shell_single_quote_escape(&notification.text)
        ));
        cmd
    }

    /// Arguments to `su`: `-lp <uid> -c <post command>`.
    pub fn command_args(&self, notification: &UpdateNotification) -> Vec<String> {
        vec![
            "-lp".to_string(),
            self.uid.to_string(),
            "-c".to_string(),
            self.post_command(notification),
        ]
    }
}

fn shell_single_quote_escape(s: &str) -> String {
    s.replace('\'', r#"'"'"'"#)
}

#[async_trait]
impl Notifier for AndroidNotifier {
    async fn notify(&self, notification: &UpdateNotification) -> Result<(), NotifyError> {
        let status = tokio::process::Command::new("su")
            .args(self.command_args(notification))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if status.success() {
            info!(tag = %self.tag, uid = self.uid, "notification posted");
            Ok(())
        } else {
            Err(NotifyError::Failed(status.code()))
        }
    }
}

/// Keeps delivered notifications in memory.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<UpdateNotification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delivered(&self) -> Vec<UpdateNotification> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &UpdateNotification) -> Result<(), NotifyError> {
        self.delivered.lock().await.push(notification.clone());
        Ok(())
    }
}
