//! # Notifications
//!
//! Turns sync events and capture outcomes into user-facing messages.
//!
//! Every message becomes a toast. When the platform has granted
//! notification permission, it is also posted as a system notification.
//! A denied permission or a failing platform call only downgrades to
//! toast-only delivery; notifications never hold up a sync pass.

pub mod location;

pub use location::{LocationProvider, StaticLocation};

use async_trait::async_trait;
use std::sync::Arc;

use crate::shared::error::Result;
use crate::shared::event::{SyncEvent, SyncEventType, SyncResult};
use crate::shared::record::Category;
use crate::sync::broadcast::EventSubscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub title: String,
    pub message: String,
}

impl Toast {
    pub fn new(kind: ToastKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// In-app toast surface; always available
pub trait ToastSink: Send + Sync {
    fn show(&self, toast: Toast);
}

/// Toasts written to the log, used by the CLI and headless runs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingToasts;

impl ToastSink for TracingToasts {
    fn show(&self, toast: Toast) {
        match toast.kind {
            ToastKind::Error => tracing::error!("[Notify] {}: {}", toast.title, toast.message),
            ToastKind::Warning => tracing::warn!("[Notify] {}: {}", toast.title, toast.message),
            ToastKind::Info | ToastKind::Success => {
                tracing::info!("[Notify] {}: {}", toast.title, toast.message)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    /// Not asked yet
    Default,
    Granted,
    Denied,
}

/// Platform notification center
#[async_trait]
pub trait SystemNotifications: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    async fn request_permission(&self) -> Result<NotificationPermission>;

    fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Routes messages to the toast sink and, when permitted, the system
/// notification center
#[derive(Clone)]
pub struct Notifier {
    toasts: Arc<dyn ToastSink>,
    system: Option<Arc<dyn SystemNotifications>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("system", &self.system.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(Arc::new(TracingToasts))
    }
}

impl Notifier {
    pub fn new(toasts: Arc<dyn ToastSink>) -> Self {
        Self {
            toasts,
            system: None,
        }
    }

    pub fn with_system(mut self, system: Arc<dyn SystemNotifications>) -> Self {
        self.system = Some(system);
        self
    }

    /// Ask for notification permission if it was never asked.
    ///
    /// Errors are treated as a denial.
    pub async fn request_permission(&self) -> NotificationPermission {
        let Some(system) = &self.system else {
            return NotificationPermission::Denied;
        };
        match system.permission() {
            NotificationPermission::Default => match system.request_permission().await {
                Ok(permission) => permission,
                Err(e) => {
                    tracing::warn!("[Notify] Permission request failed: {}", e);
                    NotificationPermission::Denied
                }
            },
            permission => permission,
        }
    }

    /// Show `toast`, mirrored to a system notification when permitted
    pub fn notify(&self, toast: Toast) {
        if let Some(system) = &self.system {
            if system.permission() == NotificationPermission::Granted {
                if let Err(e) = system.show(&toast.title, &toast.message) {
                    tracing::debug!("[Notify] System notification failed, toast only: {}", e);
                }
            }
        }
        self.toasts.show(toast);
    }

    /// A capture was written to the local store
    pub fn queued_offline(&self, category: Category, local_id: &str) {
        tracing::debug!("[Notify] Queued {} {}", category, local_id);
        self.notify(Toast::new(
            ToastKind::Info,
            "Saved offline",
            format!("{} saved locally and will sync when online", label(category)),
        ));
    }

    pub fn connectivity_changed(&self, online: bool) {
        let toast = if online {
            Toast::new(ToastKind::Info, "Back online", "Syncing queued changes")
        } else {
            Toast::new(
                ToastKind::Warning,
                "You are offline",
                "Changes are saved locally and will sync later",
            )
        };
        self.notify(toast);
    }

    /// Outcome of a pass that does not go through the engine's event bus
    pub fn pass_finished(&self, result: &SyncResult) {
        if let Some(toast) = toast_for_result(result) {
            self.notify(toast);
        }
    }

    /// Map a sync event to a toast; progress events stay silent
    pub fn dispatch(&self, event: &SyncEvent) {
        if let Some(toast) = toast_for_event(event) {
            self.notify(toast);
        }
    }

    /// Forward events until the subscription closes
    pub async fn run(self, mut subscription: EventSubscription) {
        while let Some(event) = subscription.recv().await {
            self.dispatch(&event);
        }
        tracing::debug!("[Notify] Event stream closed");
    }
}

fn label(category: Category) -> &'static str {
    match category {
        Category::Assessment => "Assessment",
        Category::Deficiency => "Deficiency",
        Category::Photo => "Photo",
        Category::Recording => "Voice note",
    }
}

/// Success, partial or failure toast for a finished pass; silent when the
/// pass had nothing to do
pub fn toast_for_result(result: &SyncResult) -> Option<Toast> {
    if result.total() == 0 && !result.aborted {
        return None;
    }
    let toast = if result.failed == 0 && !result.aborted {
        Toast::new(
            ToastKind::Success,
            "Sync complete",
            format!("{} item(s) synced", result.synced),
        )
    } else if result.synced > 0 {
        Toast::new(
            ToastKind::Warning,
            "Sync partially complete",
            format!("{} synced, {} failed", result.synced, result.failed),
        )
    } else {
        Toast::new(
            ToastKind::Error,
            "Sync failed",
            format!("{} item(s) failed; they will retry when you reconnect", result.failed),
        )
    };
    Some(toast)
}

pub fn toast_for_event(event: &SyncEvent) -> Option<Toast> {
    match event.event_type {
        SyncEventType::Start => {
            let total = event.progress.as_ref().map_or(0, |p| p.total);
            (total > 0).then(|| {
                Toast::new(ToastKind::Info, "Syncing", format!("Uploading {} queued item(s)", total))
            })
        }
        SyncEventType::Progress => None,
        SyncEventType::Complete => toast_for_result(event.result.as_ref()?),
        SyncEventType::Error => Some(Toast::new(
            ToastKind::Error,
            "Sync error",
            event.message.clone().unwrap_or_else(|| "Unknown error".to_string()),
        )),
    }
}
