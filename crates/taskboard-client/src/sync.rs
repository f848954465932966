//! Task synchronization controller.
//!
//! Keeps one view's task collection consistent with the backend. The list
//! is never patched locally: every settled mutation is followed by a full
//! refetch of the filtered collection. Overlapping fetches are not
//! cancelled, but each carries a generation number and only the most
//! recently issued one may update the view.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::notify::Notifications;
use crate::session::Session;
use crate::tasks::{Category, Task, TaskDraft, TaskGateway, TaskPatch, TaskQuery};
use chrono::Utc;
use futures_signals::signal::{Mutable, Signal};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Completion filter of the task view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Completed => "completed",
            StatusFilter::Pending => "pending",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "completed" => Ok(StatusFilter::Completed),
            "pending" => Ok(StatusFilter::Pending),
            other => Err(ClientError::validation(format!(
                "Unknown status filter '{other}'"
            ))),
        }
    }
}

/// Category filter of the task view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryFilter::All => f.write_str("all"),
            CategoryFilter::Only(category) => write!(f, "{category}"),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            s.parse().map(CategoryFilter::Only)
        }
    }
}

/// View-local filter selection, never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFilter {
    pub status: StatusFilter,
    pub category: CategoryFilter,
}

impl TaskFilter {
    pub fn new(status: StatusFilter, category: CategoryFilter) -> Self {
        Self { status, category }
    }

    /// Query parameters for `GET /tasks`
    pub fn to_query(&self) -> TaskQuery {
        TaskQuery {
            completed: match self.status {
                StatusFilter::All => None,
                StatusFilter::Completed => Some(true),
                StatusFilter::Pending => Some(false),
            },
            category: match self.category {
                CategoryFilter::All => None,
                CategoryFilter::Only(category) => Some(category),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Loading,
    Loaded,
    Error,
}

pub const LOAD_FAILED: &str = "Failed to load tasks";
pub const ADD_FAILED: &str = "Failed to add task";
pub const UPDATE_FAILED: &str = "Failed to update task";
pub const DELETE_FAILED: &str = "Failed to delete task";
pub const ADDED: &str = "Task added successfully";
pub const UPDATED: &str = "Task updated successfully";
pub const DELETED: &str = "Task deleted successfully";

struct ControllerInner {
    gateway: TaskGateway,
    session: Session,
    tasks: Mutable<Vec<Task>>,
    status: Mutable<SyncStatus>,
    filter: Mutable<TaskFilter>,
    notices: Notifications,
    generation: AtomicU64,
    logout_on_unauthorized: bool,
}

/// Refetch-on-mutation controller for one task view
#[derive(Clone)]
pub struct TaskSyncController {
    inner: Arc<ControllerInner>,
}

impl TaskSyncController {
    pub fn new(session: Session, config: &ClientConfig) -> Self {
        let gateway = TaskGateway::new(session.api().clone());
        Self {
            inner: Arc::new(ControllerInner {
                gateway,
                session,
                tasks: Mutable::new(Vec::new()),
                status: Mutable::new(SyncStatus::Idle),
                filter: Mutable::new(TaskFilter::default()),
                notices: Notifications::new(config.notification_ttl()),
                generation: AtomicU64::new(0),
                logout_on_unauthorized: config.logout_on_unauthorized,
            }),
        }
    }

    /// Tasks currently displayed
    pub fn tasks(&self) -> Vec<Task> {
        self.inner.tasks.get_cloned()
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.get()
    }

    pub fn filter(&self) -> TaskFilter {
        self.inner.filter.get()
    }

    pub fn notifications(&self) -> &Notifications {
        &self.inner.notices
    }

    pub fn tasks_signal(&self) -> impl Signal<Item = Vec<Task>> + use<> {
        self.inner.tasks.signal_cloned()
    }

    pub fn status_signal(&self) -> impl Signal<Item = SyncStatus> + use<> {
        self.inner.status.signal()
    }

    /// Refetch the filtered collection from the backend
    ///
    /// On failure the previously displayed tasks are kept and an error
    /// notice is shown. A response that arrives after a newer fetch was
    /// issued is dropped.
    pub async fn refresh(&self) -> ClientResult<()> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = self.inner.filter.get().to_query();
        self.inner.status.set_neq(SyncStatus::Loading);

        let result = self.inner.gateway.get_tasks(&query).await;

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            debug!("Discarding stale task list response (generation {})", generation);
            return result.map(|_| ());
        }

        match result {
            Ok(tasks) => {
                self.inner.tasks.set(tasks);
                self.inner.status.set_neq(SyncStatus::Loaded);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load tasks: {}", e);
                self.inner.status.set_neq(SyncStatus::Error);
                self.inner.notices.error(LOAD_FAILED);
                self.check_unauthorized(&e).await;
                Err(e)
            }
        }
    }

    /// Replace the whole filter, refetching when it changed
    pub async fn set_filter(&self, filter: TaskFilter) -> ClientResult<()> {
        let changed = self.inner.filter.replace(filter) != filter;
        if changed || self.status() == SyncStatus::Idle {
            self.refresh().await
        } else {
            Ok(())
        }
    }

    pub async fn set_status_filter(&self, status: StatusFilter) -> ClientResult<()> {
        let filter = TaskFilter {
            status,
            ..self.filter()
        };
        self.set_filter(filter).await
    }

    pub async fn set_category_filter(&self, category: CategoryFilter) -> ClientResult<()> {
        let filter = TaskFilter {
            category,
            ..self.filter()
        };
        self.set_filter(filter).await
    }

    /// Create a task from a form draft, then resync
    pub async fn add_task(&self, draft: TaskDraft) -> ClientResult<Task> {
        let new_task = match draft.into_new_task(Utc::now()) {
            Ok(task) => task,
            Err(e) => {
                self.inner.notices.error(e.to_string());
                return Err(e);
            }
        };

        match self.inner.gateway.create_task(&new_task).await {
            Ok(created) => {
                self.inner.notices.success(ADDED);
                self.resync_after_mutation().await;
                Ok(created)
            }
            Err(e) => Err(self.mutation_failed(e, ADD_FAILED).await),
        }
    }

    /// Flip `completed` on a displayed task, then resync
    pub async fn toggle_complete(&self, id: &str) -> ClientResult<Task> {
        let current = self
            .inner
            .tasks
            .lock_ref()
            .iter()
            .find(|task| task.id == id)
            .map(|task| task.completed);

        let Some(completed) = current else {
            let e = ClientError::NotFound(format!("Task {id} is not in the current view"));
            return Err(self.mutation_failed(e, UPDATE_FAILED).await);
        };

        match self
            .inner
            .gateway
            .update_task(id, &TaskPatch::completed(!completed))
            .await
        {
            Ok(updated) => {
                info!("Task {} marked completed={}", id, updated.completed);
                self.inner.notices.success(UPDATED);
                self.resync_after_mutation().await;
                Ok(updated)
            }
            Err(e) => Err(self.mutation_failed(e, UPDATE_FAILED).await),
        }
    }

    /// Delete a task, then resync
    pub async fn delete_task(&self, id: &str) -> ClientResult<()> {
        match self.inner.gateway.delete_task(id).await {
            Ok(()) => {
                self.inner.notices.success(DELETED);
                self.resync_after_mutation().await;
                Ok(())
            }
            Err(e) => Err(self.mutation_failed(e, DELETE_FAILED).await),
        }
    }

    async fn resync_after_mutation(&self) {
        // The mutation itself succeeded; refresh reports its own failure
        if let Err(e) = self.refresh().await {
            debug!("Resync after mutation failed: {}", e);
        }
    }

    async fn mutation_failed(&self, e: ClientError, message: &str) -> ClientError {
        warn!("{}: {}", message, e);
        self.inner.notices.error(message);
        self.check_unauthorized(&e).await;
        e
    }

    async fn check_unauthorized(&self, e: &ClientError) {
        if self.inner.logout_on_unauthorized && e.is_unauthorized() {
            warn!("Backend rejected the session token, logging out");
            if let Err(e) = self.inner.session.logout().await {
                warn!("Logout after 401 failed: {}", e);
            }
        }
    }
}
