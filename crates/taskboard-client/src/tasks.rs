//! Task data model and the typed gateway for the `/tasks` endpoints.

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Fixed set of task categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Work,
    Personal,
    Shopping,
    Health,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Work,
        Category::Personal,
        Category::Shopping,
        Category::Health,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Shopping => "Shopping",
            Category::Health => "Health",
            Category::Other => "Other",
        }
    }

    /// Interpret a raw backend value; missing or unknown values count as `Other`
    pub fn from_raw(raw: Option<&str>) -> Category {
        raw.and_then(|value| value.parse().ok())
            .unwrap_or(Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ClientError::validation(format!("Unknown category '{s}'")))
    }
}

/// Accepts `YYYY-MM-DD` as well as full timestamps, keeping only the date
fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        let date_part = value.get(..10).unwrap_or(&value);
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
    }))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| {
        DateTime::parse_from_rfc3339(&value)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }))
}

/// A task as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "TaskRecord")]
pub struct Task {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Raw category as given by the backend, see [`Task::category_kind`]
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub completed: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Wire shape of a task
///
/// Every field may be missing or null. The id may arrive as `_id`, `id` or
/// both; `_id` wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    #[serde(rename = "_id", default)]
    object_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_due_date")]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    created_at: Option<DateTime<Utc>>,
}

impl TryFrom<TaskRecord> for Task {
    type Error = String;

    fn try_from(record: TaskRecord) -> Result<Self, Self::Error> {
        let id = record
            .object_id
            .or(record.id)
            .ok_or_else(|| "missing field `_id`".to_string())?;

        Ok(Self {
            id,
            title: record.title,
            description: record.description,
            category: record.category,
            due_date: record.due_date,
            completed: record.completed.unwrap_or(false),
            created_at: record.created_at,
        })
    }
}

impl Task {
    pub fn category_kind(&self) -> Category {
        Category::from_raw(self.category.as_deref())
    }

    /// Title, falling back to the description, then a placeholder
    pub fn display_title(&self) -> &str {
        non_blank(self.title.as_deref())
            .or_else(|| non_blank(self.description.as_deref()))
            .unwrap_or("Untitled Task")
    }

    /// Description shown beneath the title, only when both are present
    pub fn subtitle(&self) -> Option<&str> {
        non_blank(self.title.as_deref())?;
        non_blank(self.description.as_deref())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due < today)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Creation payload sent to `POST /tasks`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// User input for a new task, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// Validate the draft and stamp it with its creation time
    ///
    /// A draft needs a non-blank title or description; blank fields are
    /// omitted from the payload.
    pub fn into_new_task(self, created_at: DateTime<Utc>) -> ClientResult<NewTask> {
        let title = Some(self.title.trim().to_string()).filter(|t| !t.is_empty());
        let description = Some(self.description.trim().to_string()).filter(|d| !d.is_empty());

        if title.is_none() && description.is_none() {
            return Err(ClientError::validation(
                "A task needs a title or a description",
            ));
        }

        Ok(NewTask {
            title,
            description,
            category: self.category,
            due_date: self.due_date,
            created_at,
        })
    }
}

/// Partial update payload sent to `PATCH /tasks/:id`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }
}

/// Query parameters accepted by `GET /tasks`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// Path of a single task; ids that could escape `/tasks/` are refused
fn task_path(id: &str) -> ClientResult<String> {
    let unsafe_char =
        |c: char| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control();

    if id.is_empty() || id == "." || id == ".." || id.contains(unsafe_char) {
        return Err(ClientError::validation(format!("Invalid task id '{id}'")));
    }
    Ok(format!("/tasks/{id}"))
}

/// Typed request functions for task CRUD
#[derive(Clone)]
pub struct TaskGateway {
    api: ApiClient,
}

impl TaskGateway {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn create_task(&self, task: &NewTask) -> ClientResult<Task> {
        let created: Task = self.api.post("/tasks", task).await?;
        info!("Created task {}", created.id);
        Ok(created)
    }

    pub async fn get_tasks(&self, query: &TaskQuery) -> ClientResult<Vec<Task>> {
        let tasks: Vec<Task> = self.api.get_with_query("/tasks", query).await?;
        debug!("Fetched {} tasks with {:?}", tasks.len(), query);
        Ok(tasks)
    }

    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> ClientResult<Task> {
        let path = task_path(id)?;
        self.api.patch(&path, patch).await
    }

    pub async fn delete_task(&self, id: &str) -> ClientResult<()> {
        let path = task_path(id)?;
        self.api.delete(&path).await?;
        info!("Deleted task {}", id);
        Ok(())
    }
}
