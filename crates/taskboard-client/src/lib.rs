//! Client core for the Taskboard task manager
//!
//! This crate holds everything of the client that is not presentation:
//!
//! - [`http`]: the shared request pipeline that attaches the bearer token
//! - [`session`]: login, signup, logout and bootstrap of the persisted session
//! - [`tasks`]: the task model and typed gateway for the `/tasks` endpoints
//! - [`sync`]: the refetch-on-mutation controller behind a task view
//! - [`guard`]: the route guard in front of protected views
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskboard_client::{
//!     ApiClient, ClientConfig, FileTokenStore, GuardDecision, RouteGuard, Session,
//!     TaskSyncController,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::load()?;
//!     let tokens = Arc::new(FileTokenStore::new(config.token_path()?));
//!     let session = Session::new(ApiClient::from_config(&config, tokens)?);
//!
//!     session.bootstrap().await;
//!     if RouteGuard::new(session.clone()).evaluate() == GuardDecision::Allow {
//!         let view = TaskSyncController::new(session, &config);
//!         view.refresh().await?;
//!         println!("{} tasks", view.tasks().len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod notify;
pub mod session;
pub mod storage;
pub mod sync;
pub mod tasks;

pub use crate::config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use guard::{GuardDecision, Route, RouteGuard};
pub use http::{ApiClient, ApiClientBuilder};
pub use notify::{Notice, NoticeKind, Notifications};
pub use session::{Session, SignupRequest, TermsAgreement, User};
pub use storage::{FileTokenStore, InMemoryTokenStore, TokenStore};
pub use sync::{CategoryFilter, StatusFilter, SyncStatus, TaskFilter, TaskSyncController};
pub use tasks::{Category, NewTask, Task, TaskDraft, TaskGateway, TaskPatch, TaskQuery};
