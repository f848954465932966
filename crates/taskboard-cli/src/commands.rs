//! Command handlers, one per subcommand.

use crate::render;
use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use console::style;
use dialoguer::{Confirm, Input, Password, Select, theme::ColorfulTheme};
use std::time::Duration;
use taskboard_client::{
    Category, CategoryFilter, ClientConfig, GuardDecision, Route, RouteGuard, Session,
    SignupRequest, StatusFilter, TaskDraft, TaskFilter, TaskSyncController, TermsAgreement,
};
use tracing::{debug, info};

const REMOTE_LOGOUT_WAIT: Duration = Duration::from_secs(5);

#[derive(Subcommand)]
pub enum TaskCommand {
    /// List tasks, optionally filtered
    List {
        /// all, completed or pending
        #[arg(short, long, default_value = "all")]
        status: StatusFilter,
        /// all or one of Work, Personal, Shopping, Health, Other
        #[arg(short, long, default_value = "all")]
        category: CategoryFilter,
    },
    /// Add a new task (prompts for anything not given)
    Add {
        /// Task title
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        category: Option<Category>,
        /// Due date as YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Flip the completed state of a task
    Toggle { id: String },
    /// Delete a task
    Delete { id: String },
}

/// Everything a command needs, built once at startup
pub struct App {
    pub config: ClientConfig,
    pub session: Session,
    pub guard: RouteGuard,
}

impl App {
    pub fn new(config: ClientConfig, session: Session) -> Self {
        let guard = RouteGuard::new(session.clone());
        Self {
            config,
            session,
            guard,
        }
    }

    async fn require(&self, route: Route) -> Result<()> {
        let decision = if route.is_protected() {
            self.guard.settled().await
        } else {
            self.guard.resolve(route)
        };

        match decision {
            GuardDecision::Allow => Ok(()),
            GuardDecision::Redirect(target) => bail!(
                "Not logged in. Run `taskboard {}` first.",
                target.path().trim_start_matches('/')
            ),
            GuardDecision::Pending => bail!("Session is still loading"),
        }
    }

    fn controller(&self) -> TaskSyncController {
        TaskSyncController::new(self.session.clone(), &self.config)
    }
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

fn prompt_text(prompt: &str) -> Result<String> {
    Ok(Input::with_theme(&theme())
        .with_prompt(prompt)
        .interact_text()?)
}

fn prompt_optional(prompt: &str) -> Result<String> {
    Ok(Input::with_theme(&theme())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?)
}

pub async fn signup(
    app: &App,
    name: Option<String>,
    email: Option<String>,
    age: Option<u32>,
    accept_terms: bool,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => prompt_text("Name")?,
    };
    let email = match email {
        Some(email) => email,
        None => prompt_text("Email")?,
    };
    let password = Password::with_theme(&theme())
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let age = match age {
        Some(age) => Some(age),
        None => {
            let raw: String = Input::with_theme(&theme())
                .with_prompt("Age (optional)")
                .allow_empty(true)
                .validate_with(|input: &String| -> Result<(), String> {
                    if input.trim().is_empty() || input.trim().parse::<u32>().is_ok() {
                        Ok(())
                    } else {
                        Err("Age must be a whole number".to_string())
                    }
                })
                .interact_text()?;
            raw.trim().parse().ok()
        }
    };

    let terms = if accept_terms
        || Confirm::with_theme(&theme())
            .with_prompt("Do you agree to the terms and conditions?")
            .default(false)
            .interact()?
    {
        TermsAgreement::Accepted
    } else {
        TermsAgreement::Declined
    };

    let profile = SignupRequest {
        name,
        email,
        password,
        age,
    };
    let user = app
        .session
        .signup(&profile, terms)
        .await
        .context("Signup failed")?;

    println!("{} Welcome, {}", style("✔").green().bold(), render::user_badge(&user));
    Ok(())
}

pub async fn login(app: &App, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_text("Email")?,
    };
    let password = Password::with_theme(&theme())
        .with_prompt("Password")
        .interact()?;

    let user = app
        .session
        .login(&email, &password)
        .await
        .context("Login failed")?;

    println!("{} Logged in as {}", style("✔").green().bold(), render::user_badge(&user));
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    let remote = app.session.logout().await.context("Failed to clear session")?;

    if let Some(handle) = remote {
        // Give the backend a chance to revoke the token before exiting
        if tokio::time::timeout(REMOTE_LOGOUT_WAIT, handle).await.is_err() {
            debug!("Remote logout still pending, not waiting any longer");
        }
    }

    println!("{} Logged out", style("✔").green().bold());
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    app.require(Route::Dashboard).await?;
    if let Some(user) = app.session.user() {
        println!("{}", render::user_badge(&user));
        if let Some(age) = user.age {
            println!("    age {}", age);
        }
    }
    Ok(())
}

pub async fn tasks(app: &App, command: TaskCommand) -> Result<()> {
    app.require(Route::Dashboard).await?;
    let controller = app.controller();

    match command {
        TaskCommand::List { status, category } => {
            let loaded = controller.set_filter(TaskFilter::new(status, category)).await;
            print_notices(&controller);
            loaded.context("Could not load tasks")?;
            println!("{}", render::filter_summary(&controller.filter()));
        }
        TaskCommand::Add {
            title,
            description,
            category,
            due,
        } => {
            let draft = if title.is_none() && description.is_none() {
                prompt_draft()?
            } else {
                TaskDraft {
                    title: title.unwrap_or_default(),
                    description: description.unwrap_or_default(),
                    category: category.unwrap_or_default(),
                    due_date: due,
                }
            };

            let created = controller.add_task(draft).await;
            print_notices(&controller);
            let created = created.context("Could not add task")?;
            info!("Added task {}", created.id);
        }
        TaskCommand::Toggle { id } => {
            controller.refresh().await.context("Could not load tasks")?;
            let toggled = controller.toggle_complete(&id).await;
            print_notices(&controller);
            toggled.context("Could not update task")?;
        }
        TaskCommand::Delete { id } => {
            let deleted = controller.delete_task(&id).await;
            print_notices(&controller);
            deleted.context("Could not delete task")?;
        }
    }

    let today = Local::now().date_naive();
    println!("{}", render::task_list(&controller.tasks(), today));
    Ok(())
}

fn prompt_draft() -> Result<TaskDraft> {
    let title = prompt_optional("Title")?;
    let description = prompt_optional("Description")?;

    let labels: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    let default = Category::ALL
        .iter()
        .position(|c| *c == Category::default())
        .unwrap_or(0);
    let selected = Select::with_theme(&theme())
        .with_prompt("Category")
        .items(&labels)
        .default(default)
        .interact()?;

    let due: String = Input::with_theme(&theme())
        .with_prompt("Due date (YYYY-MM-DD, optional)")
        .allow_empty(true)
        .validate_with(|input: &String| -> Result<(), String> {
            if input.trim().is_empty() || input.trim().parse::<NaiveDate>().is_ok() {
                Ok(())
            } else {
                Err("Expected a date like 2024-05-01".to_string())
            }
        })
        .interact_text()?;

    Ok(TaskDraft {
        title,
        description,
        category: Category::ALL[selected],
        due_date: due.trim().parse().ok(),
    })
}

fn print_notices(controller: &TaskSyncController) {
    let notices = controller.notifications();
    for notice in [notices.current_success(), notices.current_error()]
        .into_iter()
        .flatten()
    {
        println!("{}", render::notice(&notice));
    }
}
