//! Terminal rendering of tasks, notices and the signed-in user.

use chrono::NaiveDate;
use console::{Style, style};
use taskboard_client::{Category, Notice, NoticeKind, Task, TaskFilter, User};

pub const EMPTY_LIST: &str = "No tasks found. Add a new task to get started!";

/// `May 1, 2024`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Category chip colours (xterm-256 approximations of the web palette)
pub fn category_style(category: Category) -> Style {
    let colour = match category {
        Category::Work => 71,
        Category::Personal => 33,
        Category::Shopping => 208,
        Category::Health => 161,
        Category::Other => 127,
    };
    Style::new().color256(colour).bold()
}

pub fn task_line(task: &Task, today: NaiveDate) -> String {
    let checkbox = if task.completed { "[x]" } else { "[ ]" };
    let title = if task.completed {
        style(task.display_title()).dim().strikethrough()
    } else {
        style(task.display_title()).bold()
    };

    let category = task.category_kind();
    let mut line = format!(
        "{} {} {} {}",
        checkbox,
        title,
        category_style(category).apply_to(format!("[{category}]")),
        style(&task.id).dim()
    );

    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", format_date(due)));
        if task.is_overdue(today) && !task.completed {
            line.push_str(&format!(" {}", style("Overdue").red().bold()));
        }
    }

    if let Some(subtitle) = task.subtitle() {
        line.push_str(&format!("\n      {}", style(subtitle).dim()));
    }

    line
}

pub fn task_list(tasks: &[Task], today: NaiveDate) -> String {
    if tasks.is_empty() {
        return style(EMPTY_LIST).italic().to_string();
    }
    tasks
        .iter()
        .map(|task| task_line(task, today))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn filter_summary(filter: &TaskFilter) -> String {
    format!(
        "Showing {} tasks in {} categories",
        style(filter.status).cyan(),
        style(filter.category).cyan()
    )
}

pub fn notice(notice: &Notice) -> String {
    match notice.kind {
        NoticeKind::Success => format!("{} {}", style("✔").green().bold(), notice.message),
        NoticeKind::Error => format!("{} {}", style("✘").red().bold(), style(&notice.message).red()),
    }
}

pub fn user_badge(user: &User) -> String {
    format!(
        "{} {} <{}>",
        style(format!("({})", user.initial())).cyan().bold(),
        style(&user.name).bold(),
        user.email
    )
}
