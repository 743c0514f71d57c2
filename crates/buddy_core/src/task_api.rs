use crate::engine::{Clock, LocalClock};
use crate::error::AppError;
use crate::model::{RecurrenceDetails, RecurrenceRule, RecurrenceType, Subtask, Task};
use crate::storage::json_store;
use std::path::Path;
use time::Date;

/// Recurrence requested by a user when creating or editing a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecurrenceInput {
    pub kind: RecurrenceType,
    pub interval: i64,
    pub days_of_week: Vec<String>,
    /// First date an instance is due; today when absent.
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub is_main_task: bool,
    pub subtasks: Vec<String>,
    pub recurrence: Option<RecurrenceInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Templates,
    InstancesOf(u64),
}

pub fn add_task(path: &Path, new_task: NewTask) -> Result<Task, AppError> {
    let title = required_title(&new_task.title)?;
    let recurrence = match new_task.recurrence.as_ref() {
        Some(input) => build_rule(input, LocalClock.today())?,
        None => RecurrenceRule::none(),
    };

    let mut subtasks = Vec::with_capacity(new_task.subtasks.len());
    for text in &new_task.subtasks {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::invalid_input("subtask text is required"));
        }
        subtasks.push(Subtask {
            text: trimmed.to_string(),
            done: false,
        });
    }

    let date_added = json_store::now_timestamp()?;
    json_store::update_state(path, |state| {
        let task = Task {
            id: state.allocate_id(),
            title,
            completed: false,
            is_main_task: new_task.is_main_task,
            subtasks,
            date_added,
            completed_at: None,
            main_task_id: None,
            parent_id: None,
            recurrence,
            original_task_id: None,
            occurrence_date: None,
            version: 0,
        };
        state.tasks.push(task.clone());
        Ok(task)
    })
}

/// Adds or replaces the rule on an existing task. A task whose recurrence
/// ended becomes an active template again.
pub fn set_recurrence(path: &Path, id: u64, input: &RecurrenceInput) -> Result<Task, AppError> {
    let rule = build_rule(input, LocalClock.today())?;
    update_task(path, id, |task| {
        if task.is_instance() && rule.is_recurring() {
            return Err(AppError::invalid_input("generated instances cannot recur"));
        }
        task.recurrence = rule;
        Ok(())
    })
}

pub fn clear_recurrence(path: &Path, id: u64) -> Result<Task, AppError> {
    update_task(path, id, |task| {
        if !task.is_template() {
            return Err(AppError::invalid_input("task is not recurring"));
        }
        task.recurrence.end();
        Ok(())
    })
}

pub fn edit_title(path: &Path, id: u64, new_title: &str) -> Result<Task, AppError> {
    let title = required_title(new_title)?;
    update_task(path, id, |task| {
        task.title = title;
        Ok(())
    })
}

pub fn complete_task(path: &Path, id: u64) -> Result<Task, AppError> {
    let completed_at = json_store::now_timestamp()?;
    update_task(path, id, |task| {
        if task.completed {
            return Err(AppError::invalid_input("task already completed"));
        }
        task.completed = true;
        task.completed_at = Some(completed_at);
        Ok(())
    })
}

pub fn reopen_task(path: &Path, id: u64) -> Result<Task, AppError> {
    update_task(path, id, |task| {
        if !task.completed {
            return Err(AppError::invalid_input("task is not completed"));
        }
        task.completed = false;
        task.completed_at = None;
        Ok(())
    })
}

pub fn delete_task(path: &Path, id: u64) -> Result<Task, AppError> {
    json_store::update_state(path, |state| {
        let index = state
            .tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| AppError::invalid_input("task not found"))?;
        Ok(state.tasks.remove(index))
    })
}

pub fn get_task(path: &Path, id: u64) -> Result<Task, AppError> {
    let state = json_store::load_state(path)?;
    state.find(id).cloned()
}

pub fn list_tasks(path: &Path, filter: TaskFilter) -> Result<Vec<Task>, AppError> {
    let tasks = json_store::load_state(path)?.tasks;
    Ok(tasks
        .into_iter()
        .filter(|task| match filter {
            TaskFilter::All => true,
            TaskFilter::Templates => task.is_template(),
            TaskFilter::InstancesOf(template_id) => task.original_task_id == Some(template_id),
        })
        .collect())
}

fn update_task<F>(path: &Path, id: u64, change: F) -> Result<Task, AppError>
where
    F: FnOnce(&mut Task) -> Result<(), AppError>,
{
    json_store::update_state(path, |state| {
        let task = state.find_mut(id)?;
        change(task)?;
        task.version += 1;
        Ok(task.clone())
    })
}

fn required_title(title: &str) -> Result<String, AppError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input("title is required"));
    }
    Ok(trimmed.to_string())
}

fn build_rule(input: &RecurrenceInput, today: Date) -> Result<RecurrenceRule, AppError> {
    if !input.kind.is_recurring() {
        return Ok(RecurrenceRule::none());
    }

    let details = RecurrenceDetails::from_day_names(&input.days_of_week)?;
    if !details.is_empty() && !matches!(input.kind, RecurrenceType::Weekly | RecurrenceType::Custom)
    {
        return Err(AppError::invalid_input(
            "days of week only apply to weekly or custom recurrence",
        ));
    }

    let first_due = input.start_date.unwrap_or(today);
    if let Some(end_date) = input.end_date
        && end_date <= first_due
    {
        return Err(AppError::invalid_input(
            "end date must be after the first occurrence",
        ));
    }

    Ok(RecurrenceRule {
        kind: input.kind,
        interval: input.interval.max(1),
        details,
        end_date: input.end_date,
        next_occurrence_date: Some(first_due),
    })
}
