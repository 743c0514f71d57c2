pub mod json_store;

use crate::error::AppError;
use crate::model::{NewInstance, RecurrenceType, Task};
use time::Date;

pub use json_store::JsonTaskStore;

/// Partial update of a template's recurrence columns.
///
/// `None` leaves a column untouched. `next_occurrence_date: Some(None)`
/// clears the date. When `expected_version` is set the write is refused
/// with [`AppError::Conflict`] if the record changed since it was read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TemplateUpdate {
    pub next_occurrence_date: Option<Option<Date>>,
    pub recurrence_type: Option<RecurrenceType>,
    pub expected_version: Option<u64>,
}

impl TemplateUpdate {
    pub fn advance(next_occurrence_date: Date, expected_version: u64) -> Self {
        Self {
            next_occurrence_date: Some(Some(next_occurrence_date)),
            recurrence_type: None,
            expected_version: Some(expected_version),
        }
    }

    pub fn end(expected_version: u64) -> Self {
        Self {
            next_occurrence_date: Some(None),
            recurrence_type: Some(RecurrenceType::None),
            expected_version: Some(expected_version),
        }
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(next_occurrence_date) = self.next_occurrence_date {
            task.recurrence.next_occurrence_date = next_occurrence_date;
        }
        if let Some(kind) = self.recurrence_type {
            task.recurrence.kind = kind;
        }
    }
}

/// Refuses the write with [`AppError::Conflict`] when `task` changed since
/// it was read at `expected_version`.
pub fn ensure_version(task: &Task, expected_version: u64) -> Result<(), AppError> {
    if task.version != expected_version {
        return Err(AppError::conflict(format!(
            "task {} changed since it was read (version {} != {expected_version})",
            task.id, task.version
        )));
    }
    Ok(())
}

/// Persistence used by the recurrence engine.
pub trait TaskStore {
    /// Templates with an active rule whose next date is on or before `date`.
    fn list_templates_due_by(&self, date: Date) -> Result<Vec<Task>, AppError>;

    /// Inserts `instance` and moves the template to `next_occurrence_date`
    /// as one write. On any error, including a version conflict, neither
    /// change is stored.
    fn materialize_instance(
        &self,
        template_id: u64,
        expected_version: u64,
        instance: NewInstance,
        next_occurrence_date: Date,
    ) -> Result<u64, AppError>;

    fn update_template(&self, id: u64, update: &TemplateUpdate) -> Result<Task, AppError>;
}

impl<S: TaskStore + ?Sized> TaskStore for &S {
    fn list_templates_due_by(&self, date: Date) -> Result<Vec<Task>, AppError> {
        (**self).list_templates_due_by(date)
    }

    fn materialize_instance(
        &self,
        template_id: u64,
        expected_version: u64,
        instance: NewInstance,
        next_occurrence_date: Date,
    ) -> Result<u64, AppError> {
        (**self).materialize_instance(
            template_id,
            expected_version,
            instance,
            next_occurrence_date,
        )
    }

    fn update_template(&self, id: u64, update: &TemplateUpdate) -> Result<Task, AppError> {
        (**self).update_template(id, update)
    }
}
