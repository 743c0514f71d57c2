use crate::model::date_text;
use crate::model::recurrence::RecurrenceRule;
use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "isMainTask", default)]
    pub is_main_task: bool,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    #[serde(rename = "dateAdded")]
    pub date_added: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub main_task_id: Option<u64>,
    #[serde(default)]
    pub parent_id: Option<u64>,
    #[serde(flatten)]
    pub recurrence: RecurrenceRule,
    #[serde(default)]
    pub original_task_id: Option<u64>,
    /// Date a generated instance stands for.
    #[serde(default, with = "date_text", skip_serializing_if = "Option::is_none")]
    pub occurrence_date: Option<Date>,
    #[serde(default)]
    pub version: u64,
}

impl Task {
    pub fn is_template(&self) -> bool {
        self.recurrence.is_recurring()
    }

    pub fn is_instance(&self) -> bool {
        self.original_task_id.is_some()
    }
}

/// A task row generated from a template, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    pub title: String,
    pub is_main_task: bool,
    pub main_task_id: Option<u64>,
    pub parent_id: Option<u64>,
    pub original_task_id: u64,
    pub occurrence_date: Date,
}

impl NewInstance {
    pub fn from_template(template: &Task, occurrence_date: Date) -> Self {
        Self {
            title: template.title.clone(),
            is_main_task: template.is_main_task,
            main_task_id: template.main_task_id,
            parent_id: template.parent_id,
            original_task_id: template.id,
            occurrence_date,
        }
    }

    pub fn into_task(self, id: u64, date_added: String) -> Task {
        Task {
            id,
            title: self.title,
            completed: false,
            is_main_task: self.is_main_task,
            subtasks: Vec::new(),
            date_added,
            completed_at: None,
            main_task_id: self.main_task_id,
            parent_id: self.parent_id,
            recurrence: RecurrenceRule::none(),
            original_task_id: Some(self.original_task_id),
            occurrence_date: Some(self.occurrence_date),
            version: 0,
        }
    }
}
