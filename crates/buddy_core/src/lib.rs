pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod occurrence;
pub mod scheduler;
pub mod storage;
pub mod task_api;

#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::model::{RecurrenceRule, RecurrenceType, Task};

    #[test]
    fn task_has_required_fields() {
        let task = Task {
            id: 1,
            title: "demo".to_string(),
            completed: false,
            is_main_task: false,
            subtasks: Vec::new(),
            date_added: "2025-12-20T00:00:00Z".to_string(),
            completed_at: None,
            main_task_id: None,
            parent_id: None,
            recurrence: RecurrenceRule::none(),
            original_task_id: None,
            occurrence_date: None,
            version: 0,
        };

        assert_eq!(task.id, 1);
        assert_eq!(task.title, "demo");
        assert_eq!(task.recurrence.kind, RecurrenceType::None);
        assert_eq!(task.date_added, "2025-12-20T00:00:00Z");
        assert!(!task.is_template());
        assert!(!task.is_instance());
    }

    #[test]
    fn app_error_exposes_code() {
        let err = AppError::invalid_input("missing title");
        assert_eq!(err.code(), "invalid_input");
        assert_eq!(err.to_string(), "invalid_input - missing title");
    }
}
