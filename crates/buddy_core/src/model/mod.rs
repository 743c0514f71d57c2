pub mod date_text;
pub mod recurrence;
pub mod task;

pub use recurrence::{RecurrenceDetails, RecurrenceRule, RecurrenceType};
pub use task::{NewInstance, Subtask, Task};
