//! The recurrence engine: one generation pass over every due template.

use crate::error::AppError;
use crate::model::{NewInstance, Task};
use crate::occurrence::{Occurrence, plan_occurrence};
use crate::storage::{TaskStore, TemplateUpdate};
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::{debug, error, info};

/// Source of "today" for a pass.
pub trait Clock {
    fn today(&self) -> Date;
}

/// Today's date in the local timezone, falling back to UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> Date {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        OffsetDateTime::now_utc().to_offset(offset).date()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Date);

impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedInstance {
    pub template_id: u64,
    pub instance_id: u64,
    pub occurrence_date: Date,
    /// Missed due dates folded into this instance.
    pub collapsed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvancedTemplate {
    pub template_id: u64,
    pub next_occurrence_date: Date,
}

#[derive(Debug)]
pub struct GenerationFailure {
    pub task_id: u64,
    pub error: AppError,
}

#[derive(Debug)]
pub struct GenerationReport {
    pub today: Date,
    pub due: usize,
    pub created: Vec<CreatedInstance>,
    pub advanced: Vec<AdvancedTemplate>,
    pub ended: Vec<u64>,
    pub failures: Vec<GenerationFailure>,
}

impl GenerationReport {
    fn new(today: Date, due: usize) -> Self {
        Self {
            today,
            due,
            created: Vec::new(),
            advanced: Vec::new(),
            ended: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct RecurrenceEngine<S, C = LocalClock> {
    store: S,
    clock: C,
}

impl<S: TaskStore> RecurrenceEngine<S, LocalClock> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: LocalClock,
        }
    }
}

impl<S: TaskStore, C: Clock> RecurrenceEngine<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn run_generation_pass(&self) -> Result<GenerationReport, AppError> {
        self.run_generation_pass_on(self.clock.today())
    }

    /// Processes every template due on or before `today`.
    ///
    /// Only a failure to read the due set fails the pass. Errors for a
    /// single template are logged, recorded in the report, and leave that
    /// template for the next pass.
    pub fn run_generation_pass_on(&self, today: Date) -> Result<GenerationReport, AppError> {
        let templates = self.store.list_templates_due_by(today)?;
        let mut report = GenerationReport::new(today, templates.len());

        if templates.is_empty() {
            debug!(%today, "no recurring tasks due");
            return Ok(report);
        }
        info!(%today, due = templates.len(), "generating recurring tasks");

        for template in &templates {
            if let Err(err) = self.process_template(template, today, &mut report) {
                error!(task_id = template.id, "recurring task not processed: {err}");
                report.failures.push(GenerationFailure {
                    task_id: template.id,
                    error: err,
                });
            }
        }

        info!(
            %today,
            created = report.created.len(),
            ended = report.ended.len(),
            failed = report.failures.len(),
            "recurring task pass finished"
        );
        Ok(report)
    }

    fn process_template(
        &self,
        template: &Task,
        today: Date,
        report: &mut GenerationReport,
    ) -> Result<(), AppError> {
        match plan_occurrence(&template.recurrence, today) {
            Occurrence::NotDue => {
                debug!(task_id = template.id, "template no longer due, skipping");
            }
            Occurrence::Ended { last_due } => {
                self.store
                    .update_template(template.id, &TemplateUpdate::end(template.version))?;
                info!(
                    task_id = template.id,
                    title = template.title.as_str(),
                    %last_due,
                    "recurrence ended"
                );
                report.ended.push(template.id);
            }
            Occurrence::Due {
                occurrence_date,
                next_occurrence_date,
                collapsed,
            } => {
                let instance_id = self.store.materialize_instance(
                    template.id,
                    template.version,
                    NewInstance::from_template(template, occurrence_date),
                    next_occurrence_date,
                )?;
                info!(
                    task_id = template.id,
                    instance_id,
                    title = template.title.as_str(),
                    occurrence = %occurrence_date,
                    next = %next_occurrence_date,
                    collapsed,
                    "created recurring instance"
                );
                report.created.push(CreatedInstance {
                    template_id: template.id,
                    instance_id,
                    occurrence_date,
                    collapsed,
                });
                report.advanced.push(AdvancedTemplate {
                    template_id: template.id,
                    next_occurrence_date,
                });
            }
        }
        Ok(())
    }
}
