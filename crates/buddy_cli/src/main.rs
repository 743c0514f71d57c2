mod cli;

use buddy_core::config::{self, Config};
use buddy_core::engine::{GenerationReport, RecurrenceEngine};
use buddy_core::error::AppError;
use buddy_core::model::date_text::{format_date, parse_date};
use buddy_core::model::{RecurrenceRule, Task};
use buddy_core::scheduler::GenerationScheduler;
use buddy_core::storage::{JsonTaskStore, json_store};
use buddy_core::task_api::{self, NewTask, TaskFilter};
use clap::Parser;
use clap::error::ErrorKind;
use cli::{Cli, Command};
use std::path::{Path, PathBuf};
use tabled::{Table, Tabled};
use time::Date;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Repeats")]
    repeats: String,
    #[tabled(rename = "Next")]
    next: String,
    #[tabled(rename = "From")]
    origin: String,
}

fn date_label(date: Option<Date>) -> Result<String, AppError> {
    match date {
        Some(date) => format_date(date),
        None => Ok("-".to_string()),
    }
}

fn date_value(date: Option<Date>) -> Result<serde_json::Value, AppError> {
    Ok(match date {
        Some(date) => serde_json::Value::String(format_date(date)?),
        None => serde_json::Value::Null,
    })
}

fn status_label(task: &Task) -> &'static str {
    if task.completed { "completed" } else { "open" }
}

fn describe_rule(rule: &RecurrenceRule) -> String {
    if !rule.is_recurring() {
        return "-".to_string();
    }

    if !rule.details.is_empty() {
        return format!("{} on {}", rule.kind, rule.details.day_names().join(", "));
    }

    match rule.step() {
        1 => rule.kind.to_string(),
        step => format!("{} every {step}", rule.kind),
    }
}

fn task_json(task: &Task) -> Result<serde_json::Value, AppError> {
    Ok(serde_json::json!({
        "id": task.id,
        "title": task.title,
        "completed": task.completed,
        "completed_at": task.completed_at,
        "is_main_task": task.is_main_task,
        "subtasks": task.subtasks,
        "date_added": task.date_added,
        "recurrence_type": task.recurrence.kind,
        "recurrence_interval": task.recurrence.interval,
        "days_of_week": task.recurrence.details.day_names(),
        "next_occurrence_date": date_value(task.recurrence.next_occurrence_date)?,
        "end_recurrence_date": date_value(task.recurrence.end_date)?,
        "original_task_id": task.original_task_id,
        "occurrence_date": date_value(task.occurrence_date)?,
        "version": task.version,
    }))
}

fn print_task_json(task: &Task) -> Result<(), AppError> {
    println!("{}", task_json(task)?);
    Ok(())
}

fn print_tasks_json(tasks: &[Task]) -> Result<(), AppError> {
    let mut payload = Vec::with_capacity(tasks.len());
    for task in tasks {
        payload.push(task_json(task)?);
    }
    println!("{}", serde_json::Value::Array(payload));
    Ok(())
}

fn print_tasks_plain(tasks: &[Task]) -> Result<(), AppError> {
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }

    let mut rows = Vec::with_capacity(tasks.len());
    for task in tasks {
        rows.push(TaskRow {
            id: task.id,
            title: task.title.clone(),
            status: status_label(task),
            repeats: describe_rule(&task.recurrence),
            next: date_label(task.recurrence.next_occurrence_date)?,
            origin: task
                .original_task_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
        });
    }
    println!("{}", Table::new(rows));
    Ok(())
}

fn print_task_details(task: &Task) -> Result<(), AppError> {
    println!("ID:        {}", task.id);
    println!("Title:     {}", task.title);
    println!("Status:    {}", status_label(task));
    println!("Added:     {}", task.date_added);
    if let Some(completed_at) = task.completed_at.as_deref() {
        println!("Completed: {completed_at}");
    }
    if task.is_main_task {
        println!("Main task: yes");
    }
    for subtask in &task.subtasks {
        let mark = if subtask.done { "x" } else { " " };
        println!("  [{mark}] {}", subtask.text);
    }
    if task.is_template() {
        println!("Repeats:   {}", describe_rule(&task.recurrence));
        println!(
            "Next:      {}",
            date_label(task.recurrence.next_occurrence_date)?
        );
        if let Some(end_date) = task.recurrence.end_date {
            println!("Until:     {}", format_date(end_date)?);
        }
    }
    if let Some(template_id) = task.original_task_id {
        println!("From:      {template_id}");
        println!("For:       {}", date_label(task.occurrence_date)?);
    }
    Ok(())
}

fn print_report_json(report: &GenerationReport) -> Result<(), AppError> {
    let mut created = Vec::with_capacity(report.created.len());
    for entry in &report.created {
        created.push(serde_json::json!({
            "template_id": entry.template_id,
            "instance_id": entry.instance_id,
            "occurrence_date": format_date(entry.occurrence_date)?,
            "collapsed": entry.collapsed,
        }));
    }
    let mut advanced = Vec::with_capacity(report.advanced.len());
    for entry in &report.advanced {
        advanced.push(serde_json::json!({
            "template_id": entry.template_id,
            "next_occurrence_date": format_date(entry.next_occurrence_date)?,
        }));
    }
    let failures: Vec<serde_json::Value> = report
        .failures
        .iter()
        .map(|failure| {
            serde_json::json!({
                "task_id": failure.task_id,
                "code": failure.error.code(),
                "message": failure.error.message(),
            })
        })
        .collect();

    let json = serde_json::json!({
        "today": format_date(report.today)?,
        "due": report.due,
        "created": created,
        "advanced": advanced,
        "ended": report.ended,
        "failures": failures,
    });
    println!("{}", json);
    Ok(())
}

fn print_report_plain(report: &GenerationReport) -> Result<(), AppError> {
    println!(
        "Generation pass for {}: {} due, {} created, {} ended, {} failed",
        format_date(report.today)?,
        report.due,
        report.created.len(),
        report.ended.len(),
        report.failures.len()
    );
    for entry in &report.created {
        println!(
            "  created task {} from {} for {}",
            entry.instance_id,
            entry.template_id,
            format_date(entry.occurrence_date)?
        );
    }
    for entry in &report.advanced {
        println!(
            "  task {} next due {}",
            entry.template_id,
            format_date(entry.next_occurrence_date)?
        );
    }
    for id in &report.ended {
        println!("  task {id} stopped recurring");
    }
    for failure in &report.failures {
        eprintln!("  task {} failed: {}", failure.task_id, failure.error);
    }
    Ok(())
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn init_tracing(config: &Config) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_filter())),
        )
        .init();
}

fn serve(store: PathBuf, config: &Config) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::io(err.to_string()))?;

    let scheduler = GenerationScheduler::new(RecurrenceEngine::new(JsonTaskStore::new(store)))
        .with_period(config.generation_period());

    runtime.block_on(async move {
        let handle = scheduler.run();
        let result = tokio::signal::ctrl_c().await;
        handle.abort();
        info!("received Ctrl+C, scheduler stopped");
        result.map_err(|err| AppError::io(err.to_string()))
    })
}

fn report_task(json: bool, verb: &str, task: &Task) -> Result<(), AppError> {
    if json {
        print_task_json(task)
    } else {
        println!("{verb} task: {} ({})", task.title, task.id);
        Ok(())
    }
}

fn run_command(cli: Cli, config: &Config, store: &Path) -> Result<(), AppError> {
    match cli.command {
        Command::Add {
            title,
            main,
            subtasks,
            every,
            rule,
        } => {
            let recurrence = cli::add_recurrence(every.as_deref(), &rule)?;
            let task = task_api::add_task(
                store,
                NewTask {
                    title,
                    is_main_task: main,
                    subtasks,
                    recurrence,
                },
            )?;
            if cli.json {
                print_task_json(&task)?;
            } else if task.is_template() {
                println!(
                    "Added task: {} ({}), repeats {}, first due {}",
                    task.title,
                    task.id,
                    describe_rule(&task.recurrence),
                    date_label(task.recurrence.next_occurrence_date)?
                );
            } else {
                println!("Added task: {} ({})", task.title, task.id);
            }
        }
        Command::Recur { id, kind, rule } => {
            let input = rule.to_input(&kind)?;
            let task = task_api::set_recurrence(store, id, &input)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                println!(
                    "Task {} ({}) repeats {}, next due {}",
                    task.title,
                    task.id,
                    describe_rule(&task.recurrence),
                    date_label(task.recurrence.next_occurrence_date)?
                );
            }
        }
        Command::Stop { id } => {
            let task = task_api::clear_recurrence(store, id)?;
            report_task(cli.json, "Stopped recurring", &task)?;
        }
        Command::List {
            templates,
            instances,
        } => {
            let filter = match (templates, instances) {
                (_, Some(template_id)) => TaskFilter::InstancesOf(template_id),
                (true, None) => TaskFilter::Templates,
                (false, None) => TaskFilter::All,
            };
            let tasks = task_api::list_tasks(store, filter)?;
            if cli.json {
                print_tasks_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks)?;
            }
        }
        Command::Show { id } => {
            let task = task_api::get_task(store, id)?;
            if cli.json {
                print_task_json(&task)?;
            } else {
                print_task_details(&task)?;
            }
        }
        Command::Edit { id, new_title } => {
            let task = task_api::edit_title(store, id, &new_title)?;
            report_task(cli.json, "Updated", &task)?;
        }
        Command::Done { id } => {
            let task = task_api::complete_task(store, id)?;
            report_task(cli.json, "Completed", &task)?;
        }
        Command::Reopen { id } => {
            let task = task_api::reopen_task(store, id)?;
            report_task(cli.json, "Reopened", &task)?;
        }
        Command::Delete { id } => {
            let task = task_api::delete_task(store, id)?;
            report_task(cli.json, "Deleted", &task)?;
        }
        Command::Generate { today } => {
            let engine = RecurrenceEngine::new(JsonTaskStore::new(store));
            let report = match today.as_deref() {
                Some(value) => engine.run_generation_pass_on(parse_date(value)?)?,
                None => engine.run_generation_pass()?,
            };
            if cli.json {
                print_report_json(&report)?;
            } else {
                print_report_plain(&report)?;
            }
        }
        Command::Serve => {
            if !cli.json {
                println!(
                    "Generating recurring tasks every {}h from {}. Press Ctrl+C to stop.",
                    config.generation_interval_hours(),
                    store.display()
                );
            }
            serve(store.to_path_buf(), config)?;
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    let overrides = cli::config_overrides(&cli.config_override)?;
    let loaded = config::load_config_with_fallback();
    let config = config::merge_overrides(&loaded.config, &overrides);

    init_tracing(&config);
    if let Some(err) = loaded.error {
        warn!("config not loaded, using defaults: {err}");
    }

    let store = json_store::resolve_store_path(cli.store.as_deref(), config.store_path.as_deref())?;
    run_command(cli, &config, &store)
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
