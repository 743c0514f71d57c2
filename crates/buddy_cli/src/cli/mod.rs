use buddy_core::config::ConfigOverrides;
use buddy_core::error::AppError;
use buddy_core::model::RecurrenceType;
use buddy_core::model::date_text::parse_date;
use buddy_core::task_api::RecurrenceInput;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Task store file (overrides BUDDY_STORE_PATH and the config file)
    #[arg(long, value_name = "PATH", global = true)]
    pub store: Option<PathBuf>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

/// Rule options shared by `add --every` and `recur`.
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    /// Repeat every N units
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub interval: i64,
    /// Days of the week for weekly or custom rules (comma separated)
    #[arg(long = "on", value_name = "DAYS", value_delimiter = ',')]
    pub days: Vec<String>,
    /// First due date (YYYY-MM-DD), today when omitted
    #[arg(long, value_name = "DATE")]
    pub start: Option<String>,
    /// Stop generating before this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub end: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task, optionally recurring
    ///
    /// Example: buddy add "Water plants"
    /// Example: buddy add "Standup" --every weekly --on mon,wed,fri
    Add {
        title: String,
        /// Mark as a main task
        #[arg(long)]
        main: bool,
        /// Add a subtask (repeatable)
        #[arg(long = "subtask", value_name = "TEXT")]
        subtasks: Vec<String>,
        /// Recurrence type: daily, weekly, monthly, yearly, custom
        #[arg(long, value_name = "TYPE")]
        every: Option<String>,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// Set or replace the recurrence of a task
    ///
    /// Example: buddy recur 3 monthly --interval 2 --start 2024-01-31
    Recur {
        id: u64,
        /// Recurrence type: daily, weekly, monthly, yearly, custom
        kind: String,
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// Stop a task from recurring
    ///
    /// Example: buddy stop 3
    Stop { id: u64 },
    /// List tasks
    ///
    /// Example: buddy list
    /// Example: buddy list --templates
    /// Example: buddy list --instances 3
    List {
        /// Only recurring templates
        #[arg(long, conflicts_with = "instances")]
        templates: bool,
        /// Only instances generated from this template
        #[arg(long, value_name = "ID")]
        instances: Option<u64>,
    },
    /// Show details of a task
    ///
    /// Example: buddy show 3
    Show { id: u64 },
    /// Edit a task's title
    ///
    /// Example: buddy edit 3 "Water all plants"
    Edit { id: u64, new_title: String },
    /// Mark a task as completed
    ///
    /// Example: buddy done 4
    Done { id: u64 },
    /// Mark a completed task as open again
    ///
    /// Example: buddy reopen 4
    Reopen { id: u64 },
    /// Delete a task
    ///
    /// Example: buddy delete 4
    Delete { id: u64 },
    /// Run one generation pass
    ///
    /// Example: buddy generate
    /// Example: buddy generate --today 2024-03-01
    Generate {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        today: Option<String>,
    },
    /// Run generation passes periodically until interrupted
    ///
    /// Example: buddy serve
    Serve,
}

impl RuleArgs {
    pub fn to_input(&self, kind: &str) -> Result<RecurrenceInput, AppError> {
        let kind: RecurrenceType = kind.parse()?;
        Ok(RecurrenceInput {
            kind,
            interval: self.interval,
            days_of_week: self
                .days
                .iter()
                .map(|day| day.trim().to_string())
                .filter(|day| !day.is_empty())
                .collect(),
            start_date: self.start.as_deref().map(parse_date).transpose()?,
            end_date: self.end.as_deref().map(parse_date).transpose()?,
        })
    }

    fn is_default(&self) -> bool {
        self.interval == 1 && self.days.is_empty() && self.start.is_none() && self.end.is_none()
    }
}

/// Recurrence for `add`: rule flags are only accepted together with `--every`.
pub fn add_recurrence(
    every: Option<&str>,
    rule: &RuleArgs,
) -> Result<Option<RecurrenceInput>, AppError> {
    match every {
        Some(kind) => rule.to_input(kind).map(Some),
        None if rule.is_default() => Ok(None),
        None => Err(AppError::invalid_input(
            "recurrence options require --every",
        )),
    }
}

/// Flag name used to identify config override arguments by the runtime.
pub const CONFIG_OVERRIDE_FLAG: &str = "--config-override";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    StorePath,
    GenerationIntervalHours,
    LogFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match field.as_str() {
        "store_path" | "store" => ConfigOverrideTarget::StorePath,
        "generation_interval_hours" | "interval_hours" => {
            ConfigOverrideTarget::GenerationIntervalHours
        }
        "log_filter" => ConfigOverrideTarget::LogFilter,
        other => return Err(format!("unknown config field '{other}'")),
    };

    if value.is_empty() {
        return Err(format!("{field} override requires a value"));
    }

    Ok(ParsedConfigOverride { target, value })
}

/// Folds every `--config-override` argument into one set of overrides.
/// Later arguments win.
pub fn config_overrides(raw: &[String]) -> Result<ConfigOverrides, AppError> {
    let mut overrides = ConfigOverrides::default();
    for entry in raw {
        let parsed = parse_config_override(entry)
            .map_err(|err| AppError::invalid_input(format!("{CONFIG_OVERRIDE_FLAG}: {err}")))?;
        match parsed.target {
            ConfigOverrideTarget::StorePath => overrides.store_path = Some(parsed.value),
            ConfigOverrideTarget::GenerationIntervalHours => {
                let hours = parsed
                    .value
                    .parse::<u64>()
                    .ok()
                    .filter(|hours| *hours >= 1)
                    .ok_or_else(|| {
                        AppError::invalid_input(format!(
                            "{CONFIG_OVERRIDE_FLAG}: generation_interval_hours must be a whole number of at least 1"
                        ))
                    })?;
                overrides.generation_interval_hours = Some(hours);
            }
            ConfigOverrideTarget::LogFilter => overrides.log_filter = Some(parsed.value),
        }
    }

    Ok(overrides)
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Cli, Command, ConfigOverrideTarget, RuleArgs, add_recurrence, config_overrides,
        parse_config_override,
    };
    use buddy_core::model::RecurrenceType;
    use clap::Parser;
    use time::{Date, Month, Weekday};

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" Log-Filter = buddy_core=debug ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::LogFilter);
        assert_eq!(parsed.value, "buddy_core=debug");
    }

    #[test]
    fn parse_config_override_accepts_interval_alias() {
        let parsed = parse_config_override("interval_hours=6").unwrap();
        assert_eq!(parsed.target, ConfigOverrideTarget::GenerationIntervalHours);
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("theme=dark").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("store_path").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_value() {
        let err = parse_config_override("store_path= ").unwrap_err();
        assert!(err.contains("requires a value"));
    }

    #[test]
    fn config_overrides_later_entries_win() {
        let overrides = config_overrides(&[
            "generation_interval_hours=12".to_string(),
            "store_path=/tmp/a.json".to_string(),
            "generation_interval_hours=2".to_string(),
        ])
        .unwrap();

        assert_eq!(overrides.generation_interval_hours, Some(2));
        assert_eq!(overrides.store_path.as_deref(), Some("/tmp/a.json"));
        assert_eq!(overrides.log_filter, None);
    }

    #[test]
    fn config_overrides_reject_zero_interval() {
        let err = config_overrides(&["generation_interval_hours=0".to_string()]).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn rule_args_build_input() {
        let rule = RuleArgs {
            interval: 2,
            days: vec!["mon".to_string(), " fri ".to_string()],
            start: Some("2024-01-01".to_string()),
            end: Some("2024-06-30".to_string()),
        };

        let input = rule.to_input("Weekly").unwrap();
        assert_eq!(input.kind, RecurrenceType::Weekly);
        assert_eq!(input.interval, 2);
        assert_eq!(input.days_of_week, vec!["mon", "fri"]);
        assert_eq!(
            input.start_date,
            Some(Date::from_calendar_date(2024, Month::January, 1).unwrap())
        );
        assert_eq!(
            input.end_date,
            Some(Date::from_calendar_date(2024, Month::June, 30).unwrap())
        );
        assert_eq!(input.start_date.map(|date| date.weekday()), Some(Weekday::Monday));
    }

    #[test]
    fn rule_args_reject_bad_dates_and_types() {
        let rule = RuleArgs {
            start: Some("01/02/2024".to_string()),
            ..RuleArgs::default()
        };
        assert_eq!(rule.to_input("daily").unwrap_err().code(), "invalid_input");
        assert_eq!(
            RuleArgs::default().to_input("hourly").unwrap_err().code(),
            "invalid_input"
        );
    }

    #[test]
    fn add_recurrence_requires_every_for_rule_flags() {
        let plain = RuleArgs {
            interval: 1,
            ..RuleArgs::default()
        };
        assert_eq!(add_recurrence(None, &plain).unwrap(), None);

        let stray = RuleArgs {
            interval: 1,
            days: vec!["mon".to_string()],
            ..RuleArgs::default()
        };
        assert!(add_recurrence(None, &stray).is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "buddy",
            "list",
            "--templates",
            "--json",
            "--store",
            "/tmp/tasks.json",
        ])
        .unwrap();

        assert!(cli.json);
        assert_eq!(cli.store.as_deref(), Some(std::path::Path::new("/tmp/tasks.json")));
        assert!(matches!(
            cli.command,
            Command::List {
                templates: true,
                instances: None
            }
        ));
    }

    #[test]
    fn cli_splits_weekday_list() {
        let cli = Cli::try_parse_from([
            "buddy", "add", "Standup", "--every", "weekly", "--on", "mon,wed",
        ])
        .unwrap();

        match cli.command {
            Command::Add { every, rule, .. } => {
                assert_eq!(every.as_deref(), Some("weekly"));
                assert_eq!(rule.days, vec!["mon", "wed"]);
                assert_eq!(rule.interval, 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
