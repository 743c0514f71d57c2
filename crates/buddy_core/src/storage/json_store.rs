use crate::error::AppError;
use crate::model::{NewInstance, Task};
use crate::storage::{TaskStore, TemplateUpdate, ensure_version};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "tasks.json";
const STORE_ENV_VAR: &str = "BUDDY_STORE_PATH";
const TMP_SUFFIX: &str = ".tmp";
const LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Serialize, Deserialize)]
struct StoredTasks {
    schema_version: u32,
    #[serde(default)]
    next_id: u64,
    tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub next_id: u64,
}

impl TaskState {
    pub fn allocate_id(&mut self) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        id
    }

    pub fn find(&self, id: u64) -> Result<&Task, AppError> {
        self.tasks
            .iter()
            .find(|task| task.id == id)
            .ok_or_else(|| AppError::invalid_input("task not found"))
    }

    pub fn find_mut(&mut self, id: u64) -> Result<&mut Task, AppError> {
        self.tasks
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or_else(|| AppError::invalid_input("task not found"))
    }
}

pub fn store_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("taskbuddy")
            .join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("taskbuddy")
            .join(STORE_FILE_NAME))
    }
}

/// Picks the store file: an explicit path, then `BUDDY_STORE_PATH`, then
/// the configured path, then the per-user default.
pub fn resolve_store_path(
    explicit: Option<&Path>,
    configured: Option<&str>,
) -> Result<PathBuf, AppError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if std::env::var(STORE_ENV_VAR).is_ok_and(|path| !path.trim().is_empty()) {
        return store_path();
    }

    match configured.map(str::trim) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => store_path(),
    }
}

pub fn load_tasks(path: &Path) -> Result<Vec<Task>, AppError> {
    Ok(load_state(path)?.tasks)
}

pub fn load_state(path: &Path) -> Result<TaskState, AppError> {
    if !path.exists() {
        return Ok(TaskState {
            tasks: Vec::new(),
            next_id: 1,
        });
    }

    let content = std::fs::read_to_string(path).map_err(|err| AppError::io(err.to_string()))?;
    let stored: StoredTasks =
        serde_json::from_str(&content).map_err(|err| AppError::invalid_data(err.to_string()))?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    let max_id = stored.tasks.iter().map(|task| task.id).max().unwrap_or(0);
    Ok(TaskState {
        next_id: stored.next_id.max(max_id + 1),
        tasks: stored.tasks,
    })
}

pub fn save_tasks(path: &Path, tasks: &[Task]) -> Result<(), AppError> {
    update_state(path, |state| {
        state.tasks = tasks.to_vec();
        Ok(())
    })
}

/// Writes the document to a sibling temp file and renames it over `path`,
/// so readers never see a partial store.
pub fn save_state(path: &Path, state: &TaskState) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let max_id = state.tasks.iter().map(|task| task.id).max().unwrap_or(0);
    let stored = StoredTasks {
        schema_version: SCHEMA_VERSION,
        next_id: state.next_id.max(max_id + 1),
        tasks: state.tasks.to_vec(),
    };
    let content = serde_json::to_string_pretty(&stored)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let tmp_path = sibling_path(path, TMP_SUFFIX);
    let mut file = File::create(&tmp_path)
        .map_err(|err| AppError::io(format!("{}: {}", tmp_path.display(), err)))?;
    file.write_all(content.as_bytes())
        .map_err(|err| AppError::io(err.to_string()))?;
    file.sync_all().map_err(|err| AppError::io(err.to_string()))?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, permissions)
            .map_err(|err| AppError::io(err.to_string()))?;
    }

    std::fs::rename(&tmp_path, path).map_err(|err| {
        AppError::io(format!(
            "failed to replace {} with {}: {}",
            path.display(),
            tmp_path.display(),
            err
        ))
    })
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive advisory lock on `<store>.lock`, held until dropped.
///
/// The lock lives in its own file because saves replace the store file.
#[derive(Debug)]
pub struct StoreLock {
    _file: File,
}

impl StoreLock {
    pub fn acquire(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
        }

        let lock_path = sibling_path(path, LOCK_SUFFIX);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|err| AppError::io(format!("{}: {}", lock_path.display(), err)))?;
        FileExt::lock_exclusive(&file)
            .map_err(|err| AppError::io(format!("{}: {}", lock_path.display(), err)))?;

        Ok(Self { _file: file })
    }
}

/// Runs one locked read-modify-write of the store. Nothing is written
/// when `change` fails.
pub fn update_state<T, F>(path: &Path, change: F) -> Result<T, AppError>
where
    F: FnOnce(&mut TaskState) -> Result<T, AppError>,
{
    let _lock = StoreLock::acquire(path)?;
    let mut state = load_state(path)?;
    let result = change(&mut state)?;
    save_state(path, &state)?;
    Ok(result)
}

pub fn now_timestamp() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))
}

/// [`TaskStore`] over a single JSON document. Every call re-reads the file,
/// and every write holds the store lock.
#[derive(Debug, Clone)]
pub struct JsonTaskStore {
    path: PathBuf,
}

impl JsonTaskStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl TaskStore for JsonTaskStore {
    fn list_templates_due_by(&self, date: Date) -> Result<Vec<Task>, AppError> {
        let state = load_state(&self.path)?;
        Ok(state
            .tasks
            .into_iter()
            .filter(|task| task.recurrence.is_due_by(date))
            .collect())
    }

    fn materialize_instance(
        &self,
        template_id: u64,
        expected_version: u64,
        instance: NewInstance,
        next_occurrence_date: Date,
    ) -> Result<u64, AppError> {
        let date_added = now_timestamp()?;
        update_state(&self.path, |state| {
            let template = state
                .find_mut(template_id)
                .map_err(|_| AppError::invalid_input("template not found"))?;
            ensure_version(template, expected_version)?;
            TemplateUpdate::advance(next_occurrence_date, expected_version).apply(template);
            template.version += 1;

            let id = state.allocate_id();
            state.tasks.push(instance.into_task(id, date_added));
            Ok(id)
        })
    }

    fn update_template(&self, id: u64, update: &TemplateUpdate) -> Result<Task, AppError> {
        update_state(&self.path, |state| {
            let task = state.find_mut(id)?;
            if let Some(expected) = update.expected_version {
                ensure_version(task, expected)?;
            }

            update.apply(task);
            task.version += 1;
            Ok(task.clone())
        })
    }
}
