use anyhow::{Context, Result};
use cadence_core::TaskList;
use std::fs;
use std::path::{Path, PathBuf};

pub fn cadence_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".cadence"))
}

pub fn ensure_cadence_home() -> Result<PathBuf> {
    let dir = cadence_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Read a `{ "tasks": [...] }` JSON file.
///
/// Only structure is checked here; the engine owns semantic validation.
pub fn read_task_list(path: &Path) -> Result<TaskList> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse task list {}", path.display()))
}

/// Write `contents` to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(p) => {
            if let Some(dir) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
            }
            fs::write(p, contents).with_context(|| format!("write {}", p.display()))
        }
        None => {
            print!("{contents}");
            Ok(())
        }
    }
}
