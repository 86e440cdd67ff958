use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::path::Path;

use crate::session::Session;

/// Last path component of `dir`; `session` when there is none (e.g. `/`).
fn base_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string())
}

/// `dirname`, or `dirname-N` with the smallest free N >= 2.
pub fn counter_name(dir: &Path, existing: &[Session]) -> String {
    let base = base_name(dir);
    let taken: HashSet<&str> = existing.iter().map(|s| s.name.as_str()).collect();

    if !taken.contains(base.as_str()) {
        return base;
    }
    (2..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or(base)
}

/// `dirname-MMDD` for today. No collision handling.
pub fn date_name(dir: &Path) -> String {
    date_name_on(dir, Local::now().date_naive())
}

fn date_name_on(dir: &Path, date: NaiveDate) -> String {
    format!("{}-{}", base_name(dir), date.format("%m%d"))
}
