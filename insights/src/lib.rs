//! Derived figures for the continual-learning console.
//!
//! Everything here is a pure function over `records` types so the console
//! views and the CLI render the same numbers. "Unknown" results are `None`;
//! nothing here divides by zero or yields NaN.

use std::str::FromStr;

use records::{AccuracyMap, KindUsage, Model, ParseError, Protocol, Resource, ResourceKind, ResourceUsage, Task, TaskStatus};
use serde::Serialize;

/// Placeholder rendered wherever a figure cannot be computed.
pub const UNKNOWN: &str = "unknown";

/// Default page size of the resource browser.
pub const RESOURCE_PAGE_SIZE: usize = 12;
/// Default page size of the model table.
pub const MODEL_PAGE_SIZE: usize = 5;

// =============================================================================
// ACCURACY
// =============================================================================

/// Arithmetic mean, or `None` for an empty sequence.
#[must_use]
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    Some(values.iter().sum::<f64>() / len)
}

/// Mean accuracy for one protocol; `None` if the protocol is missing or empty.
#[must_use]
pub fn average_accuracy(accuracy: &AccuracyMap, protocol: Protocol) -> Option<f64> {
    accuracy.get(protocol).and_then(average)
}

/// Forgetting proxy: mean absolute per-task gap between Class-IL and Task-IL.
///
/// `None` when either sequence is missing, their lengths differ, or both are
/// empty.
#[must_use]
pub fn forgetting(accuracy: &AccuracyMap) -> Option<f64> {
    let class_il = accuracy.get(Protocol::ClassIl)?;
    let task_il = accuracy.get(Protocol::TaskIl)?;
    if class_il.len() != task_il.len() {
        return None;
    }
    let gaps: Vec<f64> = class_il
        .iter()
        .zip(task_il)
        .map(|(class, task)| (class - task).abs())
        .collect();
    average(&gaps)
}

/// One point of the per-task accuracy chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskPoint {
    pub task: String,
    pub class_il: f64,
    pub task_il: f64,
}

/// Chart series for a model: one point per Class-IL entry, with a missing
/// Task-IL value plotted as 0.
#[must_use]
pub fn accuracy_series(model: &Model) -> Vec<TaskPoint> {
    let class_il = model.accuracy.get(Protocol::ClassIl).unwrap_or_default();
    let task_il = model.accuracy.get(Protocol::TaskIl).unwrap_or_default();
    class_il
        .iter()
        .enumerate()
        .map(|(index, &class)| TaskPoint {
            task: format!("Task {}", index + 1),
            class_il: class,
            task_il: task_il.get(index).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Headline figures for the results view of one model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultsSummary {
    pub class_il: Option<f64>,
    pub task_il: Option<f64>,
    pub forgetting: Option<f64>,
    pub train_time: Option<f64>,
}

impl ResultsSummary {
    #[must_use]
    pub fn for_model(model: &Model) -> Self {
        Self {
            class_il: average_accuracy(&model.accuracy, Protocol::ClassIl),
            task_il: average_accuracy(&model.accuracy, Protocol::TaskIl),
            forgetting: forgetting(&model.accuracy),
            train_time: model.train_time,
        }
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

fn whole_seconds(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let whole = seconds.floor() as u64;
        whole
    } else {
        0
    }
}

/// `"{hours}h {minutes}min"` from a duration in seconds.
#[must_use]
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{hours}h {minutes}min")
}

/// [`format_duration`] for fractional backend values; negatives read as 0.
#[must_use]
pub fn format_duration_secs(seconds: f64) -> String {
    format_duration(whole_seconds(seconds))
}

/// Short chart-caption form: `"{h}h {m}m"`, or `"{m}m"` under an hour.
#[must_use]
pub fn format_duration_compact(seconds: f64) -> String {
    let seconds = whole_seconds(seconds);
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 { format!("{hours}h {minutes}m") } else { format!("{minutes}m") }
}

/// `"12.3%"` with the given precision, or [`UNKNOWN`].
#[must_use]
pub fn format_percent(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(value) => format!("{value:.decimals$}%"),
        None => UNKNOWN.to_owned(),
    }
}

/// Model dataset column: comma-joined, or [`UNKNOWN`] when empty.
#[must_use]
pub fn format_datasets(datasets: &[String]) -> String {
    if datasets.is_empty() { UNKNOWN.to_owned() } else { datasets.join(", ") }
}

// =============================================================================
// RESOURCES
// =============================================================================

/// Resource browser filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceFilter {
    #[default]
    All,
    Kind(ResourceKind),
}

impl ResourceFilter {
    #[must_use]
    pub fn allows(self, resource: &Resource) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => resource.kind == kind,
        }
    }
}

impl FromStr for ResourceFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(Self::All);
        }
        s.parse::<ResourceKind>().map(Self::Kind)
    }
}

/// Resources matching `filter`, in their original relative order.
#[must_use]
pub fn filter_resources(resources: &[Resource], filter: ResourceFilter) -> Vec<&Resource> {
    resources.iter().filter(|resource| filter.allows(resource)).collect()
}

/// One page of a list.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number that was requested.
    pub page: usize,
    pub page_size: usize,
    /// Total number of items across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    #[must_use]
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 { 0 } else { self.total.div_ceil(self.page_size) }
    }
}

/// Slice out 1-based `page`. Page 0 is treated as page 1; a page past the end
/// is empty.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page: usize, page_size: usize) -> Page<T> {
    let page = page.max(1);
    let start = (page - 1).saturating_mul(page_size);
    let slice = if page_size == 0 || start >= items.len() {
        &[][..]
    } else {
        let end = start.saturating_add(page_size).min(items.len());
        &items[start..end]
    };
    Page { items: slice.to_vec(), page, page_size, total: items.len() }
}

// =============================================================================
// TASKS
// =============================================================================

#[must_use]
pub fn count_status(tasks: &[Task], status: TaskStatus) -> usize {
    tasks.iter().filter(|task| task.status == status).count()
}

/// True while any task is still running; new submissions wait for it.
#[must_use]
pub fn has_running_task(tasks: &[Task]) -> bool {
    tasks.iter().any(|task| task.status == TaskStatus::Running)
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// Storage share for one resource kind (pie chart slice).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct StorageSlice {
    pub kind: ResourceKind,
    pub total_size: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardStats {
    pub training_models: usize,
    pub models: usize,
    pub uploaded_resources: u64,
    /// Megabytes, as reported by the backend.
    pub storage_used: f64,
    pub completed_tasks: usize,
    /// Averages of the most recently listed model.
    pub class_il_accuracy: Option<f64>,
    pub task_il_accuracy: Option<f64>,
    pub storage: Vec<StorageSlice>,
}

impl DashboardStats {
    #[must_use]
    pub fn compute(models: &[Model], tasks: &[Task], usage: &ResourceUsage) -> Self {
        let latest = models.last();
        let per_kind: Vec<(ResourceKind, KindUsage)> =
            ResourceKind::ALL.iter().map(|&kind| (kind, usage.for_kind(kind))).collect();

        Self {
            training_models: count_status(tasks, TaskStatus::Running),
            models: models.len(),
            uploaded_resources: per_kind.iter().map(|(_, usage)| usage.file_count).sum(),
            storage_used: per_kind.iter().map(|(_, usage)| usage.total_size).sum(),
            completed_tasks: count_status(tasks, TaskStatus::Success),
            class_il_accuracy: latest.and_then(|model| average_accuracy(&model.accuracy, Protocol::ClassIl)),
            task_il_accuracy: latest.and_then(|model| average_accuracy(&model.accuracy, Protocol::TaskIl)),
            storage: per_kind
                .into_iter()
                .map(|(kind, usage)| StorageSlice { kind, total_size: usage.total_size })
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
