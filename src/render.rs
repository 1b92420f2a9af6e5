//! Plain-text views for terminal output.

use std::fmt::Write;
use std::io;
use std::path::Path;

use insights::{
    DashboardStats, Page, ResultsSummary, UNKNOWN, accuracy_series, average_accuracy, format_datasets,
    format_duration_compact, format_duration_secs, format_percent,
};
use records::{Model, Protocol, Resource, Task, UserProfile};

pub fn dashboard(stats: &DashboardStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "training models     {}", stats.training_models);
    let _ = writeln!(out, "models              {}", stats.models);
    let _ = writeln!(out, "completed tasks     {}", stats.completed_tasks);
    let _ = writeln!(out, "uploaded resources  {}", stats.uploaded_resources);
    let _ = writeln!(out, "storage used        {:.2} MB", stats.storage_used);
    for slice in &stats.storage {
        let _ = writeln!(out, "  {:<8}          {:.2} MB", slice.kind.as_str(), slice.total_size);
    }
    let _ = writeln!(out, "latest Class-IL     {}", format_percent(stats.class_il_accuracy, 2));
    let _ = write!(out, "latest Task-IL      {}", format_percent(stats.task_il_accuracy, 2));
    out
}

pub fn models(page: &Page<Model>) -> String {
    if page.items.is_empty() {
        return "no models".to_owned();
    }
    let mut out = format!(
        "{:<6} {:<16} {:<28} {:<12} {:>9} {:>9}\n",
        "ID", "NAME", "DATASETS", "TRAIN TIME", "CLASS-IL", "TASK-IL"
    );
    for model in &page.items {
        let train_time = model.train_time.map_or_else(|| UNKNOWN.to_owned(), format_duration_secs);
        let _ = writeln!(
            out,
            "{:<6} {:<16} {:<28} {:<12} {:>9} {:>9}",
            model.id.as_str(),
            model.model_name,
            format_datasets(&model.dataset),
            train_time,
            format_percent(average_accuracy(&model.accuracy, Protocol::ClassIl), 2),
            format_percent(average_accuracy(&model.accuracy, Protocol::TaskIl), 2),
        );
    }
    let _ = write!(out, "page {}/{} ({} models)", page.page, page.page_count().max(1), page.total);
    out
}

/// Resource table; `preview` yields the local preview file for image rows.
pub fn resources<'a>(
    page: &Page<&Resource>,
    preview: impl Fn(&Resource) -> Option<&'a Path>,
) -> String {
    if page.items.is_empty() {
        return "no resources".to_owned();
    }
    let mut out = format!("{:<6} {:<8} {:<24} {:>10}  {}\n", "ID", "TYPE", "NAME", "SIZE", "DESCRIPTION");
    for resource in &page.items {
        let size = resource.size.map_or_else(|| "-".to_owned(), |size| format!("{size:.2} MB"));
        let _ = write!(
            out,
            "{:<6} {:<8} {:<24} {:>10}  {}",
            resource.id.as_str(),
            resource.kind.as_str(),
            resource.name,
            size,
            resource.description
        );
        if let Some(path) = preview(resource) {
            let _ = write!(out, "  [{}]", path.display());
        }
        out.push('\n');
    }
    let _ = write!(out, "page {}/{} ({} resources)", page.page, page.page_count().max(1), page.total);
    out
}

pub fn tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "no tasks".to_owned();
    }
    let mut out = format!("{:<6} {:<16} {:<16} {:<8} {:<20} {}\n", "ID", "MODEL", "DATASET", "STATUS", "CREATED", "ENDED");
    for task in tasks {
        let _ = writeln!(
            out,
            "{:<6} {:<16} {:<16} {:<8} {:<20} {}",
            task.id.as_str(),
            task.model_name,
            task.dataset,
            task.status.as_str(),
            task.created_at.as_deref().unwrap_or("-"),
            task.end_at.as_deref().unwrap_or("-"),
        );
    }
    out.pop();
    out
}

pub fn results(model: &Model) -> String {
    let summary = ResultsSummary::for_model(model);
    let mut out = String::new();
    let _ = writeln!(out, "model        {} (#{})", model.model_name, model.id);
    let _ = writeln!(out, "datasets     {}", format_datasets(&model.dataset));
    let train_time = model.train_time.map_or_else(|| UNKNOWN.to_owned(), format_duration_compact);
    let _ = writeln!(out, "train time   {train_time}");
    let _ = writeln!(out, "Class-IL     {}", format_percent(summary.class_il, 2));
    let _ = writeln!(out, "Task-IL      {}", format_percent(summary.task_il, 2));
    let _ = write!(out, "forgetting   {}", format_percent(summary.forgetting, 2));

    let series = accuracy_series(model);
    if !series.is_empty() {
        let _ = write!(out, "\n\n{:<10} {:>9} {:>9}", "TASK", "CLASS-IL", "TASK-IL");
        for point in series {
            let _ = write!(out, "\n{:<10} {:>8.2}% {:>8.2}%", point.task, point.class_il, point.task_il);
        }
    }
    out
}

pub fn profile(profile: &UserProfile) -> String {
    let or_dash = |value: &str| if value.is_empty() { "-".to_owned() } else { value.to_owned() };
    let mut out = String::new();
    let _ = writeln!(out, "username  {}", or_dash(&profile.username));
    let _ = writeln!(out, "phone     {}", or_dash(&profile.phone));
    let _ = writeln!(out, "email     {}", or_dash(&profile.email));
    let _ = write!(out, "role      {}", profile.role.as_deref().unwrap_or("-"));
    out
}

/// Log text added since `shown` bytes were printed. A shrunken log (backend
/// restart) is replayed from the start.
pub fn log_delta<'a>(logs: &'a str, shown: usize) -> &'a str {
    logs.get(shown..).unwrap_or(logs)
}

/// Write the new part of `logs` and flush, so a partial last line shows up
/// immediately. Returns the new shown length.
pub fn stream_log_delta(out: &mut impl io::Write, logs: &str, shown: usize) -> io::Result<usize> {
    out.write_all(log_delta(logs, shown).as_bytes())?;
    out.flush()?;
    Ok(logs.len())
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
