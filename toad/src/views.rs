//! Analytics, calendar and timeline projections over a board's tasks.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use toad_proto::model::Task;

/// Status labels in display order; other statuses follow in first-seen order.
pub const STATUS_ORDER: [&str; 6] = ["Backlog", "Planned", "In Progress", "Needs Review", "Blocked", "Done"];

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Display label of a status slug.
#[must_use]
pub fn status_label(slug: &str) -> String {
    match slug {
        "backlog" | "not-started" => "Backlog".to_string(),
        "planned" => "Planned".to_string(),
        "in-progress" => "In Progress".to_string(),
        "needs-review" => "Needs Review".to_string(),
        "blocked" => "Blocked".to_string(),
        "done" => "Done".to_string(),
        "" => "Other".to_string(),
        other => title_case(&other.replace('-', " ")),
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    out
}

/// Task count for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    /// Status label.
    pub status: String,
    /// Number of tasks.
    pub count: usize,
}

/// Board-level statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    /// Counts per status, [`STATUS_ORDER`] first.
    pub tasks_by_status: Vec<StatusCount>,
    /// Total task count.
    pub total_tasks: usize,
    /// Tasks in `Done`.
    pub completed_tasks: usize,
    /// `round(completed / total * 100)`, 0 for an empty board.
    pub completion_rate: u32,
    /// Tasks backed by a chain object.
    pub on_chain_tasks: usize,
}

/// Computes [`Analytics`] for `tasks`.
#[must_use]
pub fn analytics(tasks: &[Task]) -> Analytics {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut seen: Vec<String> = Vec::new();
    for task in tasks {
        let label = status_label(task.status().as_str());
        let count = counts.entry(label.clone()).or_insert(0);
        if *count == 0 {
            seen.push(label);
        }
        *count += 1;
    }

    let mut tasks_by_status: Vec<StatusCount> = STATUS_ORDER
        .iter()
        .map(|s| StatusCount {
            status: (*s).to_string(),
            count: counts.get(*s).copied().unwrap_or(0),
        })
        .collect();
    tasks_by_status.extend(
        seen.into_iter()
            .filter(|s| !STATUS_ORDER.contains(&s.as_str()))
            .map(|s| StatusCount {
                count: counts[&s],
                status: s,
            }),
    );

    let total_tasks = tasks.len();
    let completed_tasks = counts.get("Done").copied().unwrap_or(0);
    Analytics {
        tasks_by_status,
        total_tasks,
        completed_tasks,
        completion_rate: percent(completed_tasks, total_tasks),
        on_chain_tasks: tasks.iter().filter(|t| t.chain.object_id.is_some()).count(),
    }
}

fn percent(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    // Integer round-half-up of part * 100 / total.
    let scaled = (part * 200 + total) / (total * 2);
    u32::try_from(scaled).unwrap_or(100)
}

/// Parses a task's due date.
#[must_use]
pub fn due_at(task: &Task) -> Option<DateTime<Utc>> {
    let raw = task.due_date.as_deref()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// One day cell of a month grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay<'a> {
    /// Day of month, from 1.
    pub day: u32,
    /// Tasks due that day (UTC).
    pub tasks: Vec<&'a Task>,
}

/// A month grid starting on Sunday.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarMonth<'a> {
    /// First day of the month.
    pub first: NaiveDate,
    /// Empty cells before day 1 (0 when the month starts on Sunday).
    pub leading_blanks: u32,
    /// One entry per day of the month.
    pub days: Vec<CalendarDay<'a>>,
}

impl CalendarMonth<'_> {
    /// First day of the previous month.
    #[must_use]
    pub fn previous(&self) -> Option<NaiveDate> {
        self.first.checked_sub_months(chrono::Months::new(1))
    }

    /// First day of the next month.
    #[must_use]
    pub fn next(&self) -> Option<NaiveDate> {
        self.first.checked_add_months(chrono::Months::new(1))
    }
}

/// Builds the month grid for `year`/`month` (1-based). `None` for an
/// invalid month.
#[must_use]
pub fn calendar_month(tasks: &[Task], year: i32, month: u32) -> Option<CalendarMonth<'_>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = first.checked_add_months(chrono::Months::new(1))?;
    let days_in_month = u32::try_from((next - first).num_days()).ok()?;

    let mut days: Vec<CalendarDay<'_>> = (1..=days_in_month)
        .map(|day| CalendarDay { day, tasks: Vec::new() })
        .collect();
    for task in tasks {
        let Some(due) = due_at(task) else { continue };
        let date = due.date_naive();
        if date.year() == year && date.month() == month
            && let Some(cell) = days.get_mut(date.day0() as usize)
        {
            cell.tasks.push(task);
        }
    }

    Some(CalendarMonth {
        first,
        leading_blanks: first.weekday().num_days_from_sunday(),
        days,
    })
}

/// One row of the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry<'a> {
    /// The task.
    pub task: &'a Task,
    /// Parsed due date.
    pub due: DateTime<Utc>,
    /// Whole days until due, rounded up; negative when past.
    pub days_until_due: i64,
    /// Due date has passed.
    pub is_overdue: bool,
    /// Bar width in display units: `|days| * 8` clamped to `60..=400`.
    pub bar_width: u32,
}

/// Tasks with a due date, earliest first, measured against `now`.
#[must_use]
pub fn timeline(tasks: &[Task], now: DateTime<Utc>) -> Vec<TimelineEntry<'_>> {
    let mut entries: Vec<TimelineEntry<'_>> = tasks
        .iter()
        .filter_map(|task| {
            let due = due_at(task)?;
            let delta_ms = (due - now).num_milliseconds();
            let days_until_due = ceil_div(delta_ms, MS_PER_DAY);
            let width = days_until_due.unsigned_abs().saturating_mul(8).clamp(60, 400);
            Some(TimelineEntry {
                task,
                due,
                days_until_due,
                is_overdue: days_until_due < 0,
                bar_width: u32::try_from(width).unwrap_or(400),
            })
        })
        .collect();
    entries.sort_by_key(|e| e.due);
    entries
}

const fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b > 0 { q + 1 } else { q }
}
