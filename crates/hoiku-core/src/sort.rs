use std::cmp::Ordering;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Upcoming months first, starting from the reference month.
    #[default]
    Date,
    /// Most viewed first.
    Popular,
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" | "upcoming" => Ok(SortMode::Date),
            "popular" | "views" => Ok(SortMode::Popular),
            other => Err(anyhow!("invalid sort mode: {other}")),
        }
    }
}

/// Forward distance in months from `reference` to `month`, in `0..12`.
pub fn month_distance(month: u32, reference: u32) -> u32 {
    (i64::from(month) - i64::from(reference)).rem_euclid(12) as u32
}

/// Returns a sorted copy; equal keys keep their input order.
#[tracing::instrument(skip(events), fields(count = events.len()))]
pub fn sort_events(events: &[Event], mode: SortMode, reference_month: u32) -> Vec<Event> {
    let mut out = events.to_vec();
    match mode {
        SortMode::Date => out.sort_by(|a, b| {
            month_distance(a.month, reference_month)
                .cmp(&month_distance(b.month, reference_month))
                .then_with(|| newest_first(a, b))
        }),
        SortMode::Popular => out.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| newest_first(a, b))),
    }
    debug!(?mode, reference_month, "sorted events");
    out
}

/// Missing `created_at` counts as the epoch.
pub fn created_key(event: &Event) -> DateTime<Utc> {
    event.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn newest_first(a: &Event, b: &Event) -> Ordering {
    created_key(b).cmp(&created_key(a))
}
