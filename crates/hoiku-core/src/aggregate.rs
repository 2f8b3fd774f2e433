use std::collections::BTreeMap;

use tracing::debug;

use crate::category::Category;
use crate::event::Event;
use crate::sort::created_key;

pub type CalendarCell = (u32, Category);

/// Latest event per (month, category) cell; `None` for empty cells.
///
/// The `その他` cell takes every event whose category is not one of the
/// other two labels. Ties on `created_at` go to the earliest input.
#[tracing::instrument(skip(events), fields(count = events.len()))]
pub fn pick_latest_per_cell<'a>(
    events: &'a [Event],
    months: &[u32],
    categories: &[Category],
) -> BTreeMap<CalendarCell, Option<&'a Event>> {
    let normalized: Vec<Category> = events.iter().map(Event::normalized_category).collect();

    let mut cells = BTreeMap::new();
    for &month in months {
        for &category in categories {
            let mut latest: Option<&Event> = None;
            for (event, event_category) in events.iter().zip(&normalized) {
                if event.month != month || *event_category != category {
                    continue;
                }
                let newer = latest.is_none_or(|best| created_key(event) > created_key(best));
                if newer {
                    latest = Some(event);
                }
            }
            cells.insert((month, category), latest);
        }
    }

    debug!(
        filled = cells.values().filter(|cell| cell.is_some()).count(),
        "picked calendar cells"
    );
    cells
}

/// Full year grid: months 1 to 12 against every category.
pub fn calendar_grid(events: &[Event]) -> BTreeMap<CalendarCell, Option<&Event>> {
    let months: Vec<u32> = (1..=12).collect();
    pick_latest_per_cell(events, &months, &Category::ALL)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{calendar_grid, pick_latest_per_cell};
    use crate::category::Category;
    use crate::event::Event;

    #[test]
    fn other_cell_is_a_catch_all_and_keeps_latest() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut seisaku = Event::new("製作の日".to_string(), 5, now);
        seisaku.category = "製作".to_string();
        let mut ivent = Event::new("こどもの日".to_string(), 5, now + Duration::days(2));
        ivent.category = "イベント".to_string();
        let mut wall = Event::new("こいのぼり壁面".to_string(), 5, now + Duration::days(9));
        wall.category = "壁面".to_string();

        let events = vec![seisaku, ivent, wall];
        let cells = pick_latest_per_cell(&events, &[5], &Category::ALL);

        let other = cells[&(5, Category::Other)].map(|e| e.title.as_str());
        assert_eq!(other, Some("こどもの日"));
        let wall_cell = cells[&(5, Category::WallDecoration)].map(|e| e.title.as_str());
        assert_eq!(wall_cell, Some("こいのぼり壁面"));
        assert!(cells[&(5, Category::CraftItem)].is_none());
    }

    #[test]
    fn ties_resolve_to_first_input_every_time() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let first = Event::new("first".to_string(), 8, now);
        let second = Event::new("second".to_string(), 8, now);
        let events = vec![first, second];

        for _ in 0..3 {
            let cells = pick_latest_per_cell(&events, &[8], &[Category::Other]);
            assert_eq!(
                cells[&(8, Category::Other)].map(|e| e.title.as_str()),
                Some("first")
            );
        }
    }

    #[test]
    fn grid_covers_every_month_and_category() {
        let grid = calendar_grid(&[]);
        assert_eq!(grid.len(), 36);
        assert!(grid.values().all(|cell| cell.is_none()));
    }
}
