use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::aggregate::CalendarCell;
use crate::category::Category;
use crate::config::Config;
use crate::datetime::format_project_datetime;
use crate::event::{Event, MediaKind};

const TITLE_WIDTH: usize = 24;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, events))]
    pub fn print_event_table(&mut self, events: &[Event]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "月".to_string(),
            "カテゴリ".to_string(),
            "タイトル".to_string(),
            "対象".to_string(),
            "時間".to_string(),
            "閲覧".to_string(),
        ];

        let mut rows = Vec::with_capacity(events.len());
        for event in events {
            let ages = event
                .display_age_groups()
                .iter()
                .map(|g| g.label())
                .collect::<Vec<_>>()
                .join(",");
            rows.push(vec![
                self.paint(event.short_id(), "33"),
                format!("{}月", event.month),
                event.normalized_category().label().to_string(),
                truncate_to_width(&event.title, TITLE_WIDTH),
                ages,
                event.parsed_duration().to_string(),
                event.views.to_string(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        writeln!(out, "{} 件", events.len())?;
        Ok(())
    }

    #[tracing::instrument(skip(self, event))]
    pub fn print_event_info(&mut self, event: &Event) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        writeln!(out, "{}", self.paint(&event.title, "1"))?;
        writeln!(out, "id        {}", event.id)?;
        writeln!(out, "month     {}月", event.month)?;
        if let Some(date) = event.date {
            writeln!(out, "date      {}", date.format("%Y-%m-%d"))?;
        }
        writeln!(out, "category  {}", event.normalized_category())?;
        if event.normalized_category() == Category::Other && event.category.trim() != Category::Other.label() {
            writeln!(out, "          ({})", event.category.trim())?;
        }
        let ages = event
            .display_age_groups()
            .iter()
            .map(|g| g.label())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "ages      {ages}")?;
        writeln!(out, "duration  {}", event.parsed_duration())?;
        writeln!(out, "views     {}", event.views)?;
        writeln!(out, "owner     {}", event.user_id)?;
        if let Some(created) = event.created_at {
            writeln!(out, "created   {}", format_project_datetime(created))?;
        }
        if let Some(updated) = event.updated_at {
            writeln!(out, "updated   {}", format_project_datetime(updated))?;
        }

        writeln!(out)?;
        for line in event.description.lines() {
            writeln!(out, "  {line}")?;
        }

        write_list(&mut out, "materials", event.materials.as_deref())?;
        write_list(&mut out, "objectives", event.objectives.as_deref())?;

        let media = event.media();
        if !media.is_empty() {
            writeln!(out)?;
            writeln!(out, "media")?;
            for file in media {
                let kind = match file.kind {
                    MediaKind::Image => "image",
                    MediaKind::Video => "video",
                    MediaKind::Other => "file",
                };
                writeln!(out, "  [{kind}] {}", file.url)?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, cells))]
    pub fn print_calendar(
        &mut self,
        cells: &BTreeMap<CalendarCell, Option<&Event>>,
        current_month: u32,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let mut headers = vec!["月".to_string()];
        headers.extend(Category::ALL.iter().map(|c| c.label().to_string()));

        let months: Vec<u32> = {
            let mut months: Vec<u32> = cells.keys().map(|(month, _)| *month).collect();
            months.dedup();
            months
        };

        let mut rows = Vec::with_capacity(months.len());
        for month in months {
            let label = format!("{month}月");
            let mut row = vec![if month == current_month {
                self.paint(&label, "32")
            } else {
                label
            }];
            for category in Category::ALL {
                let cell = cells
                    .get(&(month, category))
                    .copied()
                    .flatten()
                    .map(|event| {
                        format!(
                            "{} ({})",
                            truncate_to_width(&event.title, TITLE_WIDTH - 10),
                            event.short_id()
                        )
                    })
                    .unwrap_or_else(|| "-".to_string());
                row.push(cell);
            }
            rows.push(row);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_list<W: Write>(mut writer: W, heading: &str, entries: Option<&[String]>) -> anyhow::Result<()> {
    let Some(entries) = entries.filter(|e| !e.is_empty()) else {
        return Ok(());
    };
    writeln!(writer)?;
    writeln!(writer, "{heading}")?;
    for entry in entries {
        writeln!(writer, "  - {entry}")?;
    }
    Ok(())
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write_padded(&mut writer, &headers[idx], widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            write_padded(&mut writer, &row[idx], widths[idx])?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn write_padded<W: Write>(writer: &mut W, cell: &str, width: usize) -> anyhow::Result<()> {
    let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
    let padding = width.saturating_sub(visible_width);
    write!(writer, "{}{} ", cell, " ".repeat(padding))?;
    Ok(())
}

/// Cuts `text` to at most `max` display columns, marking the cut with `…`.
fn truncate_to_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use unicode_width::UnicodeWidthStr;

    use super::{Renderer, strip_ansi, truncate_to_width, write_table};
    use crate::config::Config;

    #[test]
    fn color_setting_comes_from_config() {
        let mut cfg = Config::default();
        assert!(Renderer::new(&cfg).unwrap().color);

        cfg.apply_overrides([("rc.color".to_string(), "no".to_string())]);
        assert!(!Renderer::new(&cfg).unwrap().color);

        cfg.apply_overrides([("color".to_string(), "maybe".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }

    #[test]
    fn table_pads_by_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            vec!["月".to_string(), "タイトル".to_string()],
            vec![vec!["12月".to_string(), "クリスマス".to_string()]],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(UnicodeWidthStr::width(lines[0]), UnicodeWidthStr::width(lines[2]));
    }

    #[test]
    fn truncates_wide_titles() {
        let cut = truncate_to_width("たのしいクリスマス会の飾りつけ", 10);
        assert!(UnicodeWidthStr::width(cut.as_str()) <= 10);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate_to_width("短い", 10), "短い");
    }

    #[test]
    fn strips_color_codes() {
        assert_eq!(strip_ansi("\x1b[33mabc\x1b[0m"), "abc");
    }
}
