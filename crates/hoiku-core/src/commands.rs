use std::collections::BTreeSet;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::aggregate::calendar_grid;
use crate::category::Category;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datastore::DataStore;
use crate::datetime::current_month;
use crate::duration::{ParsedDuration, parse_duration_text};
use crate::event::{MediaFile, MediaKind};
use crate::filter::{SearchSpec, filter_events};
use crate::form::{CategoryChoice, EventDraft};
use crate::render::Renderer;
use crate::session::Session;
use crate::sort::{SortMode, sort_events};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "list",
        "popular",
        "calendar",
        "info",
        "add",
        "modify",
        "delete",
        "export",
        "duration",
        "categories",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, session, inv))]
pub fn dispatch(
    store: &DataStore,
    cfg: &Config,
    renderer: &mut Renderer,
    session: &dyn Session,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "list" => cmd_list(store, renderer, &inv.filter_terms, cfg.sort_mode()?, now),
        "popular" => cmd_list(store, renderer, &inv.filter_terms, SortMode::Popular, now),
        "calendar" => cmd_calendar(store, renderer, &inv.filter_terms, now),
        "info" => cmd_info(store, renderer, session, &inv.command_args),
        "add" => cmd_add(store, cfg, session, &inv.command_args, now),
        "modify" => cmd_modify(store, cfg, session, &inv.command_args, now),
        "delete" => cmd_delete(store, session, &inv.command_args),
        "export" => cmd_export(store, cfg, &inv.filter_terms, now),
        "duration" => cmd_duration(&inv.command_args),
        "categories" => cmd_categories(store),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(store, renderer, filter_terms, now))]
fn cmd_list(
    store: &DataStore,
    renderer: &mut Renderer,
    filter_terms: &[String],
    mode: SortMode,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    let spec = SearchSpec::parse(filter_terms)?;
    let events = store.load_events()?;
    let matched = filter_events(&events, &spec);
    let sorted = sort_events(&matched, mode, current_month(now));

    renderer.print_event_table(&sorted)
}

#[instrument(skip(store, renderer, filter_terms, now))]
fn cmd_calendar(
    store: &DataStore,
    renderer: &mut Renderer,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command calendar");

    let spec = SearchSpec::parse(filter_terms)?;
    let events = filter_events(&store.load_events()?, &spec);
    let cells = calendar_grid(&events);

    renderer.print_calendar(&cells, current_month(now))
}

#[instrument(skip(store, renderer, session, args))]
fn cmd_info(
    store: &DataStore,
    renderer: &mut Renderer,
    session: &dyn Session,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command info");

    let selector = first_arg(args, "info")?;
    let event = store.record_view(session, selector)?;
    renderer.print_event_info(&event)
}

#[instrument(skip(store, cfg, session, args, now))]
fn cmd_add(
    store: &DataStore,
    cfg: &Config,
    session: &dyn Session,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let mut draft = EventDraft::default();
    apply_mods(&mut draft, args)?;
    let submission = draft.validate()?;

    let event = store.create_event(session, submission, cfg.duration_encoding()?, now)?;
    println!("Created event {}.", event.short_id());
    Ok(())
}

#[instrument(skip(store, cfg, session, args, now))]
fn cmd_modify(
    store: &DataStore,
    cfg: &Config,
    session: &dyn Session,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let selector = first_arg(args, "modify")?;
    if args.len() < 2 {
        return Err(anyhow!("modify requires at least one field:value"));
    }

    let existing = store.find_event(selector)?;
    let mut draft = EventDraft::from_event(&existing);
    apply_mods(&mut draft, &args[1..])?;
    let submission = draft.validate()?;

    let event = store.update_event(session, &existing.id, submission, cfg.duration_encoding()?, now)?;
    println!("Modified event {}.", event.short_id());
    Ok(())
}

#[instrument(skip(store, session, args))]
fn cmd_delete(store: &DataStore, session: &dyn Session, args: &[String]) -> anyhow::Result<()> {
    info!("command delete");

    let selector = first_arg(args, "delete")?;
    let removed = store.delete_event(session, selector)?;
    println!("Deleted event {} '{}'.", removed.short_id(), removed.title);
    Ok(())
}

#[instrument(skip(store, cfg, filter_terms, now))]
fn cmd_export(
    store: &DataStore,
    cfg: &Config,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command export");

    let spec = SearchSpec::parse(filter_terms)?;
    let matched = filter_events(&store.load_events()?, &spec);
    let sorted = sort_events(&matched, cfg.sort_mode()?, current_month(now));

    let json = serde_json::to_string_pretty(&sorted).context("failed to serialize events")?;
    println!("{json}");
    Ok(())
}

fn cmd_duration(args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        return Err(anyhow!("duration requires text, e.g. `duration 1時間30分`"));
    }

    let raw = args.join(" ");
    let parsed = parse_duration_text(&raw);
    println!("display  {parsed}");
    if let ParsedDuration::Known(d) = parsed {
        println!("minutes  {}", d.total_minutes());
        println!("text     {}", d.to_text());
        println!("range    {}", serde_json::to_string(&d.to_range())?);
    }
    Ok(())
}

fn cmd_categories(store: &DataStore) -> anyhow::Result<()> {
    let events = store.load_events()?;
    for category in Category::ALL {
        let count = events
            .iter()
            .filter(|event| event.normalized_category() == category)
            .count();
        println!("{category} {count}");
    }
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "usage: hoiku [filter...] <command> [args...]\n\
         \n\
         commands:\n\
         \x20 list                 filtered events, sorted by default.sort\n\
         \x20 popular              filtered events, most viewed first\n\
         \x20 calendar             latest event per month and category\n\
         \x20 info <id>            event details (counts a view)\n\
         \x20 add <field:value>... create an event\n\
         \x20 modify <id> <field:value>...\n\
         \x20 delete <id>\n\
         \x20 export               filtered events as JSON\n\
         \x20 duration <text>      check how a duration is read\n\
         \x20 categories           event count per category\n\
         \n\
         filters: title: desc: cat: age: duration: material: objective: month: +image +video words\n\
         fields:  title: desc: month: date: cat: age: hours: minutes: duration: material: objective: image: video:"
    );
    Ok(())
}

fn first_arg<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    args.first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{command} requires an event id"))
}

/// Applies `field:value` arguments to a draft. The first value given for
/// a list field replaces the list; later ones append.
pub fn apply_mods(draft: &mut EventDraft, args: &[String]) -> anyhow::Result<()> {
    let mut replaced: BTreeSet<&'static str> = BTreeSet::new();

    for arg in args {
        let (key, value) = arg
            .split_once(':')
            .ok_or_else(|| anyhow!("expected field:value, got: {arg}"))?;

        match key.to_ascii_lowercase().as_str() {
            "title" => draft.title = value.to_string(),
            "description" | "desc" => draft.description = value.to_string(),
            "month" => {
                draft.month = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid month: {value}"))?
            }
            "date" => {
                draft.date = Some(value.to_string()).filter(|v| !v.trim().is_empty());
            }
            "category" | "cat" => draft.category = CategoryChoice::from_input(value),
            "hours" => {
                draft.hours = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid hours: {value}"))?
            }
            "minutes" | "min" => {
                draft.minutes = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid minutes: {value}"))?
            }
            "duration" => {
                let d = parse_duration_text(value)
                    .duration()
                    .ok_or_else(|| anyhow!("unreadable duration: {value}"))?;
                draft.hours = d.hours;
                draft.minutes = d.minutes;
            }
            "age" => push_list(&mut draft.age_groups, &mut replaced, "age", value),
            "material" => push_list(&mut draft.materials, &mut replaced, "material", value),
            "objective" => push_list(&mut draft.objectives, &mut replaced, "objective", value),
            "image" | "video" => {
                if replaced.insert("media") {
                    draft.media_files.clear();
                }
                if !value.trim().is_empty() {
                    let kind = if key.eq_ignore_ascii_case("image") {
                        MediaKind::Image
                    } else {
                        MediaKind::Video
                    };
                    draft.media_files.push(MediaFile {
                        url: value.trim().to_string(),
                        kind,
                    });
                }
            }
            other => return Err(anyhow!("unknown field: {other}")),
        }
    }

    debug!(
        title = %draft.title,
        hours = draft.hours,
        minutes = draft.minutes,
        "applied field modifications"
    );
    Ok(())
}

fn push_list(list: &mut Vec<String>, replaced: &mut BTreeSet<&'static str>, name: &'static str, value: &str) {
    if replaced.insert(name) {
        list.clear();
    }
    if !value.trim().is_empty() {
        list.push(value.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::{apply_mods, expand_command_abbrev, known_command_names};
    use crate::category::Category;
    use crate::form::{CategoryChoice, EventDraft};

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("cal", &known), Some("calendar"));
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("del", &known), Some("delete"));
    }

    #[test]
    fn field_mods_fill_a_draft() {
        let mut draft = EventDraft::default();
        apply_mods(
            &mut draft,
            &args(&[
                "title:節分の鬼",
                "desc:紙袋でお面を作る",
                "month:2",
                "cat:制作物",
                "age:4",
                "age:5",
                "duration:1時間",
                "material:紙袋",
                "image:https://example.com/oni.jpg",
            ]),
        )
        .unwrap();

        assert_eq!(draft.month, 2);
        assert_eq!(draft.category, CategoryChoice::Canonical(Category::CraftItem));
        assert_eq!(draft.age_groups, args(&["4", "5"]));
        assert_eq!((draft.hours, draft.minutes), (1, 0));
        assert_eq!(draft.media_files.len(), 1);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn first_list_value_replaces_existing_entries() {
        let mut draft = EventDraft {
            materials: args(&["古い材料"]),
            ..EventDraft::default()
        };
        apply_mods(&mut draft, &args(&["material:新聞紙", "material:テープ"])).unwrap();
        assert_eq!(draft.materials, args(&["新聞紙", "テープ"]));

        apply_mods(&mut draft, &args(&["material:"])).unwrap();
        assert!(draft.materials.is_empty());
    }

    #[test]
    fn rejects_unknown_fields_and_bad_numbers() {
        let mut draft = EventDraft::default();
        assert!(apply_mods(&mut draft, &args(&["colour:red"])).is_err());
        assert!(apply_mods(&mut draft, &args(&["month:May"])).is_err());
        assert!(apply_mods(&mut draft, &args(&["no-colon"])).is_err());
    }
}
