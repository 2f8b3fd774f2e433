use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::duration::DurationEncoding;
use crate::event::Event;
use crate::form::Submission;
use crate::session::{Session, require_owner, require_user};

/// Local stand-in for the hosted event table: one JSON row per line.
#[derive(Debug)]
pub struct DataStore {
    pub data_dir: PathBuf,
    pub events_path: PathBuf,
}

impl DataStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let events_path = data_dir.join("events.data");
        if !events_path.exists() {
            fs::write(&events_path, "")?;
        }

        info!(
            data_dir = %data_dir.display(),
            events = %events_path.display(),
            "opened datastore"
        );

        Ok(Self {
            data_dir,
            events_path,
        })
    }

    #[tracing::instrument(skip(self))]
    pub fn load_events(&self) -> anyhow::Result<Vec<Event>> {
        load_jsonl(&self.events_path).context("failed to load events.data")
    }

    #[tracing::instrument(skip(self, events))]
    pub fn save_events(&self, events: &[Event]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.events_path, events).context("failed to save events.data")
    }

    #[tracing::instrument(skip(self, session, submission, now), fields(title = %submission.title))]
    pub fn create_event(
        &self,
        session: &dyn Session,
        submission: Submission,
        encoding: DurationEncoding,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Event> {
        let user = require_user(session)?;
        let mut events = self.load_events()?;
        let event = submission.into_event(&user, encoding, now);
        events.push(event.clone());
        self.save_events(&events)?;
        debug!(id = %event.id, count = events.len(), "event created");
        Ok(event)
    }

    #[tracing::instrument(skip(self, session, submission, now))]
    pub fn update_event(
        &self,
        session: &dyn Session,
        selector: &str,
        submission: Submission,
        encoding: DurationEncoding,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Event> {
        let mut events = self.load_events()?;
        let idx = resolve_index(&events, selector)?;
        require_owner(session, &events[idx])?;

        submission.apply_to(&mut events[idx], encoding, now);
        let updated = events[idx].clone();
        self.save_events(&events)?;
        debug!(id = %updated.id, "event updated");
        Ok(updated)
    }

    #[tracing::instrument(skip(self, session))]
    pub fn delete_event(&self, session: &dyn Session, selector: &str) -> anyhow::Result<Event> {
        let mut events = self.load_events()?;
        let idx = resolve_index(&events, selector)?;
        require_owner(session, &events[idx])?;

        let removed = events.remove(idx);
        self.save_events(&events)?;
        info!(id = %removed.id, remaining = events.len(), "event deleted");
        Ok(removed)
    }

    /// Counts a detail-view open. Only signed-in viewers are counted;
    /// anyone else gets the event back unchanged.
    #[tracing::instrument(skip(self, session))]
    pub fn record_view(&self, session: &dyn Session, selector: &str) -> anyhow::Result<Event> {
        let mut events = self.load_events()?;
        let idx = resolve_index(&events, selector)?;
        if session.current_user().is_none() {
            debug!(id = %events[idx].id, "anonymous view, not counted");
            return Ok(events[idx].clone());
        }
        events[idx].views = events[idx].views.saturating_add(1);
        let viewed = events[idx].clone();
        self.save_events(&events)?;
        debug!(id = %viewed.id, views = viewed.views, "recorded view");
        Ok(viewed)
    }

    pub fn find_event(&self, selector: &str) -> anyhow::Result<Event> {
        let events = self.load_events()?;
        let idx = resolve_index(&events, selector)?;
        Ok(events[idx].clone())
    }
}

/// Exact id, or a prefix that names exactly one event.
pub fn resolve_index(events: &[Event], selector: &str) -> anyhow::Result<usize> {
    let selector = selector.trim();
    if selector.is_empty() {
        return Err(anyhow!("event id is required"));
    }
    if let Some(idx) = events.iter().position(|e| e.id == selector) {
        return Ok(idx);
    }

    let mut matches = events
        .iter()
        .enumerate()
        .filter(|(_, e)| e.id.starts_with(selector))
        .map(|(idx, _)| idx);
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("event not found: {selector}"))?;
    if matches.next().is_some() {
        return Err(anyhow!("event id prefix is ambiguous: {selector}"));
    }
    Ok(first)
}

#[tracing::instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Event>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: Event = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(event);
    }

    debug!(count = out.len(), "loaded events from jsonl");
    Ok(out)
}

#[tracing::instrument(skip(path, events))]
fn save_jsonl_atomic(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = events.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for event in events {
        let serialized = serde_json::to_string(event)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::Utc;
    use tempfile::tempdir;

    use super::{DataStore, resolve_index};
    use crate::event::Event;
    use crate::session::LocalSession;

    #[test]
    fn resolves_exact_ids_and_unique_prefixes() {
        let now = Utc::now();
        let mut a = Event::new("a".to_string(), 1, now);
        a.id = "abc123".to_string();
        let mut b = Event::new("b".to_string(), 1, now);
        b.id = "abd456".to_string();
        let mut c = Event::new("c".to_string(), 1, now);
        c.id = "ab".to_string();
        let events = vec![a, b, c];

        assert_eq!(resolve_index(&events, "abc").unwrap(), 0);
        assert_eq!(resolve_index(&events, "ab").unwrap(), 2);
        assert!(resolve_index(&events, "abd4").is_ok());
        assert!(resolve_index(&events, "x").is_err());
        assert!(resolve_index(&events[..2], "ab").is_err());
        assert!(resolve_index(&events, " ").is_err());
    }

    #[test]
    fn rows_with_null_fields_still_load() {
        let temp = tempdir().unwrap();
        let store = DataStore::open(temp.path()).unwrap();
        fs::write(
            &store.events_path,
            concat!(
                r#"{"id":"a1","title":"節分","description":"鬼のお面","month":2,"views":null,"category":null}"#,
                "\n",
                r#"{"id":"b2","title":"ひな祭り","description":"おひなさま","month":3,"views":4,"duration":90}"#,
                "\n",
            ),
        )
        .unwrap();

        let events = store.load_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].views, 0);
        assert_eq!(events[0].category, "");
        assert_eq!(events[1].views, 4);
        assert!(events[1].duration.is_none());
    }

    #[test]
    fn only_signed_in_viewers_are_counted() {
        let temp = tempdir().unwrap();
        let store = DataStore::open(temp.path()).unwrap();
        let event = Event::new("お月見".to_string(), 9, Utc::now());
        store.save_events(std::slice::from_ref(&event)).unwrap();

        let anonymous = LocalSession::default();
        let viewer = LocalSession::new(Some("momo".to_string()));

        assert_eq!(store.record_view(&anonymous, &event.id).unwrap().views, 0);
        assert_eq!(store.record_view(&viewer, &event.id).unwrap().views, 1);
        assert_eq!(store.record_view(&anonymous, &event.id).unwrap().views, 1);
        assert_eq!(store.find_event(&event.id).unwrap().views, 1);
    }
}
