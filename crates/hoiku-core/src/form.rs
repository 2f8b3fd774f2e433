//! Event form input and its validation.
//!
//! A draft holds the raw fields as typed by the user. Validation reports
//! every problem at once and produces a [`Submission`] that the store can
//! write.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::debug;

use crate::category::{Category, normalize_category};
use crate::datetime::parse_event_date;
use crate::duration::{Duration, DurationEncoding, ParsedDuration};
use crate::event::{AgeGroup, Event, MediaFile};

pub const MAX_HOURS: u32 = 24;
pub const MAX_MINUTES: u32 = 59;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title is required")]
    MissingTitle,

    #[error("description is required")]
    MissingDescription,

    #[error("month must be between 1 and 12, got {0}")]
    MonthOutOfRange(u32),

    #[error("hours must be between 0 and 24, got {0}")]
    HoursOutOfRange(u32),

    #[error("minutes must be between 0 and 59, got {0}")]
    MinutesOutOfRange(u32),

    #[error("duration must be longer than zero")]
    ZeroDuration,

    #[error("stored duration '{0}' could not be read; set hours:, minutes: or duration:")]
    UnreadableStoredDuration(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("unknown age group '{0}'")]
    UnknownAgeGroup(String),

    #[error("media file url is empty")]
    EmptyMediaUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid event: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn contains(&self, err: &ValidationError) -> bool {
        self.0.contains(err)
    }
}

/// Category picked on the form: one of the fixed labels, or free text
/// typed into the "other" field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryChoice {
    Canonical(Category),
    Custom(String),
}

impl Default for CategoryChoice {
    fn default() -> Self {
        CategoryChoice::Canonical(Category::Other)
    }
}

impl CategoryChoice {
    /// Canonical labels (in any spacing) select the bucket; anything else
    /// is kept as custom text.
    pub fn from_input(raw: &str) -> Self {
        match normalize_category(raw) {
            Category::Other if !raw.trim().is_empty() && raw.trim() != Category::Other.label() => {
                CategoryChoice::Custom(raw.trim().to_string())
            }
            category => CategoryChoice::Canonical(category),
        }
    }

    fn stored_value(&self) -> String {
        match self {
            CategoryChoice::Canonical(category) => category.label().to_string(),
            CategoryChoice::Custom(text) if text.trim().is_empty() => Category::Other.label().to_string(),
            CategoryChoice::Custom(text) => text.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub month: u32,
    pub date: Option<String>,
    pub category: CategoryChoice,
    pub age_groups: Vec<String>,
    pub hours: u32,
    pub minutes: u32,
    pub materials: Vec<String>,
    pub objectives: Vec<String>,
    pub media_files: Vec<MediaFile>,
    /// Stored duration text the edit form could not prefill from.
    pub unreadable_duration: Option<String>,
}

/// A draft that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub title: String,
    pub description: String,
    pub month: u32,
    pub date: Option<NaiveDate>,
    pub category: String,
    pub age_groups: Vec<AgeGroup>,
    pub duration: Duration,
    pub materials: Vec<String>,
    pub objectives: Vec<String>,
    pub media_files: Vec<MediaFile>,
}

impl EventDraft {
    /// Prefills the edit form from a stored event.
    pub fn from_event(event: &Event) -> Self {
        let parsed = event.parsed_duration();
        let duration = parsed.duration().unwrap_or_default();
        let unreadable_duration = match parsed {
            ParsedDuration::Unparsed(text) => Some(text),
            _ => None,
        };
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            month: event.month,
            date: event.date.map(|d| d.format("%Y-%m-%d").to_string()),
            category: CategoryChoice::from_input(&event.category),
            age_groups: event
                .display_age_groups()
                .into_iter()
                .map(|g| g.label().to_string())
                .collect(),
            hours: duration.hours,
            minutes: duration.minutes,
            materials: event.materials.clone().unwrap_or_default(),
            objectives: event.objectives.clone().unwrap_or_default(),
            media_files: event.media().to_vec(),
            unreadable_duration,
        }
    }

    #[tracing::instrument(skip(self), fields(title = %self.title))]
    pub fn validate(&self) -> Result<Submission, ValidationErrors> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(ValidationError::MissingTitle);
        }
        let description = self.description.trim();
        if description.is_empty() {
            errors.push(ValidationError::MissingDescription);
        }
        if !(1..=12).contains(&self.month) {
            errors.push(ValidationError::MonthOutOfRange(self.month));
        }
        if self.hours > MAX_HOURS {
            errors.push(ValidationError::HoursOutOfRange(self.hours));
        }
        if self.minutes > MAX_MINUTES {
            errors.push(ValidationError::MinutesOutOfRange(self.minutes));
        }
        let duration = Duration::new(self.hours, self.minutes);
        if duration.total_minutes() == 0 {
            errors.push(match &self.unreadable_duration {
                Some(text) => ValidationError::UnreadableStoredDuration(text.clone()),
                None => ValidationError::ZeroDuration,
            });
        }

        let date = match self.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => match parse_event_date(raw) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(ValidationError::InvalidDate(raw.to_string()));
                    None
                }
            },
            None => None,
        };

        let mut age_groups = Vec::new();
        for raw in &self.age_groups {
            match raw.parse::<AgeGroup>() {
                Ok(group) => age_groups.push(group),
                Err(_) => errors.push(ValidationError::UnknownAgeGroup(raw.clone())),
            }
        }
        age_groups.sort();
        age_groups.dedup();

        if self.media_files.iter().any(|m| m.url.trim().is_empty()) {
            errors.push(ValidationError::EmptyMediaUrl);
        }

        if !errors.is_empty() {
            debug!(count = errors.len(), "event draft rejected");
            return Err(ValidationErrors(errors));
        }

        Ok(Submission {
            title: title.to_string(),
            description: description.to_string(),
            month: self.month,
            date,
            category: self.category.stored_value(),
            age_groups,
            duration,
            materials: non_blank(&self.materials),
            objectives: non_blank(&self.objectives),
            media_files: self.media_files.clone(),
        })
    }
}

impl Submission {
    pub fn into_event(self, user_id: &str, encoding: DurationEncoding, now: DateTime<Utc>) -> Event {
        let mut event = Event::new(String::new(), self.month, now);
        event.user_id = user_id.to_string();
        self.apply_to(&mut event, encoding, now);
        event
    }

    /// Overwrites the editable fields; id, owner, views and creation time
    /// are left alone.
    pub fn apply_to(self, event: &mut Event, encoding: DurationEncoding, now: DateTime<Utc>) {
        event.title = self.title;
        event.description = self.description;
        event.month = self.month;
        event.date = self.date;
        event.category = self.category;
        event.age_groups = self.age_groups.iter().map(|g| g.label().to_string()).collect();
        event.duration = Some(self.duration.encode(encoding));
        event.materials = Some(self.materials);
        event.objectives = Some(self.objectives);
        event.media_files = Some(self.media_files);
        event.updated_at = Some(now);
    }
}

fn non_blank(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{CategoryChoice, EventDraft, ValidationError};
    use crate::category::Category;
    use crate::duration::{DurationEncoding, ParsedDuration, RawDuration};
    use crate::event::AgeGroup;

    fn draft() -> EventDraft {
        EventDraft {
            title: " 七夕飾り ".to_string(),
            description: "短冊に願いを書く".to_string(),
            month: 7,
            category: CategoryChoice::from_input("制作物"),
            age_groups: vec!["4歳児".to_string(), "3".to_string(), "4歳児".to_string()],
            hours: 1,
            minutes: 15,
            materials: vec!["折り紙".to_string(), "  ".to_string()],
            ..EventDraft::default()
        }
    }

    #[test]
    fn valid_draft_is_trimmed_and_ordered() {
        let submission = draft().validate().expect("valid draft");
        assert_eq!(submission.title, "七夕飾り");
        assert_eq!(submission.category, "制作物");
        assert_eq!(submission.age_groups, vec![AgeGroup::Age3, AgeGroup::Age4]);
        assert_eq!(submission.materials, vec!["折り紙".to_string()]);
    }

    #[test]
    fn reports_every_problem() {
        let mut bad = draft();
        bad.title = "   ".to_string();
        bad.month = 13;
        bad.hours = 0;
        bad.minutes = 0;
        bad.date = Some("7月7日".to_string());
        bad.age_groups = vec!["6歳児".to_string()];

        let errors = bad.validate().expect_err("invalid draft");
        assert!(errors.contains(&ValidationError::MissingTitle));
        assert!(errors.contains(&ValidationError::MonthOutOfRange(13)));
        assert!(errors.contains(&ValidationError::ZeroDuration));
        assert!(errors.contains(&ValidationError::InvalidDate("7月7日".to_string())));
        assert!(errors.contains(&ValidationError::UnknownAgeGroup("6歳児".to_string())));
        assert!(errors.to_string().starts_with("invalid event: title is required"));
    }

    #[test]
    fn rejects_out_of_range_duration_fields() {
        let mut bad = draft();
        bad.hours = 25;
        bad.minutes = 60;
        let errors = bad.validate().expect_err("invalid draft");
        assert!(errors.contains(&ValidationError::HoursOutOfRange(25)));
        assert!(errors.contains(&ValidationError::MinutesOutOfRange(60)));
    }

    #[test]
    fn custom_category_text_is_stored_verbatim() {
        assert_eq!(
            CategoryChoice::from_input(" 壁 面"),
            CategoryChoice::Canonical(Category::WallDecoration)
        );
        assert_eq!(
            CategoryChoice::from_input("その他"),
            CategoryChoice::Canonical(Category::Other)
        );

        let mut custom = draft();
        custom.category = CategoryChoice::from_input("運動遊び");
        let submission = custom.validate().expect("valid draft");
        assert_eq!(submission.category, "運動遊び");
    }

    #[test]
    fn submission_encodes_duration_as_configured() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        let text = draft().validate().unwrap().into_event("u1", DurationEncoding::Text, now);
        assert_eq!(text.duration, Some(RawDuration::Text("1時間15分".to_string())));
        assert_eq!(text.user_id, "u1");

        let range = draft().validate().unwrap().into_event("u1", DurationEncoding::Range, now);
        assert_eq!(
            range.duration,
            Some(RawDuration::Range {
                start: Some("00:00".to_string()),
                end: Some("01:15".to_string()),
            })
        );
        assert_eq!(range.parsed_duration().to_string(), "1時間15分");
        assert_ne!(text.id, range.id);
    }

    #[test]
    fn edit_form_prefills_from_event() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let event = draft().validate().unwrap().into_event("u1", DurationEncoding::Range, now);
        let prefilled = EventDraft::from_event(&event);
        assert_eq!(prefilled.hours, 1);
        assert_eq!(prefilled.minutes, 15);
        assert_eq!(prefilled.category, CategoryChoice::Canonical(Category::CraftItem));
        assert_eq!(prefilled.age_groups, vec!["3歳児".to_string(), "4歳児".to_string()]);
        assert!(matches!(event.parsed_duration(), ParsedDuration::Known(_)));
    }

    #[test]
    fn unreadable_stored_duration_is_named_when_editing() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut event = draft().validate().unwrap().into_event("u1", DurationEncoding::Text, now);
        event.duration = Some(RawDuration::Text("半日くらい".to_string()));

        let mut edit = EventDraft::from_event(&event);
        assert_eq!(edit.unreadable_duration.as_deref(), Some("半日くらい"));
        edit.title = "七夕まつり".to_string();

        let errors = edit.validate().expect_err("duration still unreadable");
        assert!(errors.contains(&ValidationError::UnreadableStoredDuration("半日くらい".to_string())));
        assert!(!errors.contains(&ValidationError::ZeroDuration));
        assert!(errors.to_string().contains("半日くらい"));

        edit.hours = 4;
        assert!(edit.validate().is_ok());
    }
}
