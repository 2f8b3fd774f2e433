use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::category::{Category, normalize_category};
use crate::duration::{ParsedDuration, RawDuration, parse_duration};

/// Developmental stage an event idea is aimed at, ordered by age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "0歳児")]
    Age0,
    #[serde(rename = "1歳児")]
    Age1,
    #[serde(rename = "2歳児")]
    Age2,
    #[serde(rename = "3歳児")]
    Age3,
    #[serde(rename = "4歳児")]
    Age4,
    #[serde(rename = "5歳児")]
    Age5,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 6] = [
        AgeGroup::Age0,
        AgeGroup::Age1,
        AgeGroup::Age2,
        AgeGroup::Age3,
        AgeGroup::Age4,
        AgeGroup::Age5,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::Age0 => "0歳児",
            AgeGroup::Age1 => "1歳児",
            AgeGroup::Age2 => "2歳児",
            AgeGroup::Age3 => "3歳児",
            AgeGroup::Age4 => "4歳児",
            AgeGroup::Age5 => "5歳児",
        }
    }

    /// Exact label lookup; stored rows only ever hold full labels.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|group| group.label() == label)
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Accepts the full label (`3歳児`) or the bare age (`3`).
impl FromStr for AgeGroup {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let age = trimmed.strip_suffix("歳児").unwrap_or(trimmed);
        match age {
            "0" => Ok(AgeGroup::Age0),
            "1" => Ok(AgeGroup::Age1),
            "2" => Ok(AgeGroup::Age2),
            "3" => Ok(AgeGroup::Age3),
            "4" => Ok(AgeGroup::Age4),
            "5" => Ok(AgeGroup::Age5),
            _ => Err(anyhow!("unknown age group: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,

    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub title: String,

    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub description: String,

    pub month: u32,

    #[serde(default)]
    pub date: Option<NaiveDate>,

    /// Raw category as entered; see [`Event::normalized_category`].
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub category: String,

    #[serde(default, deserialize_with = "lenient::string_vec")]
    pub age_groups: Vec<String>,

    /// Values that are neither text nor a range object read as absent.
    #[serde(default, deserialize_with = "lenient::duration")]
    pub duration: Option<RawDuration>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub materials: Option<Vec<String>>,

    #[serde(default, deserialize_with = "lenient::string_list")]
    pub objectives: Option<Vec<String>>,

    #[serde(default)]
    pub media_files: Option<Vec<MediaFile>>,

    #[serde(default, deserialize_with = "lenient::count")]
    pub views: u64,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub user_id: String,
}

impl Event {
    pub fn new(title: String, month: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description: String::new(),
            month,
            date: None,
            category: Category::Other.label().to_string(),
            age_groups: vec![],
            duration: None,
            materials: None,
            objectives: None,
            media_files: None,
            views: 0,
            created_at: Some(now),
            updated_at: Some(now),
            user_id: String::new(),
        }
    }

    pub fn normalized_category(&self) -> Category {
        normalize_category(&self.category)
    }

    /// Known age groups, deduplicated, youngest first.
    pub fn display_age_groups(&self) -> Vec<AgeGroup> {
        let mut groups: Vec<AgeGroup> = self
            .age_groups
            .iter()
            .filter_map(|label| AgeGroup::from_label(label))
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    pub fn has_age_group(&self, group: AgeGroup) -> bool {
        self.age_groups
            .iter()
            .any(|label| AgeGroup::from_label(label) == Some(group))
    }

    pub fn parsed_duration(&self) -> ParsedDuration {
        parse_duration(self.duration.as_ref())
    }

    pub fn media(&self) -> &[MediaFile] {
        self.media_files.as_deref().unwrap_or_default()
    }

    pub fn has_media(&self, kind: MediaKind) -> bool {
        self.media().iter().any(|file| file.kind == kind)
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

/// Stored rows come from a schemaless backend: any field may be `null`,
/// and array fields may hold non-string entries or be something other
/// than an array.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use crate::duration::RawDuration;

    pub fn string_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::String(text)) => text,
            _ => String::new(),
        })
    }

    pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(deserializer)?
            .as_ref()
            .and_then(Value::as_u64)
            .unwrap_or_default())
    }

    pub fn duration<'de, D>(deserializer: D) -> Result<Option<RawDuration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Value>::deserialize(deserializer)?
            .and_then(|value| serde_json::from_value::<RawDuration>(value).ok()))
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::String(text) => Some(text),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        })
    }

    pub fn string_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(string_list(deserializer)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{AgeGroup, Event, MediaKind};
    use crate::category::Category;
    use crate::duration::ParsedDuration;

    #[test]
    fn age_groups_display_in_canonical_order_without_duplicates() {
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        let mut event = Event::new("こいのぼり".to_string(), 5, now);
        event.age_groups = vec![
            "5歳児".to_string(),
            "0歳児".to_string(),
            "3歳児".to_string(),
            "0歳児".to_string(),
            "年長".to_string(),
        ];

        assert_eq!(
            event.display_age_groups(),
            vec![AgeGroup::Age0, AgeGroup::Age3, AgeGroup::Age5]
        );
    }

    #[test]
    fn age_group_parses_bare_age_and_label() {
        assert_eq!("3".parse::<AgeGroup>().unwrap(), AgeGroup::Age3);
        assert_eq!(" 4歳児 ".parse::<AgeGroup>().unwrap(), AgeGroup::Age4);
        assert!("6歳児".parse::<AgeGroup>().is_err());
    }

    #[test]
    fn lenient_rows_drop_non_string_entries_and_keep_missing_fields_absent() {
        let row = r#"{
            "id": "e1",
            "title": "七夕飾り",
            "description": "笹に飾る",
            "month": 7,
            "category": "壁面",
            "age_groups": ["3歳児", 4, null],
            "materials": ["折り紙", 12],
            "objectives": "not a list",
            "duration": {"start": "00:00", "end": "01:30"}
        }"#;
        let event: Event = serde_json::from_str(row).unwrap();

        assert_eq!(event.age_groups, vec!["3歳児".to_string()]);
        assert_eq!(event.materials, Some(vec!["折り紙".to_string()]));
        assert_eq!(event.objectives, None);
        assert_eq!(event.normalized_category(), Category::WallDecoration);
        assert_eq!(event.views, 0);
        assert!(event.created_at.is_none());
        assert!(event.media().is_empty());
        assert!(!event.has_media(MediaKind::Image));
    }

    #[test]
    fn null_scalars_and_stray_durations_fall_back_to_defaults() {
        let row = r#"{
            "id": "e2",
            "title": null,
            "description": "豆まき",
            "month": 2,
            "category": null,
            "views": null,
            "user_id": null,
            "duration": 90
        }"#;
        let event: Event = serde_json::from_str(row).unwrap();

        assert_eq!(event.title, "");
        assert_eq!(event.category, "");
        assert_eq!(event.normalized_category(), Category::Other);
        assert_eq!(event.views, 0);
        assert_eq!(event.user_id, "");
        assert!(event.duration.is_none());
        assert_eq!(event.parsed_duration(), ParsedDuration::Unknown);

        let viewed: Event =
            serde_json::from_str(r#"{"id": "e3", "month": 1, "views": 7, "duration": "45分"}"#).unwrap();
        assert_eq!(viewed.views, 7);
        assert_eq!(viewed.parsed_duration().to_string(), "45分");
    }
}
