use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::anyhow;
use regex::Regex;
use serde::{
  Deserialize,
  Serialize
};
use serde_json::Value;
use tracing::trace;

pub const UNKNOWN_DURATION_LABEL: &str =
  "不明";
const RANGE_START_SENTINEL: &str =
  "00:00";

/// Elapsed time of an activity. Not a
/// wall-clock time.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct Duration {
  pub hours:   u32,
  pub minutes: u32
}

impl Duration {
  pub fn new(
    hours: u32,
    minutes: u32
  ) -> Self {
    Self {
      hours,
      minutes
    }
  }

  pub fn total_minutes(&self) -> u64 {
    u64::from(self.hours) * 60
      + u64::from(self.minutes)
  }

  /// Compact storage text, e.g.
  /// `2時間30分`.
  pub fn to_text(&self) -> String {
    format!(
      "{}時間{}分",
      self.hours, self.minutes
    )
  }

  /// Range storage form; `start` is
  /// always the midnight sentinel.
  pub fn to_range(&self) -> RawDuration {
    RawDuration::Range {
      start: Some(
        RANGE_START_SENTINEL
          .to_string()
      ),
      end:   Some(format!(
        "{:02}:{:02}",
        self.hours, self.minutes
      ))
    }
  }

  pub fn encode(
    &self,
    encoding: DurationEncoding
  ) -> RawDuration {
    match encoding {
      | DurationEncoding::Text => {
        RawDuration::Text(
          self.to_text()
        )
      }
      | DurationEncoding::Range => {
        self.to_range()
      }
    }
  }
}

/// The two shapes a duration takes in
/// stored rows.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(untagged)]
pub enum RawDuration {
  Text(String),
  Range {
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end:   Option<String>
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum DurationEncoding {
  #[default]
  Text,
  Range
}

impl FromStr for DurationEncoding {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "text" => Ok(Self::Text),
      | "range" => Ok(Self::Range),
      | other => {
        Err(anyhow!(
          "invalid duration encoding: \
           {other}"
        ))
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedDuration {
  Known(Duration),
  /// Text matching neither pattern,
  /// kept for display.
  Unparsed(String),
  Unknown
}

impl ParsedDuration {
  pub fn duration(
    &self
  ) -> Option<Duration> {
    match self {
      | ParsedDuration::Known(d) => {
        Some(*d)
      }
      | _ => None
    }
  }
}

impl fmt::Display for ParsedDuration {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | ParsedDuration::Known(d) => {
        match format_duration(*d) {
          | Some(text) => {
            f.write_str(&text)
          }
          | None => f.write_str(
            UNKNOWN_DURATION_LABEL
          )
        }
      }
      | ParsedDuration::Unparsed(
        raw
      ) => f.write_str(raw),
      | ParsedDuration::Unknown => {
        f.write_str(
          UNKNOWN_DURATION_LABEL
        )
      }
    }
  }
}

#[must_use]
pub fn parse_duration(
  raw: Option<&RawDuration>
) -> ParsedDuration {
  match raw {
    | None => ParsedDuration::Unknown,
    | Some(RawDuration::Text(text)) => {
      parse_duration_text(text)
    }
    | Some(RawDuration::Range {
      end,
      ..
    }) => parse_range_end(end.as_deref())
  }
}

#[must_use]
pub fn parse_duration_text(
  text: &str
) -> ParsedDuration {
  if text.trim().is_empty() {
    return ParsedDuration::Unknown;
  }

  if let Ok(Value::Object(map)) =
    serde_json::from_str::<Value>(text)
  {
    trace!(
      text,
      "duration text holds a json object"
    );
    return parse_range_end(
      map
        .get("end")
        .and_then(Value::as_str)
    );
  }

  let hours =
    capture_number(hours_re(), text);
  let minutes =
    capture_number(minutes_re(), text);

  if hours.is_none() && minutes.is_none()
  {
    trace!(
      text,
      "duration text matched no pattern"
    );
    return ParsedDuration::Unparsed(
      text.to_string()
    );
  }

  ParsedDuration::Known(Duration::new(
    hours.unwrap_or(0),
    minutes.unwrap_or(0)
  ))
}

fn parse_range_end(
  end: Option<&str>
) -> ParsedDuration {
  let Some(end) = end else {
    return ParsedDuration::Unknown;
  };
  let Some(caps) = range_end_re()
    .and_then(|re| re.captures(end))
  else {
    trace!(
      end,
      "range end is not HH:MM"
    );
    return ParsedDuration::Unknown;
  };

  let hours = caps
    .get(1)
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    });
  let minutes = caps
    .get(2)
    .and_then(|m| {
      m.as_str().parse::<u32>().ok()
    });

  match (hours, minutes) {
    | (Some(hours), Some(minutes)) => {
      ParsedDuration::Known(
        Duration::new(hours, minutes)
      )
    }
    | _ => ParsedDuration::Unknown
  }
}

/// `None` means the duration is unknown
/// (both components zero).
#[must_use]
pub fn format_duration(
  d: Duration
) -> Option<String> {
  match (d.hours > 0, d.minutes > 0) {
    | (true, true) => {
      Some(format!(
        "{}時間{}分",
        d.hours, d.minutes
      ))
    }
    | (true, false) => {
      Some(format!("{}時間", d.hours))
    }
    | (false, true) => {
      Some(format!("{}分", d.minutes))
    }
    | (false, false) => None
  }
}

/// Texts the duration search constraint
/// is matched against. Range rows offer
/// both the rendered form and the stored
/// end time.
#[must_use]
pub fn duration_search_texts(
  raw: &RawDuration
) -> Vec<String> {
  match raw {
    | RawDuration::Text(text) => {
      vec![text.clone()]
    }
    | RawDuration::Range {
      end,
      ..
    } => {
      parse_range_end(end.as_deref())
        .duration()
        .and_then(format_duration)
        .into_iter()
        .chain(end.clone())
        .collect()
    }
  }
}

fn capture_number(
  re: Option<&Regex>,
  text: &str
) -> Option<u32> {
  re?
    .captures(text)?
    .get(1)?
    .as_str()
    .parse::<u32>()
    .ok()
}

fn hours_re() -> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    compile(r"(\d+)時間")
  })
  .as_ref()
}

fn minutes_re()
-> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| compile(r"(\d+)分"))
    .as_ref()
}

fn range_end_re()
-> Option<&'static Regex> {
  static RE: OnceLock<Option<Regex>> =
    OnceLock::new();
  RE.get_or_init(|| {
    compile(r"^(\d{1,2}):(\d{1,2})$")
  })
  .as_ref()
}

fn compile(
  pattern: &str
) -> Option<Regex> {
  match Regex::new(pattern) {
    | Ok(re) => Some(re),
    | Err(err) => {
      tracing::error!(
        pattern,
        error = %err,
        "internal regex compile failure"
      );
      None
    }
  }
}
