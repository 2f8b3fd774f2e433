use std::collections::BTreeSet;

use anyhow::anyhow;
use tracing::{
  debug,
  trace
};

use crate::category::{
  Category,
  normalize_category
};
use crate::duration::duration_search_texts;
use crate::event::{
  AgeGroup,
  Event,
  MediaKind
};

/// Advanced search form. Every field is
/// optional; present constraints are
/// ANDed together.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct SearchSpec {
  /// Matches title, description, or
  /// normalized category.
  pub text:        Option<String>,
  pub title:       Option<String>,
  pub description: Option<String>,
  pub category:    Option<Category>,
  /// Any-of.
  pub age_groups:  BTreeSet<AgeGroup>,
  pub duration:    Option<String>,
  /// All-of; each needle must occur in
  /// some material.
  pub materials:   Vec<String>,
  pub objectives:  Vec<String>,
  pub has_image:   bool,
  pub has_video:   bool,
  pub month:       Option<u32>
}

impl SearchSpec {
  pub fn text(
    text: impl Into<String>
  ) -> Self {
    Self {
      text: Some(text.into()),
      ..Self::default()
    }
  }

  /// Builds a spec from command-line
  /// terms such as `age:3`,
  /// `material:画用紙`, `+image`, or bare
  /// words.
  #[tracing::instrument(skip(terms))]
  pub fn parse(
    terms: &[String]
  ) -> anyhow::Result<Self> {
    let mut spec = Self::default();
    let mut words: Vec<&str> =
      Vec::new();

    for term in terms {
      if !parse_atom(&mut spec, term)? {
        words.push(term.as_str());
      }
    }

    if !words.is_empty() {
      spec.text = Some(words.join(" "));
    }

    debug!(?spec, "parsed search terms");
    Ok(spec)
  }

  pub fn is_empty(&self) -> bool {
    self.predicates().is_empty()
  }

  fn predicates(&self) -> Vec<Pred> {
    let mut preds = Vec::new();

    if let Some(needle) =
      needle(self.text.as_deref())
    {
      preds.push(Pred::TextContains(
        needle
      ));
    }
    if let Some(needle) =
      needle(self.title.as_deref())
    {
      preds.push(Pred::TitleContains(
        needle
      ));
    }
    if let Some(needle) = needle(
      self.description.as_deref()
    ) {
      preds.push(
        Pred::DescriptionContains(
          needle
        )
      );
    }
    if let Some(category) = self.category
    {
      preds
        .push(Pred::CategoryEq(category));
    }
    if !self.age_groups.is_empty() {
      preds.push(Pred::AgeGroupAny(
        self.age_groups.clone()
      ));
    }
    if let Some(needle) =
      needle(self.duration.as_deref())
    {
      preds.push(Pred::DurationContains(
        needle
      ));
    }
    let materials =
      non_blank(&self.materials);
    if !materials.is_empty() {
      preds.push(Pred::MaterialsAll(
        materials
      ));
    }
    let objectives =
      non_blank(&self.objectives);
    if !objectives.is_empty() {
      preds.push(Pred::ObjectivesAll(
        objectives
      ));
    }
    if self.has_image {
      preds.push(Pred::HasMedia(
        MediaKind::Image
      ));
    }
    if self.has_video {
      preds.push(Pred::HasMedia(
        MediaKind::Video
      ));
    }
    if let Some(month) = self.month {
      preds.push(Pred::MonthEq(month));
    }

    preds
  }
}

#[derive(Debug, Clone)]
enum Pred {
  TextContains(String),
  TitleContains(String),
  DescriptionContains(String),
  CategoryEq(Category),
  AgeGroupAny(BTreeSet<AgeGroup>),
  DurationContains(String),
  MaterialsAll(Vec<String>),
  ObjectivesAll(Vec<String>),
  HasMedia(MediaKind),
  MonthEq(u32)
}

/// Compiled conjunction of a
/// [`SearchSpec`].
#[derive(Debug, Clone, Default)]
pub struct Filter {
  preds: Vec<Pred>
}

impl Filter {
  pub fn new(spec: &SearchSpec) -> Self {
    Self {
      preds: spec.predicates()
    }
  }

  #[tracing::instrument(skip(
    self, event
  ))]
  pub fn matches(
    &self,
    event: &Event
  ) -> bool {
    self
      .preds
      .iter()
      .all(|pred| eval_pred(pred, event))
  }
}

/// Events satisfying `spec`, in input
/// order. The input is left untouched.
#[tracing::instrument(skip_all, fields(count = events.len()))]
pub fn filter_events(
  events: &[Event],
  spec: &SearchSpec
) -> Vec<Event> {
  let filter = Filter::new(spec);
  let out: Vec<Event> = events
    .iter()
    .filter(|event| filter.matches(event))
    .cloned()
    .collect();
  debug!(
    matched = out.len(),
    "filtered events"
  );
  out
}

fn parse_atom(
  spec: &mut SearchSpec,
  term: &str
) -> anyhow::Result<bool> {
  if let Some(flag) =
    term.strip_prefix('+')
  {
    match flag
      .to_ascii_lowercase()
      .as_str()
    {
      | "image" => {
        spec.has_image = true;
        return Ok(true);
      }
      | "video" => {
        spec.has_video = true;
        return Ok(true);
      }
      | _ => return Ok(false)
    }
  }

  let Some((key, value)) =
    term.split_once(':')
  else {
    return Ok(false);
  };

  match key
    .to_ascii_lowercase()
    .as_str()
  {
    | "title" => {
      spec.title = Some(value.to_string())
    }
    | "description" | "desc" => {
      spec.description =
        Some(value.to_string())
    }
    | "category" | "cat" => {
      spec.category =
        Some(normalize_category(value))
    }
    | "age" => {
      spec
        .age_groups
        .insert(value.parse::<AgeGroup>()?);
    }
    | "duration" => {
      spec.duration =
        Some(value.to_string())
    }
    | "material" => {
      spec
        .materials
        .push(value.to_string())
    }
    | "objective" => {
      spec
        .objectives
        .push(value.to_string())
    }
    | "month" => {
      let month = value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| {
          anyhow!(
            "month must be 1-12, got: \
             {value}"
          )
        })?;
      spec.month = Some(month);
    }
    | _ => return Ok(false)
  }

  Ok(true)
}

fn eval_pred(
  pred: &Pred,
  event: &Event
) -> bool {
  let ok = match pred {
    | Pred::TextContains(needle) => {
      contains_ci(&event.title, needle)
        || contains_ci(
          &event.description,
          needle
        )
        || contains_ci(
          event
            .normalized_category()
            .label(),
          needle
        )
    }
    | Pred::TitleContains(needle) => {
      contains_ci(&event.title, needle)
    }
    | Pred::DescriptionContains(
      needle
    ) => {
      contains_ci(
        &event.description,
        needle
      )
    }
    | Pred::CategoryEq(category) => {
      event.normalized_category()
        == *category
    }
    | Pred::AgeGroupAny(groups) => {
      groups
        .iter()
        .any(|g| event.has_age_group(*g))
    }
    | Pred::DurationContains(needle) => {
      event
        .duration
        .as_ref()
        .map(|raw| {
          duration_search_texts(raw)
            .iter()
            .any(|text| {
              contains_ci(text, needle)
            })
        })
        .unwrap_or(false)
    }
    | Pred::MaterialsAll(needles) => {
      all_found(
        event.materials.as_deref(),
        needles
      )
    }
    | Pred::ObjectivesAll(needles) => {
      all_found(
        event.objectives.as_deref(),
        needles
      )
    }
    | Pred::HasMedia(kind) => {
      event.has_media(*kind)
    }
    | Pred::MonthEq(month) => {
      event.month == *month
    }
  };

  trace!(pred = ?pred, id = %event.id, ok, "filter predicate evaluation");
  ok
}

/// Missing list fails closed.
fn all_found(
  entries: Option<&[String]>,
  needles: &[String]
) -> bool {
  let Some(entries) = entries else {
    return false;
  };
  needles.iter().all(|needle| {
    entries.iter().any(|entry| {
      entry.contains(needle.as_str())
    })
  })
}

fn contains_ci(
  haystack: &str,
  lowered_needle: &str
) -> bool {
  haystack
    .to_lowercase()
    .contains(lowered_needle)
}

fn needle(
  raw: Option<&str>
) -> Option<String> {
  raw
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_lowercase)
}

fn non_blank(
  values: &[String]
) -> Vec<String> {
  values
    .iter()
    .map(|v| v.trim())
    .filter(|v| !v.is_empty())
    .map(str::to_string)
    .collect()
}
