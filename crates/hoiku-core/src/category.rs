use std::fmt;

use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
)]
pub enum Category {
  #[serde(rename = "壁　面")]
  WallDecoration,
  #[serde(rename = "制作物")]
  CraftItem,
  /// Catch-all for anything that is not
  /// one of the other two labels.
  #[serde(rename = "その他")]
  Other
}

impl Category {
  pub const ALL: [Category; 3] = [
    Category::WallDecoration,
    Category::CraftItem,
    Category::Other
  ];

  pub fn label(self) -> &'static str {
    match self {
      | Category::WallDecoration => {
        "壁　面"
      }
      | Category::CraftItem => "制作物",
      | Category::Other => "その他"
    }
  }
}

impl fmt::Display for Category {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.label())
  }
}

/// Maps a stored or typed category to
/// its display bucket. Whitespace of any
/// width is ignored, so `壁面`, `壁　面`
/// and ` 壁 面 ` are the same label.
#[must_use]
pub fn normalize_category(
  raw: &str
) -> Category {
  let compact = strip_whitespace(raw);

  for candidate in [
    Category::WallDecoration,
    Category::CraftItem
  ] {
    if compact
      == strip_whitespace(
        candidate.label()
      )
    {
      return candidate;
    }
  }

  trace!(
    raw,
    "category falls into catch-all"
  );
  Category::Other
}

fn strip_whitespace(
  raw: &str
) -> String {
  raw
    .chars()
    .filter(|ch| !ch.is_whitespace())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::{
    Category,
    normalize_category
  };

  #[test]
  fn wall_label_variants_normalize() {
    for raw in [
      "壁面",
      "壁　面",
      " 壁　面 ",
      "壁 \u{3000} 面"
    ] {
      assert_eq!(
        normalize_category(raw),
        Category::WallDecoration,
        "{raw:?}"
      );
    }
    assert_eq!(
      normalize_category(" 制作物"),
      Category::CraftItem
    );
  }

  #[test]
  fn everything_else_is_other() {
    for raw in
      ["工作", "", "   ", "製作", "イベント"]
    {
      assert_eq!(
        normalize_category(raw),
        Category::Other,
        "{raw:?}"
      );
    }
  }

  #[test]
  fn normalization_is_idempotent() {
    for raw in [
      "壁面", "制作物", "工作", "", "その他"
    ] {
      let once = normalize_category(raw);
      assert_eq!(
        normalize_category(once.label()),
        once
      );
    }
  }
}
