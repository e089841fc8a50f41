//! The closed set of catalog languages.
//!
//! Every card and set row belongs to exactly one language. The stored code
//! uses underscores (`pt_br`) while the upstream API path uses hyphens
//! (`pt-br`); [`Language::from_str`] accepts either.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Language {
  En,
  De,
  Es,
  Fr,
  It,
  Ja,
  Ko,
  Nl,
  Pl,
  PtBr,
  Ru,
  Th,
  ZhCn,
  ZhTw,
  Id,
}

impl Language {
  /// Every supported language, English first.
  pub const ALL: [Language; 15] = [
    Self::En,
    Self::De,
    Self::Es,
    Self::Fr,
    Self::It,
    Self::Ja,
    Self::Ko,
    Self::Nl,
    Self::Pl,
    Self::PtBr,
    Self::Ru,
    Self::Th,
    Self::ZhCn,
    Self::ZhTw,
    Self::Id,
  ];

  /// The code stored in the `language` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::En => "en",
      Self::De => "de",
      Self::Es => "es",
      Self::Fr => "fr",
      Self::It => "it",
      Self::Ja => "ja",
      Self::Ko => "ko",
      Self::Nl => "nl",
      Self::Pl => "pl",
      Self::PtBr => "pt_br",
      Self::Ru => "ru",
      Self::Th => "th",
      Self::ZhCn => "zh_cn",
      Self::ZhTw => "zh_tw",
      Self::Id => "id",
    }
  }

  /// The code used in upstream API paths, e.g. `/v2/pt-br/cards/...`.
  pub fn api_code(self) -> &'static str {
    match self {
      Self::PtBr => "pt-br",
      Self::ZhCn => "zh-cn",
      Self::ZhTw => "zh-tw",
      other => other.as_str(),
    }
  }

  pub fn is_english(self) -> bool { self == Self::En }

  /// All languages except English, in [`Language::ALL`] order.
  pub fn non_english() -> impl Iterator<Item = Language> {
    Self::ALL.into_iter().filter(|l| !l.is_english())
  }
}

impl fmt::Display for Language {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Language {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let normalised = s.trim().to_ascii_lowercase().replace('-', "_");
    Self::ALL
      .into_iter()
      .find(|l| l.as_str() == normalised)
      .ok_or_else(|| Error::UnknownLanguage(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_both_separators() {
    assert_eq!("pt_br".parse::<Language>().unwrap(), Language::PtBr);
    assert_eq!("pt-BR".parse::<Language>().unwrap(), Language::PtBr);
    assert_eq!("zh-tw".parse::<Language>().unwrap(), Language::ZhTw);
  }

  #[test]
  fn api_code_uses_hyphens() {
    assert_eq!(Language::ZhCn.api_code(), "zh-cn");
    assert_eq!(Language::De.api_code(), "de");
  }

  #[test]
  fn rejects_unknown_code() {
    assert!("xx".parse::<Language>().is_err());
  }

  #[test]
  fn non_english_excludes_en() {
    let langs: Vec<_> = Language::non_english().collect();
    assert_eq!(langs.len(), Language::ALL.len() - 1);
    assert!(!langs.contains(&Language::En));
  }
}
