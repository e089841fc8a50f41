//! Fill-missing merge rules.
//!
//! Enrichment only ever writes into slots that are empty. A slot is empty
//! when it is `None`, an empty or whitespace-only string, an empty list, or a
//! structured value whose every member is empty. Incoming empty values never
//! clear anything, so a merge can be repeated or interrupted at any point
//! without losing data.

use chrono::NaiveDate;

/// Values that can be "empty" for the purpose of a fill-missing merge.
pub trait Blank {
  fn is_blank(&self) -> bool;
}

impl Blank for String {
  fn is_blank(&self) -> bool { self.trim().is_empty() }
}

impl<T> Blank for Vec<T> {
  fn is_blank(&self) -> bool { self.is_empty() }
}

impl<T: Blank> Blank for Option<T> {
  fn is_blank(&self) -> bool { self.as_ref().is_none_or(Blank::is_blank) }
}

impl Blank for u32 {
  fn is_blank(&self) -> bool { false }
}

impl Blank for NaiveDate {
  fn is_blank(&self) -> bool { false }
}

impl Blank for serde_json::Value {
  fn is_blank(&self) -> bool {
    match self {
      serde_json::Value::Null => true,
      serde_json::Value::String(s) => s.trim().is_empty(),
      serde_json::Value::Array(a) => a.is_empty(),
      serde_json::Value::Object(o) => o.is_empty(),
      _ => false,
    }
  }
}

/// Move `incoming` into `slot` when `slot` is blank and `incoming` is not.
///
/// Returns whether the slot was written.
pub fn fill<T: Blank>(slot: &mut T, incoming: T) -> bool {
  if slot.is_blank() && !incoming.is_blank() {
    *slot = incoming;
    true
  } else {
    false
  }
}

/// Apply [`fill`] to each listed field of `$target` from `$source`, pushing
/// the names of the fields that were written onto `$filled`.
#[macro_export]
macro_rules! fill_fields {
  ($target:expr, $source:expr, $filled:expr; $($field:ident),+ $(,)?) => {
    $(
      if $crate::merge::fill(&mut $target.$field, $source.$field) {
        $filled.push(stringify!($field));
      }
    )+
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fills_none() {
    let mut slot: Option<String> = None;
    assert!(fill(&mut slot, Some("Pokemon".into())));
    assert_eq!(slot.as_deref(), Some("Pokemon"));
  }

  #[test]
  fn empty_string_counts_as_missing() {
    let mut slot = Some(String::from("  "));
    assert!(fill(&mut slot, Some("Trainer".into())));
    assert_eq!(slot.as_deref(), Some("Trainer"));
  }

  #[test]
  fn never_overwrites_present_value() {
    let mut slot = Some(String::from("Pokemon"));
    assert!(!fill(&mut slot, Some("Energy".into())));
    assert_eq!(slot.as_deref(), Some("Pokemon"));
  }

  #[test]
  fn never_clears_with_empty_incoming() {
    let mut slot = Some(60u32);
    assert!(!fill(&mut slot, None));
    assert_eq!(slot, Some(60));

    let mut list = vec!["Fire".to_string()];
    assert!(!fill(&mut list, Vec::new()));
    assert_eq!(list, vec!["Fire".to_string()]);
  }

  #[test]
  fn blank_incoming_does_not_fill_blank_slot() {
    let mut slot: Option<String> = None;
    assert!(!fill(&mut slot, Some(String::new())));
    assert!(slot.is_none());
  }

  #[test]
  fn json_objects_and_arrays() {
    let mut slot = serde_json::json!({});
    assert!(fill(&mut slot, serde_json::json!({ "id": "base1-1" })));
    assert!(!fill(&mut slot, serde_json::json!({ "id": "other" })));
    assert_eq!(slot["id"], "base1-1");
  }
}
