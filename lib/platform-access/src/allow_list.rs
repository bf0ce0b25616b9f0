//! The set of Discord ids permitted to hold an administrative session.
//!
//! The allow-list is persisted as a JSON value. Reading it back is
//! deliberately forgiving: anything that is not an array made up entirely of
//! strings is treated as an empty list, so a corrupt or missing value denies
//! everyone instead of failing the request.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::identity::Identity;

/// Set of opaque identity ids allowed to administer the site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    ids: BTreeSet<String>,
}

impl AllowList {
    /// Creates an empty allow-list (denies everyone).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a stored allow-list value.
    ///
    /// `None`, `null`, non-arrays and arrays containing any non-string
    /// element all yield an empty list. Blank ids are dropped.
    #[must_use]
    pub fn from_value(value: Option<&serde_json::Value>) -> Self {
        let Some(items) = value.and_then(serde_json::Value::as_array) else {
            return Self::empty();
        };

        let mut ids = BTreeSet::new();
        for item in items {
            let Some(id) = item.as_str() else {
                return Self::empty();
            };
            let id = id.trim();
            if !id.is_empty() {
                ids.insert(id.to_string());
            }
        }

        Self { ids }
    }

    /// Parses operator input: ids separated by newlines, commas or whitespace.
    #[must_use]
    pub fn parse_lines(input: &str) -> Self {
        input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Returns the JSON array representation used for storage.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.ids
                .iter()
                .cloned()
                .map(serde_json::Value::String)
                .collect(),
        )
    }

    /// Returns true if `id` is on the list.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Returns true if the identity is on the list.
    #[must_use]
    pub fn permits(&self, identity: &Identity) -> bool {
        self.contains(identity.id())
    }

    /// Adds an id. Returns false if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Removes an id. Returns false if it was not present.
    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    /// Returns the number of ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nobody is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Iterates the ids in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter
                .into_iter()
                .map(Into::into)
                .filter(|id: &String| !id.trim().is_empty())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity(id: &str) -> Identity {
        Identity::new(id, "someone", None)
    }

    #[test]
    fn members_are_permitted() {
        let list = AllowList::from_value(Some(&json!(["111", "222"])));
        assert!(list.permits(&identity("111")));
        assert!(list.permits(&identity("222")));
        assert!(!list.permits(&identity("333")));
    }

    #[test]
    fn absent_value_denies_everyone() {
        let list = AllowList::from_value(None);
        assert!(list.is_empty());
        assert!(!list.permits(&identity("111")));
    }

    #[test]
    fn null_value_denies_everyone() {
        let list = AllowList::from_value(Some(&serde_json::Value::Null));
        assert!(!list.permits(&identity("111")));
    }

    #[test]
    fn non_array_denies_everyone() {
        for value in [json!("111"), json!(111), json!({"111": true}), json!(true)] {
            let list = AllowList::from_value(Some(&value));
            assert!(!list.permits(&identity("111")), "value {value} should deny");
        }
    }

    #[test]
    fn mixed_array_denies_everyone() {
        let list = AllowList::from_value(Some(&json!(["111", 222, null])));
        assert!(list.is_empty());
        assert!(!list.permits(&identity("111")));
        assert!(!list.permits(&identity("222")));
    }

    #[test]
    fn parse_lines_accepts_newlines_and_commas() {
        let list = AllowList::parse_lines("111\n222, 333\r\n\n  444 ");
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["111", "222", "333", "444"]);
    }

    #[test]
    fn insert_and_remove_report_changes() {
        let mut list = AllowList::empty();
        assert!(list.insert("111"));
        assert!(!list.insert("111"));
        assert_eq!(list.len(), 1);
        assert!(list.remove("111"));
        assert!(!list.remove("111"));
        assert!(list.is_empty());
    }

    #[test]
    fn value_form_is_a_string_array() {
        let list: AllowList = ["222", "111"].into_iter().collect();
        assert_eq!(list.to_value(), json!(["111", "222"]));
        assert_eq!(AllowList::from_value(Some(&list.to_value())), list);
    }
}
