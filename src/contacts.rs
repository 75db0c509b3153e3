use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// Up to two emergency contact identifiers, in the order they were entered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSet {
    contacts: Vec<String>,
}

impl ContactSet {
    pub const MAX_CONTACTS: usize = 2;

    /// Build a set from the two UI fields. Blank entries count as absent.
    /// Numbers are kept verbatim, no format validation.
    pub fn from_pair(first: Option<String>, second: Option<String>) -> Self {
        let contacts = [first, second]
            .into_iter()
            .flatten()
            .filter(|c| !c.trim().is_empty())
            .collect();
        Self { contacts }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.contacts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Shared in-memory contact holder.
///
/// Clones share the same set. Each `save` replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct ContactStore {
    inner: Arc<RwLock<ContactSet>>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, first: Option<String>, second: Option<String>) {
        let set = ContactSet::from_pair(first, second);
        log::info!("Saved {} emergency contact(s)", set.len());

        // poisoned or not, the set is replaced wholesale
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = set;
    }

    pub fn current(&self) -> ContactSet {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_by_default() {
        let store = ContactStore::new();
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_save_overwrites_previous_set() {
        let store = ContactStore::new();
        store.save(Some("+15550000001".into()), Some("+15550000002".into()));
        store.save(Some("+15559999999".into()), None);

        let current = store.current();
        assert_eq!(current.iter().collect::<Vec<_>>(), vec!["+15559999999"]);
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let set = ContactSet::from_pair(Some("".into()), Some("  +15551234567 ".into()));
        assert_eq!(set.len(), 1);
        // kept verbatim
        assert_eq!(set.iter().next(), Some("  +15551234567 "));
    }

    #[test]
    fn test_clones_share_state() {
        let store = ContactStore::new();
        let ui_handle = store.clone();
        ui_handle.save(Some("112".into()), Some("911".into()));
        assert_eq!(store.current().len(), 2);
    }
}
