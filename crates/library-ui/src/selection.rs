use std::collections::BTreeSet;

/// Book ids picked for bulk actions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, id: &str, selected: bool) {
        if selected {
            self.ids.insert(id.to_string());
        } else {
            self.ids.remove(id);
        }
    }

    pub fn toggle(&mut self, id: &str) -> bool {
        let selected = !self.ids.contains(id);
        self.set(id, selected);
        selected
    }

    /// Select-all checkbox: applies `selected` to every visible id.
    pub fn set_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>, selected: bool) {
        for id in ids {
            self.set(id, selected);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Drop ids that no longer appear in the catalog.
    pub fn retain_known<'a>(&mut self, known: impl IntoIterator<Item = &'a str>) {
        let known: BTreeSet<&str> = known.into_iter().collect();
        self.ids.retain(|id| known.contains(id.as_str()));
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.remove(id);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_and_select_all() {
        let mut selection = Selection::new();
        assert!(selection.toggle("b1"));
        assert!(!selection.toggle("b1"));
        assert!(selection.is_empty());

        selection.set_all(["b1", "b2", "b3"], true);
        assert_eq!(selection.len(), 3);
        selection.set_all(["b2"], false);
        assert_eq!(selection.ids(), vec!["b1", "b3"]);
    }

    #[test]
    fn reload_prunes_vanished_books() {
        let mut selection = Selection::new();
        selection.set_all(["b1", "b2", "b3"], true);

        selection.retain_known(["b2", "b3", "b4"]);

        assert_eq!(selection.ids(), vec!["b2", "b3"]);
        assert!(!selection.contains("b4"));
    }
}
