use std::collections::HashMap;

use crate::domain::{FeedItem, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    TooShort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnitPhase {
    #[default]
    Unseen,
    Pending,
    Skipped(SkipReason),
    Blurred,
    Visible,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitState {
    pub phase: UnitPhase,
    pub processed: bool,
    pub censored: bool,
    pub badged: bool,
    pub cached_score: Option<u8>,
    /// Ticket of the request currently in flight for this unit.
    pub ticket: Option<u64>,
}

impl UnitState {
    pub fn has_effect(&self) -> bool {
        self.censored || self.badged
    }
}

struct UnitEntry {
    item: FeedItem,
    state: UnitState,
}

#[derive(Default)]
pub struct UnitTable {
    order: Vec<UnitId>,
    entries: HashMap<UnitId, UnitEntry>,
}

impl UnitTable {
    /// Returns `false` when the unit is already tracked; its state is kept.
    pub fn insert(&mut self, item: FeedItem) -> bool {
        if self.entries.contains_key(&item.id) {
            return false;
        }
        self.order.push(item.id.clone());
        self.entries.insert(
            item.id.clone(),
            UnitEntry {
                item,
                state: UnitState::default(),
            },
        );
        true
    }

    pub fn remove(&mut self, id: &UnitId) -> Option<UnitState> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|known| known != id);
        Some(entry.state)
    }

    pub fn item(&self, id: &UnitId) -> Option<&FeedItem> {
        self.entries.get(id).map(|entry| &entry.item)
    }

    pub fn state(&self, id: &UnitId) -> Option<&UnitState> {
        self.entries.get(id).map(|entry| &entry.state)
    }

    pub fn state_mut(&mut self, id: &UnitId) -> Option<&mut UnitState> {
        self.entries.get_mut(id).map(|entry| &mut entry.state)
    }

    pub fn unprocessed(&self) -> Vec<UnitId> {
        self.order
            .iter()
            .filter(|id| {
                self.entries
                    .get(*id)
                    .is_some_and(|entry| !entry.state.processed)
            })
            .cloned()
            .collect()
    }

    pub fn for_each_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&UnitId, &mut UnitState),
    {
        for id in &self.order {
            if let Some(entry) = self.entries.get_mut(id) {
                visit(id, &mut entry.state);
            }
        }
    }

    pub fn count(&self, phase: UnitPhase) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.state.phase == phase)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_seen_order_and_ignores_duplicates() {
        let mut table = UnitTable::default();
        assert!(table.insert(FeedItem::new("b", "second")));
        assert!(table.insert(FeedItem::new("a", "first")));
        table.state_mut(&"b".into()).unwrap().processed = true;

        assert!(!table.insert(FeedItem::new("b", "replacement")));
        assert_eq!(table.item(&"b".into()).unwrap().text, "second");
        assert!(table.state(&"b".into()).unwrap().processed);
        assert_eq!(table.unprocessed(), vec![UnitId::from("a")]);

        assert!(table.remove(&"b".into()).is_some());
        assert_eq!(table.len(), 1);
    }
}
