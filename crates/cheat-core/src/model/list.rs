use crate::api::EntryId;
use crate::fault::EngineError;
use crate::model::entry::CheatEntry;

/// Owning, ordered container of entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheatList {
    entries: Vec<CheatEntry>,
    next_id: EntryId,
}

impl CheatList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the list holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order.
    #[must_use]
    pub fn entries(&self) -> &[CheatEntry] {
        &self.entries
    }

    /// Entries in order, mutable.
    pub fn entries_mut(&mut self) -> &mut [CheatEntry] {
        &mut self.entries
    }

    /// Entry at `at`.
    #[must_use]
    pub fn get(&self, at: usize) -> Option<&CheatEntry> {
        self.entries.get(at)
    }

    /// Entry at `at`, mutable.
    pub fn get_mut(&mut self, at: usize) -> Option<&mut CheatEntry> {
        self.entries.get_mut(at)
    }

    /// Position of the entry with identifier `id`.
    #[must_use]
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Appends `entry`, assigning it a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when the list cannot grow.
    pub fn push(&mut self, mut entry: CheatEntry) -> Result<EntryId, EngineError> {
        self.entries
            .try_reserve(1)
            .map_err(|_| EngineError::Allocation { requested: 1 })?;
        entry.id = self.allocate_id();
        let id = entry.id;
        self.entries.push(entry);
        Ok(id)
    }

    /// Grows with placeholder entries or shrinks to `len`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Allocation`] when growth fails; the list is
    /// unchanged.
    pub fn resize_entry_list(&mut self, len: usize) -> Result<(), EngineError> {
        if len > self.entries.len() {
            let extra = len - self.entries.len();
            self.entries
                .try_reserve(extra)
                .map_err(|_| EngineError::Allocation { requested: extra })?;
            while self.entries.len() < len {
                let id = self.allocate_id();
                self.entries.push(CheatEntry::new(id));
            }
        } else {
            for entry in &mut self.entries[len..] {
                entry.release_backups();
            }
            self.entries.truncate(len);
        }
        Ok(())
    }

    /// Inserts a placeholder entry at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when `at` is past the end
    /// and [`EngineError::Allocation`] when growth fails.
    pub fn insert_entry(&mut self, at: usize) -> Result<EntryId, EngineError> {
        if at > self.entries.len() {
            return Err(EngineError::InvariantViolation("invalid entry insert position"));
        }
        self.entries
            .try_reserve(1)
            .map_err(|_| EngineError::Allocation { requested: 1 })?;
        let id = self.allocate_id();
        self.entries.insert(at, CheatEntry::new(id));
        Ok(id)
    }

    /// Removes the entry at `at` after releasing its backups.
    ///
    /// Memory is not restored and engine watches stay registered; use
    /// [`crate::Engine::delete_entry`] for entries that may be active.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvariantViolation`] when `at` is out of range.
    pub fn delete_entry(&mut self, at: usize) -> Result<CheatEntry, EngineError> {
        if at >= self.entries.len() {
            return Err(EngineError::InvariantViolation("entry index out of range"));
        }
        self.entries[at].release_backups();
        Ok(self.entries.remove(at))
    }

    /// Iterates over entries.
    pub fn iter(&self) -> std::slice::Iter<'_, CheatEntry> {
        self.entries.iter()
    }

    /// Iterates mutably over entries.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, CheatEntry> {
        self.entries.iter_mut()
    }
}

impl<'a> IntoIterator for &'a CheatList {
    type Item = &'a CheatEntry;
    type IntoIter = std::slice::Iter<'a, CheatEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::CheatList;
    use crate::api::Location;
    use crate::model::action::{Backup, BackupValues};
    use crate::model::entry::CheatEntry;

    #[test]
    fn ids_stay_stable_across_inserts() {
        let mut list = CheatList::new();
        list.resize_entry_list(2).expect("grow");
        let front = list.insert_entry(0).expect("insert");
        assert_eq!(front, 2);
        assert_eq!(list.position(0), Some(1));
        assert_eq!(list.position(2), Some(0));
        assert!(list.insert_entry(9).is_err());
    }

    #[test]
    fn delete_releases_backups_and_shifts() {
        let mut list = CheatList::new();
        let mut entry = CheatEntry::new(0);
        entry.name = "first".into();
        entry.actions[0].backup = Some(Backup {
            location: Location::cpu(0),
            address: 0,
            values: BackupValues::Single(5),
        });
        list.push(entry).expect("push");
        list.resize_entry_list(3).expect("grow");

        let removed = list.delete_entry(0).expect("delete");
        assert_eq!(removed.name, "first");
        assert!(removed.actions()[0].backup.is_none());
        assert_eq!(list.len(), 2);
        assert!(list.delete_entry(2).is_err());
    }

    #[test]
    fn shrink_truncates() {
        let mut list = CheatList::new();
        list.resize_entry_list(4).expect("grow");
        list.resize_entry_list(1).expect("shrink");
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().count(), 1);
    }
}
