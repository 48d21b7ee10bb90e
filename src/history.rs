/// A linear undo/redo history of whole states.
///
/// `entries[cursor]` is the current state. Pushing while the cursor is not at
/// the end discards the redo future first. The same type backs both the
/// document raster history and the staged layer history.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: Vec<T>,
    cursor: usize,
    /// Bumped on every push or reset, so caches can tell timelines apart
    revision: u64,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
            revision: 0,
        }
    }
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A history holding a single initial state
    pub fn with_initial(state: T) -> Self {
        let mut history = Self::new();
        history.reset(state);
        history
    }

    /// Records `state` as the new current state, dropping any redo entries.
    pub fn push(&mut self, state: T) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push(state);
        self.cursor = self.entries.len() - 1;
        self.revision += 1;
    }

    /// Replaces the whole timeline with one state.
    pub fn reset(&mut self, state: T) {
        self.entries.clear();
        self.entries.push(state);
        self.cursor = 0;
        self.revision += 1;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
        self.revision += 1;
    }

    /// Steps back one state and returns it, or `None` at the start.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Steps forward one state and returns it, or `None` at the end.
    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty() && self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.entries.get_mut(self.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_walks_cursor() {
        let mut history = History::with_initial(0);
        history.push(1);
        history.push(2);
        assert_eq!(history.undo(), Some(&1));
        assert_eq!(history.undo(), Some(&0));
        assert_eq!(history.undo(), None);
        assert_eq!(history.redo(), Some(&1));
        assert_eq!(history.current(), Some(&1));
    }

    #[test]
    fn test_push_truncates_redo() {
        let mut history = History::with_initial("a");
        history.push("b");
        history.push("c");
        history.undo();
        history.undo();
        history.push("d");
        assert_eq!(history.entries(), &["a", "d"]);
        assert!(!history.can_redo());
        assert_eq!(history.cursor(), 1);
    }

    #[test]
    fn test_empty_history() {
        let mut history: History<u8> = History::new();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.undo(), None);
        history.push(7);
        assert_eq!(history.current(), Some(&7));
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_revision_changes_on_push_and_reset() {
        let mut history = History::with_initial(1);
        let r0 = history.revision();
        history.push(2);
        assert!(history.revision() > r0);
        let r1 = history.revision();
        history.undo();
        assert_eq!(history.revision(), r1);
        history.reset(3);
        assert!(history.revision() > r1);
        assert_eq!(history.len(), 1);
    }
}
