use crate::model::Composition;

/// Linear undo/redo over whole-composition snapshots.
///
/// An arena of snapshots with index-based navigation: `cursor` points at the
/// current snapshot, undo/redo move it, and a push after an undo truncates
/// the redo tail. Snapshots are whole values, not diffs.
#[derive(Clone, Debug)]
pub struct History {
    snapshots: Vec<Composition>,
    cursor: usize,
}

impl History {
    pub fn new(initial: Composition) -> Self {
        Self {
            snapshots: vec![initial],
            cursor: 0,
        }
    }

    pub fn current(&self) -> &Composition {
        &self.snapshots[self.cursor]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Number of stored snapshots, including the initial one.
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    /// Record the state resulting from a mutation. Discards any redo tail.
    pub fn push(&mut self, snapshot: Composition) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor += 1;
    }

    /// Step back one snapshot; no-op at the bottom of the stack.
    pub fn undo(&mut self) -> Option<&Composition> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.snapshots[self.cursor])
    }

    /// Step forward one snapshot; no-op at the top of the stack.
    pub fn redo(&mut self) -> Option<&Composition> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.snapshots[self.cursor])
    }
}
