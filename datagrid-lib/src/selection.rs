//! Row selection state.
//!
//! Selection is keyed by [`RowId`], so it survives sorting, filtering and
//! reloads of the same logical rows. Operations that depend on row order
//! (ranges, select-all, keyboard movement) take the current order as a
//! slice of ids.

use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::model::RowId;

/// Selection mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// No selection allowed
    None,
    /// Single row selection
    Single,
    /// Multiple rows can be selected (Ctrl+click, Shift+range)
    #[default]
    Multiple,
}

/// Ids added to and removed from the selection by one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionChange {
    pub added: Vec<RowId>,
    pub removed: Vec<RowId>,
}

impl SelectionChange {
    /// Returns `true` if membership did not change.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Keyboard commands understood by [`SelectionState::handle_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Up,
    Down,
    Home,
    End,
    /// Move up by a page of `n` rows.
    PageUp(usize),
    /// Move down by a page of `n` rows.
    PageDown(usize),
    /// Toggle the focused row.
    Space,
    /// Clear the selection, keeping focus.
    Escape,
    /// Ctrl+A.
    SelectAll,
}

/// Selected ids plus the anchor and focus used for ranges and keyboard
/// navigation.
///
/// # Example
///
/// ```
/// use datagrid_lib::model::RowId;
/// use datagrid_lib::selection::{SelectionMode, SelectionState};
///
/// let order: Vec<RowId> = (0..5).map(RowId::from).collect();
/// let mut selection = SelectionState::new(SelectionMode::Multiple);
///
/// selection.select(RowId::from(1));
/// selection.range(RowId::from(3), &order, false);
/// assert_eq!(selection.selected(), vec![RowId::from(1), RowId::from(2), RowId::from(3)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    mode: SelectionMode,
    selected: HashSet<RowId>,
    anchor: Option<RowId>,
    focus: Option<RowId>,
}

impl SelectionState {
    /// Creates an empty selection.
    pub fn new(mode: SelectionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Changes the mode, trimming the selection to what the new mode allows.
    pub fn set_mode(&mut self, mode: SelectionMode) -> SelectionChange {
        self.mode = mode;
        match mode {
            SelectionMode::None => self.clear_members(),
            SelectionMode::Single if self.selected.len() > 1 => {
                let keep = self
                    .focus
                    .clone()
                    .filter(|id| self.selected.contains(id))
                    .or_else(|| self.selected.iter().min().cloned());
                let mut removed: Vec<RowId> = self
                    .selected
                    .iter()
                    .filter(|id| Some(*id) != keep.as_ref())
                    .cloned()
                    .collect();
                removed.sort();
                for id in &removed {
                    self.selected.remove(id);
                }
                SelectionChange {
                    added: vec![],
                    removed,
                }
            }
            _ => SelectionChange::default(),
        }
    }

    /// All selected ids, sorted.
    pub fn selected(&self) -> Vec<RowId> {
        let mut ids: Vec<_> = self.selected.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// The selected set.
    pub fn selected_set(&self) -> &HashSet<RowId> {
        &self.selected
    }

    pub fn is_selected(&self, id: &RowId) -> bool {
        self.selected.contains(id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Starting point of shift ranges.
    pub fn anchor(&self) -> Option<&RowId> {
        self.anchor.as_ref()
    }

    /// Keyboard cursor.
    pub fn focus(&self) -> Option<&RowId> {
        self.focus.as_ref()
    }

    /// Moves focus without touching membership.
    pub fn set_focus(&mut self, id: Option<RowId>) {
        self.focus = id;
    }

    // -------------------------------------------------------------------------
    // Pointer operations
    // -------------------------------------------------------------------------

    /// Replaces the selection with `{id}`.
    pub fn select(&mut self, id: RowId) -> SelectionChange {
        if self.mode == SelectionMode::None {
            return SelectionChange::default();
        }
        let mut removed: Vec<RowId> = self.selected.iter().filter(|&i| *i != id).cloned().collect();
        removed.sort();
        let was_selected = self.selected.contains(&id);
        self.selected.clear();
        self.selected.insert(id.clone());
        self.anchor = Some(id.clone());
        self.focus = Some(id.clone());
        let added = if was_selected { vec![] } else { vec![id] };
        SelectionChange { added, removed }
    }

    /// Flips membership of `id`.
    pub fn toggle(&mut self, id: RowId) -> SelectionChange {
        match self.mode {
            SelectionMode::None => SelectionChange::default(),
            SelectionMode::Single => {
                if self.selected.contains(&id) {
                    self.focus = Some(id);
                    self.clear_members()
                } else {
                    self.select(id)
                }
            }
            SelectionMode::Multiple => {
                self.focus = Some(id.clone());
                if self.selected.remove(&id) {
                    SelectionChange {
                        added: vec![],
                        removed: vec![id],
                    }
                } else {
                    self.selected.insert(id.clone());
                    self.anchor = Some(id.clone());
                    SelectionChange {
                        added: vec![id],
                        removed: vec![],
                    }
                }
            }
        }
    }

    /// Ctrl/Cmd+click: toggles `id` without clearing other members.
    pub fn extend(&mut self, id: RowId) -> SelectionChange {
        match self.mode {
            SelectionMode::Single => self.select(id),
            _ => self.toggle(id),
        }
    }

    /// Shift+click: selects the interval between the anchor and `id`.
    ///
    /// The interval replaces the selection unless `additive` (Ctrl+Shift),
    /// which unions it into the current members. The anchor stays put.
    /// Without a usable anchor this behaves as [`SelectionState::select`].
    pub fn range(&mut self, id: RowId, order: &[RowId], additive: bool) -> SelectionChange {
        match self.mode {
            SelectionMode::None => return SelectionChange::default(),
            SelectionMode::Single => return self.select(id),
            SelectionMode::Multiple => {}
        }

        let anchor_pos = self
            .anchor
            .as_ref()
            .and_then(|anchor| order.iter().position(|i| i == anchor));
        let target_pos = order.iter().position(|i| *i == id);
        let (start, end) = match (anchor_pos, target_pos) {
            (Some(a), Some(t)) => (a.min(t), a.max(t)),
            _ => return self.select(id),
        };

        let span = &order[start..=end];
        let mut removed = Vec::new();
        if !additive {
            let keep: HashSet<&RowId> = span.iter().collect();
            removed = self
                .selected
                .iter()
                .filter(|i| !keep.contains(i))
                .cloned()
                .collect();
            removed.sort();
            for i in &removed {
                self.selected.remove(i);
            }
        }

        let added = span
            .iter()
            .filter(|i| self.selected.insert((*i).clone()))
            .cloned()
            .collect();
        self.focus = Some(id);
        SelectionChange { added, removed }
    }

    /// Selects every row in `order` (multi mode only).
    pub fn select_all(&mut self, order: &[RowId]) -> SelectionChange {
        if self.mode != SelectionMode::Multiple {
            return SelectionChange::default();
        }
        let added = order
            .iter()
            .filter(|id| self.selected.insert((*id).clone()))
            .cloned()
            .collect();
        self.anchor = order.first().cloned();
        self.focus = order.first().cloned();
        SelectionChange {
            added,
            removed: vec![],
        }
    }

    /// Empties the selection and forgets anchor and focus.
    pub fn clear(&mut self) -> SelectionChange {
        self.anchor = None;
        self.focus = None;
        self.clear_members()
    }

    fn clear_members(&mut self) -> SelectionChange {
        let mut removed: Vec<RowId> = self.selected.drain().collect();
        removed.sort();
        SelectionChange {
            added: vec![],
            removed,
        }
    }

    // -------------------------------------------------------------------------
    // Keyboard
    // -------------------------------------------------------------------------

    /// Applies a keyboard command. `shift` turns movement into a range from
    /// the anchor.
    pub fn handle_key(&mut self, command: KeyCommand, shift: bool, order: &[RowId]) -> SelectionChange {
        if order.is_empty() {
            return match command {
                KeyCommand::Escape => self.clear_members(),
                _ => SelectionChange::default(),
            };
        }

        let current = self
            .focus
            .as_ref()
            .and_then(|focus| order.iter().position(|i| i == focus));
        let last = order.len() - 1;
        let target = match command {
            KeyCommand::Up => current.map_or(0, |i| i.saturating_sub(1)),
            KeyCommand::Down => current.map_or(0, |i| (i + 1).min(last)),
            KeyCommand::Home => 0,
            KeyCommand::End => last,
            KeyCommand::PageUp(n) => current.map_or(0, |i| i.saturating_sub(n.max(1))),
            KeyCommand::PageDown(n) => current.map_or(0, |i| (i + n.max(1)).min(last)),
            KeyCommand::Space => {
                let Some(i) = current else {
                    self.focus = Some(order[0].clone());
                    return SelectionChange::default();
                };
                return self.toggle(order[i].clone());
            }
            KeyCommand::Escape => return self.clear_members(),
            KeyCommand::SelectAll => return self.select_all(order),
        };
        let id = order[target].clone();

        match self.mode {
            SelectionMode::None => {
                self.focus = Some(id);
                SelectionChange::default()
            }
            SelectionMode::Single => self.select(id),
            SelectionMode::Multiple if shift => {
                if self.anchor.is_none() {
                    self.anchor = current.map(|i| order[i].clone()).or_else(|| Some(id.clone()));
                }
                self.range(id, order, false)
            }
            SelectionMode::Multiple => {
                self.focus = Some(id);
                SelectionChange::default()
            }
        }
    }
}
