//! Cell edit sessions.
//!
//! At most one session is open per grid. A session moves
//! `editing -> saving -> closed`, or back to `editing` when persistence
//! fails. Every session carries a sequence number; the result of a commit
//! whose session has since been replaced or cancelled is ignored.

use crate::column::Column;
use crate::error::EditError;
use crate::model::RowId;
use crate::model::Value;

/// A cell address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub row_id: RowId,
    pub column_key: String,
}

impl CellRef {
    pub fn new(row_id: impl Into<RowId>, column_key: impl Into<String>) -> Self {
        Self {
            row_id: row_id.into(),
            column_key: column_key.into(),
        }
    }
}

/// What ended the edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitTrigger {
    /// Focus left the editor.
    #[default]
    Blur,
    Enter,
    /// Tab or Shift+Tab; moves to the adjacent editable cell on success.
    Tab { backwards: bool },
}

/// Result of a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    /// Persisted and closed. For `Tab`, `next` is the cell to edit next.
    Committed { next: Option<CellRef> },
    /// The validator rejected the draft; the session stays open and the
    /// source was not called.
    Invalid(String),
    /// The source rejected the change; the session stays open.
    Failed(String),
    /// The session was replaced or cancelled while saving.
    Discarded,
}

/// The open edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub row_id: RowId,
    pub column_key: String,
    pub draft_value: Value,
    pub original_value: Value,
    /// Validation or persistence error.
    pub error: Option<String>,
    pub saving: bool,
    seq: u64,
}

impl EditSession {
    /// The edited cell.
    pub fn cell(&self) -> CellRef {
        CellRef::new(self.row_id.clone(), self.column_key.clone())
    }

    /// Sequence number of this session.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// A validated draft ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommit {
    pub seq: u64,
    pub row_id: RowId,
    pub column_key: String,
    pub value: Value,
    pub original_value: Value,
}

/// Outcome of [`EditManager::begin_commit`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommitStart {
    Ready(PendingCommit),
    Invalid(String),
}

/// Outcome of [`EditManager::finish_commit`].
#[derive(Debug, Clone, PartialEq)]
pub enum CommitFinish {
    Committed(PendingCommit),
    Failed(String),
    Discarded,
}

/// Edit session state machine.
#[derive(Debug, Clone, Default)]
pub struct EditManager {
    session: Option<EditSession>,
    last_seq: u64,
}

impl EditManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&EditSession> {
        self.session.as_ref()
    }

    pub fn is_editing(&self) -> bool {
        self.session.is_some()
    }

    /// Opens a session, discarding any other. The draft starts as the
    /// original value.
    ///
    /// A session that is saving cannot be discarded: its value may already
    /// be persisted.
    pub fn open(
        &mut self,
        row_id: RowId,
        column_key: impl Into<String>,
        original: Value,
    ) -> Result<&EditSession, EditError> {
        if let Some(previous) = &self.session {
            if previous.saving {
                return Err(EditError::Saving);
            }
            log::debug!(
                "[edit] discarding session on {}/{}",
                previous.row_id,
                previous.column_key
            );
        }
        self.last_seq += 1;
        Ok(self.session.insert(EditSession {
            row_id,
            column_key: column_key.into(),
            draft_value: original.clone(),
            original_value: original,
            error: None,
            saving: false,
            seq: self.last_seq,
        }))
    }

    /// Replaces the draft and re-runs validation. Returns the validation
    /// error, if any.
    pub fn set_draft(&mut self, value: Value, column: &Column) -> Result<Option<String>, EditError> {
        let session = self.session.as_mut().ok_or(EditError::NoSession)?;
        if session.saving {
            return Err(EditError::Saving);
        }
        session.error = column.validate(&value).err();
        session.draft_value = value;
        Ok(session.error.clone())
    }

    /// Closes the session without persisting.
    pub fn cancel(&mut self) -> Result<EditSession, EditError> {
        match &self.session {
            None => Err(EditError::NoSession),
            Some(session) if session.saving => Err(EditError::Saving),
            Some(_) => self.session.take().ok_or(EditError::NoSession),
        }
    }

    /// Validates the draft and marks the session as saving.
    pub fn begin_commit(&mut self, column: &Column) -> Result<CommitStart, EditError> {
        let session = self.session.as_mut().ok_or(EditError::NoSession)?;
        if session.saving {
            return Err(EditError::Saving);
        }
        if let Err(message) = column.validate(&session.draft_value) {
            session.error = Some(message.clone());
            return Ok(CommitStart::Invalid(message));
        }
        session.error = None;
        session.saving = true;
        Ok(CommitStart::Ready(PendingCommit {
            seq: session.seq,
            row_id: session.row_id.clone(),
            column_key: session.column_key.clone(),
            value: session.draft_value.clone(),
            original_value: session.original_value.clone(),
        }))
    }

    /// Applies the persistence result of `pending`.
    pub fn finish_commit(&mut self, pending: PendingCommit, result: Result<(), String>) -> CommitFinish {
        let current = self.session.as_ref().map(|session| session.seq);
        if current != Some(pending.seq) {
            log::debug!("[edit] ignoring result for discarded session {}", pending.seq);
            return CommitFinish::Discarded;
        }
        match result {
            Ok(()) => {
                self.session = None;
                CommitFinish::Committed(pending)
            }
            Err(message) => {
                if let Some(session) = self.session.as_mut() {
                    session.error = Some(message.clone());
                    session.saving = false;
                }
                CommitFinish::Failed(message)
            }
        }
    }

    /// Closes the session unconditionally.
    pub fn close(&mut self) -> Option<EditSession> {
        self.session.take()
    }
}

/// The editable cell after (or before, when `backwards`) `current`, walking
/// `columns` left to right and wrapping onto the next or previous row.
pub fn adjacent_cell(
    current: &CellRef,
    columns: &[&Column],
    rows: &[RowId],
    backwards: bool,
) -> Option<CellRef> {
    let editable: Vec<&str> = columns
        .iter()
        .filter(|column| column.editable && column.visible)
        .map(|column| column.key.as_str())
        .collect();
    if editable.is_empty() || rows.is_empty() {
        return None;
    }
    let row = rows.iter().position(|id| *id == current.row_id)?;
    let col = editable
        .iter()
        .position(|key| *key == current.column_key)
        .unwrap_or(0);

    let (row, col) = if backwards {
        match (col, row) {
            (0, 0) => return None,
            (0, row) => (row - 1, editable.len() - 1),
            (col, row) => (row, col - 1),
        }
    } else if col + 1 < editable.len() {
        (row, col + 1)
    } else if row + 1 < rows.len() {
        (row + 1, 0)
    } else {
        return None;
    };
    Some(CellRef::new(rows[row].clone(), editable[col]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_column() -> Column {
        Column::new("name").with_editable(true).with_validator(|value| {
            if value.to_display_string().chars().count() > 5 {
                Err("too long".to_string())
            } else {
                Ok(())
            }
        })
    }

    #[test]
    fn test_open_starts_with_original() {
        let mut edits = EditManager::new();
        let session = edits.open(RowId::from(1), "name", "Ann".into()).unwrap();
        assert_eq!(session.draft_value, Value::from("Ann"));
        assert_eq!(session.original_value, Value::from("Ann"));
        assert!(!session.saving);
    }

    #[test]
    fn test_set_draft_validates() {
        let column = name_column();
        let mut edits = EditManager::new();
        assert_eq!(
            edits.set_draft("x".into(), &column),
            Err(EditError::NoSession)
        );

        edits.open(RowId::from(1), "name", "Ann".into()).unwrap();
        let error = edits.set_draft("Annabelle".into(), &column).unwrap();
        assert_eq!(error.as_deref(), Some("too long"));
        assert_eq!(edits.set_draft("Bo".into(), &column).unwrap(), None);
    }

    #[test]
    fn test_invalid_draft_blocks_commit() {
        let column = name_column();
        let mut edits = EditManager::new();
        edits.open(RowId::from(1), "name", "Ann".into()).unwrap();
        edits.set_draft("Annabelle".into(), &column).unwrap();
        assert_eq!(
            edits.begin_commit(&column).unwrap(),
            CommitStart::Invalid("too long".into())
        );
        let session = edits.session().unwrap();
        assert!(!session.saving);
        assert_eq!(session.error.as_deref(), Some("too long"));
    }

    #[test]
    fn test_commit_success_closes() {
        let column = name_column();
        let mut edits = EditManager::new();
        edits.open(RowId::from(1), "name", "Ann".into()).unwrap();
        edits.set_draft("Bo".into(), &column).unwrap();

        let CommitStart::Ready(pending) = edits.begin_commit(&column).unwrap() else {
            panic!("expected a ready commit");
        };
        assert!(edits.session().unwrap().saving);
        assert_eq!(edits.cancel(), Err(EditError::Saving));

        let finish = edits.finish_commit(pending.clone(), Ok(()));
        assert_eq!(finish, CommitFinish::Committed(pending));
        assert!(!edits.is_editing());
    }

    #[test]
    fn test_commit_failure_keeps_session() {
        let column = name_column();
        let mut edits = EditManager::new();
        edits.open(RowId::from(1), "name", "Ann".into()).unwrap();
        let CommitStart::Ready(pending) = edits.begin_commit(&column).unwrap() else {
            panic!("expected a ready commit");
        };
        let finish = edits.finish_commit(pending, Err("too long".into()));
        assert_eq!(finish, CommitFinish::Failed("too long".into()));

        let session = edits.session().unwrap();
        assert!(!session.saving);
        assert_eq!(session.error.as_deref(), Some("too long"));
    }

    #[test]
    fn test_result_for_discarded_session_ignored() {
        let column = name_column();
        let mut edits = EditManager::new();
        edits.open(RowId::from(1), "name", "Ann".into()).unwrap();
        let CommitStart::Ready(pending) = edits.begin_commit(&column).unwrap() else {
            panic!("expected a ready commit");
        };

        assert_eq!(
            edits.open(RowId::from(2), "name", "Cy".into()),
            Err(EditError::Saving)
        );
        assert_eq!(edits.session().unwrap().row_id, RowId::from(1));

        edits.close();
        edits.open(RowId::from(2), "name", "Cy".into()).unwrap();
        assert_eq!(edits.finish_commit(pending, Ok(())), CommitFinish::Discarded);
        assert_eq!(edits.session().unwrap().row_id, RowId::from(2));
    }

    #[test]
    fn test_adjacent_cell_wraps() {
        let a = Column::new("a").with_editable(true);
        let b = Column::new("b");
        let c = Column::new("c").with_editable(true);
        let columns = [&a, &b, &c];
        let rows = [RowId::from(10), RowId::from(11)];

        let next = adjacent_cell(&CellRef::new(10, "a"), &columns, &rows, false);
        assert_eq!(next, Some(CellRef::new(10, "c")));
        let next = adjacent_cell(&CellRef::new(10, "c"), &columns, &rows, false);
        assert_eq!(next, Some(CellRef::new(11, "a")));
        assert_eq!(
            adjacent_cell(&CellRef::new(11, "c"), &columns, &rows, false),
            None
        );

        let previous = adjacent_cell(&CellRef::new(11, "a"), &columns, &rows, true);
        assert_eq!(previous, Some(CellRef::new(10, "c")));
        assert_eq!(
            adjacent_cell(&CellRef::new(10, "a"), &columns, &rows, true),
            None
        );
    }
}
