use super::document::{Document, DocumentError};

/// A contiguous run of changes that is accepted or rejected as one.
///
/// Added lines are live in the document from `start_line`; deleted lines are
/// gone from it and only kept here so a reject can put them back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock {
    pub id: usize,
    pub start_line: usize,
    pub added: Vec<String>,
    pub deleted: Vec<String>,

    /// Whether the stream moved past the block's last line.
    pub finished: bool,
}

impl DiffBlock {
    pub(super) fn new(id: usize, start_line: usize) -> Self {
        Self {
            id,
            start_line,
            added: Vec::new(),
            deleted: Vec::new(),
            finished: false,
        }
    }

    pub(super) fn add_new_line(&mut self, document: &mut Document, text: &str, index: usize) -> Result<(), DocumentError> {
        document.insert_line(index, text)?;
        self.added.push(text.to_string());
        Ok(())
    }

    pub(super) fn delete_line_at(&mut self, document: &mut Document, index: usize) -> Result<(), DocumentError> {
        let text = document.delete_line(index)?;
        self.deleted.push(text);
        Ok(())
    }

    pub(super) fn on_last_diff_line(&mut self) {
        self.finished = true;
    }

    /// Net change in line count if the block is rejected.
    pub fn reject_offset(&self) -> isize {
        self.deleted.len() as isize - self.added.len() as isize
    }

    /// Put the document back the way it was before this block.
    pub(super) fn revert(&self, document: &mut Document) -> Result<(), DocumentError> {
        for _ in &self.added {
            document.delete_line(self.start_line)?;
        }
        for (i, line) in self.deleted.iter().enumerate() {
            document.insert_line(self.start_line + i, line.clone())?;
        }
        Ok(())
    }
}
