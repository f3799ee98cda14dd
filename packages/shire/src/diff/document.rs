use derive_more::{Display, Error};

/// Text edited line by line, with a journal of every edit so the whole
/// sequence can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
    journal: Vec<Edit>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Edit {
    Insert { index: usize },
    Delete { index: usize, text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("line {index} is out of range for a document of {len} lines")]
pub struct DocumentError {
    pub index: usize,
    pub len: usize,
}

impl Document {
    /// Split `text` on `\n`. Joining the lines back gives the same bytes.
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.split('\n').map(String::from).collect(),
            journal: Vec::new(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Number of edits that [`Document::undo_all`] would revert.
    pub fn edit_count(&self) -> usize {
        self.journal.len()
    }

    /// Insert a line so that it becomes line `index`.
    pub fn insert_line(&mut self, index: usize, text: impl Into<String>) -> Result<(), DocumentError> {
        if index > self.lines.len() {
            return Err(self.out_of_range(index));
        }
        self.lines.insert(index, text.into());
        self.journal.push(Edit::Insert { index });
        Ok(())
    }

    /// Remove line `index`, returning its text.
    pub fn delete_line(&mut self, index: usize) -> Result<String, DocumentError> {
        if index >= self.lines.len() {
            return Err(self.out_of_range(index));
        }
        let text = self.lines.remove(index);
        self.journal.push(Edit::Delete {
            index,
            text: text.clone(),
        });
        Ok(text)
    }

    /// Revert every edit, newest first. Returns how many were reverted.
    pub fn undo_all(&mut self) -> usize {
        let count = self.journal.len();
        while let Some(edit) = self.journal.pop() {
            match edit {
                Edit::Insert { index } => {
                    self.lines.remove(index);
                }
                Edit::Delete { index, text } => self.lines.insert(index, text),
            }
        }
        count
    }

    fn out_of_range(&self, index: usize) -> DocumentError {
        DocumentError {
            index,
            len: self.lines.len(),
        }
    }
}
