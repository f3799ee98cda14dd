use chrono::Local;

use crate::compiler::EditorContext;
use crate::lang;

/// Variables read straight from the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinVariable {
    Selection,
    BeforeCursor,
    AfterCursor,
    FileName,
    FilePath,
    Language,
    CommentSymbol,
    All,
    Input,
    Date,
}

impl BuiltinVariable {
    pub const ALL: [BuiltinVariable; 10] = [
        BuiltinVariable::Selection,
        BuiltinVariable::BeforeCursor,
        BuiltinVariable::AfterCursor,
        BuiltinVariable::FileName,
        BuiltinVariable::FilePath,
        BuiltinVariable::Language,
        BuiltinVariable::CommentSymbol,
        BuiltinVariable::All,
        BuiltinVariable::Input,
        BuiltinVariable::Date,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinVariable::Selection => "selection",
            BuiltinVariable::BeforeCursor => "beforeCursor",
            BuiltinVariable::AfterCursor => "afterCursor",
            BuiltinVariable::FileName => "fileName",
            BuiltinVariable::FilePath => "filePath",
            BuiltinVariable::Language => "language",
            BuiltinVariable::CommentSymbol => "commentSymbol",
            BuiltinVariable::All => "all",
            BuiltinVariable::Input => "input",
            BuiltinVariable::Date => "date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == name)
    }

    /// Value of the variable in `editor`. `fallback_language` applies when the
    /// editor can't tell the language of its file.
    pub fn resolve(self, editor: &EditorContext, fallback_language: Option<&str>) -> String {
        let language = || editor.language().or(fallback_language);
        match self {
            BuiltinVariable::Selection => editor.selected_text().unwrap_or_default().to_string(),
            BuiltinVariable::BeforeCursor => editor.before_cursor().unwrap_or_default().to_string(),
            BuiltinVariable::AfterCursor => editor.after_cursor().unwrap_or_default().to_string(),
            BuiltinVariable::FileName => editor
                .file
                .as_ref()
                .map(|f| f.name().to_string())
                .unwrap_or_default(),
            BuiltinVariable::FilePath => editor
                .file
                .as_ref()
                .map(|f| f.path.clone())
                .unwrap_or_default(),
            BuiltinVariable::Language => language().unwrap_or_default().to_string(),
            BuiltinVariable::CommentSymbol => language().map(lang::comment_symbol).unwrap_or("//").to_string(),
            BuiltinVariable::All => editor.text.clone().unwrap_or_default(),
            BuiltinVariable::Input => editor.input.clone().unwrap_or_default(),
            BuiltinVariable::Date => Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}
