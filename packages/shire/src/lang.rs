//! Source language identification by file extension.

/// Language id for a file path, from its extension.
pub fn language_of(path: &str) -> Option<&'static str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
    let language = match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "py" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "scala" => "scala",
        "hs" => "haskell",
        "sh" | "bash" => "bash",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" | "markdown" => "markdown",
        "shire" => "shire",
        _ => return None,
    };
    Some(language)
}

/// The line comment prefix for a language.
pub fn comment_symbol(language: &str) -> &'static str {
    match language {
        "python" | "ruby" | "bash" | "yaml" | "toml" | "shire" => "#",
        "sql" | "haskell" => "--",
        "html" | "xml" | "markdown" => "<!--",
        _ => "//",
    }
}
