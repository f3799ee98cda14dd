/// The first fenced code block in a piece of Markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFence {
    /// Info string after the opening fence; `None` when there is no fence.
    pub language: Option<String>,

    /// Lines inside the fence, or every line when there is no fence. An
    /// unterminated fence keeps its possibly partial last line.
    pub lines: Vec<String>,

    /// Whether the closing fence was seen.
    pub is_complete: bool,
}

const FENCE: &str = "```";

impl CodeFence {
    /// Decode the first fenced block of `content`.
    pub fn parse(content: &str) -> Self {
        let mut lines = content.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

        let language = lines
            .by_ref()
            .find_map(|line| line.trim_start().strip_prefix(FENCE))
            .map(|info| info.trim().to_string());
        let Some(language) = language else {
            return Self {
                language: None,
                lines: content.split('\n').map(String::from).collect(),
                is_complete: true,
            };
        };

        let mut body = Vec::new();
        let mut is_complete = false;
        for line in lines {
            if line.trim_start().starts_with(FENCE) {
                is_complete = true;
                break;
            }
            body.push(line.to_string());
        }

        Self {
            language: Some(language),
            lines: body,
            is_complete,
        }
    }

    /// Whether the block holds code rather than prose.
    pub fn is_code(&self) -> bool {
        self.language
            .as_deref()
            .is_some_and(|lang| !matches!(lang.to_ascii_lowercase().as_str(), "markdown" | "md"))
    }

    /// Lines that can no longer change as more content arrives.
    pub fn finished_lines(&self) -> &[String] {
        if self.is_complete {
            &self.lines
        } else {
            self.lines.split_last().map_or(&[][..], |(_, rest)| rest)
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}
