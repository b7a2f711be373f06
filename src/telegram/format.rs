/// Text formatting mode understood by `sendMessage` and `editMessageText`.
///
/// Markdown: `*bold*`, `_italic_`, `[name](url)`, `[user](tg://user?id=N)`,
/// `` `code` `` and ```` ```block``` ````.
///
/// HTML: `<b>`, `<i>`, `<a href="url">`, `<a href="tg://user?id=N">`,
/// `<code>` and `<pre>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
    Markdown,
    #[default]
    Html,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Markdown => "Markdown",
            ParseMode::Html => "HTML",
        }
    }

    /// Parses a `PARSE_MODE` value, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "markdown" => Some(ParseMode::Markdown),
            "html" => Some(ParseMode::Html),
            _ => None,
        }
    }

    /// Makes user text safe to embed in markup of this mode.
    pub fn escape(self, text: &str) -> String {
        match self {
            ParseMode::Markdown => escape_markdown(text),
            ParseMode::Html => escape_html(text),
        }
    }

    pub fn bold(self, text: &str) -> String {
        match self {
            ParseMode::Markdown => format!("*{text}*"),
            ParseMode::Html => format!("<b>{text}</b>"),
        }
    }

    pub fn italic(self, text: &str) -> String {
        match self {
            ParseMode::Markdown => format!("_{text}_"),
            ParseMode::Html => format!("<i>{text}</i>"),
        }
    }

    pub fn link(self, label: &str, url: &str) -> String {
        match self {
            ParseMode::Markdown => format!("[{label}]({url})"),
            ParseMode::Html => format!("<a href=\"{url}\">{label}</a>"),
        }
    }

    pub fn mention(self, label: &str, user_id: i64) -> String {
        self.link(label, &format!("tg://user?id={user_id}"))
    }

    pub fn code(self, text: &str) -> String {
        match self {
            ParseMode::Markdown => format!("`{text}`"),
            ParseMode::Html => format!("<code>{text}</code>"),
        }
    }

    pub fn pre(self, text: &str) -> String {
        match self {
            ParseMode::Markdown => format!("```\n{text}\n```"),
            ParseMode::Html => format!("<pre>{text}</pre>"),
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '_' | '*' | '`' | '[' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
