use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        InlineButton {
            text: text.into(),
            callback_data: callback_data.into(),
        }
    }
}

/// Inline keyboard attached to a message.
///
/// Rows are keyed from 1 and may be added in any order; they render in
/// ascending key order. Adding to a key that already exists extends that row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    rows: BTreeMap<u32, Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I>(&mut self, row: u32, buttons: I) -> &mut Self
    where
        I: IntoIterator<Item = InlineButton>,
    {
        self.rows.entry(row).or_default().extend(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.values().all(Vec::is_empty)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[InlineButton]> {
        self.rows
            .values()
            .filter(|row| !row.is_empty())
            .map(Vec::as_slice)
    }

    /// `reply_markup` payload, or `None` when there is nothing to show.
    pub fn to_json(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let rows: Vec<&[InlineButton]> = self.rows().collect();
        Some(json!({ "inline_keyboard": rows }).to_string())
    }
}
