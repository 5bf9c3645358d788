use std::fmt::Write as _;

use crate::database::grammar::{FIELD_SEPARATOR, REGION_TAG};
use crate::model::{CheatAction, CheatEntry};
use crate::search::SearchRegion;

/// Makes free text safe for a single field.
#[must_use]
pub fn sanitize_field(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            FIELD_SEPARATOR => ';',
            '\r' | '\n' => ' ',
            c => c,
        })
        .collect()
}

/// Emits one action in the current grammar, without a line terminator.
///
/// Legacy actions are written through their converted view.
#[must_use]
pub fn encode_action(action: &CheatAction, driver: &str, name: &str, comment: Option<&str>) -> String {
    let view = action.view();
    let mut line = format!(
        ":{driver}:{:08X}:{:04X}:{:08X}:{:08X}:{:08X}:{}",
        view.word.raw(),
        view.location.code(),
        view.address,
        view.data,
        view.extend_data,
        sanitize_field(name),
    );
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        let _ = write!(line, ":{}", sanitize_field(comment));
    }
    line
}

/// Emits an entry, one line per action; the first line carries the entry
/// name and comment.
#[must_use]
pub fn encode_entry(entry: &CheatEntry, driver: &str) -> String {
    let mut text = String::new();
    for (index, action) in entry.actions().iter().enumerate() {
        let line = if index == 0 {
            encode_action(action, driver, &entry.name, Some(&entry.comment))
        } else {
            encode_action(action, driver, &action.name, None)
        };
        text.push_str(&line);
        text.push('\n');
    }
    text
}

/// Emits a search region record, with a line terminator.
#[must_use]
pub fn encode_region(region: &SearchRegion, driver: &str) -> String {
    format!(
        ":{driver}:{REGION_TAG}:{:04X}:{:08X}:{:08X}:{}\n",
        region.location.code(),
        region.address,
        region.length,
        sanitize_field(&region.name),
    )
}
