//! Optional YAML frontmatter at the head of a markdown document.
//!
//! The text is split on lines consisting solely of `---`. With fewer than two
//! such lines there is no frontmatter. Otherwise the segment between the first
//! two delimiters is the metadata and everything after the second delimiter
//! (later delimiters included) is the body. Text before the first delimiter is
//! discarded. A `---` inside a fenced code block is still a delimiter.

use std::ops::Range;

use tracing::warn;

use crate::types::Metadata;

const DELIMITER: &str = "---";

/// Split `text` into `(trimmed body, metadata)`.
///
/// Never fails: malformed metadata is logged and replaced by an empty map,
/// and the body is still taken from after the second delimiter.
pub fn parse(text: &str) -> (String, Metadata) {
    let Some((meta_span, body_start)) = locate(text) else {
        return (text.trim().to_string(), Metadata::new());
    };
    let body = text[body_start..].trim().to_string();
    match parse_metadata(&text[meta_span]) {
        Ok(metadata) => (body, metadata),
        Err(e) => {
            warn!(error = %e, "malformed frontmatter, continuing without metadata");
            (body, Metadata::new())
        }
    }
}

fn parse_metadata(raw: &str) -> Result<Metadata, serde_yaml::Error> {
    if raw.trim().is_empty() {
        return Ok(Metadata::new());
    }
    serde_yaml::from_str(raw)
}

/// Metadata span and body offset, if the text has at least two delimiters.
fn locate(text: &str) -> Option<(Range<usize>, usize)> {
    let mut delimiters = delimiter_lines(text);
    let (_, first_end) = delimiters.next()?;
    let (second_start, second_end) = delimiters.next()?;
    Some((first_end..second_start, second_end))
}

/// Byte spans of every delimiter line, line break excluded.
fn delimiter_lines(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut offset = 0;
    text.split_inclusive('\n').filter_map(move |line| {
        let start = offset;
        offset += line.len();
        let content = line.trim_end_matches('\n').trim_end_matches('\r');
        (content == DELIMITER).then_some((start, start + content.len()))
    })
}
