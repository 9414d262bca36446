//! Documentation block extractor for annotated headers.
//!
//! Two marker dialects are recognized:
//!
//! - `<!doc:ENTITY> ... </!doc:ENTITY>` names its target entity explicitly.
//! - `BeginUserDocs: tag, tag ... EndUserDocs` documents the entity named
//!   after the header's file stem; the tag list becomes the `tags` field.
//!
//! The scanner is a two-state machine (outside / inside a block) driven
//! marker by marker, so one line may open, fill and close a block.

use crate::error::{MalformedBlockError, MalformedReason};
use crate::model::{DocBlock, SourceFile};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// -- Regex patterns -----------------------------------------------------------

static RE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"<!doc:(?P<open>[A-Za-z_][A-Za-z0-9_.:-]*)>",
        r"|</!doc:(?P<close>[A-Za-z_][A-Za-z0-9_.:-]*)>",
        r"|\b(?P<begin>BeginUserDocs)\b(?:[ \t]*:(?P<tags>.*))?",
        r"|\b(?P<end>EndUserDocs)\b",
    ))
    .unwrap()
});

static RE_USERDOCS_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bEndUserDocs\b").unwrap());

static RE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*):[ \t]+(\S.*?)[ \t]*$").unwrap());

/// Comment decorations removed by the leading-marker strip, longest first.
const COMMENT_MARKERS: &[&str] = &["///", "//!", "//", "*", "#"];

// -- Marker scanning ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Tag,
    UserDocs,
}

#[derive(Debug)]
enum MarkerKind<'a> {
    TagOpen(&'a str),
    TagClose(&'a str),
    UserDocsOpen(Option<&'a str>),
    UserDocsClose,
}

#[derive(Debug)]
struct Marker<'a> {
    kind: MarkerKind<'a>,
    start: usize,
    end: usize,
}

fn next_marker(text: &str) -> Option<Marker<'_>> {
    let caps = RE_MARKER.captures(text)?;
    let whole = caps.get(0)?;
    let mut end = whole.end();
    let kind = if let Some(m) = caps.name("open") {
        MarkerKind::TagOpen(m.as_str())
    } else if let Some(m) = caps.name("close") {
        MarkerKind::TagClose(m.as_str())
    } else if caps.name("begin").is_some() {
        // The tag list stops at a close marker on the same line
        let tags = caps.name("tags").map(|m| match RE_USERDOCS_END.find(m.as_str()) {
            Some(close) => {
                end = m.start() + close.start();
                &m.as_str()[..close.start()]
            }
            None => m.as_str(),
        });
        MarkerKind::UserDocsOpen(tags)
    } else {
        MarkerKind::UserDocsClose
    };
    Some(Marker {
        kind,
        start: whole.start(),
        end,
    })
}

// -- Extractor state ----------------------------------------------------------

/// A piece of block content. `inline` marks text that followed the open
/// marker on the same line.
struct Segment {
    text: String,
    inline: bool,
}

struct OpenBlock {
    entity: String,
    dialect: Dialect,
    start_line: usize,
    preset_fields: Vec<(String, String)>,
    segments: Vec<Segment>,
}

struct ExtractState<'a> {
    source: &'a SourceFile,
    blocks: Vec<DocBlock>,
    open: Option<OpenBlock>,
}

// -- Public API ---------------------------------------------------------------

/// Extract every documentation block of a header, in file order.
///
/// The first malformed block aborts the file; blocks already completed in
/// it are discarded with the error.
pub fn extract(source: &SourceFile) -> Result<Vec<DocBlock>, MalformedBlockError> {
    let mut state = ExtractState {
        source,
        blocks: Vec::new(),
        open: None,
    };

    let mut last_line = 0;
    for (idx, line) in source.text.lines().enumerate() {
        last_line = idx + 1;
        state.process_line(last_line, line)?;
    }

    if let Some(block) = &state.open {
        return Err(state.source_error(block, MalformedReason::Unterminated));
    }
    debug!(
        "{}: {} block(s) over {} line(s)",
        source.path.display(),
        state.blocks.len(),
        last_line
    );
    Ok(state.blocks)
}

impl ExtractState<'_> {
    fn process_line(&mut self, line_no: usize, line: &str) -> Result<(), MalformedBlockError> {
        let mut rest = line;
        let mut inline = false;

        loop {
            let Some(block) = self.open.as_mut() else {
                // Outside: look for the next open marker
                let Some(marker) = next_marker(rest) else {
                    return Ok(());
                };
                let after = &rest[marker.end..];
                match marker.kind {
                    MarkerKind::TagOpen(entity) => {
                        self.open = Some(OpenBlock {
                            entity: entity.to_string(),
                            dialect: Dialect::Tag,
                            start_line: line_no,
                            preset_fields: Vec::new(),
                            segments: Vec::new(),
                        });
                        inline = true;
                        rest = after;
                    }
                    MarkerKind::UserDocsOpen(tags) => {
                        let mut preset_fields = Vec::new();
                        if let Some(tags) = tags.map(str::trim).filter(|t| !t.is_empty()) {
                            preset_fields.push(("tags".to_string(), tags.to_string()));
                        }
                        self.open = Some(OpenBlock {
                            entity: self.file_entity(),
                            dialect: Dialect::UserDocs,
                            start_line: line_no,
                            preset_fields,
                            segments: Vec::new(),
                        });
                        inline = true;
                        rest = after;
                    }
                    MarkerKind::TagClose(_) | MarkerKind::UserDocsClose => {
                        debug!(
                            "{}:{}: ignoring close marker outside a block",
                            self.source.path.display(),
                            line_no
                        );
                        rest = after;
                    }
                }
                continue;
            };

            // Inside: everything up to the next marker is content
            let Some(marker) = next_marker(rest) else {
                push_segment(block, rest, inline, inline);
                return Ok(());
            };

            let closes = match (&marker.kind, block.dialect) {
                (MarkerKind::TagClose(name), Dialect::Tag) if *name == block.entity => true,
                (MarkerKind::UserDocsClose, Dialect::UserDocs) => true,
                (MarkerKind::TagOpen(_) | MarkerKind::UserDocsOpen(_), _) => {
                    return Err(self.open_error(MalformedReason::Nested));
                }
                _ => false,
            };
            if !closes {
                return Err(self.open_error(MalformedReason::MismatchedClose));
            }

            push_segment(block, &rest[..marker.start], inline, true);
            if let Some(block) = self.open.take() {
                let finished = finish_block(self.source, block, line_no);
                self.blocks.push(finished);
            }
            rest = &rest[marker.end..];
            inline = false;
        }
    }

    fn file_entity(&self) -> String {
        self.source
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source.path.to_string_lossy().to_string())
    }

    fn open_error(&self, reason: MalformedReason) -> MalformedBlockError {
        match &self.open {
            Some(block) => self.source_error(block, reason),
            None => MalformedBlockError {
                path: self.source.path.clone(),
                line: 0,
                entity: String::new(),
                reason,
            },
        }
    }

    fn source_error(&self, block: &OpenBlock, reason: MalformedReason) -> MalformedBlockError {
        MalformedBlockError {
            path: self.source.path.clone(),
            line: block.start_line,
            entity: block.entity.clone(),
            reason,
        }
    }
}

/// Record a piece of content. `partial` pieces share their line with a
/// marker and are dropped when they hold nothing but comment decoration.
fn push_segment(block: &mut OpenBlock, text: &str, inline: bool, partial: bool) {
    if partial && is_marker_only(text) {
        return;
    }
    let text = if inline { text.trim_start() } else { text };
    block.segments.push(Segment {
        text: text.to_string(),
        inline,
    });
}

/// True for text that is blank apart from comment decoration.
fn is_marker_only(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty()
        || trimmed
            .chars()
            .all(|c| matches!(c, '/' | '*' | '#' | '!'))
}

// -- Block finalization -------------------------------------------------------

fn finish_block(source: &SourceFile, block: OpenBlock, end_line: usize) -> DocBlock {
    let marker = common_marker(&block.segments);

    let mut fields = block.preset_fields;
    let mut body: Vec<String> = Vec::new();

    for segment in &block.segments {
        let text = match marker {
            Some(m) if !segment.inline => strip_marker(&segment.text, m),
            _ => segment.text.as_str(),
        };
        if let Some(caps) = RE_FIELD.captures(text) {
            fields.push((caps[1].to_string(), caps[2].to_string()));
        } else {
            body.push(text.to_string());
        }
    }

    // Drop leading and trailing blank lines, keep the rest verbatim
    let first = body.iter().position(|l| !l.trim().is_empty());
    let last = body.iter().rposition(|l| !l.trim().is_empty());
    let body = match (first, last) {
        (Some(first), Some(last)) => body[first..=last].join("\n"),
        _ => String::new(),
    };

    DocBlock {
        source: source.path.clone(),
        entity: block.entity,
        fields,
        body,
        lines: (block.start_line, end_line),
    }
}

/// The comment marker every non-blank, non-inline line starts with, if any.
fn common_marker(segments: &[Segment]) -> Option<&'static str> {
    let mut lines = segments
        .iter()
        .filter(|s| !s.inline && !s.text.trim().is_empty())
        .map(|s| s.text.trim_start())
        .peekable();
    lines.peek()?;
    let lines: Vec<&str> = lines.collect();
    COMMENT_MARKERS
        .iter()
        .copied()
        .find(|m| lines.iter().all(|l| l.starts_with(m)))
}

/// Remove indentation, the marker and at most one following space.
fn strip_marker<'a>(line: &'a str, marker: &str) -> &'a str {
    let trimmed = line.trim_start();
    match trimmed.strip_prefix(marker) {
        Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
        None => line.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceFormat;
    use std::path::PathBuf;

    fn header(name: &str, text: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(name),
            text: text.to_string(),
            format: SourceFormat::HeaderDoc,
        }
    }

    #[test]
    fn inline_block_with_field_and_body() {
        let src = header(
            "a.h",
            "<!doc:neuron_x> rate: 10Hz\nFires at fixed rate.</!doc:neuron_x>\n",
        );
        let blocks = extract(&src).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].entity, "neuron_x");
        assert_eq!(
            blocks[0].fields,
            vec![("rate".to_string(), "10Hz".to_string())]
        );
        assert_eq!(blocks[0].body, "Fires at fixed rate.");
        assert_eq!(blocks[0].lines, (1, 2));
    }

    #[test]
    fn block_inside_c_comment_keeps_verbatim_body() {
        let src = header(
            "iaf.h",
            "/* <!doc:iaf>\nShort description\n+++++++++++++++++\n\n * not a marker here\n  V_m   mV\n</!doc:iaf> */\n",
        );
        let blocks = extract(&src).unwrap();
        assert_eq!(
            blocks[0].body,
            "Short description\n+++++++++++++++++\n\n * not a marker here\n  V_m   mV"
        );
        assert!(blocks[0].fields.is_empty());
    }

    #[test]
    fn common_marker_is_stripped_once() {
        let src = header(
            "b.h",
            "/** <!doc:stdp>\n * tau: 20 ms\n * Pair-based rule.\n *\n *   indented\n * </!doc:stdp>\n */\n",
        );
        let blocks = extract(&src).unwrap();
        assert_eq!(
            blocks[0].fields,
            vec![("tau".to_string(), "20 ms".to_string())]
        );
        assert_eq!(blocks[0].body, "Pair-based rule.\n\n  indented");
    }

    #[test]
    fn line_comment_blocks() {
        let src = header(
            "c.h",
            "// <!doc:poisson>\n// rate: 5Hz\n// ## Heading\n// </!doc:poisson>\n",
        );
        let blocks = extract(&src).unwrap();
        assert_eq!(blocks[0].field("rate"), Some("5Hz"));
        assert_eq!(blocks[0].body, "## Heading");
    }

    #[test]
    fn indented_key_value_stays_in_body() {
        let src = header("d.h", "<!doc:x>\n  V_m: membrane\nV_th: threshold\n</!doc:x>\n");
        let blocks = extract(&src).unwrap();
        assert_eq!(blocks[0].body, "  V_m: membrane");
        assert_eq!(blocks[0].field("V_th"), Some("threshold"));
    }

    #[test]
    fn url_is_not_a_field() {
        let src = header("e.h", "<!doc:x>\nhttps://nest-simulator.org\n</!doc:x>\n");
        let blocks = extract(&src).unwrap();
        assert!(blocks[0].fields.is_empty());
        assert_eq!(blocks[0].body, "https://nest-simulator.org");
    }

    #[test]
    fn several_blocks_in_order() {
        let src = header(
            "f.h",
            "<!doc:a>one</!doc:a> code; <!doc:b>two</!doc:b>\n<!doc:a>\nthree\n</!doc:a>\n",
        );
        let blocks = extract(&src).unwrap();
        let got: Vec<(&str, &str)> = blocks
            .iter()
            .map(|b| (b.entity.as_str(), b.body.as_str()))
            .collect();
        assert_eq!(got, vec![("a", "one"), ("b", "two"), ("a", "three")]);
        assert_eq!(blocks[2].lines, (2, 4));
    }

    #[test]
    fn userdocs_dialect_uses_file_stem_and_tags() {
        let src = header(
            "models/iaf_simple.h",
            "namespace nest\n{\n/* BeginUserDocs: neuron, integrate-and-fire\n\nShort description\n+++++++++++++++++\n\niaf_simple neuron model\n\nEndUserDocs */\n",
        );
        let blocks = extract(&src).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].entity, "iaf_simple");
        assert_eq!(
            blocks[0].field("tags"),
            Some("neuron, integrate-and-fire")
        );
        assert_eq!(
            blocks[0].body,
            "Short description\n+++++++++++++++++\n\niaf_simple neuron model"
        );
        assert_eq!(blocks[0].lines, (3, 10));
    }

    #[test]
    fn userdocs_block_on_one_line() {
        let src = header("models/m.h", "/* BeginUserDocs: neuron EndUserDocs */
");
        let blocks = extract(&src).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].entity, "m");
        assert_eq!(blocks[0].field("tags"), Some("neuron"));
        assert_eq!(blocks[0].body, "");
        assert_eq!(blocks[0].lines, (1, 1));
    }

    #[test]
    fn unterminated_block_reports_start_line() {
        let src = header("g.h", "<!doc:ok>fine</!doc:ok>\n\n<!doc:broken>\nno end\n");
        let err = extract(&src).unwrap_err();
        assert_eq!(err.line, 3);
        assert_eq!(err.entity, "broken");
        assert_eq!(err.reason, MalformedReason::Unterminated);
        assert_eq!(err.path, PathBuf::from("g.h"));
    }

    #[test]
    fn nested_block_is_malformed() {
        let src = header("h.h", "<!doc:outer>\n<!doc:inner>\n</!doc:inner>\n</!doc:outer>\n");
        let err = extract(&src).unwrap_err();
        assert_eq!(err.reason, MalformedReason::Nested);
        assert_eq!(err.line, 1);
    }

    #[test]
    fn mismatched_close_is_malformed() {
        let src = header("i.h", "<!doc:a>\ntext\n</!doc:b>\n");
        let err = extract(&src).unwrap_err();
        assert_eq!(err.reason, MalformedReason::MismatchedClose);
    }

    #[test]
    fn stray_close_is_ignored() {
        let src = header("j.h", "</!doc:a>\nEndUserDocs\n<!doc:a>x</!doc:a>\n");
        let blocks = extract(&src).unwrap();
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn file_without_blocks() {
        let src = header("k.h", "#ifndef K_H\n#define K_H\n#endif\n");
        assert!(extract(&src).unwrap().is_empty());
    }
}
