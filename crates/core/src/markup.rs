//! Response markup shared by answer producers and the chat widget.
//!
//! Grammar, one line at a time:
//!
//! ```text
//! document  := line ("\n" line)*
//! line      := header | bullet | blank | paragraph
//! header    := "**" text-without-"**" "**"          (the whole line)
//! bullet    := ("•" | "-") " "? inline*
//! blank     := ""
//! paragraph := inline*
//! inline    := bold | link | text
//! bold      := "**" text-without-"**" "**"
//! link      := "[" text "](" url ")"
//! ```
//!
//! [`render`] is the inverse of [`parse`] for canonical input, so producer and
//! consumer can be tested against the same fixtures.

use serde::{Deserialize, Serialize};

/// One line of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Header { text: String },
    Bullet { marker: char, inlines: Vec<Inline> },
    Paragraph { inlines: Vec<Inline> },
    Blank,
}

/// An inline span inside a bullet or paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text { text: String },
    Bold { text: String },
    Link { text: String, url: String },
}

const BULLET_MARKERS: [char; 2] = ['•', '-'];

/// Parse response text into blocks.
pub fn parse(text: &str) -> Vec<Block> {
    text.split('\n').map(parse_line).collect()
}

fn parse_line(line: &str) -> Block {
    let trimmed = line.trim();

    if trimmed.is_empty() {
        return Block::Blank;
    }

    if let Some(inner) = header_text(trimmed) {
        return Block::Header {
            text: inner.to_string(),
        };
    }

    let mut chars = trimmed.chars();
    if let Some(marker) = chars.next().filter(|c| BULLET_MARKERS.contains(c)) {
        let rest = chars.as_str();
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        return Block::Bullet {
            marker,
            inlines: parse_inlines(rest),
        };
    }

    Block::Paragraph {
        inlines: parse_inlines(trimmed),
    }
}

/// Inner text when the whole line is a single `**...**` span.
fn header_text(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("**")?.strip_suffix("**")?;
    if inner.trim().is_empty() || inner.contains("**") {
        return None;
    }
    Some(inner)
}

/// Parse bold spans and links out of a line.
pub fn parse_inlines(text: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**") {
                if end > 0 {
                    flush_text(&mut plain, &mut inlines);
                    inlines.push(Inline::Bold {
                        text: after[..end].to_string(),
                    });
                    rest = &after[end + 2..];
                    continue;
                }
            }
        }

        if rest.starts_with('[') {
            if let Some((label, url, consumed)) = link_at(rest) {
                flush_text(&mut plain, &mut inlines);
                inlines.push(Inline::Link {
                    text: label.to_string(),
                    url: url.to_string(),
                });
                rest = &rest[consumed..];
                continue;
            }
        }

        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            plain.push(c);
        }
        rest = chars.as_str();
    }

    flush_text(&mut plain, &mut inlines);
    inlines
}

/// Match `[label](url)` at the start of `text`.
fn link_at(text: &str) -> Option<(&str, &str, usize)> {
    let close = text.find("](")?;
    let label = &text[1..close];
    if label.is_empty() || label.contains('[') || label.contains(']') {
        return None;
    }
    let after = &text[close + 2..];
    let end = after.find(')')?;
    let url = &after[..end];
    if url.is_empty() || url.contains(char::is_whitespace) {
        return None;
    }
    Some((label, url, close + 2 + end + 1))
}

fn flush_text(plain: &mut String, inlines: &mut Vec<Inline>) {
    if !plain.is_empty() {
        inlines.push(Inline::Text {
            text: std::mem::take(plain),
        });
    }
}

/// Render blocks back into canonical response text.
pub fn render(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|block| match block {
            Block::Header { text } => format!("**{}**", text),
            Block::Bullet { marker, inlines } => format!("{} {}", marker, render_inlines(inlines)),
            Block::Paragraph { inlines } => render_inlines(inlines),
            Block::Blank => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_inlines(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text { text } => text.clone(),
            Inline::Bold { text } => format!("**{}**", text),
            Inline::Link { text, url } => format!("[{}]({})", text, url),
        })
        .collect()
}

/// Rewrite common Markdown habits of LLM output into the widget grammar.
///
/// `* item` becomes `• item`, `# Title` becomes `**Title**`, trailing
/// whitespace is dropped and runs of blank lines collapse to one.
pub fn normalize(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for raw in text.trim().lines() {
        let line = raw.trim_end();
        let leading = line.trim_start();

        let normalized = if let Some(item) = leading.strip_prefix("* ") {
            format!("• {}", item.trim_start())
        } else if leading.starts_with('#') {
            let title = leading.trim_start_matches('#').trim();
            let title = title.trim_start_matches("**").trim_end_matches("**");
            if title.is_empty() {
                String::new()
            } else {
                format!("**{}**", title)
            }
        } else {
            line.to_string()
        };

        let is_blank = normalized.trim().is_empty();
        if is_blank && lines.last().is_some_and(|l| l.is_empty()) {
            continue;
        }
        lines.push(if is_blank { String::new() } else { normalized });
    }

    lines.join("\n")
}

/// Strip markup, leaving readable text (used for logs and previews).
pub fn to_plain_text(text: &str) -> String {
    parse(text)
        .iter()
        .map(|block| match block {
            Block::Header { text } => text.clone(),
            Block::Bullet { inlines, .. } => format!("- {}", plain_inlines(inlines)),
            Block::Paragraph { inlines } => plain_inlines(inlines),
            Block::Blank => String::new(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn plain_inlines(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text { text } | Inline::Bold { text } => text.clone(),
            Inline::Link { text, url } => format!("{} ({})", text, url),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = "**Parking Rates**\n\
                           • First 2 hours: **PHP 50**\n\
                           - Overnight: see [parking page](https://airport.test/parking)\n\
                           \n\
                           Pay at the exit booth.";

    #[test]
    fn test_parse_fixture() {
        let blocks = parse(FIXTURE);
        assert_eq!(blocks.len(), 5);
        assert_eq!(
            blocks[0],
            Block::Header {
                text: "Parking Rates".to_string()
            }
        );
        assert_eq!(
            blocks[1],
            Block::Bullet {
                marker: '•',
                inlines: vec![
                    Inline::Text {
                        text: "First 2 hours: ".to_string()
                    },
                    Inline::Bold {
                        text: "PHP 50".to_string()
                    },
                ],
            }
        );
        match &blocks[2] {
            Block::Bullet { marker, inlines } => {
                assert_eq!(*marker, '-');
                assert_eq!(
                    inlines[1],
                    Inline::Link {
                        text: "parking page".to_string(),
                        url: "https://airport.test/parking".to_string()
                    }
                );
            }
            other => panic!("expected bullet, got {:?}", other),
        }
        assert_eq!(blocks[3], Block::Blank);
        assert!(matches!(blocks[4], Block::Paragraph { .. }));
    }

    #[test]
    fn test_render_is_inverse_of_parse_for_canonical_text() {
        assert_eq!(render(&parse(FIXTURE)), FIXTURE);
    }

    #[test]
    fn test_bold_inside_line_is_not_header() {
        let blocks = parse("**Gate** 5 is open");
        assert!(matches!(blocks[0], Block::Paragraph { .. }));

        let blocks = parse("**A** and **B**");
        assert!(matches!(blocks[0], Block::Paragraph { .. }));
    }

    #[test]
    fn test_unclosed_markup_stays_text() {
        let inlines = parse_inlines("50% off **today [menu](");
        assert_eq!(
            inlines,
            vec![Inline::Text {
                text: "50% off **today [menu](".to_string()
            }]
        );
    }

    #[test]
    fn test_normalize_markdown_habits() {
        let text = "## Dining Options\n\n\n* KFC - Level 2\n* Jollibee   \nEnjoy!";
        assert_eq!(
            normalize(text),
            "**Dining Options**\n\n• KFC - Level 2\n• Jollibee\nEnjoy!"
        );
    }

    #[test]
    fn test_to_plain_text() {
        let plain = to_plain_text("**Hi**\n• see [here](https://x.test)");
        assert_eq!(plain, "Hi\n- see here (https://x.test)");
    }
}
