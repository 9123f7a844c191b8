// ABOUTME: Slide deck segmentation for the revelation application
// ABOUTME: Splits deck text into sections and vertical fragments on separator lines

use crate::errors::{RevelationError, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Raw text of one vertical slide, unescaped and untrimmed
pub type Fragment = String;

/// Ordered fragments of one horizontal slide group
pub type Section = Vec<Fragment>;

/// A deck split into sections, each split into fragments.
///
/// Separator lines are dropped; interleaving the fragments with the separator
/// lines in order gives back the normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideDocument {
    pub sections: Vec<Section>,
}

impl SlideDocument {
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Reassemble the normalized deck text
    pub fn join(&self, section_separator: &str, vertical_separator: &str) -> String {
        self.sections
            .iter()
            .map(|section| section.join(vertical_separator))
            .collect::<Vec<_>>()
            .join(section_separator)
    }
}

/// Convert CRLF and lone CR line endings to LF
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Split normalized text into sections on lines equal to `section_separator`,
/// then each section into fragments on lines equal to `vertical_separator`.
///
/// Matching is line-anchored and literal. The separator has no escape, so a
/// matching line inside a code block still splits.
pub fn segment(text: &str, section_separator: &str, vertical_separator: &str) -> SlideDocument {
    let sections = split_on_line(text, section_separator)
        .into_iter()
        .map(|section| {
            split_on_line(section, vertical_separator)
                .into_iter()
                .map(str::to_string)
                .collect()
        })
        .collect();

    SlideDocument { sections }
}

/// Read a deck from disk, normalize it and segment it.
/// Invalid UTF-8 is replaced rather than rejected.
pub fn load_slides(
    path: &Path,
    section_separator: &str,
    vertical_separator: &str,
) -> Result<SlideDocument> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RevelationError::PresentationNotFound(path.to_path_buf()),
        _ => RevelationError::Io(e),
    })?;

    let text = normalize(&String::from_utf8_lossy(&bytes));
    let document = segment(&text, section_separator, vertical_separator);
    debug!(
        "Loaded {} sections from {:?}",
        document.len(),
        path
    );

    Ok(document)
}

/// Split `text` around every line that equals `separator`. The newlines
/// bordering a separator line stay with the neighbouring pieces.
fn split_on_line<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    let mut line_start = 0;

    loop {
        let line_end = text[line_start..]
            .find('\n')
            .map_or(text.len(), |offset| line_start + offset);

        if &text[line_start..line_end] == separator {
            pieces.push(&text[piece_start..line_start]);
            piece_start = line_end;
        }

        if line_end == text.len() {
            break;
        }
        line_start = line_end + 1;
    }

    pieces.push(&text[piece_start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(sections: &[&[&str]]) -> SlideDocument {
        SlideDocument {
            sections: sections
                .iter()
                .map(|s| s.iter().map(|f| f.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_segment_sections_and_fragments() {
        let document = segment("# Pag1\n---\n# Pag2.1\n---~\n# Page2.2", "---", "---~");
        assert_eq!(
            document,
            doc(&[&["# Pag1\n"], &["\n# Pag2.1\n", "\n# Page2.2"]])
        );
    }

    #[test]
    fn test_segment_after_normalize() {
        let document = segment(&normalize("# Pag1\r---\r\n# Pag2"), "---", "---~");
        assert_eq!(document, doc(&[&["# Pag1\n"], &["\n# Pag2"]]));
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(segment("", "---", "---~"), doc(&[&[""]]));
    }

    #[test]
    fn test_separator_at_edges() {
        let document = segment("---\nbody\n---", "---", "---~");
        assert_eq!(document, doc(&[&[""], &["\nbody\n"], &[""]]));

        let document = segment("---\nbody\n---\n", "---", "---~");
        assert_eq!(document, doc(&[&[""], &["\nbody\n"], &["\n"]]));
    }

    #[test]
    fn test_partial_line_does_not_split() {
        let document = segment("a --- b\n----\n --- \n---~x", "---", "---~");
        assert_eq!(document, doc(&[&["a --- b\n----\n --- \n---~x"]]));
    }

    #[test]
    fn test_separator_inside_code_block_still_splits() {
        let text = "```\n---\n```";
        assert_eq!(segment(text, "---", "---~"), doc(&[&["```\n"], &["\n```"]]));
    }

    #[test]
    fn test_whitespace_is_preserved() {
        let document = segment("  one  \n\n---~\n\n  two  \n", "---", "---~");
        assert_eq!(document, doc(&[&["  one  \n\n", "\n\n  two  \n"]]));
    }

    #[test]
    fn test_join_recovers_text() {
        let text = "intro\n---\nA\n---~\nB\n---\n\n---~\n";
        let document = segment(text, "---", "---~");
        assert_eq!(document.join("---", "---~"), text);
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in ["a\r\nb\rc\nd", "\r\r\n\n\r", "ünïcødé\r\n✓\r", ""] {
            let once = normalize(input);
            assert_eq!(normalize(&once), once);
            assert!(!once.contains('\r'));
        }
        assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
    }
}
