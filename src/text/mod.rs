//! # Text Layout
//!
//! Line breaking and text measurement for the renderers.
//!
//! Both renderers print with the standard Helvetica faces, so widths come
//! from the Helvetica AFM advance table rather than from a font file. Break
//! opportunities follow UAX#14.
//!
//! The packer never calls into this module. Wrapping here can produce a
//! narrative block taller than its estimate; diagnostics reports that as
//! overflow instead of moving content.

use unicode_linebreak::{linebreaks, BreakOpportunity};

/// A line of text after line-breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokenLine {
    pub text: String,
    pub width: f64,
}

/// Face used for a run of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFace {
    Regular,
    Bold,
}

impl FontFace {
    /// PDF BaseFont name.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            FontFace::Regular => "Helvetica",
            FontFace::Bold => "Helvetica-Bold",
        }
    }
}

/// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Helvetica-Bold advance widths for 0x20..=0x7E, in 1/1000 em.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
];

/// Advance width of a character in points.
pub fn char_width(ch: char, face: FontFace, font_size: f64) -> f64 {
    let table = match face {
        FontFace::Regular => &HELVETICA_WIDTHS,
        FontFace::Bold => &HELVETICA_BOLD_WIDTHS,
    };
    let units = match ch as u32 {
        cp @ 0x20..=0x7E => table[(cp - 0x20) as usize],
        // Outside ASCII: an average lowercase advance
        _ => 556,
    };
    units as f64 / 1000.0 * font_size
}

/// Width of a string on a single line.
pub fn measure_width(text: &str, face: FontFace, font_size: f64) -> f64 {
    text.chars().map(|c| char_width(c, face, font_size)).sum()
}

/// Shorten `text` with a trailing ellipsis so it fits in `max_width`.
pub fn truncate_to_width(text: &str, face: FontFace, font_size: f64, max_width: f64) -> String {
    if measure_width(text, face, font_size) <= max_width {
        return text.to_string();
    }
    let ellipsis = "...";
    let budget = max_width - measure_width(ellipsis, face, font_size);
    let mut out = String::new();
    let mut width = 0.0;
    for ch in text.chars() {
        let w = char_width(ch, face, font_size);
        if width + w > budget {
            break;
        }
        width += w;
        out.push(ch);
    }
    out.truncate(out.trim_end().len());
    out.push_str(ellipsis);
    out
}

/// Compute UAX#14 break opportunities indexed by char position.
///
/// Each entry is the break opportunity *before* that character. Index 0 is
/// always `None`.
fn compute_break_opportunities(text: &str) -> Vec<Option<BreakOpportunity>> {
    let char_count = text.chars().count();
    let mut result = vec![None; char_count];

    // linebreaks() yields byte offsets of the start of the next segment.
    let mut byte_to_char = vec![0usize; text.len() + 1];
    for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
        byte_to_char[byte_idx] = char_idx;
    }
    byte_to_char[text.len()] = char_count;

    for (byte_offset, opp) in linebreaks(text) {
        let char_idx = byte_to_char[byte_offset];
        if char_idx < char_count {
            result[char_idx] = Some(opp);
        }
    }

    result
}

fn is_newline(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

/// Break a string into lines no wider than `max_width`, greedily.
///
/// Explicit newlines always break. Words longer than a line are cut at the
/// last character that fits.
pub fn break_into_lines(
    text: &str,
    max_width: f64,
    face: FontFace,
    font_size: f64,
) -> Vec<BrokenLine> {
    if text.is_empty() {
        return vec![BrokenLine {
            text: String::new(),
            width: 0.0,
        }];
    }

    let chars: Vec<char> = text.chars().collect();
    let widths: Vec<f64> = chars.iter().map(|&c| char_width(c, face, font_size)).collect();
    let break_opps = compute_break_opportunities(text);

    let mut lines = Vec::new();
    let mut line_start = 0;
    let mut line_width = 0.0;
    let mut last_break_point: Option<usize> = None;

    for (i, &ch) in chars.iter().enumerate() {
        if i > 0 {
            match break_opps[i] {
                Some(BreakOpportunity::Mandatory) => {
                    let end = if is_newline(chars[i - 1]) { i - 1 } else { i };
                    lines.push(make_line(&chars[line_start..end], &widths[line_start..end]));
                    line_start = i;
                    line_width = 0.0;
                    last_break_point = None;
                }
                Some(BreakOpportunity::Allowed) => {
                    last_break_point = Some(i - 1);
                }
                None => {}
            }
        }

        if is_newline(ch) {
            continue;
        }

        if line_width + widths[i] > max_width && line_start < i {
            if let Some(bp) = last_break_point.filter(|&bp| bp >= line_start) {
                lines.push(make_line(&chars[line_start..=bp], &widths[line_start..=bp]));
                line_start = bp + 1;
                line_width = widths[line_start..=i].iter().sum();
                last_break_point = None;
                continue;
            }

            // No break point: force a break before this char
            lines.push(make_line(&chars[line_start..i], &widths[line_start..i]));
            line_start = i;
            line_width = widths[i];
            last_break_point = None;
            continue;
        }

        line_width += widths[i];
    }

    if line_start < chars.len() {
        let end = if is_newline(chars[chars.len() - 1]) {
            chars.len() - 1
        } else {
            chars.len()
        };
        lines.push(make_line(&chars[line_start..end], &widths[line_start..end]));
    }

    lines
}

fn make_line(chars: &[char], widths: &[f64]) -> BrokenLine {
    // Trailing spaces don't count towards the width
    let mut end = chars.len();
    while end > 0 && chars[end - 1] == ' ' {
        end -= 1;
    }
    BrokenLine {
        text: chars[..end].iter().collect(),
        width: widths[..end].iter().sum(),
    }
}
