//! Unicode text styling
//!
//! Maps ASCII letters (and digits, for bold) to their Mathematical
//! Alphanumeric Symbols counterparts. Everything else passes through, so
//! styled text stays readable wherever the glyphs are missing.

use crate::types::FormatStyle;

const BOLD_UPPER: u32 = 0x1D400;
const BOLD_LOWER: u32 = 0x1D41A;
const BOLD_DIGIT: u32 = 0x1D7CE;
const ITALIC_UPPER: u32 = 0x1D434;
const ITALIC_LOWER: u32 = 0x1D44E;
const SCRIPT_UPPER: u32 = 0x1D49C;
const SCRIPT_LOWER: u32 = 0x1D4B6;

// Code points reserved in the math block because the glyph already existed
// in Letterlike Symbols.
const ITALIC_HOLES: &[(char, char)] = &[('h', '\u{210E}')];
const SCRIPT_HOLES: &[(char, char)] = &[
    ('B', '\u{212C}'),
    ('E', '\u{2130}'),
    ('F', '\u{2131}'),
    ('H', '\u{210B}'),
    ('I', '\u{2110}'),
    ('L', '\u{2112}'),
    ('M', '\u{2133}'),
    ('R', '\u{211B}'),
    ('e', '\u{212F}'),
    ('g', '\u{210A}'),
    ('o', '\u{2134}'),
];

fn offset_char(base: u32, from: char, c: char) -> Option<char> {
    char::from_u32(base + (c as u32 - from as u32))
}

/// Style a single character, or `None` when the style leaves it alone
fn style_char(c: char, style: FormatStyle) -> Option<char> {
    let holes = match style {
        FormatStyle::Normal => return None,
        FormatStyle::Bold => &[][..],
        FormatStyle::Italic => ITALIC_HOLES,
        FormatStyle::Script => SCRIPT_HOLES,
    };
    if let Some(&(_, styled)) = holes.iter().find(|(plain, _)| *plain == c) {
        return Some(styled);
    }

    let (upper, lower, digit) = match style {
        FormatStyle::Bold => (BOLD_UPPER, BOLD_LOWER, Some(BOLD_DIGIT)),
        FormatStyle::Italic => (ITALIC_UPPER, ITALIC_LOWER, None),
        FormatStyle::Script => (SCRIPT_UPPER, SCRIPT_LOWER, None),
        FormatStyle::Normal => return None,
    };

    match c {
        'A'..='Z' => offset_char(upper, 'A', c),
        'a'..='z' => offset_char(lower, 'a', c),
        '0'..='9' => digit.and_then(|base| offset_char(base, '0', c)),
        _ => None,
    }
}

/// Map a styled character back to ASCII, returning the style it carried
fn plain_char(c: char) -> Option<(char, FormatStyle)> {
    for (style, holes) in [
        (FormatStyle::Italic, ITALIC_HOLES),
        (FormatStyle::Script, SCRIPT_HOLES),
    ] {
        if let Some(&(plain, _)) = holes.iter().find(|(_, styled)| *styled == c) {
            return Some((plain, style));
        }
    }

    let code = c as u32;
    let ranges = [
        (BOLD_UPPER, 'A', FormatStyle::Bold),
        (BOLD_LOWER, 'a', FormatStyle::Bold),
        (ITALIC_UPPER, 'A', FormatStyle::Italic),
        (ITALIC_LOWER, 'a', FormatStyle::Italic),
        (SCRIPT_UPPER, 'A', FormatStyle::Script),
        (SCRIPT_LOWER, 'a', FormatStyle::Script),
    ];
    for (base, from, style) in ranges {
        if (base..base + 26).contains(&code) {
            return char::from_u32(from as u32 + (code - base)).map(|p| (p, style));
        }
    }
    if (BOLD_DIGIT..BOLD_DIGIT + 10).contains(&code) {
        return char::from_u32('0' as u32 + (code - BOLD_DIGIT)).map(|p| (p, FormatStyle::Bold));
    }

    None
}

/// Apply a style to the whole text
pub fn format_text(text: &str, style: FormatStyle) -> String {
    if style == FormatStyle::Normal {
        return text.to_string();
    }
    text.chars()
        .map(|c| style_char(c, style).unwrap_or(c))
        .collect()
}

/// Strip any styling, returning plain ASCII where a styled glyph was used
pub fn unformat_text(text: &str) -> String {
    text.chars()
        .map(|c| plain_char(c).map(|(p, _)| p).unwrap_or(c))
        .collect()
}

/// Whether the text contains at least one character in the given style
pub fn contains_styled(text: &str, style: FormatStyle) -> bool {
    text.chars()
        .any(|c| matches!(plain_char(c), Some((_, s)) if s == style))
}

/// Remove the style if present, otherwise apply it
pub fn toggle(text: &str, style: FormatStyle) -> String {
    if contains_styled(text, style) {
        unformat_text(text)
    } else {
        format_text(text, style)
    }
}
