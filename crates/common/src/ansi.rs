//! ANSI SGR decoding for captured console output
//!
//! Turns one line of raw console text into ordered, styled segments that a
//! renderer can map onto its own colour scheme. Each call starts unstyled, so
//! styling never carries over from one line to the next.
//!
//! Only Select Graphic Rendition sequences (`ESC [ <params> m`) are
//! interpreted. Anything that does not form a complete SGR sequence is kept
//! as literal text.

use serde::{Serialize, Serializer};

const ESC: u8 = 0x1b;

/// Foreground colours understood by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
}

impl Color {
    fn from_sgr(code: u32) -> Option<Self> {
        let color = match code {
            31 => Color::Red,
            32 => Color::Green,
            33 => Color::Yellow,
            34 => Color::Blue,
            35 => Color::Magenta,
            36 => Color::Cyan,
            91 => Color::BrightRed,
            92 => Color::BrightGreen,
            93 => Color::BrightYellow,
            94 => Color::BrightBlue,
            95 => Color::BrightMagenta,
            96 => Color::BrightCyan,
            _ => return None,
        };
        Some(color)
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            Color::Red => "ansi-red",
            Color::Green => "ansi-green",
            Color::Yellow => "ansi-yellow",
            Color::Blue => "ansi-blue",
            Color::Magenta => "ansi-magenta",
            Color::Cyan => "ansi-cyan",
            Color::BrightRed => "ansi-bright-red",
            Color::BrightGreen => "ansi-bright-green",
            Color::BrightYellow => "ansi-bright-yellow",
            Color::BrightBlue => "ansi-bright-blue",
            Color::BrightMagenta => "ansi-bright-magenta",
            Color::BrightCyan => "ansi-bright-cyan",
        }
    }
}

/// Style active for a run of text.
///
/// Colours are mutually exclusive (the last one wins); bold and dim are
/// modifiers that combine with any colour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Style {
    pub color: Option<Color>,
    pub bold: bool,
    pub dim: bool,
}

impl Style {
    pub fn is_plain(&self) -> bool {
        *self == Style::default()
    }

    /// Space-separated class tokens, empty for unstyled text
    pub fn class(&self) -> String {
        let mut tokens: Vec<&str> = Vec::with_capacity(3);
        if let Some(color) = self.color {
            tokens.push(color.class_name());
        }
        if self.bold {
            tokens.push("ansi-bold");
        }
        if self.dim {
            tokens.push("ansi-dim");
        }
        tokens.join(" ")
    }

    /// Apply the `;`-separated parameter list of one SGR sequence
    fn apply(&mut self, params: &str) {
        for param in params.split(';') {
            // An empty parameter means 0, as in `ESC[m`
            let code = if param.is_empty() {
                0
            } else {
                match param.parse::<u32>() {
                    Ok(code) => code,
                    Err(_) => continue,
                }
            };
            self.apply_code(code);
        }
    }

    fn apply_code(&mut self, code: u32) {
        match code {
            0 => *self = Style::default(),
            1 => self.bold = true,
            2 => self.dim = true,
            22 => {
                self.bold = false;
                self.dim = false;
            }
            39 => self.color = None,
            _ => {
                if let Some(color) = Color::from_sgr(code) {
                    self.color = Some(color);
                }
            }
        }
    }
}

impl Serialize for Style {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.class())
    }
}

/// A run of visible text sharing one style
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub text: String,
    #[serde(rename = "styleClass")]
    pub style: Style,
}

impl Segment {
    pub fn style_class(&self) -> String {
        self.style.class()
    }
}

/// Decode one line into styled segments.
///
/// Never fails and never emits empty segments. A line without escape codes
/// yields a single unstyled segment; a line made only of escape codes yields
/// none.
pub fn decode(line: &str) -> Vec<Segment> {
    let bytes = line.as_bytes();
    let mut segments = Vec::new();
    let mut style = Style::default();
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] == ESC {
            if let Some((params, end)) = match_sgr(line, pos) {
                push_segment(&mut segments, &line[literal_start..pos], style);
                style.apply(params);
                pos = end;
                literal_start = end;
                continue;
            }
        }
        pos += 1;
    }

    push_segment(&mut segments, &line[literal_start..], style);
    segments
}

/// Visible text of a line with all SGR sequences removed
pub fn strip(line: &str) -> String {
    decode(line).into_iter().map(|s| s.text).collect()
}

/// Match `ESC [ [0-9;]* m` starting at `start`, returning the parameter text
/// and the index just past the final `m`.
fn match_sgr(line: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = line.as_bytes();
    if bytes.get(start + 1) != Some(&b'[') {
        return None;
    }

    let params_start = start + 2;
    let mut pos = params_start;
    while let Some(&b) = bytes.get(pos) {
        match b {
            b'0'..=b'9' | b';' => pos += 1,
            b'm' => return Some((&line[params_start..pos], pos + 1)),
            _ => return None,
        }
    }
    None
}

fn push_segment(segments: &mut Vec<Segment>, text: &str, style: Style) {
    if text.is_empty() {
        return;
    }
    segments.push(Segment {
        text: text.to_string(),
        style,
    });
}
