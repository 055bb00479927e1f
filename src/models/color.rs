use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Persisted mapping from group id to CSS color string.
///
/// Ordered so that the pretty-printed file is stable between saves.
pub type ColorMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse an `rgb(...)`/`rgba(...)` or `#rrggbb` string.
    ///
    /// Anything unrecognised resolves to black, matching how the picker
    /// treats dots with unreadable colors.
    pub fn from_css(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with("rgb") {
            let digits = digit_regex();
            let channels: Vec<u8> = digits
                .find_iter(value)
                .take(3)
                .map(|m| m.as_str().parse::<u32>().unwrap_or(0).min(255) as u8)
                .collect();
            match channels.as_slice() {
                [r, g, b] => Self::new(*r, *g, *b),
                _ => Self::default(),
            }
        } else if let Some(hex) = value.strip_prefix('#') {
            parse_hex(hex).unwrap_or_default()
        } else {
            Self::default()
        }
    }

    pub fn to_css(&self) -> String {
        format!("rgb({},{},{})", self.r, self.g, self.b)
    }

    /// Channel-wise mean, rounded. `None` for an empty slice.
    pub fn average(colors: &[Rgb]) -> Option<Rgb> {
        if colors.is_empty() {
            return None;
        }

        let (r, g, b) = colors.iter().fold((0u64, 0u64, 0u64), |acc, c| {
            (acc.0 + c.r as u64, acc.1 + c.g as u64, acc.2 + c.b as u64)
        });
        let n = colors.len() as f64;

        Some(Self::new(
            round_channel(r as f64 / n),
            round_channel(g as f64 / n),
            round_channel(b as f64 / n),
        ))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_css())
    }
}

pub(crate) fn round_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

fn digit_regex() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").unwrap())
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if !hex.is_ascii() {
        return None;
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex[..6].to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
}

/// One picker dot, reduced to what the gradient function consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSample {
    pub rgb: Rgb,
    pub is_primary: bool,
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_css_parses_rgb_with_spaces() {
        assert_eq!(Rgb::from_css("rgb(120, 80, 200)"), Rgb::new(120, 80, 200));
    }

    #[test]
    fn from_css_parses_rgba_ignoring_alpha() {
        assert_eq!(Rgb::from_css("rgba(1,2,3,0.5)"), Rgb::new(1, 2, 3));
    }

    #[test]
    fn from_css_parses_hex() {
        assert_eq!(Rgb::from_css("#ff8000"), Rgb::new(255, 128, 0));
        assert_eq!(Rgb::from_css("#fff"), Rgb::new(255, 255, 255));
    }

    #[test]
    fn from_css_unknown_format_is_black() {
        assert_eq!(Rgb::from_css("hsl(10, 20%, 30%)"), Rgb::default());
        assert_eq!(Rgb::from_css("#zzzzzz"), Rgb::default());
        assert_eq!(Rgb::from_css("rgb(1,2)"), Rgb::default());
    }

    #[test]
    fn to_css_has_no_spaces() {
        assert_eq!(Rgb::new(20, 20, 20).to_css(), "rgb(20,20,20)");
    }

    #[test]
    fn average_rounds_each_channel() {
        let avg = Rgb::average(&[Rgb::new(0, 1, 10), Rgb::new(1, 2, 20)]).unwrap();
        // 0.5 -> 1, 1.5 -> 2, 15 -> 15
        assert_eq!(avg, Rgb::new(1, 2, 15));
    }

    #[test]
    fn average_of_nothing_is_none() {
        assert!(Rgb::average(&[]).is_none());
    }
}
