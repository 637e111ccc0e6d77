use log::warn;

use crate::config::expand_path;
use crate::error::ConfigError;

pub type Rgb = [u8; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Colors {
    pub background: Rgb,
    pub marker: Rgb,
    pub hour_tick: Rgb,
    pub highlight: Rgb,
    pub popup_background: Rgb,
    pub popup_border: Rgb,
    pub popup_text: Rgb,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            background: [0x00, 0x00, 0x00],
            marker: [0xff, 0xff, 0x00],
            hour_tick: [0xff, 0x00, 0xff],
            highlight: [0x00, 0xff, 0x00],
            popup_background: [0x00, 0x00, 0x00],
            popup_border: [0xff, 0x00, 0xff],
            popup_text: [0x00, 0xff, 0x00],
        }
    }
}

pub fn parse_hex(s: &str) -> Option<Rgb> {
    let s = s.strip_prefix('#').unwrap_or(s);
    if s.len() != 6 || !s.is_ascii() { return None; }
    Some([u8::from_str_radix(&s[0..2], 16).ok()?,
          u8::from_str_radix(&s[2..4], 16).ok()?,
          u8::from_str_radix(&s[4..6], 16).ok()?])
}

/// Reads a `key = #rrggbb` colour file. A missing file keeps the defaults,
/// a bad value for a known key is an error.
pub fn load_colors(path: Option<&str>) -> Result<Colors, ConfigError> {
    let Some(p) = path else { return Ok(Colors::default()) };
    let path = expand_path(p);
    match std::fs::read_to_string(&path) {
        Ok(content) => parse_colors(&content),
        Err(e) => {
            warn!("daybar: cannot read color file {}: {e}", path.display());
            Ok(Colors::default())
        }
    }
}

pub fn parse_colors(content: &str) -> Result<Colors, ConfigError> {
    let mut colors = Colors::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') { continue; }
        let Some((key, val)) = line.split_once('=') else { continue };
        let (key, val) = (key.trim(), val.trim().trim_matches('"'));
        let slot = match key {
            "background" => &mut colors.background,
            "marker" => &mut colors.marker,
            "hour_tick" => &mut colors.hour_tick,
            "highlight" => &mut colors.highlight,
            "popup_background" => &mut colors.popup_background,
            "popup_border" => &mut colors.popup_border,
            "popup_text" => &mut colors.popup_text,
            _ => continue,
        };
        *slot = parse_hex(val).ok_or_else(|| ConfigError::InvalidColor {
            key: key.to_string(),
            value: val.to_string(),
        })?;
    }
    Ok(colors)
}
