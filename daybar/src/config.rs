use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::colors::{load_colors, Colors};
use crate::error::ConfigError;
use crate::track::{Orientation, MARKER_BIAS};

pub const USAGE: &str = "\
usage: daybar [options] [time1 time2 ... <HH:MM>]
  -size <pixels>              Width of bar in pixels.
  -font <pattern>             Defaults to 'monospace:bold:size=18'.
  -display <name>             Wayland display socket to connect to.
  -config <path>              Config file (default ~/.config/widgets/daybar.toml).
  -left|-right|-top|-bottom   Screen edge, defaults to right.
  time1 time2 ...             Times to highlight, defaults to every three hours.";

pub const DEFAULT_HIGHLIGHTS: [f32; 7] = [3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0];
pub const MAX_POPUP_PADDING: u32 = 256;
const DEFAULT_FONT_SIZE: f32 = 18.0;

// --- Config file ---

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub size: u32,
    pub font: String,
    pub position: Orientation,
    pub display: Option<String>,
    pub times: Vec<String>,
    pub color_file: Option<String>,
    pub tick_secs: u64,
    pub marker_bias: i32,
    pub popup_padding: u32,
    pub reserve_space: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size: 4,
            font: "monospace:bold:size=18".into(),
            position: Orientation::Right,
            display: None,
            times: Vec::new(),
            color_file: None,
            tick_secs: 1,
            marker_bias: MARKER_BIAS,
            popup_padding: 2,
            reserve_space: false,
        }
    }
}

/// A missing file means defaults unless it was asked for explicitly.
pub fn load_config(path: &Path, required: bool) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(s) => toml::from_str(&s).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            debug!("no config at {}, using defaults", path.display());
            Ok(Config::default())
        }
        Err(source) => Err(ConfigError::Read { path: path.to_path_buf(), source }),
    }
}

pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home().join(".config"));
    base.join("widgets")
}

fn home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default()
}

pub fn expand_path(p: &str) -> PathBuf {
    if let Some(rest) = p.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(p)
    }
}

// --- Font pattern ---

#[derive(Debug, Clone, PartialEq)]
pub enum FontFamily {
    Monospace,
    SansSerif,
    Serif,
    Named(String),
    File(PathBuf),
}

/// Fontconfig-style pattern: `family[:style...][:size=N]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    pub family: FontFamily,
    pub weight: u16,
    pub italic: bool,
    pub size: f32,
}

impl FontSpec {
    pub fn parse(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::InvalidFont { pattern: pattern.to_string(), reason };
        let mut parts = pattern.split(':');
        let family = parts.next().unwrap_or_default().trim();
        if family.is_empty() {
            return Err(invalid("empty family name"));
        }
        let family = match family {
            "monospace" | "mono" => FontFamily::Monospace,
            "sans" | "sans-serif" => FontFamily::SansSerif,
            "serif" => FontFamily::Serif,
            f if f.contains('/') => FontFamily::File(expand_path(f)),
            f => FontFamily::Named(f.to_string()),
        };

        let mut spec = FontSpec { family, weight: 400, italic: false, size: DEFAULT_FONT_SIZE };
        for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('=') {
                Some(("size" | "pixelsize", value)) => {
                    spec.size = value
                        .trim()
                        .parse::<f32>()
                        .ok()
                        .filter(|s| s.is_finite() && *s > 0.0)
                        .ok_or_else(|| invalid("size must be a positive number"))?;
                }
                Some(("style" | "weight", value)) => {
                    if !spec.apply_style(value.trim()) {
                        return Err(invalid("unknown style"));
                    }
                }
                Some((key, _)) => debug!("ignoring font property {key}"),
                None => {
                    if !spec.apply_style(part) {
                        return Err(invalid("unknown style"));
                    }
                }
            }
        }
        Ok(spec)
    }

    fn apply_style(&mut self, word: &str) -> bool {
        match word.to_ascii_lowercase().as_str() {
            "thin" => self.weight = 100,
            "extralight" | "ultralight" => self.weight = 200,
            "light" => self.weight = 300,
            "regular" | "normal" | "book" | "roman" => self.weight = 400,
            "medium" => self.weight = 500,
            "semibold" | "demibold" => self.weight = 600,
            "bold" => self.weight = 700,
            "extrabold" | "ultrabold" => self.weight = 800,
            "black" | "heavy" => self.weight = 900,
            "italic" | "oblique" => self.italic = true,
            _ => return false,
        }
        true
    }
}

// --- Highlight times ---

/// `HH:MM` to a fractional hour, `"14:30"` -> `14.5`.
pub fn parse_time(s: &str) -> Result<f32, ConfigError> {
    let err = || ConfigError::InvalidTime(s.to_string());
    let field = |p: &str| {
        if !p.is_empty() && p.len() <= 2 && p.bytes().all(|b| b.is_ascii_digit()) {
            p.parse::<u32>().ok()
        } else {
            None
        }
    };
    let (h, m) = s.split_once(':').ok_or_else(err)?;
    let h = field(h).ok_or_else(err)?;
    let m = field(m).ok_or_else(err)?;
    if h > 23 || m > 59 {
        return Err(err());
    }
    Ok((h as f64 + m as f64 / 60.0) as f32)
}

fn parse_size(s: &str) -> Result<u32, ConfigError> {
    s.parse::<u32>()
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ConfigError::InvalidSize(s.to_string()))
}

// --- Command line ---

#[derive(Debug, Default)]
pub struct Cli {
    pub config: Option<PathBuf>,
    pub size: Option<u32>,
    pub font: Option<String>,
    pub display: Option<String>,
    pub position: Option<Orientation>,
    pub times: Vec<String>,
}

/// Accepts `-opt value`, `--opt value` and `-opt=value`.
pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, ConfigError> {
    let mut cli = Cli::default();
    let mut args = args.into_iter();
    let mut options_done = false;

    while let Some(arg) = args.next() {
        if options_done || !arg.starts_with('-') || arg == "-" {
            cli.times.push(arg);
            continue;
        }
        if arg == "--" {
            options_done = true;
            continue;
        }
        let flag = arg.trim_start_matches('-');
        let (name, inline) = match flag.split_once('=') {
            Some((n, v)) => (n, Some(v.to_string())),
            None => (flag, None),
        };
        match name {
            "size" | "font" | "display" | "config" => {
                let value = match inline {
                    Some(v) => v,
                    None => args
                        .next()
                        .ok_or_else(|| ConfigError::Usage(format!("-{name} requires a value")))?,
                };
                match name {
                    "size" => cli.size = Some(parse_size(&value)?),
                    "font" => cli.font = Some(value),
                    "display" => cli.display = Some(value),
                    _ => cli.config = Some(expand_path(&value)),
                }
            }
            "h" | "help" => return Err(ConfigError::Help),
            edge => {
                let Some(o) = Orientation::from_name(edge) else {
                    return Err(ConfigError::Usage(format!("unknown option {arg}")));
                };
                if inline.is_some() {
                    return Err(ConfigError::Usage(format!("-{edge} takes no value")));
                }
                match cli.position {
                    Some(prev) if prev != o => {
                        return Err(ConfigError::ConflictingEdges(prev.name(), o.name()));
                    }
                    _ => cli.position = Some(o),
                }
            }
        }
    }
    Ok(cli)
}

// --- Resolved settings ---

#[derive(Debug, Clone)]
pub struct Settings {
    pub orientation: Orientation,
    pub thickness: u32,
    pub font: FontSpec,
    pub display: Option<String>,
    pub highlights: Vec<f32>,
    pub colors: Colors,
    pub tick: Duration,
    pub marker_bias: i32,
    pub popup_padding: u32,
    pub reserve_space: bool,
}

/// Command line over config file over defaults.
pub fn load<I: IntoIterator<Item = String>>(args: I) -> Result<Settings, ConfigError> {
    let cli = parse_args(args)?;
    let cfg = match &cli.config {
        Some(path) => load_config(path, true)?,
        None => load_config(&config_dir().join("daybar.toml"), false)?,
    };
    resolve(cfg, cli)
}

pub fn resolve(cfg: Config, cli: Cli) -> Result<Settings, ConfigError> {
    let thickness = cli.size.unwrap_or(cfg.size);
    if thickness == 0 {
        return Err(ConfigError::InvalidSize(thickness.to_string()));
    }
    if cfg.tick_secs == 0 {
        return Err(ConfigError::InvalidTick(cfg.tick_secs));
    }
    if cfg.popup_padding > MAX_POPUP_PADDING {
        return Err(ConfigError::InvalidPadding(cfg.popup_padding));
    }
    let font = FontSpec::parse(cli.font.as_deref().unwrap_or(&cfg.font))?;
    let times = if cli.times.is_empty() { cfg.times } else { cli.times };
    let highlights = if times.is_empty() {
        DEFAULT_HIGHLIGHTS.to_vec()
    } else {
        times.iter().map(|t| parse_time(t)).collect::<Result<Vec<_>, _>>()?
    };
    let colors = load_colors(cfg.color_file.as_deref())?;

    Ok(Settings {
        orientation: cli.position.unwrap_or(cfg.position),
        thickness,
        font,
        display: cli.display.or(cfg.display),
        highlights,
        colors,
        tick: Duration::from_secs(cfg.tick_secs),
        marker_bias: cfg.marker_bias,
        popup_padding: cfg.popup_padding,
        reserve_space: cfg.reserve_space,
    })
}
