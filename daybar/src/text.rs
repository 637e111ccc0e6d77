use anyhow::{bail, Context, Result};
use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Style, SwashCache, SwashContent, Weight};
use log::debug;
use tiny_skia::Pixmap;

use crate::colors::Rgb;
use crate::config::{FontFamily, FontSpec};
use crate::render;
use crate::track::Rect;

const LINE_HEIGHT: f32 = 1.2;

/// Shapes and rasterises the popup text with a single font.
pub struct TextRenderer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    family: FontFamily,
    weight: Weight,
    style: Style,
    size: f32,
}

impl TextRenderer {
    pub fn load(spec: &FontSpec) -> Result<Self> {
        let mut family = spec.family.clone();
        let font_system = match &spec.family {
            FontFamily::File(path) => {
                let data = std::fs::read(path)
                    .with_context(|| format!("failed to read font file {}", path.display()))?;
                let mut db = cosmic_text::fontdb::Database::new();
                db.load_font_data(data);
                let name = db
                    .faces()
                    .next()
                    .and_then(|face| face.families.first())
                    .map(|(name, _)| name.clone())
                    .with_context(|| format!("font file {} contains no faces", path.display()))?;
                family = FontFamily::Named(name);
                FontSystem::new_with_locale_and_db("en-US".into(), db)
            }
            FontFamily::Named(name) => {
                let font_system = FontSystem::new();
                let known = font_system
                    .db()
                    .faces()
                    .any(|face| face.families.iter().any(|(n, _)| n.eq_ignore_ascii_case(name)));
                if !known {
                    bail!("font family {name:?} is not installed");
                }
                font_system
            }
            _ => FontSystem::new(),
        };
        debug!("loaded font {:?} at {}px", family, spec.size);
        Ok(Self {
            font_system,
            swash_cache: SwashCache::new(),
            family,
            weight: Weight(spec.weight),
            style: if spec.italic { Style::Italic } else { Style::Normal },
            size: spec.size,
        })
    }

    pub fn line_height(&self) -> f32 {
        self.size * LINE_HEIGHT
    }

    fn shape(&mut self, text: &str, max: Option<(f32, f32)>) -> Buffer {
        let metrics = Metrics::new(self.size, self.line_height());
        let attrs = make_attrs(&self.family, self.weight, self.style);
        let mut buf = Buffer::new(&mut self.font_system, metrics);
        match max {
            Some((w, h)) => buf.set_size(&mut self.font_system, Some(w), Some(h)),
            None => buf.set_size(&mut self.font_system, None, None),
        }
        buf.set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        buf.shape_until_scroll(&mut self.font_system, false);
        buf
    }

    /// Width and line height of `text` in whole pixels.
    pub fn measure(&mut self, text: &str) -> (u32, u32) {
        let buf = self.shape(text, None);
        let w = buf.layout_runs().next().map_or(0.0, |r| r.line_w);
        (w.ceil() as u32, self.line_height().ceil() as u32)
    }

    pub fn render(&mut self, pixmap: &mut Pixmap, text: &str, x: f32, y: f32, color: Rgb) {
        let max = (pixmap.width() as f32 - x, pixmap.height() as f32 - y);
        let buf = self.shape(text, Some(max));

        for run in buf.layout_runs() {
            for glyph in run.glyphs.iter() {
                let physical = glyph.physical((x, y + run.line_y), 1.0);
                let Some(image) = self.swash_cache.get_image_uncached(&mut self.font_system, physical.cache_key) else {
                    continue;
                };
                let area = Rect {
                    x: physical.x + image.placement.left,
                    y: physical.y - image.placement.top,
                    w: image.placement.width,
                    h: image.placement.height,
                };
                let data = &image.data;
                match image.content {
                    SwashContent::Mask => render::blend_glyph(pixmap, area, |i| {
                        (color, data.get(i).copied().unwrap_or(0))
                    }),
                    SwashContent::Color => render::blend_glyph(pixmap, area, |i| {
                        match data.get(i * 4..i * 4 + 4) {
                            Some(&[r, g, b, a]) => ([r, g, b], a),
                            _ => (color, 0),
                        }
                    }),
                    SwashContent::SubpixelMask => {}
                }
            }
        }
    }
}

fn make_attrs(family: &FontFamily, weight: Weight, style: Style) -> Attrs<'_> {
    let family = match family {
        FontFamily::Monospace => Family::Monospace,
        FontFamily::SansSerif => Family::SansSerif,
        FontFamily::Serif => Family::Serif,
        FontFamily::Named(name) => Family::Name(name),
        // replaced by the face's own family name at load time
        FontFamily::File(_) => Family::SansSerif,
    };
    Attrs::new().family(family).weight(weight).style(style)
}
