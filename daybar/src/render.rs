use tiny_skia::Pixmap;

use crate::bar::Frame;
use crate::colors::{Colors, Rgb};
use crate::track::Rect;

pub fn fill(pixmap: &mut Pixmap, c: Rgb) {
    pixmap.fill(tiny_skia::Color::from_rgba8(c[0], c[1], c[2], 0xff));
}

/// Opaque fill, clipped to the pixmap. Negative origins are fine.
pub fn fill_rect(pixmap: &mut Pixmap, rect: Rect, c: Rgb) {
    let pw = pixmap.width() as i64;
    let ph = pixmap.height() as i64;
    let x0 = (rect.x as i64).clamp(0, pw);
    let y0 = (rect.y as i64).clamp(0, ph);
    let x1 = (rect.x as i64 + rect.w as i64).clamp(0, pw);
    let y1 = (rect.y as i64 + rect.h as i64).clamp(0, ph);
    let data = pixmap.data_mut();
    for py in y0..y1 {
        for px in x0..x1 {
            let i = (py * pw + px) as usize * 4;
            data[i] = c[0]; data[i + 1] = c[1]; data[i + 2] = c[2]; data[i + 3] = 0xff;
        }
    }
}

/// Source-over blend of a glyph image covering `area`, clipped to the
/// pixmap. `texel` gives colour and coverage of glyph pixel `i` (row-major).
pub fn blend_glyph(pixmap: &mut Pixmap, area: Rect, texel: impl Fn(usize) -> (Rgb, u8)) {
    let pw = pixmap.width() as i64;
    let ph = pixmap.height() as i64;
    let (x, y, w, h) = (area.x as i64, area.y as i64, area.w as i64, area.h as i64);
    let gx0 = (-x).clamp(0, w);
    let gy0 = (-y).clamp(0, h);
    let gx1 = (pw - x).clamp(0, w);
    let gy1 = (ph - y).clamp(0, h);
    let data = pixmap.data_mut();
    for gy in gy0..gy1 {
        for gx in gx0..gx1 {
            let (c, a) = texel((gy * w + gx) as usize);
            if a == 0 { continue; }
            let (a, inv) = (a as u32, 255 - a as u32);
            let i = ((y + gy) * pw + x + gx) as usize * 4;
            for k in 0..3 {
                data[i + k] = ((c[k] as u32 * a + data[i + k] as u32 * inv) / 255) as u8;
            }
            data[i + 3] = (a + data[i + 3] as u32 * inv / 255) as u8;
        }
    }
}

/// One-pixel frame around the edge of the pixmap.
pub fn stroke_border(pixmap: &mut Pixmap, c: Rgb) {
    let (w, h) = (pixmap.width(), pixmap.height());
    fill_rect(pixmap, Rect { x: 0, y: 0, w, h: 1 }, c);
    fill_rect(pixmap, Rect { x: 0, y: h as i32 - 1, w, h: 1 }, c);
    fill_rect(pixmap, Rect { x: 0, y: 0, w: 1, h }, c);
    fill_rect(pixmap, Rect { x: w as i32 - 1, y: 0, w: 1, h }, c);
}

/// Clear, then marker, hour ticks and highlights in that order so the
/// ticks stay visible on top of the marker.
pub fn paint_frame(pixmap: &mut Pixmap, frame: &Frame, colors: &Colors) {
    fill(pixmap, colors.background);
    fill_rect(pixmap, frame.marker, colors.marker);
    for &tick in &frame.hour_ticks {
        fill_rect(pixmap, tick, colors.hour_tick);
    }
    for &mark in &frame.highlights {
        fill_rect(pixmap, mark, colors.highlight);
    }
}

/// Copy RGBA premul -> BGRA (ARGB8888 on LE)
pub fn copy_to_argb(canvas: &mut [u8], pixmap: &Pixmap) {
    for (dst, src) in canvas.chunks_exact_mut(4).zip(pixmap.data().chunks_exact(4)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
        dst[3] = src[3];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> [u8; 4] {
        let i = (y * pixmap.width() + x) as usize * 4;
        let d = pixmap.data();
        [d[i], d[i + 1], d[i + 2], d[i + 3]]
    }

    #[test]
    fn test_fill_rect_clips_negative_origin() {
        let mut pm = Pixmap::new(10, 4).unwrap();
        fill_rect(&mut pm, Rect { x: -3, y: 0, w: 6, h: 4 }, [1, 2, 3]);
        assert_eq!(pixel(&pm, 0, 0), [1, 2, 3, 0xff]);
        assert_eq!(pixel(&pm, 2, 3), [1, 2, 3, 0xff]);
        assert_eq!(pixel(&pm, 3, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_fill_rect_clips_far_edge() {
        let mut pm = Pixmap::new(4, 10).unwrap();
        fill_rect(&mut pm, Rect { x: 0, y: 8, w: 4, h: 6 }, [9, 9, 9]);
        assert_eq!(pixel(&pm, 3, 9), [9, 9, 9, 0xff]);
        assert_eq!(pixel(&pm, 3, 7), [0, 0, 0, 0]);
        fill_rect(&mut pm, Rect { x: 0, y: 50, w: 4, h: 6 }, [7, 7, 7]);
    }

    #[test]
    fn test_paint_frame_layers() {
        let colors = Colors::default();
        let frame = Frame {
            marker: Rect { x: 10, y: 0, w: 6, h: 4 },
            hour_ticks: vec![Rect { x: 12, y: 0, w: 2, h: 4 }],
            highlights: vec![Rect { x: 30, y: 0, w: 2, h: 4 }],
        };
        let mut pm = Pixmap::new(48, 4).unwrap();
        paint_frame(&mut pm, &frame, &colors);

        let rgb = |p: [u8; 4]| [p[0], p[1], p[2]];
        assert_eq!(rgb(pixel(&pm, 0, 0)), colors.background);
        assert_eq!(rgb(pixel(&pm, 10, 2)), colors.marker);
        assert_eq!(rgb(pixel(&pm, 12, 2)), colors.hour_tick);
        assert_eq!(rgb(pixel(&pm, 15, 2)), colors.marker);
        assert_eq!(rgb(pixel(&pm, 31, 3)), colors.highlight);
        assert_eq!(pixel(&pm, 40, 1)[3], 0xff);
    }

    #[test]
    fn test_blend_glyph_clips_and_blends() {
        let mut pm = Pixmap::new(4, 4).unwrap();
        // 2x2 glyph hanging off the top-left corner
        let mask = [255u8, 255, 255, 128];
        blend_glyph(&mut pm, Rect { x: -1, y: -1, w: 2, h: 2 }, |i| ([200, 100, 0], mask[i]));
        assert_eq!(pixel(&pm, 0, 0), [100, 50, 0, 128]);
        assert_eq!(pixel(&pm, 1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn test_blend_glyph_over_opaque_and_off_far_edge() {
        let mut pm = Pixmap::new(4, 4).unwrap();
        fill(&mut pm, [0, 0, 0]);
        blend_glyph(&mut pm, Rect { x: 3, y: 3, w: 3, h: 3 }, |_| ([0, 255, 0], 255));
        assert_eq!(pixel(&pm, 3, 3), [0, 255, 0, 0xff]);
        assert_eq!(pixel(&pm, 2, 3), [0, 0, 0, 0xff]);
        blend_glyph(&mut pm, Rect { x: 9, y: -9, w: 3, h: 3 }, |_| ([255, 0, 0], 255));
    }

    #[test]
    fn test_border_and_argb_copy() {
        let mut pm = Pixmap::new(5, 3).unwrap();
        fill(&mut pm, [0, 0, 0]);
        stroke_border(&mut pm, [0xff, 0x00, 0x80]);
        assert_eq!(pixel(&pm, 4, 2), [0xff, 0x00, 0x80, 0xff]);
        assert_eq!(pixel(&pm, 2, 1), [0, 0, 0, 0xff]);

        let mut canvas = vec![0u8; 5 * 3 * 4];
        copy_to_argb(&mut canvas, &pm);
        assert_eq!(&canvas[0..4], &[0x80, 0x00, 0xff, 0xff]);
    }
}
