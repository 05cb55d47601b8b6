use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tiny_skia::{Pixmap, PixmapPaint, PremultipliedColorU8, Transform};

pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes =
        std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("parsing font {}: {e}", path.display()))
}

/// Rasterises `text` into a tight, transparent, premultiplied pixmap.
/// Returns `None` for text with no visible glyphs.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: [u8; 4],
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * color[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let bg = dst[i];
            // Source-over in premultiplied space.
            let inv = 1.0 - a;
            let blend = |s: u8, d: u8| (s as f32 * a + d as f32 * inv).min(255.0) as u8;
            let out_a = blend(255, bg.alpha()).max(sa);
            let r = blend(color[0], bg.red()).min(out_a);
            let g = blend(color[1], bg.green()).min(out_a);
            let bl = blend(color[2], bg.blue()).min(out_a);
            if let Some(px) = PremultipliedColorU8::from_rgba(r, g, bl, out_a) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub color: [u8; 4],
}

impl TextStyle {
    pub const fn new(size: f32, color: [u8; 4]) -> Self {
        Self { size, color }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: String,
    size_bits: u32,
    color: [u8; 4],
}

/// Draws cached text runs. Without a font every draw is a no-op, so the
/// rest of the frame still renders.
pub struct Typesetter {
    font: Option<FontArc>,
    cache: HashMap<TextKey, Arc<Pixmap>>,
}

impl Typesetter {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            font,
            cache: HashMap::new(),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn cached_runs(&self) -> usize {
        self.cache.len()
    }

    fn get_or_render(&mut self, text: &str, style: TextStyle) -> Option<Arc<Pixmap>> {
        let font = self.font.as_ref()?;
        let key = TextKey {
            text: text.to_owned(),
            size_bits: style.size.to_bits(),
            color: style.color,
        };
        if let Some(pm) = self.cache.get(&key) {
            return Some(Arc::clone(pm));
        }
        let pm = Arc::new(render_text_pixmap(text, style.size, font, style.color)?);
        self.cache.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    /// Draws `text` vertically centred on `pos`, aligned by `anchor`, then
    /// rotated by `rotation_deg` around `pos`. Returns whether anything was drawn.
    pub fn draw(
        &mut self,
        canvas: &mut Pixmap,
        text: &str,
        style: TextStyle,
        anchor: Anchor,
        pos: (f32, f32),
        rotation_deg: f32,
    ) -> bool {
        let Some(cached) = self.get_or_render(text, style) else {
            return false;
        };
        let pm: &Pixmap = &cached;
        let (w, h) = (pm.width() as f32, pm.height() as f32);
        let x = match anchor {
            Anchor::Left => pos.0,
            Anchor::Center => pos.0 - w * 0.5,
            Anchor::Right => pos.0 - w,
        };
        let y = pos.1 - h * 0.5;
        let transform = if rotation_deg == 0.0 {
            Transform::identity()
        } else {
            Transform::from_rotate_at(rotation_deg, pos.0, pos.1)
        };
        canvas.draw_pixmap(
            x.round() as i32,
            y.round() as i32,
            pm.as_ref(),
            &PixmapPaint::default(),
            transform,
            None,
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn without_font_nothing_is_drawn() {
        let mut ts = Typesetter::new(None);
        let mut canvas = Pixmap::new(64, 32).unwrap();
        let drawn = ts.draw(
            &mut canvas,
            "Click!",
            TextStyle::new(24.0, [255, 255, 255, 255]),
            Anchor::Center,
            (32.0, 16.0),
            0.0,
        );
        assert!(!drawn);
        assert!(!ts.has_font());
        assert_eq!(ts.cached_runs(), 0);
        assert!(canvas.pixels().iter().all(|p| p.alpha() == 0));
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let err = load_font(Path::new("/nonexistent/reflex-font.ttf")).unwrap_err();
        assert!(err.to_string().contains("reflex-font.ttf"));
    }

    #[test]
    fn garbage_font_bytes_are_rejected() {
        let mut file = tempfile::Builder::new().suffix(".ttf").tempfile().unwrap();
        file.write_all(b"not a font").unwrap();
        let err = load_font(file.path()).unwrap_err();
        assert!(err.to_string().contains("parsing font"));
    }
}
