use ab_glyph::{point, Font, FontArc, FontVec, PxScale, ScaleFont};
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::color::Rgb;
use crate::error::{BurnerError, Result};
use super::TextMeasurer;

/// System font files tried after the configured and local font directories
pub const FONT_SEARCH_PATHS: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
    "/usr/share/fonts/truetype/takao-gothic/TakaoPGothic.ttf",
    "/usr/share/fonts/truetype/vlgothic/VL-Gothic-Regular.ttf",
    "/usr/share/fonts/opentype/ipafont-gothic/ipagp.ttf",
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/Library/Fonts/Arial Unicode.ttf",
    "C:\\Windows\\Fonts\\msgothic.ttc",
    "C:\\Windows\\Fonts\\meiryo.ttc",
    "C:\\Windows\\Fonts\\YuGothM.ttc",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
];

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "ttc"];

const COVERAGE_PROBE: &[char] = &['あ', 'ア', '漢', '字'];

pub struct FontFace {
    font: FontArc,
    path: PathBuf,
}

impl FontFace {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec_and_index(data, 0)
            .map_err(|e| BurnerError::Font(format!("Failed to parse font {}: {}", path.display(), e)))?;

        Ok(Self {
            font: FontArc::new(font),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.font.glyph_id(c).0 != 0
    }

    /// Font has glyphs for hiragana, katakana and kanji
    pub fn covers_japanese(&self) -> bool {
        COVERAGE_PROBE.iter().all(|c| self.has_glyph(*c))
    }

    /// Coverage mask of `text` with the line's top-left at the origin
    pub fn rasterize(&self, text: &str, px: f32) -> GlyphMask {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let (width, height) = self.measure(text, px);
        let mut mask = GlyphMask::new(width.ceil() as u32 + 1, height.ceil() as u32 + 1);

        let ascent = scaled.ascent();
        let mut caret = 0.0f32;
        let mut previous = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, ascent));
            caret += scaled.h_advance(id);
            previous = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let x = bounds.min.x as i64 + gx as i64;
                let y = bounds.min.y as i64 + gy as i64;
                mask.accumulate(x, y, coverage);
            });
        }

        mask
    }
}

impl TextMeasurer for FontFace {
    fn measure(&self, text: &str, px: f32) -> (f32, f32) {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0f32;
        let mut previous = None;

        for c in text.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = previous {
                width += scaled.kern(prev, id);
            }
            width += scaled.h_advance(id);
            previous = Some(id);
        }

        (width.max(0.0), scaled.ascent() - scaled.descent())
    }
}

/// Per-pixel glyph coverage in `0.0..=1.0`
#[derive(Debug, Clone)]
pub struct GlyphMask {
    pub width: u32,
    pub height: u32,
    data: Vec<f32>,
}

impl GlyphMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width as usize) * (height as usize)],
        }
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.data[(y * self.width + x) as usize]
    }

    fn accumulate(&mut self, x: i64, y: i64, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = (y as u32 * self.width + x as u32) as usize;
        self.data[idx] = (self.data[idx] + coverage).min(1.0);
    }

    /// Grow the mask by `radius` pixels in every direction.
    ///
    /// The result is `2 * radius` larger on each axis and stamps the
    /// source at every offset inside the radius circle.
    pub fn dilate(&self, radius: u32) -> GlyphMask {
        let r = radius as i64;
        let mut out = GlyphMask::new(self.width + radius * 2, self.height + radius * 2);
        if radius == 0 {
            out.data.clone_from(&self.data);
            return out;
        }

        let offsets: Vec<(i64, i64)> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| (dx, dy)))
            .filter(|(dx, dy)| dx * dx + dy * dy <= r * r)
            .collect();

        for y in 0..self.height {
            for x in 0..self.width {
                let coverage = self.get(x, y);
                if coverage <= 0.0 {
                    continue;
                }
                for (dx, dy) in &offsets {
                    let idx = ((y as i64 + r + dy) * out.width as i64 + (x as i64 + r + dx)) as usize;
                    if out.data[idx] < coverage {
                        out.data[idx] = coverage;
                    }
                }
            }
        }
        out
    }

    /// Source-over `color` through this mask onto `canvas` at `(x, y)`
    pub fn composite(&self, canvas: &mut RgbaImage, x: i64, y: i64, color: Rgb) {
        for my in 0..self.height {
            let cy = y + my as i64;
            if cy < 0 || cy >= canvas.height() as i64 {
                continue;
            }
            for mx in 0..self.width {
                let cx = x + mx as i64;
                if cx < 0 || cx >= canvas.width() as i64 {
                    continue;
                }
                let alpha = self.get(mx, my);
                if alpha <= 0.0 {
                    continue;
                }

                let pixel = canvas.get_pixel_mut(cx as u32, cy as u32);
                let dst_a = pixel[3] as f32 / 255.0;
                let out_a = alpha + dst_a * (1.0 - alpha);
                for c in 0..3 {
                    let src = color.0[c] as f32;
                    let dst = pixel[c] as f32;
                    let value = (src * alpha + dst * dst_a * (1.0 - alpha)) / out_a;
                    pixel[c] = value.round().clamp(0.0, 255.0) as u8;
                }
                pixel[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

fn font_files_in(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| FONT_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Ordered list of font files to try
pub fn font_candidates(configured: Option<&Path>, font_dirs: &[PathBuf]) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    candidates.extend(configured.map(Path::to_path_buf));
    for dir in font_dirs {
        candidates.extend(font_files_in(dir));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".local/share/fonts/NotoSansJP-Regular.otf"));
    }
    candidates.extend(FONT_SEARCH_PATHS.iter().map(PathBuf::from));
    candidates
}

/// First candidate that loads and covers Japanese text.
///
/// A font without Japanese glyphs is only used when nothing else loads.
pub fn find_font(configured: Option<&Path>, font_dirs: &[PathBuf]) -> Result<FontFace> {
    let mut last_resort: Option<FontFace> = None;

    for candidate in font_candidates(configured, font_dirs) {
        if !candidate.exists() {
            if configured == Some(candidate.as_path()) {
                warn!("Configured font not found: {}", candidate.display());
            }
            continue;
        }

        match FontFace::load(&candidate) {
            Ok(face) if face.covers_japanese() => {
                info!("Using font: {}", candidate.display());
                return Ok(face);
            }
            Ok(face) => {
                debug!("Font lacks Japanese glyphs: {}", candidate.display());
                if last_resort.is_none() {
                    last_resort = Some(face);
                }
            }
            Err(e) => debug!("Skipping font {}: {}", candidate.display(), e),
        }
    }

    match last_resort {
        Some(face) => {
            warn!(
                "No Japanese font found, falling back to {} (kanji may render as boxes)",
                face.path().display()
            );
            Ok(face)
        }
        None => Err(BurnerError::Font(
            "No usable font found. Set style.font_path or run `furigana-burner check --download-font`".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn any_installed_font() -> Option<FontFace> {
        find_font(None, &[]).ok()
    }

    #[test]
    fn test_dilate_grows_mask() {
        let mut mask = GlyphMask::new(1, 1);
        mask.accumulate(0, 0, 1.0);

        let grown = mask.dilate(2);
        assert_eq!((grown.width, grown.height), (5, 5));
        assert_eq!(grown.get(2, 2), 1.0);
        assert_eq!(grown.get(0, 2), 1.0);
        assert_eq!(grown.get(2, 4), 1.0);
        // corners fall outside the radius circle
        assert_eq!(grown.get(0, 0), 0.0);
    }

    #[test]
    fn test_composite_source_over() {
        let mut canvas = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 0]));
        let mut mask = GlyphMask::new(2, 1);
        mask.accumulate(0, 0, 1.0);
        mask.accumulate(1, 0, 0.5);

        mask.composite(&mut canvas, 0, 0, Rgb([200, 100, 50]));
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([200, 100, 50, 255]));
        assert_eq!(canvas.get_pixel(1, 0)[3], 128);
        assert_eq!(canvas.get_pixel(1, 0)[0], 200);

        // opaque white under a half-covered black pixel turns grey
        let mut canvas = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let mut mask = GlyphMask::new(1, 1);
        mask.accumulate(0, 0, 0.5);
        mask.composite(&mut canvas, 0, 0, Rgb::BLACK);
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn test_composite_clips_to_canvas() {
        let mut canvas = RgbaImage::new(2, 2);
        let mut mask = GlyphMask::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                mask.accumulate(x, y, 1.0);
            }
        }
        mask.composite(&mut canvas, -1, 1, Rgb::WHITE);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(1, 1)[3], 255);
    }

    #[test]
    fn test_candidates_start_with_configured_and_local_fonts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.otf"), b"").unwrap();
        std::fs::write(dir.path().join("a.ttf"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let configured = PathBuf::from("/custom/font.ttc");
        let candidates = font_candidates(Some(&configured), &[dir.path().to_path_buf()]);

        assert_eq!(candidates[0], configured);
        assert_eq!(candidates[1], dir.path().join("a.ttf"));
        assert_eq!(candidates[2], dir.path().join("b.otf"));
        assert!(candidates.iter().all(|c| !c.ends_with("notes.txt")));
    }

    #[test]
    fn test_invalid_font_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(matches!(FontFace::load(&path), Err(BurnerError::Font(_))));
    }

    #[test]
    fn test_installed_font_measures_and_rasterizes() {
        let Some(face) = any_installed_font() else {
            eprintln!("no font installed, skipping");
            return;
        };

        let (narrow, height) = face.measure("i", 32.0);
        let (wide, _) = face.measure("iiii", 32.0);
        assert!(height > 0.0);
        assert!(wide > narrow);

        let mask = face.rasterize("H", 32.0);
        let inked = (0..mask.height)
            .flat_map(|y| (0..mask.width).map(move |x| (x, y)))
            .filter(|(x, y)| mask.get(*x, *y) > 0.0)
            .count();
        assert!(inked > 0);
    }
}
