use image::{imageops, RgbaImage};
use tracing::debug;

use crate::color::Rgb;
use crate::error::{BurnerError, Result};
use crate::furigana::{has_kanji, split_kana_affixes};
use crate::subtitle::RubyToken;
use super::font::FontFace;
use super::{SubtitleRenderer, TextMeasurer, TextStyle};

/// Horizontal placement of one token inside the rendered line
#[derive(Debug, Clone, PartialEq)]
pub struct TokenColumn {
    /// Left edge of the column relative to the text origin
    pub x: f32,
    pub width: f32,
    /// Main text offset inside the column
    pub text_x: f32,
    /// Ruby offset inside the column
    pub ruby_x: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RubyLayout {
    pub columns: Vec<TokenColumn>,
    pub main_height: f32,
    /// Ruby text height plus the gap above the main text, 0 without ruby
    pub ruby_row: f32,
    pub stroke: f32,
}

impl RubyLayout {
    pub fn compute(tokens: &[RubyToken], style: &TextStyle, measurer: &dyn TextMeasurer) -> Self {
        let mut columns = Vec::with_capacity(tokens.len());
        let mut main_height = 0.0f32;
        let mut ruby_height = 0.0f32;
        let mut x = 0.0f32;

        for token in tokens {
            let (main_w, main_h) = measurer.measure(&token.text, style.main_size);
            main_height = main_height.max(main_h);

            let Some(ruby) = token.ruby.as_deref().filter(|r| !r.is_empty()) else {
                columns.push(TokenColumn {
                    x,
                    width: main_w,
                    text_x: 0.0,
                    ruby_x: 0.0,
                });
                x += main_w;
                continue;
            };

            let (ruby_w, ruby_h) = measurer.measure(ruby, style.ruby_size);
            ruby_height = ruby_height.max(ruby_h);

            // ruby sits over the kanji core, not the okurigana
            let (prefix_w, core_w, span) = if has_kanji(&token.text) {
                let (prefix, core, suffix) = split_kana_affixes(&token.text);
                if prefix.is_empty() && suffix.is_empty() {
                    (0.0, main_w, ruby_w)
                } else {
                    let prefix_w = measurer.measure(prefix, style.main_size).0;
                    let core_w = measurer.measure(core, style.main_size).0;
                    let suffix_w = measurer.measure(suffix, style.main_size).0;
                    (prefix_w, core_w, prefix_w + ruby_w.max(core_w) + suffix_w)
                }
            } else {
                (0.0, main_w, ruby_w)
            };

            let width = main_w.max(span);
            let text_x = (width - main_w) / 2.0;
            let ruby_x = (text_x + prefix_w + core_w / 2.0 - ruby_w / 2.0).max(0.0);

            columns.push(TokenColumn {
                x,
                width,
                text_x,
                ruby_x,
            });
            x += width;
        }

        let ruby_row = if ruby_height > 0.0 {
            ruby_height + style.ruby_size * style.ruby_spacing
        } else {
            0.0
        };

        Self {
            columns,
            main_height,
            ruby_row,
            stroke: style.stroke_width as f32,
        }
    }

    pub fn text_width(&self) -> f32 {
        self.columns.last().map(|c| c.x + c.width).unwrap_or(0.0)
    }

    /// Size of the text block including the outline, without padding
    pub fn size(&self) -> (f32, f32) {
        (
            self.text_width() + self.stroke * 2.0,
            self.main_height + self.ruby_row + self.stroke * 2.0,
        )
    }
}

/// Measured `(width, height)` of a token line
pub fn measure_tokens(tokens: &[RubyToken], style: &TextStyle, measurer: &dyn TextMeasurer) -> (f32, f32) {
    RubyLayout::compute(tokens, style, measurer).size()
}

/// Scale `image` down to fit `max_width` x `max_height`, keeping the aspect ratio
pub fn fit_image(image: RgbaImage, max_width: u32, max_height: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image;
    }

    let scale = (max_width as f32 / width as f32).min(max_height as f32 / height as f32);
    let new_width = ((width as f32 * scale).floor() as u32).max(1);
    let new_height = ((height as f32 * scale).floor() as u32).max(1);
    debug!("Scaling subtitle image {}x{} -> {}x{}", width, height, new_width, new_height);

    imageops::resize(&image, new_width, new_height, imageops::FilterType::Lanczos3)
}

pub struct RubyRenderer {
    face: FontFace,
    style: TextStyle,
}

impl RubyRenderer {
    pub fn new(face: FontFace, style: TextStyle) -> Self {
        Self { face, style }
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    pub fn face(&self) -> &FontFace {
        &self.face
    }

    pub fn measure(&self, tokens: &[RubyToken]) -> (f32, f32) {
        measure_tokens(tokens, &self.style, &self.face)
    }

    /// Render a token line onto a transparent canvas with padding on every side
    pub fn render(&self, tokens: &[RubyToken]) -> Result<RgbaImage> {
        if tokens.iter().all(RubyToken::is_blank) {
            return Err(BurnerError::Render("Nothing to render".to_string()));
        }

        let layout = RubyLayout::compute(tokens, &self.style, &self.face);
        let (width, height) = layout.size();
        let padding = self.style.padding();
        let mut canvas = RgbaImage::new(width.ceil() as u32 + padding * 2, height.ceil() as u32 + padding * 2);

        let origin_x = padding as f32 + layout.stroke;
        let ruby_y = padding as f32 + layout.stroke;
        let main_y = ruby_y + layout.ruby_row;

        let mut runs: Vec<(&str, f32, f32, f32, Rgb)> = Vec::new();
        for (token, column) in tokens.iter().zip(&layout.columns) {
            let color = token.color.unwrap_or(self.style.text_color);
            if let Some(ruby) = token.ruby.as_deref().filter(|r| !r.is_empty()) {
                runs.push((ruby, self.style.ruby_size, origin_x + column.x + column.ruby_x, ruby_y, color));
            }
            runs.push((token.text.as_str(), self.style.main_size, origin_x + column.x + column.text_x, main_y, color));
        }

        let masks: Vec<_> = runs
            .iter()
            .filter(|(text, ..)| !text.trim().is_empty())
            .map(|(text, px, x, y, color)| (self.face.rasterize(text, *px), x.round() as i64, y.round() as i64, *color))
            .collect();

        // outlines first so no stroke covers a neighbouring fill
        let stroke = self.style.stroke_width;
        if stroke > 0 {
            for (mask, x, y, _) in &masks {
                mask.dilate(stroke)
                    .composite(&mut canvas, x - stroke as i64, y - stroke as i64, self.style.stroke_color);
            }
        }
        for (mask, x, y, color) in &masks {
            mask.composite(&mut canvas, *x, *y, *color);
        }

        Ok(canvas)
    }

    /// Render and shrink to the slot if the line is still too large
    pub fn render_fitted(&self, tokens: &[RubyToken], max_width: u32, max_height: u32) -> Result<RgbaImage> {
        Ok(fit_image(self.render(tokens)?, max_width, max_height))
    }
}

impl SubtitleRenderer for RubyRenderer {
    fn style(&self) -> &TextStyle {
        &self.style
    }

    fn measurer(&self) -> &dyn TextMeasurer {
        &self.face
    }

    fn render_fitted(&self, tokens: &[RubyToken], max_width: u32, max_height: u32) -> Result<RgbaImage> {
        RubyRenderer::render_fitted(self, tokens, max_width, max_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::monospace;
    use crate::render::font::find_font;

    fn style() -> TextStyle {
        TextStyle {
            main_size: 40.0,
            ruby_size: 20.0,
            stroke_width: 2,
            ruby_spacing: 0.5,
            ..TextStyle::default()
        }
    }

    #[test]
    fn test_plain_line_has_no_ruby_row() {
        let layout = RubyLayout::compute(&[RubyToken::plain("abc")], &style(), &monospace());
        assert_eq!(layout.ruby_row, 0.0);
        assert_eq!(layout.size(), (124.0, 44.0));
    }

    #[test]
    fn test_ruby_wider_than_text_widens_column() {
        // 2 kanji at 40px = 80, 4 kana at 20px = 80
        let tokens = [RubyToken::with_ruby("今日", "きょうは"), RubyToken::plain("は")];
        let layout = RubyLayout::compute(&tokens, &style(), &monospace());

        assert_eq!(layout.columns[0].width, 80.0);
        assert_eq!(layout.columns[1].x, 80.0);

        let tokens = [RubyToken::with_ruby("東京", "とうきょうと")];
        let layout = RubyLayout::compute(&tokens, &style(), &monospace());
        assert_eq!(layout.columns[0].width, 120.0);
        assert_eq!(layout.columns[0].text_x, 20.0);
        assert_eq!(layout.columns[0].ruby_x, 0.0);
        // ruby 20px + gap 10px
        assert_eq!(layout.ruby_row, 30.0);
        assert_eq!(layout.size(), (124.0, 74.0));
    }

    #[test]
    fn test_ruby_centered_over_core_of_affixed_token() {
        let tokens = [RubyToken::with_ruby("食べる", "た")];
        let layout = RubyLayout::compute(&tokens, &style(), &monospace());
        let column = &layout.columns[0];

        assert_eq!(column.width, 120.0);
        assert_eq!(column.text_x, 0.0);
        // core 食 spans 0..40, ruby is 20 wide
        assert_eq!(column.ruby_x, 10.0);
    }

    #[test]
    fn test_long_ruby_on_affixed_token_spans_prefix_and_suffix() {
        // prefix お 40, core 茶 40, ruby 8 chars 160
        let tokens = [RubyToken::with_ruby("お茶だ", "ちゃちゃちゃちゃ")];
        let layout = RubyLayout::compute(&tokens, &style(), &monospace());
        let column = &layout.columns[0];

        assert_eq!(column.width, 40.0 + 160.0 + 40.0);
        assert_eq!(column.text_x, 60.0);
        assert_eq!(column.ruby_x, 40.0);
    }

    #[test]
    fn test_fit_image_keeps_aspect_ratio() {
        let image = RgbaImage::new(400, 100);
        let fitted = fit_image(image, 200, 200);
        assert_eq!(fitted.dimensions(), (200, 50));

        let small = RgbaImage::new(50, 20);
        assert_eq!(fit_image(small, 200, 200).dimensions(), (50, 20));
    }

    #[test]
    fn test_render_with_installed_font() {
        let Ok(face) = find_font(None, &[]) else {
            eprintln!("no font installed, skipping");
            return;
        };
        let renderer = RubyRenderer::new(face, style());
        let tokens = [RubyToken::with_ruby("空", "そら"), RubyToken::plain("だ")];

        let image = renderer.render(&tokens).unwrap();
        let (width, height) = renderer.measure(&tokens);
        let padding = renderer.style().padding();
        assert_eq!(image.width(), width.ceil() as u32 + padding * 2);
        assert_eq!(image.height(), height.ceil() as u32 + padding * 2);
        assert!(image.pixels().any(|p| p[3] > 0));
        // padding stays transparent
        assert_eq!(image.get_pixel(0, 0)[3], 0);

        assert!(renderer.render(&[RubyToken::plain("  ")]).is_err());
    }
}
