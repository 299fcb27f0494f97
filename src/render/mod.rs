//! Ruby text layout and rasterization.
//!
//! Text is measured through the [`TextMeasurer`] trait so layout and
//! line fitting can be exercised without a font file. [`FontFace`]
//! provides the real implementation on top of `ab_glyph`.

pub mod fit;
pub mod font;
pub mod ruby;

use image::RgbaImage;

use crate::color::Rgb;
use crate::config::StyleConfig;
use crate::error::Result;
use crate::subtitle::RubyToken;

pub use fit::{auto_split_segments, FitOptions};
pub use font::{find_font, FontFace, FONT_SEARCH_PATHS};
pub use ruby::{RubyLayout, RubyRenderer};

/// Minimum transparent border around a rendered subtitle image
pub const RENDER_PADDING: u32 = 16;

pub trait TextMeasurer {
    /// `(width, height)` of `text` at `px` pixels
    fn measure(&self, text: &str, px: f32) -> (f32, f32);
}

/// Turns a line of ruby tokens into a subtitle image
pub trait SubtitleRenderer {
    fn style(&self) -> &TextStyle;

    /// Measurer matching what [`SubtitleRenderer::render_fitted`] draws with
    fn measurer(&self) -> &dyn TextMeasurer;

    /// Render `tokens`, scaled down to fit `max_width` x `max_height`
    fn render_fitted(&self, tokens: &[RubyToken], max_width: u32, max_height: u32) -> Result<RgbaImage>;
}

#[derive(Debug, Clone)]
pub struct TextStyle {
    pub main_size: f32,
    pub ruby_size: f32,
    pub text_color: Rgb,
    pub stroke_color: Rgb,
    pub stroke_width: u32,
    /// Gap between ruby and main text as a fraction of `ruby_size`
    pub ruby_spacing: f32,
}

impl TextStyle {
    pub fn from_config(style: &StyleConfig) -> Self {
        Self {
            main_size: style.main_font_size as f32,
            ruby_size: style.furigana_font_size as f32,
            text_color: style.text_color,
            stroke_color: style.stroke_color,
            stroke_width: style.stroke_width,
            ruby_spacing: style.furigana_spacing,
        }
    }

    pub fn padding(&self) -> u32 {
        RENDER_PADDING.max(self.stroke_width * 2)
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self::from_config(&StyleConfig::default())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::TextMeasurer;

    /// Every character is `px * ratio` wide and `px` tall
    pub struct FixedMeasurer {
        pub ratio: f32,
    }

    impl TextMeasurer for FixedMeasurer {
        fn measure(&self, text: &str, px: f32) -> (f32, f32) {
            (text.chars().count() as f32 * px * self.ratio, px)
        }
    }

    pub fn monospace() -> FixedMeasurer {
        FixedMeasurer { ratio: 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_grows_with_stroke() {
        let mut style = TextStyle::default();
        assert_eq!(style.padding(), 16);
        style.stroke_width = 12;
        assert_eq!(style.padding(), 24);
    }

    #[test]
    fn test_style_from_config() {
        let style = TextStyle::from_config(&StyleConfig {
            main_font_size: 60,
            furigana_font_size: 30,
            ..StyleConfig::default()
        });
        assert_eq!(style.main_size, 60.0);
        assert_eq!(style.ruby_size, 30.0);
        assert_eq!(style.text_color, Rgb::WHITE);
        assert_eq!(style.stroke_width, 2);
    }
}
