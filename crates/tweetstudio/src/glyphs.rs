//! 8x8 bitmap glyph text for the software card renderer and the watermark.

use crate::bitmap::Bitmap;
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS, MISC_FONTS};

/// Glyph cell edge in unscaled pixels
pub const GLYPH_SIZE: u32 = 8;

fn glyph(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| MISC_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0u8; 8])
}

/// Width in pixels of `text` drawn at `scale`
#[must_use]
pub fn text_width(text: &str, scale: u32) -> u32 {
    (text.chars().count() as u32) * GLYPH_SIZE * scale.max(1)
}

/// Draw a single line of text with its top-left corner at `(x, y)`.
///
/// Only foreground bits are painted; the color's alpha is honored.
pub fn draw_text(bitmap: &mut Bitmap, x: u32, y: u32, text: &str, scale: u32, rgba: [u8; 4]) {
    let scale = scale.max(1);
    let mut cursor_x = x;
    for ch in text.chars() {
        if cursor_x >= bitmap.width() {
            break;
        }
        if !ch.is_whitespace() {
            draw_char(bitmap, cursor_x, y, ch, scale, rgba);
        }
        cursor_x = cursor_x.saturating_add(GLYPH_SIZE * scale);
    }
}

fn draw_char(bitmap: &mut Bitmap, x: u32, y: u32, ch: char, scale: u32, rgba: [u8; 4]) {
    for (row_idx, row) in glyph(ch).iter().enumerate() {
        for bit in 0..GLYPH_SIZE {
            // font8x8 stores the leftmost pixel in the least significant bit
            if (row >> bit) & 1 == 0 {
                continue;
            }
            let px = x + bit * scale;
            let py = y + (row_idx as u32) * scale;
            if rgba[3] == 255 {
                bitmap.fill_rect(px, py, scale, scale, rgba);
            } else {
                bitmap.blend_rect(px, py, scale, scale, rgba);
            }
        }
    }
}

/// Greedy word wrap into lines of at most `max_cols` characters.
///
/// Explicit newlines are kept; words longer than a line are hard-split.
#[must_use]
pub fn wrap(text: &str, max_cols: usize) -> Vec<String> {
    let max_cols = max_cols.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        let mut line_len = 0usize;
        for word in paragraph.split(' ') {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_cols {
                if line_len > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_len = 0;
                }
                let rest = word.split_off(max_cols);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let needed = if line_len == 0 {
                word.len()
            } else {
                line_len + 1 + word.len()
            };
            if needed > max_cols && line_len > 0 {
                lines.push(std::mem::take(&mut line));
                line_len = 0;
            }
            if line_len > 0 {
                line.push(' ');
                line_len += 1;
            }
            line.extend(word.iter());
            line_len += word.len();
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("abc", 1), 24);
        assert_eq!(text_width("abc", 3), 72);
        assert_eq!(text_width("", 2), 0);
        assert_eq!(text_width("é", 0), 8);
    }

    #[test]
    fn test_draw_text_paints_foreground_only() {
        let mut bmp = Bitmap::filled(16, 8, [0, 0, 0, 255]);
        draw_text(&mut bmp, 0, 0, "H", 1, [255, 255, 255, 255]);
        let lit = bmp.pixels().filter(|p| p[0] == 255).count();
        assert!(lit > 0);
        // second cell untouched
        for x in 8..16 {
            for y in 0..8 {
                assert_eq!(bmp.pixel(x, y), [0, 0, 0, 255]);
            }
        }
    }

    #[test]
    fn test_draw_text_scaled_and_clipped() {
        let mut bmp = Bitmap::filled(10, 10, [0, 0, 0, 255]);
        draw_text(&mut bmp, 4, 4, "WW", 4, [255, 0, 0, 255]);
        assert_eq!(bmp.dimensions(), (10, 10));
    }

    #[test]
    fn test_wrap_words() {
        let lines = wrap("the quick brown fox", 10);
        assert_eq!(lines, vec!["the quick", "brown fox"]);
    }

    #[test]
    fn test_wrap_keeps_newlines_and_splits_long_words() {
        let lines = wrap("ab\nabcdefgh", 3);
        assert_eq!(lines, vec!["ab", "abc", "def", "gh"]);
    }

    #[test]
    fn test_wrap_empty() {
        assert_eq!(wrap("", 5), vec![String::new()]);
    }
}
