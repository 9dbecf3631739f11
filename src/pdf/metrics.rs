//! Text measurement for the built-in Helvetica faces.
//!
//! printpdf exposes no string metrics, so the layout engine carries the
//! standard Helvetica advance widths (1/1000 em units) itself. Accented
//! Latin-1 letters measure as their base letter, which holds for the
//! Helvetica design.

/// Points to millimeters.
pub const PT_TO_MM: f32 = 25.4 / 72.0;

/// Advance widths for ASCII 32..=126, in 1/1000 em.
#[rustfmt::skip]
const ASCII_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

const DEFAULT_WIDTH: u16 = 556;

fn base_letter(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        'Á' | 'À' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
        'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
        'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
        'Ç' => 'C',
        'Ñ' => 'N',
        other => other,
    }
}

/// Advance width of one character, in 1/1000 em.
pub fn char_width_units(c: char) -> u16 {
    let c = base_letter(c);
    let code = c as u32;
    if (32..=126).contains(&code) {
        return ASCII_WIDTHS[(code - 32) as usize];
    }
    match c {
        '°' => 400,
        'ª' | 'º' => 333,
        '·' => 278,
        _ => DEFAULT_WIDTH,
    }
}

/// Rendered width of `text` at `font_size` points, in millimeters.
pub fn text_width_mm(text: &str, font_size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| char_width_units(c) as u32).sum();
    units as f32 / 1000.0 * font_size * PT_TO_MM
}

/// Transliterate `text` into the WinAnsi repertoire the built-in fonts
/// encode. Unrepresentable characters become `?` instead of failing the
/// render; a few typographic characters degrade to ASCII lookalikes.
pub fn sanitize_winansi(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{00A0}' => ' ',
            c if (c as u32) < 0x20 => ' ',
            c if (0x7F..0xA0).contains(&(c as u32)) => '?',
            c if (c as u32) <= 0xFF => c,
            _ => '?',
        })
        .collect()
}
