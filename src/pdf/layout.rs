//! Table geometry and cell styling decisions, kept free of drawing calls so
//! every rule is unit-testable.

use crate::config::SpecLimits;
use crate::models::parse_comma_decimal;
use crate::pdf::metrics::text_width_mm;

/// A4 landscape geometry, millimeters.
pub const PAGE_WIDTH_MM: f32 = 297.0;
pub const PAGE_HEIGHT_MM: f32 = 210.0;
pub const PAGE_MARGIN_MM: f32 = 10.0;
/// Printable width between the side margins.
pub const USABLE_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * PAGE_MARGIN_MM;
/// Rows stop this far above the bottom edge; the footer band lives there.
pub const BOTTOM_GUARD_MM: f32 = 15.0;

pub const TABLE_FONT_SIZE: f32 = 8.0;
pub const DEFAULT_ROW_HEIGHT_MM: f32 = 8.0;
/// Row height multiplier for rows carrying a soft-wrapped address cell.
pub const WRAP_ROW_FACTOR: f32 = 1.8;
/// Line advance inside a soft-wrapped address cell.
pub const WRAP_LINE_HEIGHT_MM: f32 = 4.0;

/// Extra width added to content-sized columns so text never touches a rule.
const CELL_PADDING_MM: f32 = 8.0;
/// Share of the usable width reserved for the address column.
const ADDRESS_WIDTH_SHARE: f32 = 0.40;

/// Spec limits available for cell coloring; a table may carry either
/// metric, both (raw data), or neither (mini-tables).
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLimits {
    pub temperature: Option<SpecLimits>,
    pub humidity: Option<SpecLimits>,
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub title: Option<String>,
    pub row_height: f32,
    /// Redraw the header row at the top of every continuation page.
    pub repeat_header: bool,
    /// Ignore content sizing and split the usable width evenly (mini-tables).
    pub equal_widths: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            title: None,
            row_height: DEFAULT_ROW_HEIGHT_MM,
            repeat_header: true,
            equal_widths: false,
        }
    }
}

/// Text color of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellColor {
    Black,
    Red,
    Blue,
}

/// Which spec limits govern a column, decided from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Temperature,
    Humidity,
    Address,
    Plain,
}

pub fn classify_column(header: &str) -> ColumnKind {
    let normalized = header.trim().to_lowercase();
    if normalized == "endereco" || normalized == "endereço" {
        return ColumnKind::Address;
    }
    if normalized.starts_with("temperatura") {
        return ColumnKind::Temperature;
    }
    if normalized.starts_with("umidade") {
        return ColumnKind::Humidity;
    }
    ColumnKind::Plain
}

/// True when the string reads as a number (comma decimals accepted).
pub fn is_numeric(value: &str) -> bool {
    parse_comma_decimal(value.trim()).is_ok()
}

/// Numeric cells render with exactly 2 decimals; everything else unchanged.
pub fn format_cell(value: &str) -> String {
    match parse_comma_decimal(value.trim()) {
        Ok(number) => format!("{number:.2}"),
        Err(_) => value.to_string(),
    }
}

/// Column widths: content-driven with a fixed padding, except the address
/// column which always gets 40% of the usable width. If the total exceeds
/// the usable width, every width is scaled by a single ratio so the sum
/// fits exactly.
pub fn compute_column_widths(
    headers: &[String],
    rows: &[Vec<String>],
    usable_width: f32,
) -> Vec<f32> {
    let mut widths: Vec<f32> = headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            if classify_column(header) == ColumnKind::Address {
                return usable_width * ADDRESS_WIDTH_SHARE;
            }
            let mut max = text_width_mm(header, TABLE_FONT_SIZE);
            for row in rows {
                if let Some(cell) = row.get(col) {
                    max = max.max(text_width_mm(&format_cell(cell), TABLE_FONT_SIZE));
                }
            }
            max + CELL_PADDING_MM
        })
        .collect();

    let total: f32 = widths.iter().sum();
    if total > usable_width {
        let ratio = usable_width / total;
        for w in widths.iter_mut() {
            *w *= ratio;
        }
    }
    widths.iter().map(|w| (w * 100.0).round() / 100.0).collect()
}

/// Evenly split widths for the fixed-shape mini-tables.
pub fn equal_column_widths(columns: usize, usable_width: f32) -> Vec<f32> {
    let w = usable_width / columns.max(1) as f32;
    vec![w; columns]
}

/// Whether the text overflows the column and must soft-wrap.
pub fn text_overflows(text: &str, column_width: f32) -> bool {
    text_width_mm(text, TABLE_FONT_SIZE) > column_width
}

/// A row is promoted to the taller height exactly when one of its address
/// cells overflows its column.
pub fn row_height_for(
    headers: &[String],
    row: &[String],
    widths: &[f32],
    base_height: f32,
) -> f32 {
    let needs_wrap = headers.iter().enumerate().any(|(col, header)| {
        classify_column(header) == ColumnKind::Address
            && row
                .get(col)
                .map(|cell| text_overflows(cell, widths[col]))
                .unwrap_or(false)
    });
    if needs_wrap {
        base_height * WRAP_ROW_FACTOR
    } else {
        base_height
    }
}

/// Per-row page-break check: does drawing a row of `row_height` starting at
/// `cursor_y` (top-down mm) run into the footer band?
pub fn page_break_needed(cursor_y: f32, row_height: f32) -> bool {
    cursor_y + row_height > PAGE_HEIGHT_MM - PAGE_MARGIN_MM - BOTTOM_GUARD_MM
}

/// Color of an out-of-spec metric cell. `numeric` is the aggregation's own
/// value when the caller has one; otherwise the display string is parsed,
/// and a parse failure falls back to black.
pub fn cell_color(
    kind: ColumnKind,
    display: &str,
    numeric: Option<f64>,
    limits: &TableLimits,
) -> CellColor {
    let spec = match kind {
        ColumnKind::Temperature => limits.temperature,
        ColumnKind::Humidity => limits.humidity,
        _ => None,
    };
    let Some(spec) = spec else {
        return CellColor::Black;
    };

    let value = match numeric {
        Some(v) if v.is_finite() => v,
        _ => match parse_comma_decimal(display.trim()) {
            Ok(v) => v,
            Err(_) => return CellColor::Black,
        },
    };

    if value > spec.upper {
        CellColor::Red
    } else if value < spec.lower {
        CellColor::Blue
    } else {
        CellColor::Black
    }
}

/// Greedy word wrap against a column width; unbreakable runs are split at
/// the character that would overflow.
pub fn wrap_to_width(text: &str, column_width: f32, font_size: f32) -> Vec<String> {
    let inner = column_width - 2.0;
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    let fits = |s: &str| text_width_mm(s, font_size) <= inner;

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
        } else {
            // Hard-split an oversized run.
            let mut piece = String::new();
            for c in word.chars() {
                piece.push(c);
                if !fits(&piece) {
                    piece.pop();
                    if !piece.is_empty() {
                        lines.push(std::mem::take(&mut piece));
                    }
                    piece.push(c);
                }
            }
            current = piece;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn widths_fit_content_when_page_allows() {
        let hdrs = headers(&["Ponto", "Temperatura (°C)"]);
        let rows = vec![row(&["1", "23.50"]), row(&["2", "24.00"])];
        let widths = compute_column_widths(&hdrs, &rows, USABLE_WIDTH_MM);

        assert_eq!(widths.len(), 2);
        // Content plus padding, untouched by scaling.
        let header_w = text_width_mm("Temperatura (°C)", TABLE_FONT_SIZE) + 8.0;
        assert!((widths[1] - (header_w * 100.0).round() / 100.0).abs() < 0.02);
        assert!(widths.iter().sum::<f32>() < USABLE_WIDTH_MM);
    }

    #[test]
    fn oversized_tables_scale_to_exactly_the_usable_width() {
        let hdrs: Vec<String> = (0..14).map(|i| format!("Coluna bem comprida {i}")).collect();
        let rows = vec![(0..14).map(|_| "123456.78".to_string()).collect::<Vec<_>>()];
        let widths = compute_column_widths(&hdrs, &rows, USABLE_WIDTH_MM);

        let total: f32 = widths.iter().sum();
        assert!(
            (total - USABLE_WIDTH_MM).abs() < 0.5,
            "scaled sum {total} should match usable width"
        );
    }

    #[test]
    fn address_column_takes_forty_percent() {
        let hdrs = headers(&["Ponto", "Endereço"]);
        let rows = vec![row(&["1", "Rua A"])];
        let widths = compute_column_widths(&hdrs, &rows, USABLE_WIDTH_MM);
        assert!((widths[1] - USABLE_WIDTH_MM * 0.40).abs() < 0.02);
    }

    #[test]
    fn row_promotion_tracks_address_overflow_exactly() {
        let hdrs = headers(&["Ponto", "Endereço"]);
        let widths = vec![20.0, 40.0];
        let long = "Avenida das Américas, 4666 - Barra da Tijuca - Rio de Janeiro - Brasil";
        let short = "Rua A";

        assert!(text_overflows(long, widths[1]));
        assert!(!text_overflows(short, widths[1]));

        let promoted = row_height_for(&hdrs, &row(&["1", long]), &widths, DEFAULT_ROW_HEIGHT_MM);
        assert!((promoted - DEFAULT_ROW_HEIGHT_MM * WRAP_ROW_FACTOR).abs() < 1e-6);

        let normal = row_height_for(&hdrs, &row(&["1", short]), &widths, DEFAULT_ROW_HEIGHT_MM);
        assert!((normal - DEFAULT_ROW_HEIGHT_MM).abs() < 1e-6);
    }

    #[test]
    fn long_text_outside_the_address_column_never_promotes() {
        let hdrs = headers(&["Observação", "Endereço"]);
        let widths = vec![10.0, 110.0];
        let r = row(&["um texto bastante comprido que estoura a primeira coluna", "Rua A"]);
        let h = row_height_for(&hdrs, &r, &widths, DEFAULT_ROW_HEIGHT_MM);
        assert!((h - DEFAULT_ROW_HEIGHT_MM).abs() < 1e-6);
    }

    #[test]
    fn page_break_fires_at_the_footer_band() {
        assert!(!page_break_needed(100.0, 8.0));
        assert!(page_break_needed(180.0, 8.0));
        // Exactly on the guard line still fits.
        assert!(!page_break_needed(177.0, 8.0));
    }

    #[test]
    fn temperature_coloring_matches_the_limits() {
        let limits = TableLimits {
            temperature: Some(SpecLimits::new(15.0, 30.0)),
            humidity: None,
        };
        let kind = classify_column("Temperatura (°C)");
        assert_eq!(kind, ColumnKind::Temperature);

        assert_eq!(cell_color(kind, "31.5", None, &limits), CellColor::Red);
        assert_eq!(cell_color(kind, "10.0", None, &limits), CellColor::Blue);
        assert_eq!(cell_color(kind, "22.0", None, &limits), CellColor::Black);

        // Same value under a wider spec stays black.
        let wider = TableLimits {
            temperature: Some(SpecLimits::new(15.0, 35.0)),
            humidity: None,
        };
        assert_eq!(cell_color(kind, "31.5", None, &wider), CellColor::Black);
    }

    #[test]
    fn color_prefers_the_numeric_companion_value() {
        let limits = TableLimits {
            humidity: Some(SpecLimits::new(30.0, 70.0)),
            temperature: None,
        };
        let kind = classify_column("Umidade_Média");
        assert_eq!(
            cell_color(kind, "71.00", Some(69.996), &limits),
            CellColor::Black
        );
        assert_eq!(cell_color(kind, "71.00", None, &limits), CellColor::Red);
    }

    #[test]
    fn unparseable_cells_fall_back_to_black() {
        let limits = TableLimits {
            temperature: Some(SpecLimits::new(15.0, 30.0)),
            humidity: None,
        };
        let kind = classify_column("Temperatura (°C)");
        assert_eq!(cell_color(kind, "n/d", None, &limits), CellColor::Black);
        // Plain columns are never colored, whatever the value.
        assert_eq!(
            cell_color(classify_column("Luz (lx)"), "9999", None, &limits),
            CellColor::Black
        );
    }

    #[test]
    fn comma_decimals_count_as_numbers() {
        assert!(is_numeric("23,5"));
        assert!(is_numeric(" -4.25 "));
        assert!(!is_numeric("Rua A"));
        assert_eq!(format_cell("23,5"), "23.50");
        assert_eq!(format_cell("Rua A"), "Rua A");
    }

    #[test]
    fn wrap_splits_on_word_boundaries() {
        let lines = wrap_to_width(
            "Avenida das Américas, 4666 - Barra da Tijuca - Rio de Janeiro",
            40.0,
            TABLE_FONT_SIZE,
        );
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, TABLE_FONT_SIZE) <= 40.0);
        }
        // No content is lost.
        assert_eq!(
            lines.join(" ").split_whitespace().count(),
            "Avenida das Américas, 4666 - Barra da Tijuca - Rio de Janeiro"
                .split_whitespace()
                .count()
        );
    }

    #[test]
    fn wrap_hard_splits_unbreakable_runs() {
        let lines = wrap_to_width(&"x".repeat(200), 20.0, TABLE_FONT_SIZE);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width_mm(line, TABLE_FONT_SIZE) <= 20.0);
        }
    }
}
