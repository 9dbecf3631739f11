//! Document state, cell drawing, and page sequencing for the PDF report.
//!
//! printpdf's origin is the bottom-left corner; the cursor here runs
//! top-down like the rest of the layout math, and the drawing helpers flip
//! coordinates at the last moment.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use printpdf::image_crate::codecs::png::PngDecoder;
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Polygon, Rgb,
};
use tracing::debug;

use crate::errors::ReportError;
use crate::pdf::layout::{
    cell_color, classify_column, compute_column_widths, equal_column_widths, format_cell,
    is_numeric, page_break_needed, row_height_for, text_overflows, wrap_to_width, CellColor,
    ColumnKind, TableLimits, TableOptions, PAGE_HEIGHT_MM, PAGE_MARGIN_MM, PAGE_WIDTH_MM,
    TABLE_FONT_SIZE, USABLE_WIDTH_MM, WRAP_LINE_HEIGHT_MM,
};
use crate::pdf::metrics::{sanitize_winansi, text_width_mm, PT_TO_MM};

/// Width at which full-page images (map, charts) are embedded.
pub const IMAGE_WIDTH_MM: f32 = 260.0;

const HEADER_FILL: (f32, f32, f32) = (200.0 / 255.0, 220.0 / 255.0, 1.0);

pub struct PdfReport {
    doc: PdfDocumentReference,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    /// Top-down position on the current page, millimeters.
    cursor_y: f32,
}

impl PdfReport {
    pub fn new(title: &str) -> Result<Self, ReportError> {
        let doc = PdfDocument::empty(title);
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| ReportError::Pdf(e.to_string()))?;
        Ok(Self {
            doc,
            pages: Vec::new(),
            font,
            font_bold,
            cursor_y: PAGE_MARGIN_MM,
        })
    }

    /// Start a new A4 landscape page and move the cursor to the top margin.
    pub fn add_page(&mut self) {
        let (page, layer) =
            self.doc
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
        self.pages.push((page, layer));
        self.cursor_y = PAGE_MARGIN_MM;
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn set_cursor(&mut self, y: f32) {
        self.cursor_y = y;
    }

    fn layer(&self) -> PdfLayerReference {
        let (page, layer) = self.pages.last().copied().expect("a page must exist");
        self.doc.get_page(page).get_layer(layer)
    }

    fn set_text_color(&self, color: CellColor) {
        let (r, g, b) = match color {
            CellColor::Black => (0.0, 0.0, 0.0),
            CellColor::Red => (1.0, 0.0, 0.0),
            CellColor::Blue => (0.0, 0.0, 1.0),
        };
        self.layer()
            .set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    /// Write text with its baseline `baseline_top` mm from the page top.
    fn text_at(&self, text: &str, size: f32, bold: bool, x: f32, baseline_top: f32) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer()
            .use_text(text, size, Mm(x), Mm(PAGE_HEIGHT_MM - baseline_top), font);
    }

    fn text_centered(&self, text: &str, size: f32, bold: bool, baseline_top: f32) {
        let x = (PAGE_WIDTH_MM - text_width_mm(text, size)) / 2.0;
        self.text_at(text, size, bold, x, baseline_top);
    }

    /// Baseline position that vertically centers `size`-pt text in a band
    /// starting at `top` with height `band`.
    fn band_baseline(top: f32, band: f32, size: f32) -> f32 {
        top + (band + size * PT_TO_MM * 0.7) / 2.0
    }

    /// Rectangle with optional fill, `top` mm from the page top.
    fn rect(&self, x: f32, top: f32, w: f32, h: f32, fill: Option<(f32, f32, f32)>) {
        let layer = self.layer();
        layer.set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        layer.set_outline_thickness(0.3);

        let y_top = PAGE_HEIGHT_MM - top;
        let y_bottom = y_top - h;
        let corners = vec![
            (Point::new(Mm(x), Mm(y_top)), false),
            (Point::new(Mm(x + w), Mm(y_top)), false),
            (Point::new(Mm(x + w), Mm(y_bottom)), false),
            (Point::new(Mm(x), Mm(y_bottom)), false),
        ];

        if let Some((r, g, b)) = fill {
            layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
            layer.add_polygon(Polygon {
                rings: vec![corners],
                mode: PaintMode::FillStroke,
                winding_order: WindingOrder::NonZero,
            });
            // Fill color doubles as text color; restore black.
            layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        } else {
            layer.add_line(Line {
                points: corners,
                is_closed: true,
            });
        }
    }

    /// Centered bold heading at the top of the current page; the cursor
    /// moves below it.
    pub fn page_heading(&mut self, title: &str) {
        let title = sanitize_winansi(title);
        self.text_centered(&title, 16.0, true, self.cursor_y + 7.0);
        self.cursor_y += 10.0;
    }

    /// Cover page: big centered title block, observations underneath.
    pub fn cover(&mut self, title: &str, observations: Option<&str>) {
        self.add_page();

        let title = sanitize_winansi(title);
        let title_lines = wrap_to_width(&title, USABLE_WIDTH_MM - 40.0, 28.0);
        let line_height = 14.0;
        let block = title_lines.len() as f32 * line_height;
        let mut y = (PAGE_HEIGHT_MM - block) / 2.0;

        for line in &title_lines {
            self.text_centered(line, 28.0, true, y);
            y += line_height;
        }

        if let Some(observations) = observations {
            let text = sanitize_winansi(&format!("Observações: {observations}"));
            y += 6.0;
            for line in wrap_to_width(&text, USABLE_WIDTH_MM - 40.0, 12.0) {
                self.text_centered(&line, 12.0, false, y);
                y += 7.0;
            }
        }
        self.cursor_y = y;
    }

    /// Embed a PNG left-aligned at the page margin, `top` mm from the page
    /// top, scaled to `width_mm` (and independently to `height_mm` when
    /// given, matching the squeezed chart pages). Returns the drawn height.
    pub fn image_at(
        &mut self,
        png: &Path,
        top: f32,
        width_mm: f32,
        height_mm: Option<f32>,
    ) -> Result<f32, ReportError> {
        let file = File::open(png).map_err(|e| ReportError::IoError {
            path: png.to_path_buf(),
            source: e,
        })?;
        let decoder =
            PngDecoder::new(file).map_err(|e| ReportError::Pdf(e.to_string()))?;
        let image = Image::try_from(decoder).map_err(|e| ReportError::Pdf(e.to_string()))?;

        let px_w = image.image.width.0 as f32;
        let px_h = image.image.height.0 as f32;
        // At the default 300 dpi one pixel is 25.4/300 mm.
        let natural_w = px_w * 25.4 / 300.0;
        let natural_h = px_h * 25.4 / 300.0;
        let scale_x = width_mm / natural_w;
        let scale_y = match height_mm {
            Some(h) => h / natural_h,
            None => scale_x,
        };
        let drawn_h = natural_h * scale_y;

        image.add_to_layer(
            self.layer(),
            ImageTransform {
                translate_x: Some(Mm(PAGE_MARGIN_MM)),
                translate_y: Some(Mm(PAGE_HEIGHT_MM - top - drawn_h)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                ..ImageTransform::default()
            },
        );

        self.cursor_y = top + drawn_h;
        Ok(drawn_h)
    }

    /// Heading plus full-width image on a fresh page.
    pub fn image_page(
        &mut self,
        title: &str,
        png: &Path,
        height_mm: Option<f32>,
    ) -> Result<(), ReportError> {
        self.add_page();
        self.page_heading(title);
        self.image_at(png, 20.0, IMAGE_WIDTH_MM, height_mm)?;
        Ok(())
    }

    fn draw_header_row(&mut self, headers: &[String], widths: &[f32], row_height: f32) {
        let mut x = PAGE_MARGIN_MM;
        for (header, w) in headers.iter().zip(widths) {
            self.rect(x, self.cursor_y, *w, row_height, Some(HEADER_FILL));
            let text = sanitize_winansi(header);
            let tx = x + (w - text_width_mm(&text, TABLE_FONT_SIZE)).max(0.0) / 2.0;
            let baseline = Self::band_baseline(self.cursor_y, row_height, TABLE_FONT_SIZE);
            self.text_at(&text, TABLE_FONT_SIZE, true, tx, baseline);
            x += w;
        }
        self.cursor_y += row_height;
    }

    /// Draw a bordered table: content-sized columns with the address
    /// override, per-row pagination, conditional address wrapping, numeric
    /// formatting, and out-of-spec coloring with the color reset after
    /// every metric cell.
    pub fn draw_table(
        &mut self,
        headers: &[String],
        rows: &[Vec<String>],
        numeric: Option<&[Vec<f64>]>,
        limits: &TableLimits,
        options: &TableOptions,
    ) {
        let widths = if options.equal_widths {
            equal_column_widths(headers.len(), IMAGE_WIDTH_MM)
        } else {
            compute_column_widths(headers, rows, USABLE_WIDTH_MM)
        };
        let kinds: Vec<ColumnKind> = headers.iter().map(|h| classify_column(h)).collect();

        if let Some(title) = &options.title {
            let title = sanitize_winansi(title);
            self.text_centered(&title, 14.0, true, self.cursor_y + 7.0);
            self.cursor_y += 11.0;
        }

        self.draw_header_row(headers, &widths, options.row_height);

        for (row_idx, row) in rows.iter().enumerate() {
            let row_h = row_height_for(headers, row, &widths, options.row_height);

            if page_break_needed(self.cursor_y, row_h) {
                self.add_page();
                if options.repeat_header {
                    self.draw_header_row(headers, &widths, options.row_height);
                }
            }

            let mut x = PAGE_MARGIN_MM;
            for (col, width) in widths.iter().enumerate() {
                let raw = row.get(col).map(String::as_str).unwrap_or("");
                let numeric_cell = is_numeric(raw);
                let formatted = if numeric_cell {
                    format_cell(raw)
                } else {
                    raw.to_string()
                };
                let display = sanitize_winansi(&formatted);

                self.rect(x, self.cursor_y, *width, row_h, None);

                let companion = numeric
                    .and_then(|matrix| matrix.get(row_idx))
                    .and_then(|r| r.get(col))
                    .copied();
                let color = cell_color(kinds[col], &display, companion, limits);
                self.set_text_color(color);

                if kinds[col] == ColumnKind::Address && text_overflows(&display, *width) {
                    // Soft-wrap inside the promoted row at the reduced line
                    // height; the line budget is bounded by the row band.
                    let max_lines = (row_h / WRAP_LINE_HEIGHT_MM).floor() as usize;
                    let lines = wrap_to_width(&display, *width, TABLE_FONT_SIZE);
                    for (i, line) in lines.iter().take(max_lines.max(1)).enumerate() {
                        let baseline = self.cursor_y + 3.0 + i as f32 * WRAP_LINE_HEIGHT_MM;
                        self.text_at(line, TABLE_FONT_SIZE, false, x + 1.0, baseline);
                    }
                } else {
                    let tx = if numeric_cell {
                        x + (width - text_width_mm(&display, TABLE_FONT_SIZE)).max(0.0) / 2.0
                    } else {
                        x + 1.0
                    };
                    let baseline = Self::band_baseline(self.cursor_y, row_h, TABLE_FONT_SIZE);
                    self.text_at(&display, TABLE_FONT_SIZE, false, tx, baseline);
                }

                // Never let an out-of-spec color leak into the next cell.
                self.set_text_color(CellColor::Black);
                x += width;
            }

            self.cursor_y += row_h;
        }

        self.set_text_color(CellColor::Black);
    }

    /// Second pass: overlay the centered "page de total" footer on every
    /// page, then write the document. Returns the total page count.
    pub fn finish(self, path: &Path) -> Result<usize, ReportError> {
        let total = self.pages.len();
        for (i, (page, layer)) in self.pages.iter().enumerate() {
            let layer = self.doc.get_page(*page).get_layer(*layer);
            let text = format!("{} de {}", i + 1, total);
            let x = (PAGE_WIDTH_MM - text_width_mm(&text, 10.0)) / 2.0;
            layer.set_fill_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
            layer.use_text(text, 10.0, Mm(x), Mm(6.0), &self.font);
        }

        let file = File::create(path).map_err(|e| ReportError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.doc
            .save(&mut BufWriter::new(file))
            .map_err(|e| ReportError::Pdf(e.to_string()))?;

        debug!("Saved {} page report to {}", total, path.display());
        Ok(total)
    }
}
