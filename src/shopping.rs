//! Shopping-list aggregation and rendering.
//!
//! The store hands over raw (name, unit, amount) rows joined through the
//! user's cart; `aggregate` groups them by ingredient and sums amounts,
//! and the two renderers produce the plain-text and PDF downloads.

use std::collections::BTreeMap;

use crate::errors::ExportError;
use crate::models::ShoppingItem;

/// Group raw cart rows by (name, measurement unit) and sum the amounts.
/// Output is sorted by ingredient name.
pub fn aggregate(rows: Vec<(String, String, i64)>) -> Vec<ShoppingItem> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for (name, unit, amount) in rows {
        *totals.entry((name, unit)).or_insert(0) += amount;
    }
    totals
        .into_iter()
        .map(|((name, measurement_unit), amount)| ShoppingItem {
            name,
            measurement_unit,
            amount,
        })
        .collect()
}

/// One `name (unit) - total` line per ingredient.
pub fn render_text(items: &[ShoppingItem]) -> String {
    let mut text = String::new();
    for item in items {
        text.push_str(&format!(
            "{} ({}) - {}\n",
            item.name, item.measurement_unit, item.amount
        ));
    }
    text
}

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const LINE_STEP_MM: f32 = 8.0;

/// Render the aggregated list as a single-column A4 PDF table, starting
/// new pages as the cursor reaches the bottom margin.
pub fn render_pdf(items: &[ShoppingItem]) -> Result<Vec<u8>, ExportError> {
    use printpdf::{BuiltinFont, Mm, PdfDocument};

    let (doc, first_page, first_layer) = PdfDocument::new(
        "Shopping list",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "list",
    );
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);
    let mut y = PAGE_HEIGHT_MM - 25.0;

    layer.use_text("Your shopping list", 16.0, Mm(MARGIN_MM), Mm(y), &bold);
    y -= 2.0 * LINE_STEP_MM;
    layer.use_text("Ingredient", 12.0, Mm(MARGIN_MM), Mm(y), &bold);
    layer.use_text("Amount", 12.0, Mm(150.0), Mm(y), &bold);
    y -= LINE_STEP_MM;

    for item in items {
        if y < MARGIN_MM {
            let (page, page_layer) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "list");
            layer = doc.get_page(page).get_layer(page_layer);
            y = PAGE_HEIGHT_MM - 25.0;
        }
        layer.use_text(
            format!("{} ({})", item.name, item.measurement_unit),
            12.0,
            Mm(MARGIN_MM),
            Mm(y),
            &font,
        );
        layer.use_text(item.amount.to_string(), 12.0, Mm(150.0), Mm(y), &font);
        y -= LINE_STEP_MM;
    }

    doc.save_to_bytes().map_err(|e| ExportError::Pdf(e.to_string()))
}
