//! Region-clipped text extraction from page content streams.
//!
//! Walks the content stream's text operators, tracking the text line
//! position through `Tm`/`Td`/`TD`/`TL`/`T*`, and collects every show op
//! whose start point falls inside the query rectangle. Glyph-level
//! x-advance is not modeled; a run is located at its baseline start,
//! which is sufficient for radius-based label context.

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};

use formfill_core::{EngineError, Rect};

use crate::acroform::{decode_pdf_string, object_to_f64};

// Runs whose baselines differ by no more than this belong to one line.
const LINE_TOLERANCE: f64 = 2.0;

struct TextRun {
    x: f64,
    y: f64,
    text: String,
}

/// Extract text within `clip`, top-to-bottom, one string per visual line.
pub(crate) fn extract_region(
    doc: &Document,
    page_id: ObjectId,
    clip: Rect,
) -> Result<String, EngineError> {
    let data = doc
        .get_page_content(page_id)
        .map_err(|e| EngineError::Text(e.to_string()))?;
    let content = Content::decode(&data).map_err(|e| EngineError::Text(e.to_string()))?;

    let mut runs: Vec<TextRun> = Vec::new();
    let mut x = 0.0;
    let mut y = 0.0;
    let mut line_x = 0.0;
    let mut line_y = 0.0;
    let mut leading = 0.0;

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                x = 0.0;
                y = 0.0;
                line_x = 0.0;
                line_y = 0.0;
            }
            "Tm" => {
                if op.operands.len() == 6 {
                    if let (Some(e), Some(f)) = (
                        object_to_f64(&op.operands[4]),
                        object_to_f64(&op.operands[5]),
                    ) {
                        line_x = e;
                        line_y = f;
                        x = e;
                        y = f;
                    }
                }
            }
            "Td" | "TD" => {
                if op.operands.len() == 2 {
                    if let (Some(tx), Some(ty)) = (
                        object_to_f64(&op.operands[0]),
                        object_to_f64(&op.operands[1]),
                    ) {
                        if op.operator == "TD" {
                            leading = -ty;
                        }
                        line_x += tx;
                        line_y += ty;
                        x = line_x;
                        y = line_y;
                    }
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(object_to_f64) {
                    leading = l;
                }
            }
            "T*" => {
                line_y -= leading;
                x = line_x;
                y = line_y;
            }
            "Tj" => {
                if let Some(text) = op.operands.first().and_then(shown_text) {
                    push_run(&mut runs, x, y, text);
                }
            }
            "'" => {
                line_y -= leading;
                x = line_x;
                y = line_y;
                if let Some(text) = op.operands.first().and_then(shown_text) {
                    push_run(&mut runs, x, y, text);
                }
            }
            "\"" => {
                line_y -= leading;
                x = line_x;
                y = line_y;
                if let Some(text) = op.operands.get(2).and_then(shown_text) {
                    push_run(&mut runs, x, y, text);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    let text: String = items.iter().filter_map(shown_text).collect();
                    push_run(&mut runs, x, y, text);
                }
            }
            _ => {}
        }
    }

    runs.retain(|run| clip.contains(run.x, run.y));
    runs.sort_by(|a, b| {
        b.y.total_cmp(&a.y)
            .then_with(|| a.x.total_cmp(&b.x))
    });

    let mut lines: Vec<(f64, String)> = Vec::new();
    for run in runs {
        match lines.last_mut() {
            Some((last_y, text)) if (*last_y - run.y).abs() <= LINE_TOLERANCE => {
                text.push(' ');
                text.push_str(&run.text);
            }
            _ => lines.push((run.y, run.text)),
        }
    }

    Ok(lines
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join("\n"))
}

fn shown_text(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

fn push_run(runs: &mut Vec<TextRun>, x: f64, y: f64, text: String) {
    if !text.trim().is_empty() {
        runs.push(TextRun { x, y, text });
    }
}
