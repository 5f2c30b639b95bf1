//! AcroForm widget enumeration and value writes.
//!
//! Widgets live in each page's `/Annots` array; field attributes (`/FT`,
//! `/Ff`, `/V`, `/Opt`) may sit on the widget itself or on an ancestor in
//! the `/Parent` chain, and field names are fully qualified by joining the
//! `/T` entries of that chain with dots.

use lopdf::{Dictionary, Document, Object, ObjectId};

use formfill_core::{EngineError, Rect, Widget, WidgetKind, WidgetValue};

// Button and choice field flags (PDF 32000-1, table 226/230).
const FF_RADIO: i64 = 1 << 15;
const FF_PUSHBUTTON: i64 = 1 << 16;
const FF_COMBO: i64 = 1 << 17;

// Guard against /Parent cycles in malformed documents.
const MAX_PARENT_DEPTH: usize = 32;

const OFF_STATE: &[u8] = b"Off";
const DEFAULT_ON_STATE: &[u8] = b"Yes";

/// Follow a reference to its target object; non-references pass through.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn object_to_f64(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Decode a PDF text string: UTF-16BE when BOM-prefixed, Latin-1 otherwise.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Encode a text value for `/V`: plain literal for ASCII, BOM-prefixed
/// UTF-16BE otherwise.
pub(crate) fn encode_pdf_string(text: &str) -> Object {
    if text.is_ascii() {
        Object::string_literal(text)
    } else {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, lopdf::StringFormat::Hexadecimal)
    }
}

/// Look up a key on the page dictionary, walking up the page tree via
/// `/Parent` when the key is inherited.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current_id = page_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let dict = doc.get_object(current_id).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        current_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Page media box, defaulting to US Letter when absent.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> Rect {
    resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|object| rect_from_object(doc, object))
        .unwrap_or_else(|| Rect::new(0.0, 0.0, 612.0, 792.0))
}

fn rect_from_object(doc: &Document, object: &Object) -> Option<Rect> {
    let array = object.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut nums = [0.0f64; 4];
    for (slot, entry) in nums.iter_mut().zip(array) {
        *slot = object_to_f64(resolve(doc, entry)?)?;
    }
    Some(Rect::new(nums[0], nums[1], nums[2], nums[3]))
}

/// Annotation object ids of the widgets on a page, in document order.
pub(crate) fn page_widget_ids(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Vec<ObjectId>, EngineError> {
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| EngineError::Widget(format!("page dictionary: {}", e)))?;

    let annots = match page.get(b"Annots") {
        Ok(annots) => annots,
        Err(_) => return Ok(Vec::new()),
    };
    let annots = resolve(doc, annots)
        .and_then(|a| a.as_array().ok())
        .ok_or_else(|| EngineError::Widget("malformed /Annots array".to_string()))?;

    let mut ids = Vec::new();
    for entry in annots {
        let Ok(id) = entry.as_reference() else {
            continue;
        };
        let Some(dict) = doc.get_object(id).ok().and_then(|o| o.as_dict().ok()) else {
            continue;
        };
        let is_widget = dict
            .get(b"Subtype")
            .ok()
            .and_then(|s| s.as_name().ok())
            .map(|name| name == b"Widget")
            .unwrap_or(false);
        if is_widget {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Field attribute with AcroForm inheritance through `/Parent`.
fn field_attr<'a>(doc: &'a Document, widget: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut dict = widget;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        dict = resolve(doc, dict.get(b"Parent").ok()?)?.as_dict().ok()?;
    }
    None
}

/// Fully-qualified field name: `/T` entries from root ancestor down to the
/// widget, dot-joined. Empty when no `/T` exists anywhere in the chain.
pub(crate) fn qualified_name(doc: &Document, widget: &Dictionary) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut dict = Some(widget);
    for _ in 0..MAX_PARENT_DEPTH {
        let Some(current) = dict else { break };
        if let Some(t) = current.get(b"T").ok().and_then(|t| resolve(doc, t)) {
            if let Ok(bytes) = t.as_str() {
                segments.push(decode_pdf_string(bytes));
            }
        }
        dict = current
            .get(b"Parent")
            .ok()
            .and_then(|p| resolve(doc, p))
            .and_then(|o| o.as_dict().ok());
    }
    segments.reverse();
    segments.join(".")
}

pub(crate) fn classify(doc: &Document, widget: &Dictionary) -> WidgetKind {
    let flags = field_attr(doc, widget, b"Ff")
        .and_then(|f| f.as_i64().ok())
        .unwrap_or(0);
    match field_attr(doc, widget, b"FT").and_then(|ft| ft.as_name().ok()) {
        Some(name) if name == b"Tx" => WidgetKind::Text,
        Some(name) if name == b"Btn" => {
            if flags & FF_RADIO != 0 {
                WidgetKind::Radio
            } else if flags & FF_PUSHBUTTON != 0 {
                WidgetKind::PushButton
            } else {
                WidgetKind::Checkbox
            }
        }
        Some(name) if name == b"Ch" => {
            if flags & FF_COMBO != 0 {
                WidgetKind::ComboBox
            } else {
                WidgetKind::ListBox
            }
        }
        Some(name) if name == b"Sig" => WidgetKind::Signature,
        _ => WidgetKind::Unknown,
    }
}

fn current_value(doc: &Document, widget: &Dictionary, kind: WidgetKind) -> Option<String> {
    let value = field_attr(doc, widget, b"V")?;
    match value {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        Object::Name(name) => match kind {
            // Checkbox states are booleans; lowercase-stringified for
            // uniformity with the other field types.
            WidgetKind::Checkbox => Some((name.as_slice() != OFF_STATE).to_string()),
            _ => Some(decode_pdf_string(name)),
        },
        // Multi-select list boxes carry an array; report the first choice.
        Object::Array(items) => items.iter().find_map(|item| {
            resolve(doc, item)
                .and_then(|o| o.as_str().ok())
                .map(decode_pdf_string)
        }),
        _ => None,
    }
}

/// Export values declared in `/Opt`. Pair entries `[export, display]`
/// contribute their export member.
fn choice_values(doc: &Document, widget: &Dictionary) -> Option<Vec<String>> {
    let opt = field_attr(doc, widget, b"Opt")?.as_array().ok()?;
    let mut values = Vec::new();
    for entry in opt {
        match resolve(doc, entry)? {
            Object::String(bytes, _) => values.push(decode_pdf_string(bytes)),
            Object::Array(pair) => {
                if let Some(export) = pair
                    .first()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_str().ok())
                {
                    values.push(decode_pdf_string(export));
                }
            }
            _ => {}
        }
    }
    Some(values)
}

/// Build the engine-level widget view of one annotation.
pub(crate) fn widget_from_dict(doc: &Document, annot_id: ObjectId) -> Option<Widget> {
    let dict = doc.get_object(annot_id).ok()?.as_dict().ok()?;
    let kind = classify(doc, dict);
    let rect = dict
        .get(b"Rect")
        .ok()
        .and_then(|r| resolve(doc, r))
        .and_then(|r| rect_from_object(doc, r))
        .unwrap_or(Rect::new(0.0, 0.0, 0.0, 0.0));
    let choice_values = match kind {
        WidgetKind::ComboBox | WidgetKind::ListBox => {
            Some(choice_values(doc, dict).unwrap_or_default())
        }
        _ => None,
    };
    Some(Widget {
        native_name: qualified_name(doc, dict),
        kind,
        rect,
        value: current_value(doc, dict, kind),
        choice_values,
    })
}

/// The appearance-state name that turns a button on, discovered from the
/// widget's `/AP /N` dictionary.
fn on_state(doc: &Document, widget: &Dictionary) -> Vec<u8> {
    let states = widget
        .get(b"AP")
        .ok()
        .and_then(|ap| resolve(doc, ap))
        .and_then(|ap| ap.as_dict().ok())
        .and_then(|ap| ap.get(b"N").ok())
        .and_then(|n| resolve(doc, n))
        .and_then(|n| n.as_dict().ok());
    if let Some(states) = states {
        for (key, _) in states.iter() {
            if key.as_slice() != OFF_STATE {
                return key.clone();
            }
        }
    }
    DEFAULT_ON_STATE.to_vec()
}

/// The dictionary that owns the field data: the widget itself when merged,
/// otherwise the nearest ancestor carrying `/FT`.
fn value_owner(doc: &Document, annot_id: ObjectId) -> ObjectId {
    let mut current = annot_id;
    for _ in 0..MAX_PARENT_DEPTH {
        let Some(dict) = doc.get_object(current).ok().and_then(|o| o.as_dict().ok()) else {
            return annot_id;
        };
        if dict.has(b"FT") {
            return current;
        }
        match dict.get(b"Parent").ok().and_then(|p| p.as_reference().ok()) {
            Some(parent) => current = parent,
            None => return annot_id,
        }
    }
    annot_id
}

/// Write a value into a widget annotation.
pub(crate) fn write_widget_value(
    doc: &mut Document,
    annot_id: ObjectId,
    value: &WidgetValue,
) -> Result<(), EngineError> {
    let widget = doc
        .get_object(annot_id)
        .ok()
        .and_then(|o| o.as_dict().ok())
        .ok_or_else(|| EngineError::Widget("widget annotation missing".to_string()))?;
    let kind = classify(doc, widget);
    let on = on_state(doc, widget);
    let owner = value_owner(doc, annot_id);

    match (kind, value) {
        (WidgetKind::Checkbox, WidgetValue::Toggle(checked)) => {
            let state = if *checked { on } else { OFF_STATE.to_vec() };
            set_dict_entry(doc, owner, b"V", Object::Name(state.clone()))?;
            set_dict_entry(doc, annot_id, b"AS", Object::Name(state))?;
        }
        (WidgetKind::Checkbox, WidgetValue::Text(text)) => {
            // Text landing on a checkbox widget is treated as a state name.
            let state: Vec<u8> = text.as_bytes().to_vec();
            set_dict_entry(doc, owner, b"V", Object::Name(state.clone()))?;
            set_dict_entry(doc, annot_id, b"AS", Object::Name(state))?;
        }
        (WidgetKind::Radio, value) => {
            let export = match value {
                WidgetValue::Text(text) => text.as_bytes().to_vec(),
                WidgetValue::Toggle(true) => on,
                WidgetValue::Toggle(false) => OFF_STATE.to_vec(),
            };
            set_dict_entry(doc, owner, b"V", Object::Name(export.clone()))?;
            // Only the kid whose appearance dictionary declares this state
            // shows as selected.
            let widget = doc
                .get_object(annot_id)
                .ok()
                .and_then(|o| o.as_dict().ok())
                .ok_or_else(|| EngineError::Widget("widget annotation missing".to_string()))?;
            let has_state = widget
                .get(b"AP")
                .ok()
                .and_then(|ap| resolve(doc, ap))
                .and_then(|ap| ap.as_dict().ok())
                .and_then(|ap| ap.get(b"N").ok())
                .and_then(|n| resolve(doc, n))
                .and_then(|n| n.as_dict().ok())
                .map(|states| states.has(&export))
                .unwrap_or(true);
            let state = if has_state { export } else { OFF_STATE.to_vec() };
            set_dict_entry(doc, annot_id, b"AS", Object::Name(state))?;
        }
        (_, WidgetValue::Text(text)) => {
            set_dict_entry(doc, owner, b"V", encode_pdf_string(text))?;
        }
        (_, WidgetValue::Toggle(checked)) => {
            set_dict_entry(doc, owner, b"V", encode_pdf_string(&checked.to_string()))?;
        }
    }
    Ok(())
}

fn set_dict_entry(
    doc: &mut Document,
    id: ObjectId,
    key: &[u8],
    value: Object,
) -> Result<(), EngineError> {
    let dict = doc
        .get_object_mut(id)
        .map_err(|e| EngineError::Widget(e.to_string()))?
        .as_dict_mut()
        .map_err(|e| EngineError::Widget(e.to_string()))?;
    dict.set(key.to_vec(), value);
    Ok(())
}

/// Ask viewers to regenerate field appearances after a value change.
pub(crate) fn set_need_appearances(doc: &mut Document) {
    let Some(root_id) = doc
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|r| r.as_reference().ok())
    else {
        return;
    };
    let acroform_ref = doc
        .get_object(root_id)
        .ok()
        .and_then(|o| o.as_dict().ok())
        .and_then(|catalog| catalog.get(b"AcroForm").ok())
        .and_then(|form| form.as_reference().ok());

    if let Some(form_id) = acroform_ref {
        if let Ok(form) = doc
            .get_object_mut(form_id)
            .and_then(|o| o.as_dict_mut())
        {
            form.set("NeedAppearances", Object::Boolean(true));
        }
        return;
    }

    // Inline /AcroForm dictionary on the catalog.
    if let Ok(catalog) = doc.get_object_mut(root_id).and_then(|o| o.as_dict_mut()) {
        if let Ok(form) = catalog.get_mut(b"AcroForm").and_then(|o| o.as_dict_mut()) {
            form.set("NeedAppearances", Object::Boolean(true));
        }
    }
}
