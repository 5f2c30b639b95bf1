//! Capability interface over the underlying document engine.
//!
//! The extraction and commit machinery never touches a document format
//! directly; it goes through [`DocumentEngine`] / [`DocumentHandle`].
//! `formfill-pdf` provides the lopdf-backed implementation, tests use an
//! in-memory fake.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to open document: {0}")]
    Open(String),

    #[error("Page {0} out of range")]
    PageOutOfRange(usize),

    #[error("Widget error: {0}")]
    Widget(String),

    #[error("Text extraction failed: {0}")]
    Text(String),

    #[error("Failed to save document: {0}")]
    Save(String),
}

/// Axis-aligned rectangle in page coordinates, `(x0, y0)` to `(x1, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Grow the rectangle by `radius` in every direction.
    pub fn expand(&self, radius: f64) -> Rect {
        Rect {
            x0: self.x0 - radius,
            y0: self.y0 - radius,
            x1: self.x1 + radius,
            y1: self.y1 + radius,
        }
    }

    /// Clamp to the overlap with `other`. Degenerates to a zero-area rect
    /// when the two do not overlap.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let x0 = self.x0.max(other.x0);
        let y0 = self.y0.max(other.y0);
        let x1 = self.x1.min(other.x1).max(x0);
        let y1 = self.y1.min(other.y1).max(y0);
        Rect { x0, y0, x1, y1 }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

/// Widget types as the underlying engine reports them. Richer than
/// [`crate::field::FieldType`]: classification collapses this down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Text,
    Checkbox,
    ComboBox,
    ListBox,
    Radio,
    PushButton,
    Signature,
    Unknown,
}

/// A native form widget enumerated from a document page.
#[derive(Debug, Clone)]
pub struct Widget {
    /// Fully-qualified native field name. Empty for nameless widgets,
    /// which extraction skips.
    pub native_name: String,
    pub kind: WidgetKind,
    pub rect: Rect,
    /// Current value; checkbox values are reported as `"true"`/`"false"`.
    pub value: Option<String>,
    /// Declared choice list. `Some(vec![])` is a choice widget with no
    /// configured options; `None` means not a choice widget.
    pub choice_values: Option<Vec<String>>,
}

/// Value written into a widget at commit time.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetValue {
    Text(String),
    Toggle(bool),
}

/// An open document. Exclusive and owned: dropping the handle releases the
/// underlying resource on every exit path.
pub trait DocumentHandle: Send {
    fn page_count(&self) -> usize;

    fn page_bounds(&self, page: usize) -> Result<Rect, EngineError>;

    /// Enumerate form widgets on a page, in document order.
    fn widgets(&self, page: usize) -> Result<Vec<Widget>, EngineError>;

    /// Extract text whose layout position falls within `clip`.
    fn read_text(&self, page: usize, clip: Rect) -> Result<String, EngineError>;

    /// Write a value into the widget with the given native name on `page`.
    fn set_widget_value(
        &mut self,
        page: usize,
        native_name: &str,
        value: &WidgetValue,
    ) -> Result<(), EngineError>;

    /// Persist the document to `destination` and return the saved bytes.
    /// On failure no bytes have been written to the destination.
    fn save(&mut self, destination: &Path) -> Result<Vec<u8>, EngineError>;
}

/// Factory for document handles.
pub trait DocumentEngine: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_grows_symmetrically() {
        let r = Rect::new(100.0, 100.0, 200.0, 150.0).expand(25.0);
        assert_eq!(r, Rect::new(75.0, 75.0, 225.0, 175.0));
    }

    #[test]
    fn test_intersect_clamps_to_page() {
        let page = Rect::new(0.0, 0.0, 612.0, 792.0);
        let r = Rect::new(-50.0, 700.0, 300.0, 900.0).intersect(&page);
        assert_eq!(r, Rect::new(0.0, 700.0, 300.0, 792.0));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 20.0, 30.0, 30.0);
        let r = a.intersect(&b);
        assert_eq!(r.width(), 0.0);
        assert_eq!(r.height(), 0.0);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(10.0, 10.0));
        assert!(!r.contains(10.1, 5.0));
    }
}
