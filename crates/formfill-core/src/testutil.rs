//! In-memory document engine used by unit tests.
//!
//! Persistent state is shared between opens: a save writes the mutated
//! document back into the engine, so a later open observes committed
//! values just like re-reading a saved file would.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::engine::{
    DocumentEngine, DocumentHandle, EngineError, Rect, Widget, WidgetValue,
};

#[derive(Clone)]
pub struct FakeText {
    pub x: f64,
    pub y: f64,
    pub text: String,
}

impl FakeText {
    pub fn new(x: f64, y: f64, text: String) -> Self {
        Self { x, y, text }
    }
}

#[derive(Clone)]
pub struct FakePage {
    pub bounds: Rect,
    pub widgets: Vec<Widget>,
    pub texts: Vec<FakeText>,
}

impl FakePage {
    pub fn letter() -> Self {
        Self {
            bounds: Rect::new(0.0, 0.0, 612.0, 792.0),
            widgets: Vec::new(),
            texts: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeDocument {
    pub pages: Vec<FakePage>,
}

pub struct FakeEngine {
    state: Arc<Mutex<FakeDocument>>,
    fail_open: bool,
    fail_save: bool,
    fail_writes: HashSet<String>,
    saves: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeEngine {
    pub fn with_pages(pages: Vec<FakePage>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeDocument { pages })),
            fail_open: false,
            fail_save: false,
            fail_writes: HashSet::new(),
            saves: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn empty(page_count: usize) -> Self {
        Self::with_pages((0..page_count).map(|_| FakePage::letter()).collect())
    }

    pub fn failing_open() -> Self {
        let mut engine = Self::empty(0);
        engine.fail_open = true;
        engine
    }

    pub fn with_failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    pub fn with_failing_write(mut self, native_name: &str) -> Self {
        self.fail_writes.insert(native_name.to_string());
        self
    }

    /// Snapshot of the engine's persisted document state.
    pub fn document(&self) -> FakeDocument {
        self.state.lock().unwrap().clone()
    }

    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saves.lock().unwrap().clone()
    }
}

impl DocumentEngine for FakeEngine {
    fn open(&self, _bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, EngineError> {
        if self.fail_open {
            return Err(EngineError::Open("not a document".to_string()));
        }
        Ok(Box::new(FakeHandle {
            doc: self.state.lock().unwrap().clone(),
            state: Arc::clone(&self.state),
            fail_save: self.fail_save,
            fail_writes: self.fail_writes.clone(),
            saves: Arc::clone(&self.saves),
        }))
    }
}

struct FakeHandle {
    doc: FakeDocument,
    state: Arc<Mutex<FakeDocument>>,
    fail_save: bool,
    fail_writes: HashSet<String>,
    saves: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeHandle {
    fn page(&self, page: usize) -> Result<&FakePage, EngineError> {
        self.doc.pages.get(page).ok_or(EngineError::PageOutOfRange(page))
    }
}

impl DocumentHandle for FakeHandle {
    fn page_count(&self) -> usize {
        self.doc.pages.len()
    }

    fn page_bounds(&self, page: usize) -> Result<Rect, EngineError> {
        Ok(self.page(page)?.bounds)
    }

    fn widgets(&self, page: usize) -> Result<Vec<Widget>, EngineError> {
        Ok(self.page(page)?.widgets.clone())
    }

    fn read_text(&self, page: usize, clip: Rect) -> Result<String, EngineError> {
        let mut hits: Vec<&FakeText> = self
            .page(page)?
            .texts
            .iter()
            .filter(|t| clip.contains(t.x, t.y))
            .collect();
        // Top-to-bottom reading order; the page origin is bottom-left.
        hits.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap()
                .then(a.x.partial_cmp(&b.x).unwrap())
        });
        Ok(hits
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn set_widget_value(
        &mut self,
        page: usize,
        native_name: &str,
        value: &WidgetValue,
    ) -> Result<(), EngineError> {
        if self.fail_writes.contains(native_name) {
            return Err(EngineError::Widget(format!(
                "write rejected for {}",
                native_name
            )));
        }
        let page = self
            .doc
            .pages
            .get_mut(page)
            .ok_or(EngineError::PageOutOfRange(page))?;
        let widget = page
            .widgets
            .iter_mut()
            .find(|w| w.native_name == native_name)
            .ok_or_else(|| EngineError::Widget(format!("no widget named {}", native_name)))?;
        widget.value = Some(match value {
            WidgetValue::Text(s) => s.clone(),
            WidgetValue::Toggle(b) => b.to_string(),
        });
        Ok(())
    }

    fn save(&mut self, destination: &Path) -> Result<Vec<u8>, EngineError> {
        if self.fail_save {
            return Err(EngineError::Save("disk full".to_string()));
        }
        *self.state.lock().unwrap() = self.doc.clone();
        self.saves.lock().unwrap().push(destination.to_path_buf());
        let bytes = b"%FAKEPDF".to_vec();
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| EngineError::Save(e.to_string()))?;
            }
        }
        std::fs::write(destination, &bytes).map_err(|e| EngineError::Save(e.to_string()))?;
        Ok(bytes)
    }
}
