//! `DocumentEngine` implementation backed by lopdf.

use std::path::Path;

use lopdf::{Document, ObjectId};
use tracing::debug;

use formfill_core::{
    DocumentEngine, DocumentHandle, EngineError, Rect, Widget, WidgetValue,
};

use crate::acroform;
use crate::text;

/// Stateless factory; each open produces an exclusive [`LopdfHandle`].
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for LopdfEngine {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, EngineError> {
        let doc = Document::load_mem(bytes).map_err(|e| EngineError::Open(e.to_string()))?;
        // get_pages is keyed by 1-based page number; the values land here
        // in page order, indexed 0-based.
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        debug!("opened document with {} pages", pages.len());
        Ok(Box::new(LopdfHandle { doc, pages }))
    }
}

pub struct LopdfHandle {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl LopdfHandle {
    fn page_id(&self, page: usize) -> Result<ObjectId, EngineError> {
        self.pages
            .get(page)
            .copied()
            .ok_or(EngineError::PageOutOfRange(page))
    }
}

impl DocumentHandle for LopdfHandle {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_bounds(&self, page: usize) -> Result<Rect, EngineError> {
        let page_id = self.page_id(page)?;
        Ok(acroform::media_box(&self.doc, page_id))
    }

    fn widgets(&self, page: usize) -> Result<Vec<Widget>, EngineError> {
        let page_id = self.page_id(page)?;
        let ids = acroform::page_widget_ids(&self.doc, page_id)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| acroform::widget_from_dict(&self.doc, id))
            .collect())
    }

    fn read_text(&self, page: usize, clip: Rect) -> Result<String, EngineError> {
        let page_id = self.page_id(page)?;
        text::extract_region(&self.doc, page_id, clip)
    }

    fn set_widget_value(
        &mut self,
        page: usize,
        native_name: &str,
        value: &WidgetValue,
    ) -> Result<(), EngineError> {
        let page_id = self.page_id(page)?;
        let target = acroform::page_widget_ids(&self.doc, page_id)?
            .into_iter()
            .find(|&id| {
                self.doc
                    .get_object(id)
                    .ok()
                    .and_then(|o| o.as_dict().ok())
                    .map(|dict| acroform::qualified_name(&self.doc, dict) == native_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                EngineError::Widget(format!(
                    "no widget named {:?} on page {}",
                    native_name, page
                ))
            })?;
        acroform::write_widget_value(&mut self.doc, target, value)
    }

    fn save(&mut self, destination: &Path) -> Result<Vec<u8>, EngineError> {
        acroform::set_need_appearances(&mut self.doc);

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| EngineError::Save(e.to_string()))?;

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| EngineError::Save(e.to_string()))?;
            }
        }
        std::fs::write(destination, &bytes).map_err(|e| EngineError::Save(e.to_string()))?;
        debug!("saved {} bytes to {}", bytes.len(), destination.display());
        Ok(bytes)
    }
}
