//! Application state for the FormFill API

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use formfill_core::{DocumentEngine, SessionRegistry};
use formfill_pdf::LopdfEngine;

use crate::mapper::ClaudeMapper;

pub struct AppState {
    pub engine: Arc<dyn DocumentEngine>,
    pub registry: SessionRegistry,
    /// Present only when an API key is configured; handlers fall back to
    /// keyword mapping (or report the mapper unavailable) without it.
    pub mapper: Option<ClaudeMapper>,
    pub output_dir: PathBuf,
}

impl AppState {
    pub fn new() -> Result<Self> {
        let output_dir = std::env::var("FORMFILL_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("formfill"));
        std::fs::create_dir_all(&output_dir)?;
        tracing::info!("Writing filled documents under {}", output_dir.display());

        let mapper = match ClaudeMapper::from_env() {
            Ok(mapper) => {
                tracing::info!("Claude instruction mapper configured");
                Some(mapper)
            }
            Err(e) => {
                tracing::warn!("Claude instruction mapper not configured: {}", e);
                None
            }
        };

        Ok(Self {
            engine: Arc::new(LopdfEngine::new()),
            registry: SessionRegistry::new(),
            mapper,
            output_dir,
        })
    }

    /// Path under the output directory for a session's artifacts.
    pub fn session_path(&self, session_id: &str, suffix: &str) -> PathBuf {
        self.output_dir.join(format!("{}{}.pdf", session_id, suffix))
    }
}
