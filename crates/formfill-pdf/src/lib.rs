//! lopdf-backed implementation of the document engine capability.
//!
//! This crate provides AcroForm widget enumeration, widget value writes,
//! and region-clipped text extraction on top of lopdf, exposed through the
//! `formfill-core` engine traits.

mod acroform;
pub mod engine;
mod text;

pub use engine::{LopdfEngine, LopdfHandle};
