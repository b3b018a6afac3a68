//! Stateful terminal replay: a custom grid/cell/pen model driven by the
//! `vte` crate's parser, giving full control over the attribute set
//! (faint/blink/strikethrough) that neither `vt100` nor
//! `alacritty_terminal`'s cell type exposes directly.

mod cell;
mod color;
mod engine;
mod grid;
mod handler;
mod pen;
mod snapshot;

pub use color::Color;
pub use engine::VtEngine;
pub use handler::Cursor;
pub use pen::PenFlags;
pub use snapshot::{Snapshot, SnapshotLine, SnapshotSpan};
