//! A stream inspection engine: observes hypervisor block-level writes,
//! classifies them against a precomputed ext2/MBR index, detects inode and
//! data mutations, and republishes structured change events on per-file
//! topics.
//!
//! The engine owns no transport and no CLI surface. Callers supply an
//! [`Index`](model::Index) (via [`loader::load`]), a [`stream::WriteReader`]
//! over their own event source, and a [`publish::Publisher`] implementation,
//! then drive [`inspector::on_write`] in a loop.

pub mod classify;
pub mod config;
pub mod differ;
pub mod document;
pub mod error;
pub mod ext2;
pub mod inspector;
pub mod loader;
pub mod model;
pub mod publish;
pub mod stream;

pub use classify::{classify, SectorRole};
pub use config::EngineConfig;
pub use error::{EngineError, InodeDecodeOutOfRange, PublishError};
pub use inspector::{on_write, InspectOutcome};
pub use loader::load;
pub use model::Index;
pub use publish::Publisher;
pub use stream::{Write, WriteReader};
