//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// AI assistant commands
pub mod ai;

/// WhatsApp agent roster commands
pub mod agent;

/// General utility commands
pub mod general;

/// Stock and movement commands
pub mod inventory;

/// Product management commands
pub mod product;

// Export commands
pub use agent::*;
pub use ai::*;
pub use general::*;
pub use inventory::*;
pub use product::*;
