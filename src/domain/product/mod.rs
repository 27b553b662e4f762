// ============================================================================
// Product Domain - price and stock rules
// ============================================================================

pub mod entity;
pub mod errors;
pub mod events;

pub use entity::*;
pub use errors::*;
pub use events::*;
