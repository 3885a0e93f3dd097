//! Shared types for the LeadScout discovery engine.
//!
//! Wire shapes of the google-maps lead endpoints plus the client-side domain
//! model built from them.

mod history;
mod preview;
mod search;
mod session;
mod unlock;

pub use history::*;
pub use preview::*;
pub use search::*;
pub use session::*;
pub use unlock::*;
