//! Glue between the fragment detector and application code: change
//! notifications forwarded to named event handlers, and elements bound to
//! navigate to a fragment when activated.

mod events;
mod link;
mod plugin;

pub use events::{EventDispatcher, EventHandler, HandlerId};
pub use link::{ActivationHandler, Activatable};
pub use plugin::HashPlugin;
