//! The seam between the detector and the environment it runs in.
//!
//! A [`Host`] provides the address, capability probes, timers and the hidden
//! surface used by the legacy strategy. Everything runs on the host's single
//! event loop: tasks handed to a host are invoked one at a time and never
//! concurrently, so implementations and tasks are free to use `Rc` and
//! `RefCell`.

use std::rc::Rc;
use std::time::Duration;

use crate::error::SurfaceResult;

/// A task run once by the host's event loop.
pub type Task = Box<dyn FnOnce()>;

/// A task run repeatedly by the host's event loop.
pub type RepeatingTask = Box<dyn FnMut()>;

/// Environment primitives the detector depends on.
pub trait Host {
    /// The full current address, fragment included.
    fn href(&self) -> String;

    /// Replaces the fragment of the current address.
    fn set_fragment(&self, fragment: &str);

    /// Whether the host claims to fire a native event when the fragment
    /// changes. This is a capability probe only; see
    /// [`crate::native_change_notification_is_reliable`] for the filter
    /// applied on top of it.
    fn probe_hash_change_event(&self) -> bool;

    /// Document compatibility level, when the host reports one.
    fn document_mode(&self) -> Option<u32>;

    /// Whether the host exposes the legacy activation object that marks the
    /// environments needing the auxiliary surface.
    fn has_legacy_activation_object(&self) -> bool;

    /// Whether the host carries a non-standard navigation-mode flag.
    fn has_navigation_mode(&self) -> bool;

    /// Switches the navigation-mode flag to its compatible setting.
    fn use_compatible_navigation_mode(&self);

    /// Registers `handler` for the native fragment change event.
    fn listen_hash_change(&self, handler: RepeatingTask);

    /// Runs `task` once after `delay`.
    fn set_timeout(&self, delay: Duration, task: Task);

    /// Runs `task` every `period`, forever.
    fn set_interval(&self, period: Duration, task: RepeatingTask);

    /// Creates a hidden, non-interactive surface identified by `element_id`
    /// and attaches it to the document.
    fn create_surface(&self, element_id: &str) -> SurfaceResult<Rc<dyn AuxiliarySurface>>;
}

/// A hidden embedded document whose rewrites register navigation history
/// steps on hosts that offer no other way to do so.
pub trait AuxiliarySurface {
    /// Replaces the surface's document with `html`.
    fn write_document(&self, html: &str) -> SurfaceResult<()>;

    /// Returns the visible text of the surface's document.
    fn read_text(&self) -> SurfaceResult<String>;
}

/// Minimal document recording `value` as its visible text.
///
/// Markup characters are escaped so the surface's visible text reads back as
/// exactly `value`.
pub fn history_document(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    format!("<html><body>{escaped}</body></html>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_in_history_document() {
        assert_eq!(history_document("alpha"), "<html><body>alpha</body></html>");
        assert_eq!(
            history_document("a<b>&c"),
            "<html><body>a&lt;b&gt;&amp;c</body></html>"
        );
    }
}
