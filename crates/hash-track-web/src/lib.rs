//! Browser implementation of the hash-track host.
//!
//! Only available when compiling for `wasm32`. [`BrowserHost`] reads and
//! writes `window.location`, probes the capabilities that drive strategy
//! selection, schedules work with `setTimeout`/`setInterval`, and creates the
//! hidden `<iframe>` used as the auxiliary surface. [`BrowserElement`] lets a
//! DOM element be bound with `HashPlugin::bind_link`.

mod error;
mod report;

#[cfg(target_arch = "wasm32")]
mod browser;

pub use error::WebHostError;

#[cfg(target_arch = "wasm32")]
pub use browser::{browser_detector, BrowserElement, BrowserHost};

/// Whether this build runs against a browser.
pub fn is_browser() -> bool {
    cfg!(target_arch = "wasm32")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_describe_the_missing_global() {
        assert_eq!(WebHostError::NoWindow.to_string(), "no global window object");
        assert_eq!(WebHostError::NoDocument.to_string(), "window has no document");
    }
}
