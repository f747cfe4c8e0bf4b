#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::RefCell;
use std::fmt;

use tracing::warn;

/// The address from the last successful read, served when a read fails.
#[derive(Debug, Default)]
pub(crate) struct LastKnownAddress {
    href: RefCell<String>,
}

impl LastKnownAddress {
    pub(crate) fn resolve<E: fmt::Display>(&self, read: Result<String, E>) -> String {
        match read {
            Ok(href) => {
                *self.href.borrow_mut() = href.clone();
                href
            }
            Err(err) => {
                warn!(error = %err, "failed to read location href, keeping last known address");
                self.href.borrow().clone()
            }
        }
    }
}

/// Logs a failed host call. Returns whether it succeeded.
pub(crate) fn logged<E: fmt::Display>(action: &str, result: Result<(), E>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "failed to {action}");
            false
        }
    }
}
