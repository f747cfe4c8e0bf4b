use std::fmt;

use crate::host::Host;

/// How the detector learns about fragment changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The host's native fragment change event.
    NativeEvent,
    /// Sampling the address on a timer.
    Polling,
    /// History steps recorded in a hidden auxiliary surface, sampled on a
    /// timer.
    AuxiliarySurface,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::NativeEvent => "native-event",
            Strategy::Polling => "polling",
            Strategy::AuxiliarySurface => "auxiliary-surface",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters the native change event probe through the document
/// compatibility level.
///
/// Compatibility rendering modes at level 7 and below answer the probe
/// positively but never fire the event. This is the only place a version
/// number is consulted.
pub fn native_change_notification_is_reliable(document_mode: Option<u32>) -> bool {
    document_mode.map_or(true, |mode| mode > 7)
}

/// Legacy hosts below compatibility level 8 cannot create history entries
/// from fragment writes and need the auxiliary surface.
fn needs_auxiliary_surface(host: &dyn Host) -> bool {
    host.has_legacy_activation_object() && host.document_mode().map_or(true, |mode| mode < 8)
}

/// Picks the strategy for `host` from its capability probes.
pub fn select_strategy(host: &dyn Host) -> Strategy {
    if host.probe_hash_change_event() && native_change_notification_is_reliable(host.document_mode())
    {
        Strategy::NativeEvent
    } else if needs_auxiliary_surface(host) {
        Strategy::AuxiliarySurface
    } else {
        Strategy::Polling
    }
}
