//! Address fragment change tracking with history support.
//!
//! A [`Detector`] watches the fragment of the current address (everything
//! after the first `#`) and reports it to a single callback as
//! `(fragment, is_initial)`: once synchronously when initialised, then on
//! every change. [`Detector::navigate_to`] moves to a new fragment and creates
//! a history entry, so back and forward work.
//!
//! The environment is reached through the [`Host`] trait. Depending on what
//! the host supports, the detector listens to native change events, polls the
//! address, or on legacy hosts records history steps in a hidden auxiliary
//! surface (see [`Strategy`]). [`sim::SimulatedHost`] is a deterministic host
//! for tests and tooling.
//!
//! ```
//! use hash_track::sim::{HostProfile, Notification, Recorder, SimulatedHost};
//! use hash_track::{Detector, DetectorSettings};
//!
//! let host = SimulatedHost::new(HostProfile::native(), "http://example.com/page#alpha");
//! let detector = Detector::new(host.clone(), DetectorSettings::default());
//! let recorder = Recorder::new();
//!
//! detector.initialize(recorder.callback());
//! detector.navigate_to("beta");
//!
//! assert_eq!(host.address(), "http://example.com/page#beta");
//! assert_eq!(
//!     recorder.take(),
//!     vec![Notification::initial("alpha"), Notification::change("beta")]
//! );
//! ```

mod detector;
mod error;
mod fragment;
pub mod host;
pub mod sim;
mod strategy;

pub use detector::{Callback, Detector, DetectorSettings, DEFAULT_SURFACE_ID};
pub use error::{SurfaceError, SurfaceResult};
pub use fragment::{fragment_of, with_fragment};
pub use host::{history_document, AuxiliarySurface, Host, RepeatingTask, Task};
pub use strategy::{native_change_notification_is_reliable, select_strategy, Strategy};
