//! Shared test harness utilities for hash-track crates.

use std::rc::Rc;

use hash_track::sim::{HostProfile, Recorder, SimulatedHost};
use hash_track::Detector;
use hash_track_config::Config;

pub const START_ADDRESS: &str = "http://example.com/page#alpha";

/// Returns a baseline configuration for tests.
pub fn test_config() -> Config {
    Config::default()
}

pub fn native_host() -> Rc<SimulatedHost> {
    SimulatedHost::new(HostProfile::native(), START_ADDRESS)
}

pub fn polling_host() -> Rc<SimulatedHost> {
    SimulatedHost::new(HostProfile::polling(), START_ADDRESS)
}

pub fn legacy_host() -> Rc<SimulatedHost> {
    SimulatedHost::new(HostProfile::legacy(), START_ADDRESS)
}

/// A detector for `host` using the test configuration, not yet initialised.
pub fn detector_for(host: &Rc<SimulatedHost>) -> Detector {
    Detector::new(host.clone(), test_config().detector_settings())
}

/// An initialised detector with its recorder.
pub fn started_detector(host: &Rc<SimulatedHost>) -> (Detector, Recorder) {
    let detector = detector_for(host);
    let recorder = Recorder::new();
    detector.initialize(recorder.callback());
    (detector, recorder)
}
