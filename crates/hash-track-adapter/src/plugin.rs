use std::cell::Cell;
use std::rc::Rc;

use hash_track::Detector;
use hash_track_config::AdapterConfig;
use tracing::debug;

use crate::events::{EventDispatcher, HandlerId};
use crate::link::{ActivationHandler, Activatable};

/// Forwards every fragment notification of a [`Detector`] to an
/// [`EventDispatcher`] under the configured event name.
///
/// Handlers should be bound before [`HashPlugin::init`] so they also see the
/// initial fragment.
pub struct HashPlugin {
    detector: Detector,
    events: Rc<EventDispatcher>,
    config: AdapterConfig,
    initialized: Cell<bool>,
}

impl HashPlugin {
    pub fn new(detector: Detector, events: Rc<EventDispatcher>, config: AdapterConfig) -> Self {
        Self {
            detector,
            events,
            config,
            initialized: Cell::new(false),
        }
    }

    /// Starts the detector with a callback triggering the change event. Only
    /// the first call has any effect.
    pub fn init(&self) {
        if self.initialized.replace(true) {
            return;
        }
        if self.detector.is_initialized() {
            debug!("detector was initialised elsewhere; changes will not be forwarded");
        }

        let events = Rc::clone(&self.events);
        let event_name = self.config.event_name.clone();
        self.detector.initialize(move |fragment, _initial| {
            events.trigger(&event_name, fragment);
        });
    }

    /// Navigates to `fragment`. See [`Detector::navigate_to`].
    pub fn go(&self, fragment: &str) {
        self.detector.navigate_to(fragment);
    }

    /// Binds `handler` to the change event.
    pub fn on_change<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&str) + 'static,
    {
        self.events.bind(&self.config.event_name, handler)
    }

    /// Makes `element` navigate to `target` when activated, replacing any
    /// earlier binding on it. With `target` set to `None` the earlier binding
    /// is only removed.
    ///
    /// The element's link target becomes `#target` unless `set_href` is
    /// `Some(false)`; `None` falls back to the configured default.
    pub fn bind_link(&self, element: &dyn Activatable, target: Option<&str>, set_href: Option<bool>) {
        element.set_activation(None);

        let Some(target) = target else {
            return;
        };

        let detector = self.detector.clone();
        let fragment = target.to_owned();
        let handler: ActivationHandler = Rc::new(move || detector.navigate_to(&fragment));
        element.set_activation(Some(handler));

        if set_href.unwrap_or(self.config.set_href) {
            element.set_href(&format!("#{target}"));
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn events(&self) -> &Rc<EventDispatcher> {
        &self.events
    }

    pub fn event_name(&self) -> &str {
        &self.config.event_name
    }
}
