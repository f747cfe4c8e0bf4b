use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use hash_track::sim::{Notification, SimulatedHost};
use hash_track_adapter::{ActivationHandler, Activatable, EventDispatcher, HashPlugin};
use hash_track_config::AdapterConfig;
use hash_track_test_support::{
    detector_for, legacy_host, native_host, polling_host, started_detector, test_config,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct TestElement {
    handler: RefCell<Option<ActivationHandler>>,
    href: RefCell<Option<String>>,
}

impl TestElement {
    /// Simulates a click; returns whether default activation would proceed.
    fn click(&self) -> bool {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => {
                handler();
                false
            }
            None => true,
        }
    }

    fn href(&self) -> Option<String> {
        self.href.borrow().clone()
    }
}

impl Activatable for TestElement {
    fn set_activation(&self, handler: Option<ActivationHandler>) {
        *self.handler.borrow_mut() = handler;
    }

    fn set_href(&self, href: &str) {
        *self.href.borrow_mut() = Some(href.to_owned());
    }
}

fn plugin_for(host: &Rc<SimulatedHost>) -> (HashPlugin, Rc<RefCell<Vec<String>>>) {
    let plugin = HashPlugin::new(
        detector_for(host),
        Rc::new(EventDispatcher::new()),
        test_config().adapter,
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    plugin.on_change(move |fragment| sink.borrow_mut().push(fragment.to_owned()));
    (plugin, seen)
}

#[test]
fn forwards_initial_and_subsequent_fragments() {
    let host = native_host();
    let (plugin, seen) = plugin_for(&host);

    plugin.init();
    plugin.go("beta");
    host.navigate_externally("gamma");
    host.run_pending();

    assert_eq!(*seen.borrow(), vec!["alpha", "beta", "gamma"]);
}

#[test]
fn init_runs_once() {
    let host = native_host();
    let (plugin, seen) = plugin_for(&host);

    plugin.init();
    plugin.init();

    assert_eq!(*seen.borrow(), vec!["alpha"]);
    assert_eq!(plugin.events().handler_count("hashchange"), 1);
}

#[test]
fn uses_configured_event_name() {
    let host = native_host();
    let events = Rc::new(EventDispatcher::new());
    let plugin = HashPlugin::new(
        detector_for(&host),
        Rc::clone(&events),
        AdapterConfig {
            event_name: "fragment".into(),
            set_href: true,
        },
    );
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    events.bind("hashchange", |_| panic!("default event name must not fire"));
    events.bind("fragment", move |fragment| sink.borrow_mut().push(fragment.to_owned()));

    plugin.init();

    assert_eq!(plugin.event_name(), "fragment");
    assert_eq!(*seen.borrow(), vec!["alpha"]);
}

#[test]
fn bound_link_navigates_and_sets_href() {
    let host = native_host();
    let (plugin, seen) = plugin_for(&host);
    plugin.init();
    let link = TestElement::default();

    plugin.bind_link(&link, Some("settings"), None);

    assert_eq!(link.href().as_deref(), Some("#settings"));
    assert!(!link.click());
    assert_eq!(host.address(), "http://example.com/page#settings");
    assert_eq!(*seen.borrow(), vec!["alpha", "settings"]);
}

#[test]
fn rebinding_replaces_previous_target() {
    let host = native_host();
    let (plugin, seen) = plugin_for(&host);
    plugin.init();
    let link = TestElement::default();

    plugin.bind_link(&link, Some("first"), None);
    plugin.bind_link(&link, Some("second"), Some(false));

    assert_eq!(link.href().as_deref(), Some("#first"));
    link.click();
    assert_eq!(*seen.borrow(), vec!["alpha", "second"]);
}

#[test]
fn unbinding_restores_default_activation() {
    let host = native_host();
    let (plugin, seen) = plugin_for(&host);
    plugin.init();
    let link = TestElement::default();

    plugin.bind_link(&link, Some("first"), None);
    plugin.bind_link(&link, None, None);

    assert!(link.click());
    assert_eq!(*seen.borrow(), vec!["alpha"]);
}

#[test]
fn configured_href_default_can_be_disabled() {
    let host = native_host();
    let mut config = test_config().adapter;
    config.set_href = false;
    let plugin = HashPlugin::new(detector_for(&host), Rc::new(EventDispatcher::new()), config);
    let link = TestElement::default();

    plugin.bind_link(&link, Some("quiet"), None);
    assert_eq!(link.href(), None);

    plugin.bind_link(&link, Some("loud"), Some(true));
    assert_eq!(link.href().as_deref(), Some("#loud"));
}

#[test]
fn legacy_hosts_forward_after_the_surface_tick() {
    let host = legacy_host();
    let (plugin, seen) = plugin_for(&host);
    plugin.init();

    plugin.go("beta");
    assert_eq!(*seen.borrow(), vec!["alpha"]);

    host.advance(Duration::from_millis(50));
    assert_eq!(*seen.borrow(), vec!["alpha", "beta"]);

    assert!(host.back());
    host.advance(Duration::from_millis(50));
    assert_eq!(*seen.borrow(), vec!["alpha", "beta", "alpha"]);
}

#[test]
fn detector_started_elsewhere_keeps_its_own_callback() {
    let host = polling_host();
    let (detector, recorder) = started_detector(&host);
    let plugin = HashPlugin::new(detector, Rc::new(EventDispatcher::new()), test_config().adapter);
    let seen = Rc::new(RefCell::new(Vec::<String>::new()));
    let sink = Rc::clone(&seen);
    plugin.on_change(move |fragment| sink.borrow_mut().push(fragment.to_owned()));

    plugin.init();
    host.navigate_externally("beta");
    host.advance(Duration::from_millis(50));

    assert!(seen.borrow().is_empty());
    assert_eq!(
        recorder.take(),
        vec![Notification::initial("alpha"), Notification::change("beta")]
    );
}
