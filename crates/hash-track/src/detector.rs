use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::fragment::fragment_of;
use crate::host::{history_document, AuxiliarySurface, Host};
use crate::strategy::{select_strategy, Strategy};

/// Element id given to the auxiliary surface unless configured otherwise.
pub const DEFAULT_SURFACE_ID: &str = "hash-track-history";

/// Receives `(fragment, is_initial)` on every observed change.
pub type Callback = Rc<dyn Fn(&str, bool)>;

/// Timing knobs for the polling strategies and the surface retry loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorSettings {
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    /// Retries allowed for a failed surface setup or write. `None` retries
    /// forever.
    pub max_retries: Option<u32>,
    pub surface_id: String,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            retry_delay: Duration::from_millis(10),
            max_retries: None,
            surface_id: DEFAULT_SURFACE_ID.to_owned(),
        }
    }
}

/// Tracks the address fragment of a host and reports its changes to a
/// single callback.
///
/// Cloning yields another handle to the same detector. Timers and event
/// handlers registered with the host hold weak references, so detection stops
/// once every handle has been dropped.
#[derive(Clone)]
pub struct Detector {
    shared: Rc<Shared>,
}

struct Shared {
    host: Rc<dyn Host>,
    settings: DetectorSettings,
    state: RefCell<State>,
}

struct State {
    current: String,
    callback: Option<Callback>,
    strategy: Option<Strategy>,
    surface: Option<SurfaceSlot>,
}

struct SurfaceSlot {
    handle: Rc<dyn AuxiliarySurface>,
    last_recorded: String,
}

impl Detector {
    pub fn new(host: Rc<dyn Host>, settings: DetectorSettings) -> Self {
        let current = fragment_of(&host.href()).to_owned();
        Self {
            shared: Rc::new(Shared {
                host,
                settings,
                state: RefCell::new(State {
                    current,
                    callback: None,
                    strategy: None,
                    surface: None,
                }),
            }),
        }
    }

    /// Registers `callback`, reports the current fragment to it with
    /// `is_initial` set, and starts detection.
    ///
    /// Only the first call has any effect. Later calls are ignored, including
    /// their callbacks, so repeated initialisation from independent callers
    /// is safe.
    pub fn initialize<F>(&self, callback: F)
    where
        F: Fn(&str, bool) + 'static,
    {
        let shared = &self.shared;
        let initial = {
            let mut state = shared.state.borrow_mut();
            if state.callback.is_some() {
                debug!("detector already initialised, ignoring");
                return;
            }
            let initial = shared.read_fragment();
            state.current = initial.clone();
            state.callback = Some(Rc::new(callback));
            initial
        };
        shared.notify(&initial, true);

        let strategy = select_strategy(shared.host.as_ref());
        shared.state.borrow_mut().strategy = Some(strategy);
        debug!(%strategy, fragment = %initial, "fragment detection started");

        match strategy {
            Strategy::NativeEvent => {
                let weak = Rc::downgrade(shared);
                shared.host.listen_hash_change(Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.check_address();
                    }
                }));
            }
            Strategy::Polling => {
                if shared.host.has_navigation_mode() {
                    shared.host.use_compatible_navigation_mode();
                }
                let weak = Rc::downgrade(shared);
                shared.host.set_interval(
                    shared.settings.poll_interval,
                    Box::new(move || {
                        if let Some(shared) = weak.upgrade() {
                            shared.check_address();
                        }
                    }),
                );
            }
            Strategy::AuxiliarySurface => set_up_surface(shared, 0),
        }
    }

    /// Moves to `fragment`, creating a history entry.
    ///
    /// Navigating to the fragment already stored does nothing: there is no
    /// portable way to record the same value twice in a row. Callers that
    /// need it must make the value distinct, e.g. with a counter suffix.
    ///
    /// Once the auxiliary surface is attached, the change is recorded there
    /// and reported by its polling loop instead of synchronously.
    pub fn navigate_to(&self, fragment: &str) {
        let shared = &self.shared;
        let via_surface = {
            let state = shared.state.borrow();
            if state.current == fragment {
                trace!(fragment, "already at fragment");
                return;
            }
            state.surface.is_some()
        };

        if via_surface {
            record_history_step(shared, fragment.to_owned(), 0);
            return;
        }

        shared.state.borrow_mut().current = fragment.to_owned();
        shared.host.set_fragment(fragment);
        debug!(fragment, "navigated");
        shared.notify(fragment, false);
    }

    /// Parses the fragment out of the host's full address. Pure.
    pub fn read_current_fragment(&self) -> String {
        self.shared.read_fragment()
    }

    /// The last fragment observed or set.
    pub fn current_fragment(&self) -> String {
        self.shared.state.borrow().current.clone()
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.shared.state.borrow().strategy
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.state.borrow().callback.is_some()
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.shared.settings
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("Detector")
            .field("current", &state.current)
            .field("initialized", &state.callback.is_some())
            .field("strategy", &state.strategy)
            .field("surface_attached", &state.surface.is_some())
            .finish()
    }
}

impl Shared {
    fn read_fragment(&self) -> String {
        fragment_of(&self.host.href()).to_owned()
    }

    fn check_address(&self) {
        let fragment = self.read_fragment();
        {
            let mut state = self.state.borrow_mut();
            if state.current == fragment {
                return;
            }
            state.current = fragment.clone();
        }
        debug!(fragment = %fragment, "fragment changed");
        self.notify(&fragment, false);
    }

    // The callback is cloned out first so it may call back into the detector.
    fn notify(&self, fragment: &str, initial: bool) {
        let callback = self.state.borrow().callback.clone();
        if let Some(callback) = callback {
            callback(fragment, initial);
        }
    }

    fn surface_handle(&self) -> Option<Rc<dyn AuxiliarySurface>> {
        self.state
            .borrow()
            .surface
            .as_ref()
            .map(|slot| Rc::clone(&slot.handle))
    }
}

fn retry_later<F>(shared: &Rc<Shared>, operation: &'static str, attempt: u32, task: F)
where
    F: FnOnce(&Rc<Shared>, u32) + 'static,
{
    if let Some(max) = shared.settings.max_retries {
        if attempt >= max {
            warn!(
                operation,
                attempts = next_attempt(attempt),
                "auxiliary surface still unavailable, giving up"
            );
            return;
        }
    }

    let weak = Rc::downgrade(shared);
    shared.host.set_timeout(
        shared.settings.retry_delay,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                task(&shared, next_attempt(attempt));
            }
        }),
    );
}

// Unbounded retry loops may run for the life of the page.
fn next_attempt(attempt: u32) -> u32 {
    attempt.saturating_add(1)
}

fn set_up_surface(shared: &Rc<Shared>, attempt: u32) {
    let handle = match shared.host.create_surface(&shared.settings.surface_id) {
        Ok(handle) => handle,
        Err(err) => {
            trace!(error = %err, attempt, "auxiliary surface setup failed");
            retry_later(shared, "setup", attempt, set_up_surface);
            return;
        }
    };

    let seed = {
        let mut state = shared.state.borrow_mut();
        let seed = state.current.clone();
        state.surface = Some(SurfaceSlot {
            handle,
            last_recorded: seed.clone(),
        });
        seed
    };
    debug!(element_id = %shared.settings.surface_id, "auxiliary surface attached");

    record_history_step(shared, seed, 0);

    let weak = Rc::downgrade(shared);
    shared.host.set_interval(
        shared.settings.poll_interval,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                poll_surface(&shared);
            }
        }),
    );
}

/// Rewrites the surface with `value`, registering a history step, and stores
/// `value` as the current fragment. The surface loop reports it on its next
/// tick.
fn record_history_step(shared: &Rc<Shared>, value: String, attempt: u32) {
    let Some(handle) = shared.surface_handle() else {
        return;
    };

    match handle.write_document(&history_document(&value)) {
        Ok(()) => {
            trace!(fragment = %value, "history step recorded");
            shared.state.borrow_mut().current = value;
        }
        Err(err) => {
            trace!(error = %err, attempt, "history step write failed");
            retry_later(shared, "write", attempt, move |shared, attempt| {
                record_history_step(shared, value, attempt)
            });
        }
    }
}

fn poll_surface(shared: &Rc<Shared>) {
    let snapshot = {
        let state = shared.state.borrow();
        state
            .surface
            .as_ref()
            .map(|slot| (Rc::clone(&slot.handle), slot.last_recorded.clone()))
    };
    let Some((handle, last_recorded)) = snapshot else {
        return;
    };

    let content = match handle.read_text() {
        Ok(content) => content,
        Err(err) => {
            trace!(error = %err, "auxiliary surface unreadable, skipping tick");
            return;
        }
    };

    if content != last_recorded {
        {
            let mut state = shared.state.borrow_mut();
            if let Some(slot) = state.surface.as_mut() {
                slot.last_recorded = content.clone();
            }
            state.current = content.clone();
        }
        debug!(fragment = %content, "history step restored");
        shared.host.set_fragment(&content);
        shared.notify(&content, true);
        return;
    }

    // The address was changed without going through the detector; mirror it
    // into the surface so it becomes a history step.
    let fragment = shared.read_fragment();
    let stale = shared.state.borrow().current != fragment;
    if stale {
        record_history_step(shared, fragment, 0);
    }
}
