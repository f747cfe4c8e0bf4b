//! Deterministic in-memory host.
//!
//! [`SimulatedHost`] runs every timer and native event on a virtual clock
//! that only moves when [`SimulatedHost::advance`] is called, which makes the
//! detector's strategies observable tick by tick. Host profiles reproduce the
//! capability combinations that drive strategy selection, and fault counters
//! make the auxiliary surface fail the way a freshly created frame does.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::error::{SurfaceError, SurfaceResult};
use crate::fragment::{fragment_of, with_fragment};
use crate::host::{AuxiliarySurface, Host, RepeatingTask, Task};

/// Capability probes reported by a [`SimulatedHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostProfile {
    pub hash_change_event: bool,
    pub document_mode: Option<u32>,
    pub legacy_activation_object: bool,
    pub navigation_mode: Option<String>,
}

impl HostProfile {
    /// A current host with a working native change event.
    pub fn native() -> Self {
        Self {
            hash_change_event: true,
            document_mode: None,
            legacy_activation_object: false,
            navigation_mode: None,
        }
    }

    /// A host without the native event, carrying a navigation-mode flag.
    pub fn polling() -> Self {
        Self {
            hash_change_event: false,
            document_mode: None,
            legacy_activation_object: false,
            navigation_mode: Some("automatic".to_owned()),
        }
    }

    /// A legacy host that only records history through the auxiliary
    /// surface.
    pub fn legacy() -> Self {
        Self {
            hash_change_event: false,
            document_mode: Some(7),
            legacy_activation_object: true,
            navigation_mode: None,
        }
    }

    /// A legacy host rendering in compatibility mode: the native event probe
    /// answers yes, but the event never fires reliably.
    pub fn compatibility_view() -> Self {
        Self {
            hash_change_event: true,
            document_mode: Some(7),
            legacy_activation_object: true,
            navigation_mode: None,
        }
    }
}

/// Remaining injected failures.
#[derive(Debug, Default)]
struct Faults {
    creations: u32,
    writes: u32,
    reads: u32,
}

pub struct SimulatedHost {
    profile: HostProfile,
    this: Weak<SimulatedHost>,
    clock: RefCell<Clock>,
    state: RefCell<SimState>,
    faults: Rc<RefCell<Faults>>,
}

struct SimState {
    href: String,
    address_writes: usize,
    navigation_mode: Option<String>,
    listeners: Vec<Rc<RefCell<RepeatingTask>>>,
    history: Vec<String>,
    history_index: usize,
    surface: Option<Rc<SimulatedSurface>>,
}

impl SimulatedHost {
    pub fn new(profile: HostProfile, address: impl Into<String>) -> Rc<Self> {
        let href = address.into();
        Rc::new_cyclic(|this| SimulatedHost {
            this: this.clone(),
            clock: RefCell::new(Clock::default()),
            state: RefCell::new(SimState {
                href: href.clone(),
                address_writes: 0,
                navigation_mode: profile.navigation_mode.clone(),
                listeners: Vec::new(),
                history: vec![href],
                history_index: 0,
                surface: None,
            }),
            faults: Rc::new(RefCell::new(Faults::default())),
            profile,
        })
    }

    pub fn profile(&self) -> &HostProfile {
        &self.profile
    }

    /// Time elapsed on the virtual clock.
    pub fn now(&self) -> Duration {
        self.clock.borrow().now
    }

    /// Moves the clock forward by `by`, running every timer that falls due,
    /// in due order.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.borrow().now + by;
        loop {
            let next = self.clock.borrow_mut().take_due(target);
            let Some(timer) = next else {
                break;
            };
            match timer.job {
                Job::Once(task) => task(),
                Job::Repeat { period, mut task } => {
                    task();
                    self.clock
                        .borrow_mut()
                        .schedule(timer.due + period, Job::Repeat { period, task });
                }
            }
        }
        self.clock.borrow_mut().now = target;
    }

    /// Runs everything due now, such as queued native events.
    pub fn run_pending(&self) {
        self.advance(Duration::ZERO);
    }

    /// Number of timers waiting on the clock.
    pub fn pending_timers(&self) -> usize {
        self.clock.borrow().timers.len()
    }

    /// The full current address.
    pub fn address(&self) -> String {
        self.state.borrow().href.clone()
    }

    /// Fragment writes performed through [`Host::set_fragment`].
    pub fn address_writes(&self) -> usize {
        self.state.borrow().address_writes
    }

    pub fn navigation_mode(&self) -> Option<String> {
        self.state.borrow().navigation_mode.clone()
    }

    /// Changes the fragment the way a user or an unrelated script would,
    /// bypassing the detector.
    pub fn navigate_externally(&self, fragment: &str) {
        let href = with_fragment(&self.address(), fragment);
        self.set_address(href);
    }

    /// Replaces the whole address, bypassing the detector.
    pub fn set_address(&self, href: impl Into<String>) {
        let href = href.into();
        if self.replace_href(href) {
            self.queue_hash_change();
        }
    }

    /// Steps back through history. Returns `false` at the oldest entry.
    pub fn back(&self) -> bool {
        self.traverse(-1)
    }

    /// Steps forward through history. Returns `false` at the newest entry.
    pub fn forward(&self) -> bool {
        self.traverse(1)
    }

    /// The auxiliary surface, once the detector has created it.
    pub fn surface(&self) -> Option<Rc<SimulatedSurface>> {
        self.state.borrow().surface.clone()
    }

    /// Makes the next `count` surface creations fail as not ready.
    pub fn fail_surface_creations(&self, count: u32) {
        self.faults.borrow_mut().creations = count;
    }

    /// Makes the next `count` surface writes fail as not ready.
    pub fn fail_surface_writes(&self, count: u32) {
        self.faults.borrow_mut().writes = count;
    }

    /// Makes the next `count` surface reads fail.
    pub fn fail_surface_reads(&self, count: u32) {
        self.faults.borrow_mut().reads = count;
    }

    fn traverse(&self, step: isize) -> bool {
        if let Some(surface) = self.surface() {
            return surface.traverse(step);
        }

        let changed = {
            let mut state = self.state.borrow_mut();
            let Some(index) = state.history_index.checked_add_signed(step) else {
                return false;
            };
            if index >= state.history.len() {
                return false;
            }
            state.history_index = index;
            let href = state.history[index].clone();
            let changed = fragment_of(&href) != fragment_of(&state.href);
            state.href = href;
            changed
        };
        if changed {
            self.queue_hash_change();
        }
        true
    }

    /// Stores `href` and records a history entry. Legacy hosts do not turn
    /// address changes into history entries once the surface exists.
    fn replace_href(&self, href: String) -> bool {
        let mut state = self.state.borrow_mut();
        if state.href == href {
            return false;
        }
        if state.surface.is_none() {
            let keep = state.history_index + 1;
            state.history.truncate(keep);
            state.history.push(href.clone());
            state.history_index = keep;
        }
        state.href = href;
        true
    }

    fn queue_hash_change(&self) {
        if !self.profile.hash_change_event {
            return;
        }
        let this = self.this.clone();
        self.set_timeout(
            Duration::ZERO,
            Box::new(move || {
                if let Some(host) = this.upgrade() {
                    host.dispatch_hash_change();
                }
            }),
        );
    }

    fn dispatch_hash_change(&self) {
        let listeners = self.state.borrow().listeners.clone();
        for listener in listeners {
            let mut handler = listener.borrow_mut();
            (*handler)();
        }
    }
}

impl Host for SimulatedHost {
    fn href(&self) -> String {
        self.address()
    }

    fn set_fragment(&self, fragment: &str) {
        self.state.borrow_mut().address_writes += 1;
        let href = with_fragment(&self.address(), fragment);
        if self.replace_href(href) {
            self.queue_hash_change();
        }
    }

    fn probe_hash_change_event(&self) -> bool {
        self.profile.hash_change_event
    }

    fn document_mode(&self) -> Option<u32> {
        self.profile.document_mode
    }

    fn has_legacy_activation_object(&self) -> bool {
        self.profile.legacy_activation_object
    }

    fn has_navigation_mode(&self) -> bool {
        self.state.borrow().navigation_mode.is_some()
    }

    fn use_compatible_navigation_mode(&self) {
        self.state.borrow_mut().navigation_mode = Some("compatible".to_owned());
    }

    fn listen_hash_change(&self, handler: RepeatingTask) {
        self.state
            .borrow_mut()
            .listeners
            .push(Rc::new(RefCell::new(handler)));
    }

    fn set_timeout(&self, delay: Duration, task: Task) {
        let mut clock = self.clock.borrow_mut();
        let due = clock.now + delay;
        clock.schedule(due, Job::Once(task));
    }

    fn set_interval(&self, period: Duration, task: RepeatingTask) {
        // A zero period would keep `advance` from ever reaching its target.
        let period = period.max(Duration::from_millis(1));
        let mut clock = self.clock.borrow_mut();
        let due = clock.now + period;
        clock.schedule(due, Job::Repeat { period, task });
    }

    fn create_surface(&self, element_id: &str) -> SurfaceResult<Rc<dyn AuxiliarySurface>> {
        {
            let mut faults = self.faults.borrow_mut();
            if faults.creations > 0 {
                faults.creations -= 1;
                return Err(SurfaceError::NotReady);
            }
        }
        let surface = Rc::new(SimulatedSurface {
            element_id: element_id.to_owned(),
            faults: Rc::clone(&self.faults),
            state: RefCell::new(SurfaceState::default()),
        });
        self.state.borrow_mut().surface = Some(Rc::clone(&surface));
        Ok(surface)
    }
}

/// Hidden frame of a [`SimulatedHost`]. Every document write is a history
/// entry; traversal swaps the visible document.
pub struct SimulatedSurface {
    element_id: String,
    faults: Rc<RefCell<Faults>>,
    state: RefCell<SurfaceState>,
}

#[derive(Default)]
struct SurfaceState {
    entries: Vec<String>,
    index: Option<usize>,
}

impl SimulatedSurface {
    pub fn element_id(&self) -> &str {
        &self.element_id
    }

    /// Visible text of every recorded entry, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.state.borrow().entries.clone()
    }

    /// Visible text of the current entry, ignoring injected read faults.
    pub fn text(&self) -> Option<String> {
        let state = self.state.borrow();
        state.index.map(|index| state.entries[index].clone())
    }

    fn traverse(&self, step: isize) -> bool {
        let mut state = self.state.borrow_mut();
        let Some(current) = state.index else {
            return false;
        };
        match current.checked_add_signed(step) {
            Some(index) if index < state.entries.len() => {
                state.index = Some(index);
                true
            }
            _ => false,
        }
    }
}

impl AuxiliarySurface for SimulatedSurface {
    fn write_document(&self, html: &str) -> SurfaceResult<()> {
        {
            let mut faults = self.faults.borrow_mut();
            if faults.writes > 0 {
                faults.writes -= 1;
                return Err(SurfaceError::NotReady);
            }
        }
        let mut state = self.state.borrow_mut();
        let keep = state.index.map_or(0, |index| index + 1);
        state.entries.truncate(keep);
        state.entries.push(body_text(html));
        state.index = Some(keep);
        Ok(())
    }

    fn read_text(&self) -> SurfaceResult<String> {
        {
            let mut faults = self.faults.borrow_mut();
            if faults.reads > 0 {
                faults.reads -= 1;
                return Err(SurfaceError::Unreadable);
            }
        }
        self.text().ok_or(SurfaceError::Unreadable)
    }
}

fn body_text(html: &str) -> String {
    let body = html.split_once("<body>").map_or(html, |(_, rest)| rest);
    let body = body.rsplit_once("</body>").map_or(body, |(inner, _)| inner);
    body.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// A notification delivered to a [`Recorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub fragment: String,
    pub initial: bool,
}

impl Notification {
    pub fn initial(fragment: &str) -> Self {
        Self {
            fragment: fragment.to_owned(),
            initial: true,
        }
    }

    pub fn change(fragment: &str) -> Self {
        Self {
            fragment: fragment.to_owned(),
            initial: false,
        }
    }
}

/// Collects every notification a detector delivers.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Rc<RefCell<Vec<Notification>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detector callback appending to this recorder.
    pub fn callback(&self) -> impl Fn(&str, bool) + 'static {
        let events = Rc::clone(&self.events);
        move |fragment: &str, initial: bool| {
            events.borrow_mut().push(Notification {
                fragment: fragment.to_owned(),
                initial,
            });
        }
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.events.borrow().clone()
    }

    /// Returns and clears the recorded notifications.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}

#[derive(Default)]
struct Clock {
    now: Duration,
    next_seq: u64,
    timers: Vec<Timer>,
}

struct Timer {
    due: Duration,
    seq: u64,
    job: Job,
}

enum Job {
    Once(Task),
    Repeat {
        period: Duration,
        task: RepeatingTask,
    },
}

impl Clock {
    fn schedule(&mut self, due: Duration, job: Job) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(Timer { due, seq, job });
    }

    /// Removes the earliest timer due at or before `target` and moves the
    /// clock to its due time.
    fn take_due(&mut self, target: Duration) -> Option<Timer> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due <= target)
            .min_by_key(|(_, timer)| (timer.due, timer.seq))
            .map(|(index, _)| index)?;
        let timer = self.timers.swap_remove(index);
        self.now = self.now.max(timer.due);
        Some(timer)
    }
}
