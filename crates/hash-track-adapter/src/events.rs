use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handler receiving the new fragment.
pub type EventHandler = Rc<dyn Fn(&str)>;

/// Identifies a bound handler so it can be unbound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Named-event registry. Handlers run in the order they were bound.
#[derive(Default)]
pub struct EventDispatcher {
    bindings: RefCell<Vec<Binding>>,
    next_id: Cell<u64>,
}

struct Binding {
    id: HandlerId,
    event: String,
    handler: EventHandler,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&str) + 'static,
    {
        let id = HandlerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.bindings.borrow_mut().push(Binding {
            id,
            event: event.to_owned(),
            handler: Rc::new(handler),
        });
        id
    }

    /// Removes a handler. Returns `false` if it was not bound.
    pub fn unbind(&self, id: HandlerId) -> bool {
        let mut bindings = self.bindings.borrow_mut();
        let before = bindings.len();
        bindings.retain(|binding| binding.id != id);
        bindings.len() != before
    }

    /// Calls every handler bound to `event` with `fragment` and returns how
    /// many ran. Handlers bound or unbound during the dispatch take effect on
    /// the next one.
    pub fn trigger(&self, event: &str, fragment: &str) -> usize {
        let handlers: Vec<EventHandler> = self
            .bindings
            .borrow()
            .iter()
            .filter(|binding| binding.event == event)
            .map(|binding| Rc::clone(&binding.handler))
            .collect();
        for handler in &handlers {
            handler(fragment);
        }
        handlers.len()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.bindings
            .borrow()
            .iter()
            .filter(|binding| binding.event == event)
            .count()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings = self.bindings.borrow();
        f.debug_struct("EventDispatcher")
            .field("bindings", &bindings.len())
            .finish()
    }
}
