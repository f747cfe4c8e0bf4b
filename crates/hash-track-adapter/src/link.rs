use std::rc::Rc;

/// Handler run when a bound element is activated.
pub type ActivationHandler = Rc<dyn Fn()>;

/// An element that can be bound to navigate to a fragment, such as an
/// anchor.
pub trait Activatable {
    /// Installs `handler` in place of the one a previous binding installed;
    /// `None` removes it. While a handler is installed the element's default
    /// activation is suppressed.
    fn set_activation(&self, handler: Option<ActivationHandler>);

    /// Sets the element's visible link target.
    fn set_href(&self, href: &str);
}
