use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use hash_track::{
    AuxiliarySurface, Detector, DetectorSettings, Host, RepeatingTask, SurfaceError,
    SurfaceResult, Task,
};
use hash_track_adapter::{ActivationHandler, Activatable};
use js_sys::{Array, Reflect};
use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Event, HtmlDocument, HtmlElement, HtmlIFrameElement, Window};

use crate::error::WebHostError;
use crate::report::{logged, LastKnownAddress};

/// A detector bound to the current page.
pub fn browser_detector(settings: DetectorSettings) -> Result<Detector, WebHostError> {
    let host = BrowserHost::new()?;
    Ok(Detector::new(Rc::new(host), settings))
}

/// [`Host`] backed by the global `window`.
pub struct BrowserHost {
    window: Window,
    document: Document,
    address: LastKnownAddress,
}

impl BrowserHost {
    pub fn new() -> Result<Self, WebHostError> {
        let window = web_sys::window().ok_or(WebHostError::NoWindow)?;
        let document = window.document().ok_or(WebHostError::NoDocument)?;
        let host = Self {
            window,
            document,
            address: LastKnownAddress::default(),
        };
        host.href();
        Ok(host)
    }
}

impl Host for BrowserHost {
    fn href(&self) -> String {
        let read = self.window.location().href().map_err(|err| js_message(&err));
        self.address.resolve(read)
    }

    fn set_fragment(&self, fragment: &str) {
        if let Err(err) = self.window.location().set_hash(fragment) {
            warn!(error = %js_message(&err), "failed to set location hash");
        }
    }

    fn probe_hash_change_event(&self) -> bool {
        let Some(body) = self.document.body() else {
            return false;
        };
        let name = JsValue::from_str("onhashchange");
        if Reflect::has(&body, &name).unwrap_or(false) {
            return true;
        }
        // Some hosts only expose handler properties once the attribute is set.
        if body.set_attribute("onhashchange", "return;").is_err() {
            return false;
        }
        Reflect::get(&body, &name)
            .map(|handler| handler.is_function())
            .unwrap_or(false)
    }

    fn document_mode(&self) -> Option<u32> {
        property(&self.document, "documentMode")
            .and_then(|mode| mode.as_f64())
            .map(|mode| mode as u32)
    }

    fn has_legacy_activation_object(&self) -> bool {
        property(&self.window, "ActiveXObject").is_some()
    }

    fn has_navigation_mode(&self) -> bool {
        self.window
            .history()
            .ok()
            .and_then(|history| property(&history, "navigationMode"))
            .map_or(false, |mode| mode.is_truthy())
    }

    fn use_compatible_navigation_mode(&self) {
        let Ok(history) = self.window.history() else {
            return;
        };
        if let Err(err) = Reflect::set(
            &history,
            &JsValue::from_str("navigationMode"),
            &JsValue::from_str("compatible"),
        ) {
            warn!(error = %js_message(&err), "failed to switch navigation mode");
        }
    }

    fn listen_hash_change(&self, handler: RepeatingTask) {
        let closure = Closure::wrap(handler);
        if let Err(err) = self
            .window
            .add_event_listener_with_callback("hashchange", closure.as_ref().unchecked_ref())
        {
            warn!(error = %js_message(&err), "failed to listen for hashchange");
            return;
        }
        // Listeners live as long as the page.
        closure.forget();
    }

    fn set_timeout(&self, delay: Duration, task: Task) {
        let callback = Closure::once_into_js(move || task());
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                millis(delay),
            )
        {
            warn!(error = %js_message(&err), "failed to schedule timeout");
        }
    }

    fn set_interval(&self, period: Duration, task: RepeatingTask) {
        let closure = Closure::wrap(task);
        if let Err(err) = self
            .window
            .set_interval_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                millis(period),
            )
        {
            warn!(error = %js_message(&err), "failed to schedule interval");
            return;
        }
        closure.forget();
    }

    fn create_surface(&self, element_id: &str) -> SurfaceResult<Rc<dyn AuxiliarySurface>> {
        let body = self.document.body().ok_or(SurfaceError::NotReady)?;
        let frame: HtmlIFrameElement = self
            .document
            .create_element("iframe")
            .map_err(host_error)?
            .dyn_into()
            .map_err(|_| SurfaceError::Host("created element is not an iframe".into()))?;
        frame.set_id(element_id);
        frame.set_src("javascript:void(0)");
        frame.set_tab_index(-1);
        frame
            .set_attribute("style", "display: none;")
            .map_err(host_error)?;
        body.append_child(&frame).map_err(host_error)?;
        Ok(Rc::new(FrameSurface { frame }))
    }
}

/// Hidden `<iframe>` whose document rewrites register history entries.
struct FrameSurface {
    frame: HtmlIFrameElement,
}

impl AuxiliarySurface for FrameSurface {
    fn write_document(&self, html: &str) -> SurfaceResult<()> {
        let document: HtmlDocument = self
            .frame
            .content_document()
            .ok_or(SurfaceError::NotReady)?
            .dyn_into()
            .map_err(|_| SurfaceError::NotReady)?;
        document.open().map_err(host_error)?;
        document
            .write(&Array::of1(&JsValue::from_str(html)))
            .map_err(host_error)?;
        document.close().map_err(host_error)?;
        Ok(())
    }

    fn read_text(&self) -> SurfaceResult<String> {
        let body = self
            .frame
            .content_document()
            .and_then(|document| document.body())
            .ok_or(SurfaceError::Unreadable)?;
        Ok(body.inner_text())
    }
}

/// A DOM element usable with `HashPlugin::bind_link`. The click listener is
/// removed when the element is rebound or this wrapper is dropped.
pub struct BrowserElement {
    element: HtmlElement,
    listener: RefCell<Option<Closure<dyn FnMut(Event)>>>,
}

impl BrowserElement {
    pub fn new(element: HtmlElement) -> Self {
        Self {
            element,
            listener: RefCell::new(None),
        }
    }

    pub fn element(&self) -> &HtmlElement {
        &self.element
    }

    fn remove_listener(&self) {
        if let Some(previous) = self.listener.borrow_mut().take() {
            let result = self
                .element
                .remove_event_listener_with_callback("click", previous.as_ref().unchecked_ref())
                .map_err(|err| js_message(&err));
            logged("remove click handler", result);
        }
    }
}

impl Activatable for BrowserElement {
    fn set_activation(&self, handler: Option<ActivationHandler>) {
        self.remove_listener();
        let Some(handler) = handler else {
            return;
        };

        let closure = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.prevent_default();
            handler();
        });
        if let Err(err) = self
            .element
            .add_event_listener_with_callback("click", closure.as_ref().unchecked_ref())
        {
            warn!(error = %js_message(&err), "failed to bind click handler");
            return;
        }
        *self.listener.borrow_mut() = Some(closure);
    }

    fn set_href(&self, href: &str) {
        if let Err(err) = self.element.set_attribute("href", href) {
            warn!(error = %js_message(&err), "failed to set href");
        }
    }
}

impl Drop for BrowserElement {
    fn drop(&mut self) {
        self.remove_listener();
    }
}

/// A property of `target` that is neither `undefined` nor `null`.
fn property(target: &JsValue, name: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}

fn host_error(err: JsValue) -> SurfaceError {
    SurfaceError::Host(js_message(&err))
}

fn millis(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}
