//! Browser host for the captcha widget
//!
//! Builds the DOM, turns pointer events into `CaptchaInput`s, and executes the
//! `CaptchaEvent`s the state machine queues (repaint, timers, fetch,
//! navigation). Every listener, timer and request is owned by the widget and
//! released on `destroy`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::Vec2;
use image::RgbaImage;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use wasm_bindgen::prelude::*;
use wasm_bindgen::{Clamped, JsCast};
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    AbortController, AbortSignal, CanvasRenderingContext2d, Document, EventTarget,
    HtmlCanvasElement, HtmlElement, ImageData, MouseEvent, Request, RequestInit, RequestMode,
    Response, Window,
};

use crate::captcha::{
    CaptchaEvent, CaptchaInput, CaptchaState, Feedback, Lifecycle, VerificationOutcome, step,
};
use crate::config::CaptchaConfig;
use crate::error::{CaptchaError, Result};
use crate::render;

/// Attribute holding a JSON `CaptchaConfig` on the mount element
pub const CONFIG_ATTRIBUTE: &str = "data-captcha-config";

impl From<CaptchaError> for JsValue {
    fn from(err: CaptchaError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

fn js_err(e: JsValue) -> CaptchaError {
    CaptchaError::Dom(describe(&e))
}

fn describe(e: &JsValue) -> String {
    e.as_string().unwrap_or_else(|| format!("{:?}", e))
}

fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| CaptchaError::Dom("no window".into()))
}

fn document() -> Result<Document> {
    window()?
        .document()
        .ok_or_else(|| CaptchaError::Dom("no document".into()))
}

/// Widget DOM nodes
struct Dom {
    wrapper: HtmlElement,
    container: HtmlElement,
    background: HtmlCanvasElement,
    piece: HtmlCanvasElement,
}

/// A registered listener, kept so it can be removed again
struct Listener {
    target: EventTarget,
    kind: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

/// Everything one mounted widget owns
struct Host {
    state: CaptchaState,
    dom: Dom,
    listeners: Vec<Listener>,
    feedback_timer: Option<i32>,
    /// Callback of the latest feedback timer, dropped once superseded
    feedback_callback: Option<Closure<dyn FnMut()>>,
    in_flight: Vec<(u64, AbortController)>,
}

type Shared = Rc<RefCell<Host>>;

impl Host {
    /// Release listeners, timers, requests and DOM. Safe to call twice.
    fn teardown(&mut self) {
        if self.state.lifecycle != Lifecycle::Destroyed {
            step(&mut self.state, CaptchaInput::Destroy);
        }
        for (_, controller) in self.in_flight.drain(..) {
            controller.abort();
        }
        if let (Some(id), Some(window)) = (self.feedback_timer.take(), web_sys::window()) {
            window.clear_timeout_with_handle(id);
        }
        self.feedback_callback = None;
        for listener in self.listeners.drain(..) {
            if let Err(e) = listener.target.remove_event_listener_with_callback(
                listener.kind,
                listener.closure.as_ref().unchecked_ref(),
            ) {
                log::warn!("Failed to remove {} listener: {}", listener.kind, describe(&e));
            }
        }
        self.dom.wrapper.remove();
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// A mounted slider captcha
#[wasm_bindgen]
pub struct CaptchaWidget {
    host: Shared,
}

#[wasm_bindgen]
impl CaptchaWidget {
    /// Mount with an optional JSON config (missing fields use defaults)
    #[wasm_bindgen(js_name = mount)]
    pub fn mount_json(config_json: Option<String>) -> std::result::Result<CaptchaWidget, JsValue> {
        let config = match config_json {
            Some(json) => CaptchaConfig::from_json(&json)?,
            None => CaptchaConfig::default(),
        };
        Ok(mount(config)?)
    }

    /// Tear down: abort requests, clear timers, unregister listeners
    pub fn destroy(&self) {
        self.host.borrow_mut().teardown();
        log::info!("Captcha destroyed");
    }

    #[wasm_bindgen(getter, js_name = targetX)]
    pub fn target_x(&self) -> u32 {
        self.host.borrow().state.challenge.target_x
    }

    #[wasm_bindgen(getter, js_name = isDestroyed)]
    pub fn is_destroyed(&self) -> bool {
        self.host.borrow().state.lifecycle == Lifecycle::Destroyed
    }
}

/// Read the config from the first element carrying `data-captcha-config`,
/// falling back to defaults
pub fn config_from_page() -> CaptchaConfig {
    let element = document()
        .ok()
        .and_then(|d| d.query_selector(&format!("[{}]", CONFIG_ATTRIBUTE)).ok().flatten());

    if let Some(element) = element {
        if let Some(json) = element.get_attribute(CONFIG_ATTRIBUTE) {
            match CaptchaConfig::from_json(&json) {
                Ok(mut config) => {
                    if config.mount_selector.is_none() && !element.id().is_empty() {
                        config.mount_selector = Some(format!("#{}", element.id()));
                    }
                    log::info!("Loaded captcha config from page");
                    return config;
                }
                Err(e) => log::warn!("{}, using defaults", e),
            }
        }
    }

    log::info!("Using default captcha config");
    CaptchaConfig::default()
}

/// Build the widget, attach it to the page and start loading the image
pub fn mount(config: CaptchaConfig) -> Result<CaptchaWidget> {
    let document = document()?;
    let state = CaptchaState::new(config, &mut Pcg32::from_os_rng())?;

    let parent: web_sys::Element = match &state.config.mount_selector {
        Some(selector) => document
            .query_selector(selector)
            .map_err(js_err)?
            .ok_or_else(|| CaptchaError::Dom(format!("no element matches {}", selector)))?,
        None => document
            .body()
            .ok_or_else(|| CaptchaError::Dom("no body".into()))?
            .into(),
    };

    let dom = build_dom(&document, &state.config, state.challenge.target_y)?;
    parent.append_child(&dom.wrapper).map_err(js_err)?;

    let host = Rc::new(RefCell::new(Host {
        state,
        dom,
        listeners: Vec::new(),
        feedback_timer: None,
        feedback_callback: None,
        in_flight: Vec::new(),
    }));

    register_pointer_handlers(&host, &document)?;
    spawn_local(load_puzzle(Rc::downgrade(&host)));

    Ok(CaptchaWidget { host })
}

fn create<T: JsCast>(document: &Document, tag: &str) -> Result<T> {
    document
        .create_element(tag)
        .map_err(js_err)?
        .dyn_into::<T>()
        .map_err(|_| CaptchaError::Dom(format!("<{}> has unexpected type", tag)))
}

fn set_styles(el: &HtmlElement, styles: &[(&str, &str)]) -> Result<()> {
    let style = el.style();
    for (name, value) in styles {
        style.set_property(name, value).map_err(js_err)?;
    }
    Ok(())
}

fn build_dom(document: &Document, config: &CaptchaConfig, target_y: u32) -> Result<Dom> {
    let wrapper: HtmlElement = create(document, "div")?;
    set_styles(
        &wrapper,
        &[
            ("margin", "20px 0"),
            ("display", "flex"),
            ("flex-direction", "column"),
            ("align-items", "center"),
        ],
    )?;

    let title: HtmlElement = create(document, "h3")?;
    title.set_text_content(Some(&config.title));
    set_styles(&title, &[("margin-bottom", "10px")])?;

    let container: HtmlElement = create(document, "div")?;
    let width = format!("{}px", config.container_width);
    let height = format!("{}px", config.container_height);
    set_styles(
        &container,
        &[
            ("position", "relative"),
            ("width", width.as_str()),
            ("height", height.as_str()),
            ("border", Feedback::Neutral.border()),
        ],
    )?;

    let background: HtmlCanvasElement = create(document, "canvas")?;
    background.set_width(config.container_width);
    background.set_height(config.container_height);
    set_styles(&background, &[("position", "absolute"), ("left", "0px"), ("top", "0px")])?;

    let piece: HtmlCanvasElement = create(document, "canvas")?;
    piece.set_width(config.piece_size);
    piece.set_height(config.piece_size);
    let top = format!("{}px", target_y);
    set_styles(
        &piece,
        &[
            ("position", "absolute"),
            ("left", "0px"),
            ("top", top.as_str()),
            ("cursor", "pointer"),
            ("touch-action", "none"),
            ("visibility", "hidden"),
        ],
    )?;

    container.append_child(&background).map_err(js_err)?;
    container.append_child(&piece).map_err(js_err)?;
    wrapper.append_child(&title).map_err(js_err)?;
    wrapper.append_child(&container).map_err(js_err)?;

    Ok(Dom {
        wrapper,
        container,
        background,
        piece,
    })
}

/// Pointer position relative to the container's top-left corner
fn container_pos(container: &HtmlElement, event: &MouseEvent) -> Vec2 {
    let rect = container.get_bounding_client_rect();
    Vec2::new(
        event.client_x() as f32 - rect.left() as f32,
        event.client_y() as f32 - rect.top() as f32,
    )
}

fn listen(
    host: &Shared,
    target: EventTarget,
    kind: &'static str,
    handler: impl FnMut(web_sys::Event) + 'static,
) -> Result<()> {
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
    target
        .add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
        .map_err(js_err)?;
    host.borrow_mut().listeners.push(Listener {
        target,
        kind,
        closure,
    });
    Ok(())
}

fn register_pointer_handlers(host: &Shared, document: &Document) -> Result<()> {
    let (piece, container) = {
        let h = host.borrow();
        (h.dom.piece.clone(), h.dom.container.clone())
    };

    // Press only on the piece
    {
        let weak = Rc::downgrade(host);
        let container = container.clone();
        listen(host, piece.into(), "pointerdown", move |event| {
            let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            event.prevent_default();
            let pos = container_pos(&container, mouse);
            dispatch(&weak, CaptchaInput::PointerDown { pos });
        })?;
    }

    // Move anywhere, so fast drags that leave the piece keep tracking
    {
        let weak = Rc::downgrade(host);
        listen(host, document.clone().into(), "pointermove", move |event| {
            let Some(mouse) = event.dyn_ref::<MouseEvent>() else {
                return;
            };
            let dragging = weak
                .upgrade()
                .is_some_and(|h| h.borrow().state.drag.is_dragging());
            if !dragging {
                return;
            }
            event.prevent_default();
            let pos = container_pos(&container, mouse);
            dispatch(&weak, CaptchaInput::PointerMove { pos });
        })?;
    }

    // Release anywhere
    {
        let weak = Rc::downgrade(host);
        listen(host, document.clone().into(), "pointerup", move |_event| {
            dispatch(&weak, CaptchaInput::PointerUp);
        })?;
    }

    {
        let weak = Rc::downgrade(host);
        listen(host, document.clone().into(), "pointercancel", move |_event| {
            dispatch(&weak, CaptchaInput::PointerCancel);
        })?;
    }

    Ok(())
}

/// Apply one input and execute whatever it queued
fn dispatch(weak: &Weak<RefCell<Host>>, input: CaptchaInput) {
    let Some(host) = weak.upgrade() else {
        return;
    };
    let events = {
        let mut h = host.borrow_mut();
        let before = h.state.lifecycle;
        step(&mut h.state, input);
        if h.state.lifecycle != before {
            show_lifecycle(&h);
        }
        h.state.drain_events()
    };
    for event in events {
        apply(&host, event);
    }
}

fn show_lifecycle(host: &Host) {
    let result = match host.state.lifecycle {
        Lifecycle::Ready => set_styles(&host.dom.piece, &[("visibility", "visible")]),
        Lifecycle::Broken => {
            if let Some(failure) = &host.state.failure {
                host.dom.container.set_title(&failure.to_string());
            }
            set_styles(
                &host.dom.container,
                &[("opacity", "0.5"), ("cursor", "not-allowed")],
            )
        }
        Lifecycle::Loading | Lifecycle::Destroyed => Ok(()),
    };
    if let Err(e) = result {
        log::warn!("{}", e);
    }
}

fn apply(host: &Shared, event: CaptchaEvent) {
    let result = match event {
        CaptchaEvent::MovePiece { left } => {
            let h = host.borrow();
            let left = format!("{}px", left);
            set_styles(&h.dom.piece, &[("left", left.as_str())])
        }
        CaptchaEvent::SetFeedback(feedback) => {
            let h = host.borrow();
            set_styles(&h.dom.container, &[("border", feedback.border())])
        }
        CaptchaEvent::ScheduleFeedbackReset { token, after_ms } => {
            schedule_feedback_reset(host, token, after_ms)
        }
        CaptchaEvent::Verify { ticket } => start_verification(host, ticket),
        CaptchaEvent::Navigate { to } => window().and_then(|w| {
            w.location().set_href(&to).map_err(js_err)
        }),
    };
    if let Err(e) = result {
        log::error!("{}", e);
    }
}

fn schedule_feedback_reset(host: &Shared, token: u64, after_ms: u32) -> Result<()> {
    let window = window()?;
    let weak = Rc::downgrade(host);
    let callback = Closure::<dyn FnMut()>::new(move || {
        if let Some(h) = weak.upgrade() {
            h.borrow_mut().feedback_timer = None;
        }
        dispatch(&weak, CaptchaInput::FeedbackTimerFired { token });
    });
    let id = window
        .set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            after_ms.min(i32::MAX as u32) as i32,
        )
        .map_err(js_err)?;

    // A newer failure supersedes the pending revert; the old callback has
    // either fired or been cleared, so it can be dropped
    let mut h = host.borrow_mut();
    if let Some(old) = h.feedback_timer.replace(id) {
        window.clear_timeout_with_handle(old);
    }
    h.feedback_callback = Some(callback);
    Ok(())
}

fn start_verification(host: &Shared, ticket: u64) -> Result<()> {
    let controller = AbortController::new().map_err(js_err)?;
    let signal = controller.signal();
    let path = {
        let mut h = host.borrow_mut();
        h.in_flight.push((ticket, controller));
        h.state.config.verify_path.clone()
    };

    let weak = Rc::downgrade(host);
    spawn_local(async move {
        let outcome = match post_verify(&path, &signal).await {
            Ok(status) => VerificationOutcome::from_status(status),
            Err(e) => VerificationOutcome::TransportFailed {
                reason: describe(&e),
            },
        };
        if let Some(h) = weak.upgrade() {
            h.borrow_mut().in_flight.retain(|(t, _)| *t != ticket);
        }
        dispatch(&weak, CaptchaInput::VerificationFinished { ticket, outcome });
    });
    Ok(())
}

async fn post_verify(path: &str, signal: &AbortSignal) -> std::result::Result<u16, JsValue> {
    let opts = RequestInit::new();
    opts.set_method("POST");
    opts.set_signal(Some(signal));
    let request = Request::new_with_str_and_init(path, &opts)?;
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await?
        .dyn_into()?;
    Ok(response.status())
}

async fn fetch_image(src: &str) -> Result<RgbaImage> {
    let load_err = |reason: String| CaptchaError::AssetLoad {
        src: src.to_string(),
        reason,
    };

    let window = web_sys::window().ok_or_else(|| load_err("no window".into()))?;
    let opts = RequestInit::new();
    opts.set_mode(RequestMode::Cors);
    let response: Response = JsFuture::from(window.fetch_with_str_and_init(src, &opts))
        .await
        .and_then(|r| r.dyn_into())
        .map_err(|e| load_err(describe(&e)))?;
    if !response.ok() {
        return Err(load_err(format!("HTTP {}", response.status())));
    }
    let buffer = JsFuture::from(response.array_buffer().map_err(|e| load_err(describe(&e)))?)
        .await
        .map_err(|e| load_err(describe(&e)))?;
    let bytes = js_sys::Uint8Array::new(&buffer).to_vec();
    render::decode(&bytes, src)
}

fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d> {
    canvas
        .get_context("2d")
        .map_err(js_err)?
        .ok_or_else(|| CaptchaError::Render("2d context unavailable".into()))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(|_| CaptchaError::Render("not a 2d context".into()))
}

fn paint(canvas: &HtmlCanvasElement, image: &RgbaImage) -> Result<()> {
    let ctx = context_2d(canvas)?;
    ctx.clear_rect(0.0, 0.0, canvas.width() as f64, canvas.height() as f64);
    let data = ImageData::new_with_u8_clamped_array_and_sh(
        Clamped(image.as_raw().as_slice()),
        image.width(),
        image.height(),
    )
    .map_err(|e| CaptchaError::Render(describe(&e)))?;
    ctx.put_image_data(&data, 0.0, 0.0)
        .map_err(|e| CaptchaError::Render(describe(&e)))
}

/// Fetch, composite and paint, then report the result to the state machine
async fn load_puzzle(weak: Weak<RefCell<Host>>) {
    let Some(host) = weak.upgrade() else {
        return;
    };
    let (config, challenge, background, piece) = {
        let h = host.borrow();
        (
            h.state.config.clone(),
            h.state.challenge,
            h.dom.background.clone(),
            h.dom.piece.clone(),
        )
    };
    drop(host);

    let input = match fetch_image(&config.image_source).await {
        Ok(source) => {
            let painted = render::compose(&source, &config, &challenge).and_then(|surfaces| {
                paint(&background, &surfaces.background)?;
                paint(&piece, &surfaces.piece)
            });
            match painted {
                Ok(()) => {
                    log::info!("Drawing completed successfully");
                    CaptchaInput::AssetReady
                }
                Err(error) => {
                    // Degraded: show the plain image without a piece
                    if let Some(plain) = render::compose::plain_background(&source, &config) {
                        if let Err(e) = paint(&background, &plain) {
                            log::warn!("Failed to paint plain background: {}", e);
                        }
                    }
                    CaptchaInput::AssetFailed { error }
                }
            }
        }
        Err(error) => CaptchaInput::AssetFailed { error },
    };

    dispatch(&weak, input);
}
