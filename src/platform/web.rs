//! Browser embedding: the `Arena` class exported to JavaScript
//!
//! Host notifications are queued while the engine is borrowed and delivered
//! afterwards, so a JS callback may call straight back into the arena.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, KeyboardEvent};

use crate::audio::AudioEngine;
use crate::audio::web::WebAudioBackend;
use crate::config::{Answer, GameConfig};
use crate::engine::Engine;
use crate::host::{GameResult, HostBridge, HudSnapshot, PromptView};
use crate::renderer::{RenderState, scene};
use crate::settings::{QualityPreset, Settings};
use crate::sim::state::Direction;

/// One queued host notification
#[derive(Debug)]
enum Notice {
    Started,
    Pause(bool),
    Hud(String),
    Prompt(Option<String>),
    GameOver {
        code: u8,
        reason: Option<&'static str>,
    },
}

/// Host bridge that records notices for later delivery to JS
#[derive(Debug, Default)]
struct JsHost {
    outbox: Vec<Notice>,
}

fn to_json<T: serde::Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(json) => Some(json),
        Err(e) => {
            log::error!("Failed to serialize host payload: {e}");
            None
        }
    }
}

impl HostBridge for JsHost {
    fn game_started(&mut self) {
        self.outbox.push(Notice::Started);
    }

    fn pause_requested(&mut self, paused: bool) {
        self.outbox.push(Notice::Pause(paused));
    }

    fn hud_updated(&mut self, hud: &HudSnapshot) {
        if let Some(json) = to_json(hud) {
            self.outbox.push(Notice::Hud(json));
        }
    }

    fn prompt_changed(&mut self, prompt: Option<&PromptView>) {
        let json = match prompt {
            Some(prompt) => match to_json(prompt) {
                Some(json) => Some(json),
                None => return,
            },
            None => None,
        };
        self.outbox.push(Notice::Prompt(json));
    }

    fn game_over(&mut self, result: GameResult) {
        let (code, reason) = result.callback_args();
        self.outbox.push(Notice::GameOver { code, reason });
    }
}

/// JS callbacks supplied at construction
struct Callbacks {
    on_game_over: Option<js_sys::Function>,
    on_game_started: Option<js_sys::Function>,
    on_pause_request: Option<js_sys::Function>,
    on_hud: Option<js_sys::Function>,
    on_prompt: Option<js_sys::Function>,
}

impl Callbacks {
    fn from_js(object: &JsValue) -> Self {
        let get = |name: &str| {
            js_sys::Reflect::get(object, &JsValue::from_str(name))
                .ok()
                .and_then(|value| value.dyn_into::<js_sys::Function>().ok())
        };
        Self {
            on_game_over: get("onGameOver"),
            on_game_started: get("onGameStarted"),
            on_pause_request: get("onPauseRequest"),
            on_hud: get("onHud"),
            on_prompt: get("onPrompt"),
        }
    }

    fn call(callback: &Option<js_sys::Function>, arg: JsValue) {
        if let Some(f) = callback {
            if let Err(e) = f.call1(&JsValue::NULL, &arg) {
                log::warn!("Host callback threw: {e:?}");
            }
        }
    }

    fn parse(json: &str) -> JsValue {
        js_sys::JSON::parse(json).unwrap_or(JsValue::NULL)
    }

    fn deliver(&self, notice: Notice) {
        match notice {
            Notice::Started => Self::call(&self.on_game_started, JsValue::UNDEFINED),
            Notice::Pause(paused) => Self::call(&self.on_pause_request, JsValue::from_bool(paused)),
            Notice::Hud(json) => Self::call(&self.on_hud, Self::parse(&json)),
            Notice::Prompt(json) => {
                let arg = json.as_deref().map_or(JsValue::NULL, Self::parse);
                Self::call(&self.on_prompt, arg);
            }
            Notice::GameOver { code, reason } => {
                if let Some(f) = &self.on_game_over {
                    let reason = reason.map_or(JsValue::NULL, JsValue::from_str);
                    if let Err(e) = f.call2(&JsValue::NULL, &JsValue::from(code), &reason) {
                        log::warn!("Host callback threw: {e:?}");
                    }
                }
            }
        }
    }
}

type KeyListener = Closure<dyn FnMut(KeyboardEvent)>;

struct Shared {
    engine: Engine<JsHost>,
    render_state: Option<RenderState>,
    raf_id: Option<i32>,
    listeners: Vec<(&'static str, KeyListener)>,
    destroyed: bool,
}

/// A quiz tank arena bound to a canvas
#[wasm_bindgen]
pub struct Arena {
    shared: Rc<RefCell<Shared>>,
    callbacks: Rc<Callbacks>,
}

fn key_direction(key: &str) -> Option<Direction> {
    match key {
        "ArrowUp" | "w" | "W" => Some(Direction::Up),
        "ArrowDown" | "s" | "S" => Some(Direction::Down),
        "ArrowLeft" | "a" | "A" => Some(Direction::Left),
        "ArrowRight" | "d" | "D" => Some(Direction::Right),
        _ => None,
    }
}

/// Run `f` against the engine, then hand queued notices to JS
fn with_engine<R>(
    shared: &Rc<RefCell<Shared>>,
    callbacks: &Callbacks,
    f: impl FnOnce(&mut Engine<JsHost>) -> R,
) -> Option<R> {
    let (result, notices) = {
        let Ok(mut s) = shared.try_borrow_mut() else {
            log::warn!("Arena busy; call ignored");
            return None;
        };
        if s.destroyed {
            return None;
        }
        let result = f(&mut s.engine);
        let notices = std::mem::take(&mut s.engine.host_mut().outbox);
        (result, notices)
    };
    for notice in notices {
        callbacks.deliver(notice);
    }
    Some(result)
}

fn request_animation_frame(shared: Weak<RefCell<Shared>>, callbacks: Rc<Callbacks>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(strong) = shared.upgrade() else {
        return;
    };
    let closure = Closure::once(move |time: f64| {
        game_loop(shared, callbacks, time);
    });
    match window.request_animation_frame(closure.as_ref().unchecked_ref()) {
        Ok(id) => strong.borrow_mut().raf_id = Some(id),
        Err(e) => log::error!("requestAnimationFrame failed: {e:?}"),
    }
    closure.forget();
}

fn game_loop(shared: Weak<RefCell<Shared>>, callbacks: Rc<Callbacks>, time: f64) {
    let Some(strong) = shared.upgrade() else {
        return;
    };
    if strong.borrow().destroyed {
        return;
    }

    with_engine(&strong, &callbacks, |engine| engine.frame(time));

    if let Ok(mut s) = strong.try_borrow_mut() {
        let s = &mut *s;
        if let Some(render_state) = s.render_state.as_mut() {
            match render_state.render(&scene(s.engine.state())) {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost) => {
                    render_state.resize(render_state.size.0, render_state.size.1);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("Out of memory!");
                }
                Err(e) => log::warn!("Render error: {:?}", e),
            }
        }
    }

    request_animation_frame(shared, callbacks);
}

async fn init_gpu(canvas: HtmlCanvasElement, width: u32, height: u32) -> Option<RenderState> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::BROWSER_WEBGPU,
        ..Default::default()
    });

    let surface = match instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas)) {
        Ok(surface) => surface,
        Err(e) => {
            log::error!("Failed to create surface: {e}");
            return None;
        }
    };

    let adapter = match instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        })
        .await
    {
        Ok(adapter) => adapter,
        Err(e) => {
            log::error!("Failed to get adapter: {e}");
            return None;
        }
    };
    log::info!("Using adapter: {:?}", adapter.get_info().name);

    match RenderState::new(surface, &adapter, width, height).await {
        Ok(state) => Some(state),
        Err(e) => {
            log::error!("Failed to create device: {e}");
            None
        }
    }
}

impl Arena {
    fn flush(&self) {
        with_engine(&self.shared, &self.callbacks, |_| ());
    }

    fn install_keyboard(&self, window: &web_sys::Window) -> Result<(), JsValue> {
        let keydown: KeyListener = {
            let shared = Rc::downgrade(&self.shared);
            let callbacks = self.callbacks.clone();
            Closure::new(move |event: KeyboardEvent| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                let key = event.key();
                if let Some(dir) = key_direction(&key) {
                    event.prevent_default();
                    with_engine(&shared, &callbacks, |e| e.press(dir));
                    return;
                }
                match key.as_str() {
                    " " => {
                        event.prevent_default();
                        with_engine(&shared, &callbacks, |e| e.set_fire(true));
                    }
                    "Escape" if !event.repeat() => {
                        with_engine(&shared, &callbacks, |e| e.toggle_settings());
                    }
                    "Enter" => {
                        with_engine(&shared, &callbacks, |e| e.start());
                    }
                    _ => {}
                }
            })
        };

        let keyup: KeyListener = {
            let shared = Rc::downgrade(&self.shared);
            let callbacks = self.callbacks.clone();
            Closure::new(move |event: KeyboardEvent| {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                let key = event.key();
                if let Some(dir) = key_direction(&key) {
                    with_engine(&shared, &callbacks, |e| e.release(dir));
                } else if key == " " {
                    with_engine(&shared, &callbacks, |e| e.set_fire(false));
                }
            })
        };

        let mut s = self.shared.borrow_mut();
        for (name, listener) in [("keydown", keydown), ("keyup", keyup)] {
            window.add_event_listener_with_callback(name, listener.as_ref().unchecked_ref())?;
            s.listeners.push((name, listener));
        }
        Ok(())
    }

    /// Whether the answer was correct
    fn answer(&self, answer: Answer) -> bool {
        with_engine(&self.shared, &self.callbacks, |e| e.answer(answer))
            .flatten()
            .is_some_and(|v| v == crate::sim::Verdict::Correct)
    }
}

#[wasm_bindgen]
impl Arena {
    /// Build an arena on `canvas_id` from a JSON config. `callbacks` may
    /// carry `onGameOver(code, reason)`, `onGameStarted`, `onPauseRequest`,
    /// `onHud` and `onPrompt`.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_id: &str, config_json: &str, callbacks: JsValue) -> Result<Arena, JsValue> {
        console_error_panic_hook::set_once();
        // A second arena on the page finds the logger already set
        let _ = console_log::init_with_level(log::Level::Info);

        let config = GameConfig::from_json(config_json)
            .map_err(|e| JsValue::from_str(&format!("invalid game config: {e}")))?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id(canvas_id)
            .ok_or_else(|| JsValue::from_str("no canvas"))?
            .dyn_into()
            .map_err(|_| JsValue::from_str("not a canvas"))?;

        let dpr = window.device_pixel_ratio();
        let width = ((canvas.client_width() as f64 * dpr) as u32).max(1);
        let height = ((canvas.client_height() as f64 * dpr) as u32).max(1);
        canvas.set_width(width);
        canvas.set_height(height);

        let settings = Settings::load();
        let audio = match WebAudioBackend::new() {
            Some(backend) => AudioEngine::new(Box::new(backend), &settings),
            None => AudioEngine::silent(&settings),
        };
        let seed = js_sys::Date::now() as u64;
        let engine = Engine::new(config, seed, settings, audio, JsHost::default());

        let shared = Rc::new(RefCell::new(Shared {
            engine,
            render_state: None,
            raf_id: None,
            listeners: Vec::new(),
            destroyed: false,
        }));
        let callbacks = Rc::new(Callbacks::from_js(&callbacks));
        let arena = Arena { shared, callbacks };

        // Ready screen and first HUD
        arena.flush();
        arena.install_keyboard(&window)?;

        {
            let shared = Rc::downgrade(&arena.shared);
            wasm_bindgen_futures::spawn_local(async move {
                let render_state = init_gpu(canvas, width, height).await;
                if let Some(shared) = shared.upgrade() {
                    let mut s = shared.borrow_mut();
                    if !s.destroyed {
                        s.render_state = render_state;
                    }
                }
            });
        }

        request_animation_frame(Rc::downgrade(&arena.shared), arena.callbacks.clone());
        log::info!("Arena running with seed {seed}");
        Ok(arena)
    }

    /// Dismiss the ready screen
    pub fn start(&self) -> bool {
        with_engine(&self.shared, &self.callbacks, |e| e.start()).unwrap_or(false)
    }

    #[wasm_bindgen(js_name = answerChoice)]
    pub fn answer_choice(&self, index: u32) -> bool {
        self.answer(Answer::Choice(index as usize))
    }

    #[wasm_bindgen(js_name = answerChoices)]
    pub fn answer_choices(&self, indices: Vec<u32>) -> bool {
        let set: BTreeSet<usize> = indices.into_iter().map(|i| i as usize).collect();
        self.answer(Answer::Choices(set))
    }

    #[wasm_bindgen(js_name = answerText)]
    pub fn answer_text(&self, text: String) -> bool {
        self.answer(Answer::Text(text))
    }

    #[wasm_bindgen(js_name = dismissPrompt)]
    pub fn dismiss_prompt(&self) -> bool {
        with_engine(&self.shared, &self.callbacks, |e| e.dismiss_prompt()).unwrap_or(false)
    }

    #[wasm_bindgen(js_name = openSettings)]
    pub fn open_settings(&self) -> bool {
        with_engine(&self.shared, &self.callbacks, |e| e.open_settings()).unwrap_or(false)
    }

    #[wasm_bindgen(js_name = closeSettings)]
    pub fn close_settings(&self) -> bool {
        with_engine(&self.shared, &self.callbacks, |e| e.close_settings()).unwrap_or(false)
    }

    /// "low", "medium" or "high"; false for an unknown name
    #[wasm_bindgen(js_name = setQuality)]
    pub fn set_quality(&self, name: String) -> bool {
        let Some(preset) = QualityPreset::from_str(&name) else {
            log::warn!("Unknown quality preset {name:?}");
            return false;
        };
        with_engine(&self.shared, &self.callbacks, |e| e.set_quality(preset)).is_some()
    }

    #[wasm_bindgen(js_name = setParticles)]
    pub fn set_particles(&self, enabled: bool) {
        with_engine(&self.shared, &self.callbacks, |e| e.set_particles(enabled));
    }

    #[wasm_bindgen(js_name = setSoundEnabled)]
    pub fn set_sound_enabled(&self, enabled: bool) {
        with_engine(&self.shared, &self.callbacks, |e| e.set_sound_enabled(enabled));
    }

    #[wasm_bindgen(js_name = setMusicVolume)]
    pub fn set_music_volume(&self, volume: f32) {
        with_engine(&self.shared, &self.callbacks, |e| e.set_music_volume(volume));
    }

    #[wasm_bindgen(js_name = setSfxVolume)]
    pub fn set_sfx_volume(&self, volume: f32) {
        with_engine(&self.shared, &self.callbacks, |e| e.set_sfx_volume(volume));
    }

    /// Externally owned countdown shown in the HUD
    #[wasm_bindgen(js_name = setTimer)]
    pub fn set_timer(&self, label: String, running: bool) {
        with_engine(&self.shared, &self.callbacks, |e| e.set_timer(label, running));
    }

    /// Stop the loop, remove listeners, close audio, drop pending timers
    pub fn destroy(&self) {
        let notices = {
            let Ok(mut s) = self.shared.try_borrow_mut() else {
                log::warn!("Arena busy; destroy ignored");
                return;
            };
            if s.destroyed {
                return;
            }
            s.destroyed = true;

            if let Some(window) = web_sys::window() {
                if let Some(id) = s.raf_id.take() {
                    let _ = window.cancel_animation_frame(id);
                }
                for (name, listener) in s.listeners.drain(..) {
                    let _ = window.remove_event_listener_with_callback(
                        name,
                        listener.as_ref().unchecked_ref(),
                    );
                }
            }
            s.render_state = None;
            s.engine.teardown();
            std::mem::take(&mut s.engine.host_mut().outbox)
        };
        for notice in notices {
            self.callbacks.deliver(notice);
        }
        log::info!("Arena destroyed");
    }
}
