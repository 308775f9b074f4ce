//! Canonical pet controller (main window).
//!
//! Sole writer of authoritative gameplay mutations: named care actions, name
//! edits, appearance swaps, the 30s decay tick and the aging timer. Every
//! mutation stamps the interaction/save timestamps, persists through the
//! store (last-writer-wins) and publishes a change signal so mirror contexts
//! converge. Transient emotion overrides (joy, rapid-tap anger, wake anger)
//! stay session-local and are composed over the persisted classifier.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::actions::{self, CLICK_HAPPINESS_BONUS};
use crate::params::parse_query;
use crate::state::{
    AGE_INTERVAL_MS, Appearance, DECAY_INTERVAL_MS, Emotion, EmotionOverride, JOY_TTL_MS,
    OVERTAP_ANGER_TTL_MS, PetState, SavedState, TapTracker, WAKE_ANGER_TTL_MS, clamp_stat,
    compose_emotion, is_valid_color, state_key,
};
use crate::store::{LocalStorageBackend, Store};
use crate::sync::{SyncEvent, SyncHub};

struct Controller {
    state_key: String,
    store: Store<LocalStorageBackend>,
    hub: SyncHub,
    state: SavedState,
    /// Running action id and its animation deadline (epoch ms).
    current_action: Option<(&'static str, f64)>,
    taps: TapTracker,
    overrides: Vec<EmotionOverride>,
    /// Epoch ms up to which decay has been applied to the canonical state.
    /// Kept separate from `last_saved_at`, which any writer may stamp.
    last_decay_at: f64,
}

thread_local! {
    static CONTROLLER: RefCell<Option<Controller>> = RefCell::new(None);
}

impl Controller {
    fn persist(&mut self, now: f64) {
        self.state.last_saved_at = now;
        self.store.save(&self.state_key, &self.state);
        self.hub.publish(&self.state);
    }

    fn record_interaction(&mut self, now: f64) {
        self.state.last_interaction_time = now;
    }

    fn push_override(&mut self, emotion: Emotion, now: f64, ttl_ms: f64) {
        self.overrides.retain(|o| o.active(now));
        self.overrides.push(EmotionOverride::new(emotion, now, ttl_ms));
    }

    fn action_running(&self, now: f64) -> Option<&'static str> {
        match self.current_action {
            Some((id, ends_at)) if now < ends_at => Some(id),
            _ => None,
        }
    }

    fn is_sleeping(&self, now: f64) -> bool {
        self.action_running(now) == Some("sleep")
    }

    /// Interrupting sleep makes the pet wake up angry; the running action is
    /// cancelled and the triggering input consumed.
    fn wake_if_sleeping(&mut self, now: f64) -> bool {
        if !self.is_sleeping(now) {
            return false;
        }
        self.current_action = None;
        self.push_override(Emotion::Anger, now, WAKE_ANGER_TTL_MS);
        log::debug!("woken up mid-sleep");
        true
    }

    fn perform_action(&mut self, id: &str, now: f64) -> bool {
        let Some(spec) = actions::find(id) else {
            log::warn!("unknown action '{id}' ignored");
            return false;
        };
        if !spec.affordable(self.state.pet_state.energy) {
            return false;
        }
        self.record_interaction(now);
        if spec.id != "sleep" && self.wake_if_sleeping(now) {
            self.persist(now);
            return false;
        }
        if self.action_running(now).is_some() {
            return false;
        }
        self.state.pet_state = spec.apply(&self.state.pet_state);
        self.current_action = Some((spec.id, now + spec.duration_ms));
        if spec.triggers_joy() {
            self.push_override(Emotion::Joy, now, JOY_TTL_MS);
        }
        self.persist(now);
        true
    }

    fn sprite_click(&mut self, now: f64) {
        self.record_interaction(now);

        let over_tapped = self.taps.record(now);
        if over_tapped {
            self.push_override(Emotion::Anger, now, OVERTAP_ANGER_TTL_MS);
        }

        if self.wake_if_sleeping(now) {
            self.persist(now);
            return;
        }

        if !over_tapped && self.action_running(now).is_none() {
            self.push_override(Emotion::Joy, now, JOY_TTL_MS);
            self.state.pet_state.happiness =
                clamp_stat(self.state.pet_state.happiness + CLICK_HAPPINESS_BONUS);
        }
        self.persist(now);
    }

    /// One wall-clock decay tick. Decay runs against the controller's own
    /// tick clock, never the stored `lastSavedAt`: a live companion rewrites
    /// the store every few seconds with a fresh timestamp, and trusting it
    /// would compute zero steps forever. The store is still read first to
    /// fold in companion tap bumps; racing writers resolve last-writer-wins.
    fn decay_tick(&mut self, now: f64) {
        if let Some(stored) = self.store.load_raw(&self.state_key, now) {
            self.state.absorb_taps(&stored);
        }
        let elapsed = (now - self.last_decay_at).max(0.0);
        let steps = (elapsed / DECAY_INTERVAL_MS).floor();
        if steps > 0.0 {
            self.state.pet_state = self.state.pet_state.decayed(steps);
            self.last_decay_at += steps * DECAY_INTERVAL_MS;
        }
        self.persist(now);
    }

    fn age_tick(&mut self, now: f64) {
        self.state.age = self.state.age.saturating_add(1);
        self.persist(now);
    }

    fn set_name(&mut self, name: &str, now: f64) {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return;
        }
        self.state.pet_name = trimmed.to_string();
        self.record_interaction(now);
        self.persist(now);
    }

    /// Appearance swap doubles as "replace Sooty": stats, age and all
    /// transient session state reset.
    fn set_appearance(&mut self, shape: &str, color: &str, now: f64) -> bool {
        if crate::state::Shape::parse(shape).is_none() || !is_valid_color(color) {
            return false;
        }
        self.state.appearance = Appearance::coerced(shape, color);
        self.state.age = 1;
        self.state.pet_state = PetState::default();
        self.current_action = None;
        self.taps.clear();
        self.overrides.clear();
        self.last_decay_at = now;
        self.record_interaction(now);
        self.persist(now);
        self.hub.send_appearance(&self.state.appearance);
        true
    }

    fn emotion(&self, now: f64) -> Emotion {
        compose_emotion(&self.state, &self.overrides, now)
    }

    fn view_json(&mut self, now: f64) -> String {
        // Expire finished actions lazily; the renderer polls this view.
        if self.action_running(now).is_none() {
            self.current_action = None;
        }
        let emotion = self.emotion(now);
        serde_json::json!({
            "petName": self.state.pet_name,
            "age": self.state.age,
            "petState": self.state.pet_state,
            "appearance": self.state.appearance,
            "emotion": emotion,
            "currentAction": self.current_action.map(|(id, _)| id),
            "isSleeping": self.is_sleeping(now),
            "tapCount": self.taps.count(),
        })
        .to_string()
    }
}

fn with_controller<R>(f: impl FnOnce(&mut Controller, f64) -> R) -> Option<R> {
    CONTROLLER.with(|cell| cell.borrow_mut().as_mut().map(|c| f(c, crate::now_ms())))
}

/// Start the canonical pet window: load-or-default from storage, wire the
/// sync hub, start the decay and aging intervals. The query string carries
/// the optional `sootyId` and `debug` flags.
#[wasm_bindgen]
pub fn start_pet_window() -> Result<(), JsValue> {
    let win = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let query = win.location().search().unwrap_or_default();
    let params = parse_query(&query);
    if params.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }
    let key = state_key(params.sooty_id.as_deref());
    let now = crate::now_ms();

    let store = Store::new(LocalStorageBackend);
    let state = store.load_or_fresh(&key, now);
    log::info!("pet window up for {key} (age {})", state.age);

    // The controller is the writer; it only reacts to relay state requests,
    // not to its own change notifications.
    let on_event: Rc<dyn Fn(SyncEvent)> = Rc::new(|event| {
        if let SyncEvent::StateRequested = event {
            with_controller(|c, _| c.hub.push_to_relay(&c.state));
        }
    });
    let hub = SyncHub::start(&key, on_event)?;

    CONTROLLER.with(|cell| {
        cell.replace(Some(Controller {
            state_key: key,
            store,
            hub,
            state,
            current_action: None,
            taps: TapTracker::default(),
            overrides: Vec::new(),
            last_decay_at: now,
        }))
    });

    crate::sync::set_interval(&win, DECAY_INTERVAL_MS as i32, || {
        with_controller(|c, now| c.decay_tick(now));
    })?;
    crate::sync::set_interval(&win, AGE_INTERVAL_MS as i32, || {
        with_controller(|c, now| c.age_tick(now));
    })?;
    Ok(())
}

/// Apply a named care action; returns false when rejected (unknown id, not
/// enough energy, another action still running, or it woke the pet).
#[wasm_bindgen]
pub fn pet_perform_action(id: &str) -> bool {
    with_controller(|c, now| c.perform_action(id, now)).unwrap_or(false)
}

/// Sprite click: rapid-tap tracking, wake-on-click, small happiness bump.
#[wasm_bindgen]
pub fn pet_sprite_click() {
    with_controller(|c, now| c.sprite_click(now));
}

#[wasm_bindgen]
pub fn pet_set_name(name: &str) {
    with_controller(|c, now| c.set_name(name, now));
}

/// Replace the pet's appearance (and reset it, as a new pet). Returns false
/// on invalid shape/color.
#[wasm_bindgen]
pub fn pet_set_appearance(shape: &str, color: &str) -> bool {
    with_controller(|c, now| c.set_appearance(shape, color, now)).unwrap_or(false)
}

/// Ask the host to show or hide the companion surface on the active page.
#[wasm_bindgen]
pub fn pet_toggle_companion(open: bool) {
    with_controller(|c, _| c.hub.send_companion_toggle(open));
}

/// JSON view-model for the rendering layer (stats, emotion, running action).
#[wasm_bindgen]
pub fn pet_view_json() -> String {
    with_controller(|c, now| c.view_json(now)).unwrap_or_default()
}
