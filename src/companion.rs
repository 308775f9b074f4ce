//! Companion / embedded mirror view.
//!
//! A read-mostly rendering context (extension popup embed, injected widget
//! iframe) that mirrors the canonical snapshot: it subscribes to every sync
//! channel, polls the store as a backstop, and applies a staleness policy so
//! a partitioned store never makes the companion look falsely angry or sad.
//! Its only writes are small additive micro-updates (tap -> happiness bump).

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::actions::CLICK_HAPPINESS_BONUS;
use crate::params::{EmbedParams, parse_query};
use crate::state::{Appearance, Emotion, SavedState, clamp_stat, state_key};
use crate::store::{LocalStorageBackend, Store};
use crate::sync::{SyncEvent, SyncHub};

/// Snapshots older than this (pre-decay `lastSavedAt`) are discarded in favor
/// of a fresh default: across the extension's origin boundary the store is
/// partitioned, and an old copy means partition, not genuine neglect.
pub const COMPANION_STALENESS_MS: f64 = 120_000.0;

/// No local interaction for 30 seconds puts the companion to sleep. The flag
/// is companion-local: not persisted, not synced.
pub const SLEEP_IDLE_MS: f64 = 30_000.0;

const POLL_INTERVAL_MS: i32 = 3000;

/// Staleness gate for any snapshot the companion is about to adopt, from the
/// store or from the relay. Fresh-enough snapshots are caught up to `now`.
pub fn adopt_snapshot(candidate: SavedState, now: f64) -> SavedState {
    if now - candidate.last_saved_at > COMPANION_STALENESS_MS {
        SavedState::fresh_default(now)
    } else {
        candidate.catch_up(now)
    }
}

struct Companion {
    state_key: String,
    params: EmbedParams,
    store: Store<LocalStorageBackend>,
    hub: SyncHub,
    state: SavedState,
    /// Appearance pushed by the canonical controller (beaten only by a URL
    /// override).
    pushed_appearance: Option<Appearance>,
    last_local_interaction: f64,
    /// Monotonic counter the renderer watches to retrigger the jump animation
    /// even while a previous jump is still playing.
    jump_token: u32,
}

thread_local! {
    static COMPANION: RefCell<Option<Companion>> = RefCell::new(None);
}

impl Companion {
    /// Re-read the store and adopt what is there. The periodic poll also
    /// writes the caught-up snapshot back with a fresh `lastSavedAt`, keeping
    /// a partitioned copy inside the staleness window while the companion is
    /// alive; push-triggered refreshes skip the write to avoid write echo
    /// between multiple mirrors.
    fn refresh(&mut self, now: f64, write_back: bool) {
        match self.store.load_raw(&self.state_key, now) {
            Some(raw) => self.state = adopt_snapshot(raw, now),
            None => self.state = self.state.catch_up(now),
        }
        if write_back {
            self.state.last_saved_at = now;
            self.store.save(&self.state_key, &self.state);
        }
    }

    /// Adopt a snapshot relayed across the origin boundary and seed the local
    /// (partitioned) store with it.
    fn adopt_remote(&mut self, state: SavedState, now: f64) {
        self.state = adopt_snapshot(state, now);
        self.store.save(&self.state_key, &self.state);
    }

    /// Tap protocol: same mutation as a local click (happiness bump plus
    /// interaction refresh), wakes the companion, and bumps the jump token.
    fn tap(&mut self, now: f64) {
        self.state.pet_state.happiness =
            clamp_stat(self.state.pet_state.happiness + CLICK_HAPPINESS_BONUS);
        self.state.last_interaction_time = now;
        self.state.last_saved_at = now;
        self.store.save(&self.state_key, &self.state);
        // Same-tab contexts won't get a storage event for our write.
        self.hub.publish(&self.state);
        self.last_local_interaction = now;
        self.jump_token = self.jump_token.wrapping_add(1);
        log::debug!("companion tap, jump token {}", self.jump_token);
    }

    fn is_sleeping(&self, now: f64) -> bool {
        now - self.last_local_interaction > SLEEP_IDLE_MS
    }

    fn effective_appearance(&self) -> &Appearance {
        self.params
            .appearance_override
            .as_ref()
            .or(self.pushed_appearance.as_ref())
            .unwrap_or(&self.state.appearance)
    }

    fn view_json(&self, now: f64) -> String {
        let emotion = self.state.emotion_at(now);
        let stats = &self.state.pet_state;
        let mouth_down = matches!(emotion, Emotion::Anger | Emotion::Sorrow)
            || (emotion == Emotion::Neutral
                && (stats.hunger < 30.0 || stats.thirst < 30.0 || stats.energy < 30.0));
        serde_json::json!({
            "petName": self.state.pet_name,
            "age": self.state.age,
            "petState": stats,
            "appearance": self.effective_appearance(),
            "emotion": emotion,
            "isSleeping": self.is_sleeping(now),
            "mouthDown": mouth_down,
            "jumpToken": self.jump_token,
            "maxSize": self.params.max_size,
        })
        .to_string()
    }
}

fn with_companion<R>(f: impl FnOnce(&mut Companion, f64) -> R) -> Option<R> {
    COMPANION.with(|cell| cell.borrow_mut().as_mut().map(|c| f(c, crate::now_ms())))
}

/// Start the companion mirror for the query string's `sootyId`. Wires every
/// sync channel plus the poll backstop and asks the host relay for the
/// current snapshot right away.
#[wasm_bindgen]
pub fn start_companion() -> Result<(), JsValue> {
    let win = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
    let query = win.location().search().unwrap_or_default();
    let params = parse_query(&query);
    if params.debug {
        log::set_max_level(log::LevelFilter::Debug);
    }
    let key = state_key(params.sooty_id.as_deref());
    let now = crate::now_ms();

    let store = Store::new(LocalStorageBackend);
    let state = match store.load_raw(&key, now) {
        Some(raw) => adopt_snapshot(raw, now),
        None => SavedState::fresh_default(now),
    };
    log::info!("companion up for {key}");

    let on_event: Rc<dyn Fn(SyncEvent)> = Rc::new(|event| {
        match event {
            SyncEvent::Changed => with_companion(|c, now| c.refresh(now, false)),
            SyncEvent::Remote(state) => with_companion(|c, now| c.adopt_remote(state, now)),
            SyncEvent::Tap => with_companion(|c, now| c.tap(now)),
            SyncEvent::AppearanceChanged(appearance) => {
                with_companion(|c, _| c.pushed_appearance = Some(appearance))
            }
            SyncEvent::StateRequested => None,
        };
    });
    let hub = SyncHub::start(&key, on_event)?;
    hub.request_from_relay();

    COMPANION.with(|cell| {
        cell.replace(Some(Companion {
            state_key: key,
            params,
            store,
            hub,
            state,
            pushed_appearance: None,
            last_local_interaction: now,
            jump_token: 0,
        }))
    });

    crate::sync::set_interval(&win, POLL_INTERVAL_MS, || {
        with_companion(|c, now| c.refresh(now, true));
    })?;
    Ok(())
}

/// Local click or host tap signal on the companion sprite.
#[wasm_bindgen]
pub fn companion_tap() {
    with_companion(|c, now| c.tap(now));
}

/// JSON view-model for the companion renderer (emotion, jump token, sleep
/// flag, effective appearance, size cap).
#[wasm_bindgen]
pub fn companion_view_json() -> String {
    with_companion(|c, now| c.view_json(now)).unwrap_or_default()
}
