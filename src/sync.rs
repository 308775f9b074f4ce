//! Multi-channel change fan-out between browser contexts.
//!
//! A canonical save must reach every live context showing the same state key
//! within a short bound, over whichever channels exist there:
//! - `storage` events (same-origin, cross-tab push; free with localStorage)
//! - a `BroadcastChannel` (covers the same-tab case storage events miss)
//! - a postMessage relay through the host (the only path across the
//!   extension's origin boundary, request/response plus push)
//! - an immediate re-read when the document becomes visible again; consumers
//!   additionally run a low-frequency read poll as backstop.
//!
//! Listeners are page-lifetime singletons; their closures are `forget`-leaked
//! exactly once per context, matching the page teardown model.

use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{BroadcastChannel, MessageEvent, StorageEvent, VisibilityState, window};

use crate::messages::SyncMessage;
use crate::state::{Appearance, SavedState};

/// Name of the origin-scoped page-to-page channel.
pub const BROADCAST_CHANNEL_NAME: &str = "sooty-sync";

/// What a channel observed; consumers re-read the store on `Changed` and
/// adopt relayed snapshots directly on `Remote`.
pub enum SyncEvent {
    /// The shared store (probably) has a newer snapshot for our key.
    Changed,
    /// A full snapshot crossed an origin boundary via the relay.
    Remote(SavedState),
    /// The relay asked for our current snapshot (answer with `push_to_relay`).
    StateRequested,
    /// Host tap signal for the companion.
    Tap,
    /// Appearance push from the canonical controller.
    AppearanceChanged(Appearance),
}

pub struct SyncHub {
    state_key: String,
    channel: Option<BroadcastChannel>,
}

impl SyncHub {
    /// Wire every available channel for `state_key`, delivering events to
    /// `on_event`. Periodic polling is the consumer's job (the controller has
    /// its decay interval, the companion its write-back poll).
    pub fn start(state_key: &str, on_event: Rc<dyn Fn(SyncEvent)>) -> Result<SyncHub, JsValue> {
        let win = window().ok_or_else(|| JsValue::from_str("no window"))?;

        // BroadcastChannel is optional capability; missing support degrades to
        // the remaining channels.
        let channel = match BroadcastChannel::new(BROADCAST_CHANNEL_NAME) {
            Ok(c) => Some(c),
            Err(_) => {
                log::warn!("BroadcastChannel unavailable; falling back to storage events/poll");
                None
            }
        };

        if let Some(channel) = &channel {
            let key = state_key.to_string();
            let cb = on_event.clone();
            let closure = Closure::wrap(Box::new(move |evt: MessageEvent| {
                if let Some(msg) = message_from_event(&evt) {
                    if matches!(msg, SyncMessage::StateSync { .. }) && msg.matches_key(&key) {
                        log::debug!("broadcast change signal for {key}");
                        cb(SyncEvent::Changed);
                    }
                }
            }) as Box<dyn FnMut(_)>);
            channel
                .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Same-origin cross-tab writes: parse nothing, just re-read the store.
        {
            let key = state_key.to_string();
            let cb = on_event.clone();
            let closure = Closure::wrap(Box::new(move |evt: StorageEvent| {
                if evt.key().as_deref() == Some(key.as_str()) && evt.new_value().is_some() {
                    log::debug!("storage event for {key}");
                    cb(SyncEvent::Changed);
                }
            }) as Box<dyn FnMut(_)>);
            win.add_event_listener_with_callback("storage", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Host/relay messages (cross-origin path).
        {
            let key = state_key.to_string();
            let cb = on_event.clone();
            let closure = Closure::wrap(Box::new(move |evt: MessageEvent| {
                let Some(msg) = message_from_event(&evt) else { return };
                if !msg.matches_key(&key) {
                    return;
                }
                match msg {
                    SyncMessage::RequestState { .. } => cb(SyncEvent::StateRequested),
                    SyncMessage::StateSync { state, .. } => {
                        if let Some(state) = SavedState::from_json_value(&state, crate::now_ms()) {
                            log::debug!("relayed snapshot for {key}");
                            cb(SyncEvent::Remote(state));
                        }
                    }
                    SyncMessage::CompanionTap => cb(SyncEvent::Tap),
                    SyncMessage::AppearanceSync { appearance } => {
                        if let Some(appearance) = Appearance::from_json_value(&appearance) {
                            cb(SyncEvent::AppearanceChanged(appearance));
                        }
                    }
                    SyncMessage::OpenCompanion | SyncMessage::CloseCompanion => {}
                }
            }) as Box<dyn FnMut(_)>);
            win.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())?;
            closure.forget();
        }

        // Hidden -> visible transition forces an immediate re-read so a
        // returning user never sees a stale emotion for a poll interval.
        if let Some(doc) = win.document() {
            let cb = on_event.clone();
            let doc_for_closure = doc.clone();
            let closure = Closure::wrap(Box::new(move |_evt: web_sys::Event| {
                if doc_for_closure.visibility_state() == VisibilityState::Visible {
                    cb(SyncEvent::Changed);
                }
            }) as Box<dyn FnMut(_)>);
            doc.add_event_listener_with_callback(
                "visibilitychange",
                closure.as_ref().unchecked_ref(),
            )?;
            closure.forget();
        }

        Ok(SyncHub { state_key: state_key.to_string(), channel })
    }

    /// Same-origin push after a canonical save. Storage events cover other
    /// tabs on their own; this covers listeners in the same tab.
    pub fn publish(&self, state: &SavedState) {
        if let Some(channel) = &self.channel {
            let msg = SyncMessage::state_sync(&self.state_key, state);
            let _ = channel.post_message(&JsValue::from_str(&msg.to_json()));
        }
    }

    /// Push the snapshot up through the host relay (extension popup or
    /// injected widget host).
    pub fn push_to_relay(&self, state: &SavedState) {
        self.post_to_parent(&SyncMessage::state_sync(&self.state_key, state));
    }

    /// Ask the host relay for the current snapshot (request/response).
    pub fn request_from_relay(&self) {
        self.post_to_parent(&SyncMessage::RequestState { state_key: self.state_key.clone() });
    }

    pub fn send_appearance(&self, appearance: &Appearance) {
        self.post_to_parent(&SyncMessage::appearance_sync(appearance));
    }

    /// Ask the host to show/hide the companion surface.
    pub fn send_companion_toggle(&self, open: bool) {
        self.post_to_parent(if open {
            &SyncMessage::OpenCompanion
        } else {
            &SyncMessage::CloseCompanion
        });
    }

    fn post_to_parent(&self, msg: &SyncMessage) {
        let Some(win) = window() else { return };
        let Ok(Some(parent)) = win.parent() else { return };
        // Top-level windows are their own parent; nothing to relay to.
        if js_sys::Object::is(parent.as_ref(), win.as_ref()) {
            return;
        }
        let _ = parent.post_message(&JsValue::from_str(&msg.to_json()), "*");
    }
}

/// Leaky interval helper for page-lifetime periodic work (decay ticks, aging,
/// companion polls).
pub(crate) fn set_interval(
    win: &web_sys::Window,
    interval_ms: i32,
    f: impl Fn() + 'static,
) -> Result<(), JsValue> {
    let closure = Closure::wrap(Box::new(f) as Box<dyn FnMut()>);
    win.set_interval_with_callback_and_timeout_and_arguments_0(
        closure.as_ref().unchecked_ref(),
        interval_ms,
    )?;
    closure.forget();
    Ok(())
}

/// Relay hosts may post either JSON text or a structured object; normalize to
/// text before parsing.
fn message_from_event(evt: &MessageEvent) -> Option<SyncMessage> {
    let data = evt.data();
    let raw = data
        .as_string()
        .or_else(|| js_sys::JSON::stringify(&data).ok().and_then(|s| s.as_string()))?;
    SyncMessage::parse(&raw)
}
