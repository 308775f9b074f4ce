//! Shared pet state model: stats, catch-up decay, emotion classification and
//! the persisted snapshot codec.
//!
//! Main window and companion embed read/write the same snapshot (per state
//! key), so expression and numbers stay consistent across contexts. Everything
//! in this module is pure and native-testable; browser I/O lives in `store`
//! and `sync`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_STAT: f64 = 100.0;

// Decay: one tick every 30 seconds. Per-tick deltas derive from design-level
// rates: hunger 8/hour, thirst 10/hour, happiness and energy 30/day.
pub const DECAY_INTERVAL_MS: f64 = 30_000.0;
pub const HUNGER_DECAY: f64 = 8.0 / 120.0;
pub const THIRST_DECAY: f64 = 10.0 / 120.0;
pub const HAPPINESS_DECAY: f64 = 30.0 / 2880.0;
pub const ENERGY_DECAY: f64 = 30.0 / 2880.0;

/// No interaction for 3 minutes -> sorrow.
pub const SORROW_THRESHOLD_MS: f64 = 3.0 * 60.0 * 1000.0;

/// Age: +1 year every 3 hours of wall-clock time.
pub const AGE_INTERVAL_MS: f64 = 3.0 * 60.0 * 60.0 * 1000.0;

pub const DEFAULT_PET_NAME: &str = "Sooty";
pub const DEFAULT_COLOR: &str = "#2a2a2a";

pub fn clamp_stat(n: f64) -> f64 {
    n.clamp(0.0, MAX_STAT)
}

/// Storage key for one logical pet instance. No id collapses to a single
/// shared "default" instance.
pub fn state_key(sooty_id: Option<&str>) -> String {
    match sooty_id {
        Some(id) if !id.is_empty() => format!("sooty-game-state-{id}"),
        _ => "sooty-game-state-default".to_string(),
    }
}

// --- Stats -------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PetState {
    pub hunger: f64,
    pub thirst: f64,
    pub happiness: f64,
    pub energy: f64,
}

impl Default for PetState {
    fn default() -> Self {
        Self { hunger: 80.0, thirst: 85.0, happiness: 90.0, energy: 95.0 }
    }
}

impl PetState {
    /// Clamp every stat into [0, 100].
    pub fn clamped(self) -> Self {
        Self {
            hunger: clamp_stat(self.hunger),
            thirst: clamp_stat(self.thirst),
            happiness: clamp_stat(self.happiness),
            energy: clamp_stat(self.energy),
        }
    }

    /// Apply `steps` whole decay ticks at the design rates.
    pub fn decayed(self, steps: f64) -> Self {
        Self {
            hunger: clamp_stat(self.hunger - steps * HUNGER_DECAY),
            thirst: clamp_stat(self.thirst - steps * THIRST_DECAY),
            happiness: clamp_stat(self.happiness - steps * HAPPINESS_DECAY),
            energy: clamp_stat(self.energy - steps * ENERGY_DECAY),
        }
    }
}

// --- Appearance --------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    #[default]
    Circle,
    Square,
    Star,
    Triangle,
    Heart,
}

impl Shape {
    /// Parse a shape name; unknown values yield `None` (callers fall back to
    /// the default circle).
    pub fn parse(s: &str) -> Option<Shape> {
        match s {
            "circle" => Some(Shape::Circle),
            "square" => Some(Shape::Square),
            "star" => Some(Shape::Star),
            "triangle" => Some(Shape::Triangle),
            "heart" => Some(Shape::Heart),
            _ => None,
        }
    }
}

/// `#RRGGBB`, case-insensitive hex digits.
pub fn is_valid_color(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(u8::is_ascii_hexdigit)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub shape: Shape,
    pub color: String,
}

impl Default for Appearance {
    fn default() -> Self {
        Self { shape: Shape::Circle, color: DEFAULT_COLOR.to_string() }
    }
}

impl Appearance {
    /// Build a validated appearance; invalid shape or color falls back to the
    /// defaults field-by-field.
    pub fn coerced(shape: &str, color: &str) -> Appearance {
        Appearance {
            shape: Shape::parse(shape).unwrap_or_default(),
            color: if is_valid_color(color) { color.to_string() } else { DEFAULT_COLOR.to_string() },
        }
    }

    /// Strict parse of an appearance payload pushed over a sync channel: both
    /// fields must be present and valid, otherwise the push is dropped.
    pub fn from_json_value(v: &Value) -> Option<Appearance> {
        let o = v.as_object()?;
        let shape = Shape::parse(o.get("shape")?.as_str()?)?;
        let color = o.get("color")?.as_str()?;
        if !is_valid_color(color) {
            return None;
        }
        Some(Appearance { shape, color: color.to_string() })
    }
}

// --- Emotion -----------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Anger,
    Sorrow,
    Neutral,
    /// Never derived from persisted state; only transient overrides produce it.
    Joy,
}

/// Short-lived emotion override (joy on petting, anger on rapid taps or being
/// woken). Session-local: never persisted and never synced to other contexts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EmotionOverride {
    pub emotion: Emotion,
    pub expires_at: f64,
}

impl EmotionOverride {
    pub fn new(emotion: Emotion, now: f64, ttl_ms: f64) -> Self {
        Self { emotion, expires_at: now + ttl_ms }
    }

    pub fn active(&self, now: f64) -> bool {
        now < self.expires_at
    }
}

// Transient override lifetimes.
pub const JOY_TTL_MS: f64 = 3000.0;
pub const OVERTAP_ANGER_TTL_MS: f64 = 3000.0;
/// Being woken mid-sleep reads as grumpier than being over-tapped.
pub const WAKE_ANGER_TTL_MS: f64 = 4000.0;

// Rapid tap anger: 5 taps within a sliding 2 second window.
pub const TAP_WINDOW_MS: f64 = 2000.0;
pub const TAP_THRESHOLD: usize = 5;

/// Sliding-window tap counter behind the over-tap anger rule.
#[derive(Clone, Debug, Default)]
pub struct TapTracker {
    times: Vec<f64>,
}

impl TapTracker {
    /// Record a tap; true when it tips the window over the threshold.
    pub fn record(&mut self, now: f64) -> bool {
        self.times.retain(|t| now - *t < TAP_WINDOW_MS);
        self.times.push(now);
        self.times.len() >= TAP_THRESHOLD
    }

    pub fn count(&self) -> usize {
        self.times.len()
    }

    pub fn clear(&mut self) {
        self.times.clear();
    }
}

/// Compose transient overrides with the persisted-state classifier. Transient
/// anger wins over everything, then critical-needs anger, then joy, then the
/// idle-driven sorrow/neutral baseline.
pub fn compose_emotion(state: &SavedState, overrides: &[EmotionOverride], now: f64) -> Emotion {
    let live = |e: Emotion| overrides.iter().any(|o| o.emotion == e && o.active(now));
    if live(Emotion::Anger) {
        return Emotion::Anger;
    }
    let base = state.emotion_at(now);
    if base == Emotion::Anger {
        return Emotion::Anger;
    }
    if live(Emotion::Joy) {
        return Emotion::Joy;
    }
    base
}

// --- Persisted snapshot ------------------------------------------------------

/// The unit of truth shared across all contexts for one pet instance,
/// serialized as a camelCase JSON document under the state key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedState {
    pub pet_name: String,
    pub age: u32,
    pub pet_state: PetState,
    pub appearance: Appearance,
    /// Epoch ms of the last persisted write, advanced tick-by-tick by decay.
    pub last_saved_at: f64,
    /// Epoch ms of the last user interaction (drives the sorrow classifier).
    pub last_interaction_time: f64,
}

impl SavedState {
    /// A just-created pet: default stats, both timestamps at `now`, so it never
    /// starts out looking angry or sad.
    pub fn fresh_default(now: f64) -> Self {
        Self {
            pet_name: DEFAULT_PET_NAME.to_string(),
            age: 1,
            pet_state: PetState::default(),
            appearance: Appearance::default(),
            last_saved_at: now,
            last_interaction_time: now,
        }
    }

    /// Catch-up decay across the wall-clock time elapsed since `last_saved_at`.
    ///
    /// Whole 30s ticks only; `last_saved_at` advances by `steps * tick` rather
    /// than to `now`, so the remainder of a partial tick is never lost and the
    /// computation is reproducible no matter how often it runs. Clock skew
    /// (`now` in the past) means zero steps.
    pub fn catch_up(&self, now: f64) -> SavedState {
        let elapsed = (now - self.last_saved_at).max(0.0);
        let steps = (elapsed / DECAY_INTERVAL_MS).floor();
        if steps <= 0.0 {
            return self.clone();
        }
        SavedState {
            pet_state: self.pet_state.decayed(steps),
            last_saved_at: self.last_saved_at + steps * DECAY_INTERVAL_MS,
            ..self.clone()
        }
    }

    /// Persisted-state emotion, strict priority order: critical hunger/thirst
    /// anger always beats idle sorrow, even when both hold.
    pub fn emotion_at(&self, now: f64) -> Emotion {
        if self.pet_state.hunger < 20.0 || self.pet_state.thirst < 20.0 {
            return Emotion::Anger;
        }
        if now - self.last_interaction_time > SORROW_THRESHOLD_MS {
            return Emotion::Sorrow;
        }
        Emotion::Neutral
    }

    /// Schema-at-the-boundary validator: coerce a parsed JSON document into a
    /// fully valid snapshot. Missing or wrong-typed fields fall back to their
    /// defaults field-by-field; only a non-object document is rejected.
    /// Missing timestamps default to `now`.
    pub fn from_json_value(v: &Value, now: f64) -> Option<SavedState> {
        let o = v.as_object()?;
        let pet_name = o
            .get("petName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_PET_NAME.to_string());
        let age = match o.get("age").and_then(Value::as_f64) {
            Some(n) if n >= 1.0 => n as u32,
            _ => 1,
        };
        let defaults = PetState::default();
        let ps = o.get("petState").and_then(Value::as_object);
        let stat = |field: &str, fallback: f64| {
            clamp_stat(ps.and_then(|m| m.get(field)).and_then(Value::as_f64).unwrap_or(fallback))
        };
        let pet_state = PetState {
            hunger: stat("hunger", defaults.hunger),
            thirst: stat("thirst", defaults.thirst),
            happiness: stat("happiness", defaults.happiness),
            energy: stat("energy", defaults.energy),
        };
        let ap = o.get("appearance").and_then(Value::as_object);
        let appearance = Appearance::coerced(
            ap.and_then(|m| m.get("shape")).and_then(Value::as_str).unwrap_or(""),
            ap.and_then(|m| m.get("color")).and_then(Value::as_str).unwrap_or(""),
        );
        let last_saved_at = o.get("lastSavedAt").and_then(Value::as_f64).unwrap_or(now);
        let last_interaction_time =
            o.get("lastInteractionTime").and_then(Value::as_f64).unwrap_or(now);
        Some(SavedState { pet_name, age, pet_state, appearance, last_saved_at, last_interaction_time })
    }

    /// Parse + validate raw persisted text. Unparsable input is treated the
    /// same as absent state.
    pub fn parse(raw: &str, now: f64) -> Option<SavedState> {
        let v: Value = serde_json::from_str(raw).ok()?;
        SavedState::from_json_value(&v, now)
    }

    /// Fold another context's tap micro-updates into this snapshot. Taps only
    /// bump happiness and refresh the interaction timestamp, so a max on both
    /// fields absorbs them without adopting the other copy's `last_saved_at`.
    pub fn absorb_taps(&mut self, other: &SavedState) {
        self.pet_state.happiness = self.pet_state.happiness.max(other.pet_state.happiness);
        self.last_interaction_time =
            self.last_interaction_time.max(other.last_interaction_time);
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
