// Integration tests (native) for the pure state core: decay, classifier,
// snapshot codec and actions. These avoid wasm-specific functionality so they
// run under `cargo test` on the host.

use sooty::actions;
use sooty::state::{
    Appearance, DECAY_INTERVAL_MS, Emotion, EmotionOverride, PetState, SavedState, Shape,
    TAP_WINDOW_MS, TapTracker, WAKE_ANGER_TTL_MS, compose_emotion, is_valid_color, state_key,
};

const T0: f64 = 1_700_000_000_000.0;

fn snapshot(pet_state: PetState) -> SavedState {
    SavedState { pet_state, ..SavedState::fresh_default(T0) }
}

fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{a} !~ {b}");
}

#[test]
fn decay_zero_elapsed_is_identity() {
    let s = snapshot(PetState::default());
    assert_eq!(s.catch_up(T0), s);
    // Partial tick: still zero steps.
    assert_eq!(s.catch_up(T0 + DECAY_INTERVAL_MS - 1.0), s);
}

#[test]
fn decay_clock_skew_is_identity() {
    let s = snapshot(PetState::default());
    assert_eq!(s.catch_up(T0 - 3_600_000.0), s);
}

#[test]
fn decay_is_idempotent_once_caught_up() {
    let s = snapshot(PetState::default());
    let now = T0 + 7_200_000.0;
    let once = s.catch_up(now);
    let twice = once.catch_up(now);
    assert_eq!(once, twice);
}

#[test]
fn decay_preserves_partial_tick_remainder() {
    let s = snapshot(PetState::default());
    // 2.5 ticks elapsed: lastSavedAt advances by exactly 2 ticks, not to now.
    let now = T0 + 2.5 * DECAY_INTERVAL_MS;
    let out = s.catch_up(now);
    assert_close(out.last_saved_at, T0 + 2.0 * DECAY_INTERVAL_MS);
}

#[test]
fn decay_two_hours_matches_design_rates() {
    let s = snapshot(PetState::default());
    // 2 hours = 240 ticks of 30s.
    let out = s.catch_up(T0 + 7_200_000.0);
    assert_close(out.pet_state.hunger, 80.0 - 240.0 * (8.0 / 120.0)); // 64
    assert_close(out.pet_state.thirst, 85.0 - 240.0 * (10.0 / 120.0)); // 65
    assert_close(out.pet_state.happiness, 90.0 - 240.0 * (30.0 / 2880.0)); // 87.5
    assert_close(out.pet_state.energy, 95.0 - 240.0 * (30.0 / 2880.0)); // 92.5
}

#[test]
fn decay_saturates_at_zero() {
    let s = snapshot(PetState { hunger: 0.0, thirst: 1.0, happiness: 0.5, energy: 0.0 });
    // A year away: everything bottoms out, nothing goes negative.
    let out = s.catch_up(T0 + 365.0 * 24.0 * 3_600_000.0);
    assert_eq!(out.pet_state.hunger, 0.0);
    assert_eq!(out.pet_state.thirst, 0.0);
    assert_eq!(out.pet_state.happiness, 0.0);
    assert_eq!(out.pet_state.energy, 0.0);
}

#[test]
fn decay_is_componentwise_monotonic_in_elapsed_time() {
    let s = snapshot(PetState::default());
    let mut prev = s.catch_up(T0);
    for hours in 1..48 {
        let next = s.catch_up(T0 + hours as f64 * 3_600_000.0);
        assert!(next.pet_state.hunger <= prev.pet_state.hunger);
        assert!(next.pet_state.thirst <= prev.pet_state.thirst);
        assert!(next.pet_state.happiness <= prev.pet_state.happiness);
        assert!(next.pet_state.energy <= prev.pet_state.energy);
        prev = next;
    }
}

#[test]
fn hungry_anger_beats_idle_sorrow() {
    let mut s = snapshot(PetState { hunger: 10.0, thirst: 90.0, happiness: 50.0, energy: 50.0 });
    // Zero idle time: anger purely from hunger.
    assert_eq!(s.emotion_at(s.last_interaction_time), Emotion::Anger);
    // Long idle as well: anger still wins over sorrow.
    s.last_interaction_time = T0 - 3_600_000.0;
    assert_eq!(s.emotion_at(T0), Emotion::Anger);
}

#[test]
fn classifier_neutral_and_sorrow_thresholds() {
    let s = snapshot(PetState { hunger: 80.0, thirst: 80.0, happiness: 50.0, energy: 50.0 });
    let t = s.last_interaction_time;
    assert_eq!(s.emotion_at(t + 60_000.0), Emotion::Neutral);
    // Strictly greater than 3 minutes flips to sorrow.
    assert_eq!(s.emotion_at(t + 180_000.0), Emotion::Neutral);
    assert_eq!(s.emotion_at(t + 181_000.0), Emotion::Sorrow);
}

#[test]
fn override_composition_priorities() {
    let s = snapshot(PetState { hunger: 80.0, thirst: 80.0, happiness: 50.0, energy: 50.0 });
    let now = T0;
    let joy = EmotionOverride::new(Emotion::Joy, now, 3000.0);
    let anger = EmotionOverride::new(Emotion::Anger, now, 3000.0);

    assert_eq!(compose_emotion(&s, &[], now), Emotion::Neutral);
    assert_eq!(compose_emotion(&s, &[joy], now), Emotion::Joy);
    // Transient anger beats joy.
    assert_eq!(compose_emotion(&s, &[joy, anger], now), Emotion::Anger);
    // Joy also masks idle sorrow.
    let idle_now = s.last_interaction_time + 200_000.0;
    let joy_late = EmotionOverride::new(Emotion::Joy, idle_now, 3000.0);
    assert_eq!(compose_emotion(&s, &[joy_late], idle_now), Emotion::Joy);
    // Expired overrides are ignored.
    assert_eq!(compose_emotion(&s, &[joy], now + 3000.0), Emotion::Neutral);
}

#[test]
fn rapid_taps_trip_the_anger_threshold() {
    let mut taps = TapTracker::default();
    for i in 0..4 {
        assert!(!taps.record(T0 + i as f64 * 100.0));
    }
    // Fifth tap inside the 2s window.
    assert!(taps.record(T0 + 400.0));
    assert_eq!(taps.count(), 5);
}

#[test]
fn tap_window_is_sliding_and_strict() {
    let mut taps = TapTracker::default();
    for i in 0..4 {
        taps.record(T0 + i as f64 * 100.0);
    }
    // Exactly at the window edge the oldest tap has already aged out.
    assert!(!taps.record(T0 + TAP_WINDOW_MS));
    // Long idle empties the window entirely.
    assert!(!taps.record(T0 + TAP_WINDOW_MS + 2_300.0));
    assert_eq!(taps.count(), 1);
}

#[test]
fn wake_anger_expires_after_its_ttl() {
    let s = snapshot(PetState { hunger: 80.0, thirst: 80.0, happiness: 50.0, energy: 50.0 });
    let wake = EmotionOverride::new(Emotion::Anger, T0, WAKE_ANGER_TTL_MS);
    assert_eq!(compose_emotion(&s, &[wake], T0 + WAKE_ANGER_TTL_MS - 1.0), Emotion::Anger);
    assert_eq!(compose_emotion(&s, &[wake], T0 + WAKE_ANGER_TTL_MS), Emotion::Neutral);
}

#[test]
fn absorb_taps_folds_happiness_and_interaction_only() {
    let mut canonical = SavedState::fresh_default(T0);
    canonical.pet_state.happiness = 50.0;
    let mut mirror = canonical.clone();
    mirror.pet_state.happiness = 53.0; // tap bump
    mirror.pet_state.hunger = 10.0; // not a tap field
    mirror.last_interaction_time = T0 + 5_000.0;
    mirror.last_saved_at = T0 + 5_000.0;

    canonical.absorb_taps(&mirror);
    assert_eq!(canonical.pet_state.happiness, 53.0);
    assert_eq!(canonical.last_interaction_time, T0 + 5_000.0);
    assert_eq!(canonical.pet_state.hunger, 80.0);
    assert_eq!(canonical.last_saved_at, T0);

    // A staler mirror never drags the canonical copy backwards.
    let stale = SavedState { last_interaction_time: T0 - 1.0, ..mirror };
    canonical.absorb_taps(&stale);
    assert_eq!(canonical.last_interaction_time, T0 + 5_000.0);
}

#[test]
fn codec_coerces_missing_and_wrong_typed_fields() {
    let raw = r#"{"petName":42,"age":0,"petState":{"hunger":"full","thirst":250,"energy":-5},"appearance":{"shape":"hexagon","color":"red"},"lastSavedAt":1000}"#;
    let s = SavedState::parse(raw, T0).expect("object documents are coerced, not rejected");
    assert_eq!(s.pet_name, "Sooty");
    assert_eq!(s.age, 1);
    assert_eq!(s.pet_state.hunger, 80.0); // wrong type -> default
    assert_eq!(s.pet_state.thirst, 100.0); // out of range -> clamped
    assert_eq!(s.pet_state.happiness, 90.0); // missing -> default
    assert_eq!(s.pet_state.energy, 0.0); // negative -> clamped
    assert_eq!(s.appearance.shape, Shape::Circle);
    assert_eq!(s.appearance.color, "#2a2a2a");
    assert_eq!(s.last_saved_at, 1000.0);
    assert_eq!(s.last_interaction_time, T0); // missing timestamp -> now
}

#[test]
fn codec_rejects_non_object_documents() {
    assert!(SavedState::parse("null", T0).is_none());
    assert!(SavedState::parse("[1,2]", T0).is_none());
    assert!(SavedState::parse("\"sooty\"", T0).is_none());
    assert!(SavedState::parse("not json at all", T0).is_none());
}

#[test]
fn snapshot_serializes_to_the_camel_case_document() {
    let s = SavedState::fresh_default(T0);
    let v: serde_json::Value = serde_json::from_str(&s.to_json()).unwrap();
    let o = v.as_object().unwrap();
    for key in ["petName", "age", "petState", "appearance", "lastSavedAt", "lastInteractionTime"] {
        assert!(o.contains_key(key), "missing '{key}'");
    }
    assert_eq!(v["appearance"]["shape"], "circle");
    assert_eq!(v["petState"]["hunger"], 80.0);
    // Exact round trip through the lenient validator.
    assert_eq!(SavedState::parse(&s.to_json(), T0).unwrap(), s);
}

#[test]
fn color_and_shape_validation() {
    assert!(is_valid_color("#2a2a2a"));
    assert!(is_valid_color("#ABCDEF"));
    assert!(!is_valid_color("2a2a2a"));
    assert!(!is_valid_color("#2a2a2"));
    assert!(!is_valid_color("#2a2a2g"));
    assert!(!is_valid_color("#2a2a2a2a"));
    assert_eq!(Shape::parse("heart"), Some(Shape::Heart));
    assert_eq!(Shape::parse("Heart"), None);
    assert_eq!(Appearance::coerced("blob", "#123456").shape, Shape::Circle);
    assert_eq!(Appearance::coerced("star", "#123456").color, "#123456");
}

#[test]
fn state_key_derivation() {
    assert_eq!(state_key(None), "sooty-game-state-default");
    assert_eq!(state_key(Some("")), "sooty-game-state-default");
    assert_eq!(state_key(Some("abc123")), "sooty-game-state-abc123");
}

#[test]
fn actions_have_unique_known_ids() {
    let mut seen = std::collections::HashSet::new();
    for a in actions::ACTIONS {
        assert!(seen.insert(a.id), "duplicate action '{}'", a.id);
        assert!(a.duration_ms > 0.0, "action '{}' has no duration", a.id);
    }
    assert!(actions::find("feed").is_some());
    assert!(actions::find("walk").is_none());
}

#[test]
fn actions_respect_energy_cost_and_clamp() {
    let play = actions::find("play").unwrap();
    assert!(!play.affordable(10.0));
    assert!(play.affordable(15.0));
    // Feed costs nothing, always affordable.
    assert!(actions::find("feed").unwrap().affordable(0.0));

    let full = PetState { hunger: 95.0, thirst: 95.0, happiness: 95.0, energy: 20.0 };
    let after = play.apply(&full);
    assert_eq!(after.happiness, 100.0); // +25 clamped at 100
    assert_eq!(after.energy, 5.0); // cost 15

    let sleep = actions::find("sleep").unwrap();
    let tired = PetState { hunger: 50.0, thirst: 50.0, happiness: 50.0, energy: 90.0 };
    assert_eq!(sleep.apply(&tired).energy, 100.0); // +40 clamped
}
