//! Named care actions and their fixed stat deltas.
//!
//! Each action adds fixed amounts to hunger/thirst/happiness, may cost or
//! restore energy, and carries an animation duration the rendering layer uses
//! to block overlapping actions. An action is rejected when its energy cost
//! exceeds the current energy.

use crate::state::{PetState, clamp_stat};

/// Happiness bump applied by a plain sprite click or a companion tap.
pub const CLICK_HAPPINESS_BONUS: f64 = 3.0;

#[derive(Clone, Copy, Debug)]
pub struct ActionSpec {
    pub id: &'static str,
    pub hunger_gain: f64,
    pub thirst_gain: f64,
    pub happiness_gain: f64,
    pub energy_cost: f64,
    pub energy_gain: f64,
    pub duration_ms: f64,
}

pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec { id: "feed", hunger_gain: 25.0, thirst_gain: 0.0, happiness_gain: 10.0, energy_cost: 0.0, energy_gain: 0.0, duration_ms: 1500.0 },
    ActionSpec { id: "drink", hunger_gain: 0.0, thirst_gain: 30.0, happiness_gain: 5.0, energy_cost: 0.0, energy_gain: 0.0, duration_ms: 1200.0 },
    ActionSpec { id: "sleep", hunger_gain: 0.0, thirst_gain: 0.0, happiness_gain: 5.0, energy_cost: 0.0, energy_gain: 40.0, duration_ms: 4000.0 },
    ActionSpec { id: "play", hunger_gain: 0.0, thirst_gain: 0.0, happiness_gain: 25.0, energy_cost: 15.0, energy_gain: 0.0, duration_ms: 2500.0 },
    ActionSpec { id: "love", hunger_gain: 0.0, thirst_gain: 0.0, happiness_gain: 30.0, energy_cost: 10.0, energy_gain: 0.0, duration_ms: 2000.0 },
];

pub fn find(id: &str) -> Option<&'static ActionSpec> {
    ACTIONS.iter().find(|a| a.id == id)
}

impl ActionSpec {
    pub fn affordable(&self, energy: f64) -> bool {
        self.energy_cost <= 0.0 || energy >= self.energy_cost
    }

    /// Apply this action's deltas, clamping every resulting stat into [0, 100].
    pub fn apply(&self, prev: &PetState) -> PetState {
        PetState {
            hunger: clamp_stat(prev.hunger + self.hunger_gain),
            thirst: clamp_stat(prev.thirst + self.thirst_gain),
            happiness: clamp_stat(prev.happiness + self.happiness_gain),
            energy: clamp_stat(prev.energy - self.energy_cost + self.energy_gain),
        }
    }

    /// Feeding and petting trigger the transient joy override.
    pub fn triggers_joy(&self) -> bool {
        matches!(self.id, "love" | "feed")
    }
}
