use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{CancelToken, TimerQueue};
use crate::engine::TimerEvent;
use crate::snapshot::{EyeRollLayer, Offset2};

pub const EYE_ROLL_STEPS: u32 = 60;
const PUPIL_RADIUS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EyeRollVariation {
    Full,
    Half,
    Double,
    Slow,
    Quick,
}

impl EyeRollVariation {
    /// Total pupil travel in radians.
    pub fn total_rotation(self) -> f64 {
        match self {
            Self::Half => PI,
            Self::Double => PI * 4.0,
            Self::Full | Self::Slow | Self::Quick => PI * 2.0,
        }
    }

    pub fn duration_ms(self) -> i64 {
        match self {
            Self::Slow => 2000,
            Self::Quick => 500,
            Self::Full | Self::Half | Self::Double => 1000,
        }
    }
}

impl std::str::FromStr for EyeRollVariation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "half" => Ok(Self::Half),
            "double" => Ok(Self::Double),
            "slow" => Ok(Self::Slow),
            "quick" => Ok(Self::Quick),
            _ => Err(format!("Unknown eye roll variation: {}", s)),
        }
    }
}

/// Eyelid offsets from rest for a phase in [0, 1): (top, bottom).
pub fn eyelid_offsets(phase: f64) -> (f64, f64) {
    if phase < 0.25 {
        (phase * 4.0 * 10.0, -(phase * 4.0 * 5.0))
    } else if phase < 0.5 {
        (10.0, -5.0)
    } else if phase < 0.75 {
        let relax = (phase - 0.5) * 4.0;
        (10.0 - relax * 10.0, -5.0 + relax * 5.0)
    } else {
        (0.0, 0.0)
    }
}

/// Shared raise, furrow, settle envelope scaled to `peak`.
fn brow_envelope(phase: f64, peak: f64) -> f64 {
    if phase < 0.3 {
        (phase / 0.3) * peak
    } else if phase < 0.6 {
        peak
    } else {
        let settle = (phase - 0.6) / 0.4;
        peak - settle * peak
    }
}

/// Eyebrow (rotation, y) offsets for a phase in [0, 1).
pub fn eyebrow_offsets(phase: f64) -> (f64, f64) {
    (brow_envelope(phase, -5.0), brow_envelope(phase, -2.0))
}

pub fn head_tilt(phase: f64) -> f64 {
    brow_envelope(phase, -2.0)
}

pub fn pupil_position(progress: f64, variation: EyeRollVariation) -> Offset2 {
    let angle = progress * variation.total_rotation();
    Offset2 {
        x: angle.cos() * PUPIL_RADIUS,
        y: angle.sin() * PUPIL_RADIUS,
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveRoll {
    variation: EyeRollVariation,
    started_ms: i64,
    next_step: CancelToken,
}

/// Drives one eye-roll at a time through its stepped choreography.
#[derive(Debug, Default)]
pub struct EyeRollChoreographer {
    active: Option<ActiveRoll>,
    completed: u64,
}

impl EyeRollChoreographer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// Returns false and leaves the running roll untouched if one is active.
    pub fn start(
        &mut self,
        variation: EyeRollVariation,
        layer: &mut EyeRollLayer,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
    ) -> bool {
        if self.active.is_some() {
            debug!(?variation, "eye roll already running, request ignored");
            return false;
        }

        let next_step = timers.schedule(
            now_ms,
            step_offset(variation, 1),
            TimerEvent::EyeRollStep(1),
        );
        self.active = Some(ActiveRoll {
            variation,
            started_ms: now_ms,
            next_step,
        });
        apply(layer, variation, 0.0);
        layer.active = true;
        debug!(?variation, "eye roll started");
        true
    }

    pub fn on_step(
        &mut self,
        step: u32,
        layer: &mut EyeRollLayer,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
    ) {
        let Some(roll) = self.active.as_mut() else {
            return;
        };

        if step >= EYE_ROLL_STEPS {
            self.active = None;
            self.completed += 1;
            *layer = EyeRollLayer::default();
            return;
        }

        let progress = step as f64 / EYE_ROLL_STEPS as f64;
        apply(layer, roll.variation, progress);

        let due = roll.started_ms + step_offset(roll.variation, step + 1);
        roll.next_step = timers.schedule(now_ms, due - now_ms, TimerEvent::EyeRollStep(step + 1));
    }

    /// Abort a running roll and restore the resting layer.
    pub fn cancel(&mut self, layer: &mut EyeRollLayer, timers: &mut TimerQueue<TimerEvent>) {
        if let Some(roll) = self.active.take() {
            timers.cancel(roll.next_step);
        }
        *layer = EyeRollLayer::default();
    }
}

fn step_offset(variation: EyeRollVariation, step: u32) -> i64 {
    (variation.duration_ms() as f64 * step as f64 / EYE_ROLL_STEPS as f64).round() as i64
}

fn apply(layer: &mut EyeRollLayer, variation: EyeRollVariation, progress: f64) {
    let phase = progress % 1.0;
    let (top, bottom) = eyelid_offsets(phase);
    let (brow_rotation, brow_y) = eyebrow_offsets(phase);

    layer.progress = progress;
    layer.pupil_offset = pupil_position(progress, variation);
    layer.eyelid_top_offset = top;
    layer.eyelid_bottom_offset = bottom;
    layer.eyebrow_rotation_offset = brow_rotation;
    layer.eyebrow_y_offset = brow_y;
    layer.head_tilt = head_tilt(phase);
}
