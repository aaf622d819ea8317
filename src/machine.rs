use std::f64::consts::PI;

use tracing::debug;

use crate::core::{CancelToken, TimerQueue};
use crate::emotion::{EmotionalState, StateConfig};
use crate::engine::TimerEvent;
use crate::particles::ParticleType;
use crate::snapshot::{
    AccessoryType, AnimationSnapshot, BlinkLayer, ContextState, EyeRollLayer, MicroMovement,
};

const BREATHING_AMPLITUDE: f64 = 0.02;
const SCREEN_SHAKE_MS: i64 = 300;
const EYE_TRACKING_LIMIT: f64 = 6.0;

/// Owns the authoritative emotional state and the snapshot the renderer reads.
#[derive(Debug)]
pub struct EmotionalStateMachine {
    snapshot: AnimationSnapshot,
    breathing_origin_ms: i64,
    shake_timer: Option<CancelToken>,
}

impl EmotionalStateMachine {
    pub fn new(now_ms: i64) -> Self {
        Self {
            snapshot: AnimationSnapshot::new(now_ms),
            breathing_origin_ms: now_ms,
            shake_timer: None,
        }
    }

    pub fn snapshot(&self) -> &AnimationSnapshot {
        &self.snapshot
    }

    pub fn current_state(&self) -> EmotionalState {
        self.snapshot.current_state
    }

    pub fn annoyance_level(&self) -> u8 {
        self.snapshot.current_state.annoyance_level()
    }

    /// Every state is a valid target. Only the eyebrow rotations, mouth shape
    /// and glow are rewritten; all other layers keep their values.
    pub fn transition_to(&mut self, state: EmotionalState, now_ms: i64) -> EmotionalState {
        let previous = self.snapshot.current_state;
        let config = StateConfig::for_state(state);

        let snapshot = &mut self.snapshot;
        snapshot.current_state = state;
        snapshot.last_state_change_ms = now_ms;
        snapshot.face.left_eyebrow.rotation = config.left_eyebrow_rotation;
        snapshot.face.right_eyebrow.rotation = config.right_eyebrow_rotation;
        snapshot.face.mouth.shape = config.mouth;
        snapshot.glow.intensity = config.glow_intensity;
        snapshot.glow.pulse_rate = config.glow_pulse_rate;
        snapshot.glow.color = config.glow_color;

        debug!(from = %previous, to = %state, "state transition");
        previous
    }

    /// Name-based transition; unknown names act as `idle`.
    pub fn transition_to_named(&mut self, name: &str, now_ms: i64) -> EmotionalState {
        self.transition_to(EmotionalState::parse_or_idle(name), now_ms)
    }

    /// Point both pupils at a horizontal position in [-6, 6].
    pub fn update_eye_tracking(&mut self, position: f64) {
        let x = position.clamp(-EYE_TRACKING_LIMIT, EYE_TRACKING_LIMIT);
        self.snapshot.face.left_pupil.x = x;
        self.snapshot.face.right_pupil.x = x;
    }

    /// Slow ~6 s breathing cycle.
    pub fn breathe(&mut self, now_ms: i64) {
        let elapsed = (now_ms - self.breathing_origin_ms) as f64 / 1000.0;
        self.snapshot.breathing_scale = 1.0 + (elapsed * (PI / 3.0)).sin() * BREATHING_AMPLITUDE;
    }

    pub fn refresh_idle_time(&mut self, now_ms: i64) {
        self.snapshot.idle_time_ms = (now_ms - self.snapshot.last_state_change_ms).max(0);
    }

    pub fn trigger_screen_shake(
        &mut self,
        intensity: f64,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
    ) {
        if let Some(token) = self.shake_timer.take() {
            timers.cancel(token);
        }
        self.snapshot.screen_shake.active = true;
        self.snapshot.screen_shake.intensity = intensity;
        self.shake_timer = Some(timers.schedule(
            now_ms,
            SCREEN_SHAKE_MS,
            TimerEvent::ScreenShakeEnd,
        ));
    }

    pub fn end_screen_shake(&mut self) {
        self.shake_timer = None;
        self.snapshot.screen_shake.active = false;
    }

    pub fn set_particle_type(&mut self, particle_type: Option<ParticleType>) {
        self.snapshot.particle_type = particle_type;
    }

    pub fn set_accessory(&mut self, accessory: Option<AccessoryType>) {
        self.snapshot.show_accessories = accessory.is_some();
        self.snapshot.accessory_type = accessory;
    }

    pub(crate) fn blink_layer_mut(&mut self) -> &mut BlinkLayer {
        &mut self.snapshot.blink
    }

    pub(crate) fn eye_roll_layer_mut(&mut self) -> &mut EyeRollLayer {
        &mut self.snapshot.eye_roll
    }

    pub(crate) fn micro_layer_mut(&mut self) -> &mut MicroMovement {
        &mut self.snapshot.micro
    }

    pub(crate) fn context_mut(&mut self) -> &mut ContextState {
        &mut self.snapshot.context
    }
}
