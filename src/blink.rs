use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{CancelToken, TimerQueue};
use crate::emotion::EmotionalState;
use crate::engine::TimerEvent;
use crate::snapshot::BlinkLayer;

const BASE_INTERVAL_MS: f64 = 3000.0;
const INTERVAL_SPREAD_MS: f64 = 3000.0;
const BLINK_CLOCK_MS: i64 = 4000;
const WINK_CHANCE: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlinkType {
    Standard,
    Slow,
    Heavy,
    QuickDouble,
    Half,
    Wink,
}

impl BlinkType {
    pub fn hold_ms(self) -> i64 {
        match self {
            Self::Standard => 150,
            Self::Slow => 400,
            Self::Heavy => 600,
            Self::QuickDouble => 250,
            Self::Half => 100,
            Self::Wink => 200,
        }
    }

    pub fn closes_left_eye(self) -> bool {
        !matches!(self, Self::Wink)
    }

    pub fn closes_right_eye(self) -> bool {
        true
    }
}

impl std::str::FromStr for BlinkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Self::Standard),
            "slow" => Ok(Self::Slow),
            "heavy" => Ok(Self::Heavy),
            "quickDouble" | "double" => Ok(Self::QuickDouble),
            "half" => Ok(Self::Half),
            "wink" => Ok(Self::Wink),
            _ => Err(format!("Unknown blink type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkEvent {
    Fire,
    End,
}

/// Randomised auto-blink loop layered over the current state.
#[derive(Debug)]
pub struct BlinkScheduler {
    pending_fire: Option<CancelToken>,
    clock_origin_ms: i64,
    started: u64,
}

impl BlinkScheduler {
    pub fn new(now_ms: i64) -> Self {
        Self {
            pending_fire: None,
            clock_origin_ms: now_ms,
            started: 0,
        }
    }

    /// Number of blinks started so far.
    pub fn blinks_started(&self) -> u64 {
        self.started
    }

    pub fn interval_for<R: Rng>(state: EmotionalState, rng: &mut R) -> i64 {
        let base = BASE_INTERVAL_MS + rng.gen::<f64>() * INTERVAL_SPREAD_MS;
        let factor = match state {
            EmotionalState::Sleepy | EmotionalState::SoftMode => 1.5,
            EmotionalState::Annoyed | EmotionalState::MaximumGrump => 0.7,
            EmotionalState::Processing | EmotionalState::ThinkingDeep => 0.8,
            EmotionalState::Sleep => 3.0,
            _ => 1.0,
        };
        (base * factor).floor() as i64
    }

    pub fn type_for<R: Rng>(state: EmotionalState, rng: &mut R) -> BlinkType {
        match state {
            EmotionalState::Sleepy | EmotionalState::SoftMode | EmotionalState::Sleep => {
                BlinkType::Slow
            }
            EmotionalState::Annoyed => BlinkType::Heavy,
            EmotionalState::Skeptical => BlinkType::Half,
            EmotionalState::Impressed => {
                if rng.gen::<f64>() < WINK_CHANCE {
                    BlinkType::Wink
                } else {
                    BlinkType::Standard
                }
            }
            _ => BlinkType::Standard,
        }
    }

    /// Schedule the next automatic blink unless one is already pending or in flight.
    pub fn arm<R: Rng>(
        &mut self,
        layer: &BlinkLayer,
        state: EmotionalState,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
        rng: &mut R,
    ) {
        if layer.is_blinking || self.pending_fire.is_some() {
            return;
        }
        let delay = Self::interval_for(state, rng);
        let fire = TimerEvent::Blink(BlinkEvent::Fire);
        self.pending_fire = Some(timers.schedule(now_ms, delay, fire));
    }

    /// The interval depends on the state, so a pending cycle is re-rolled.
    pub fn on_state_change<R: Rng>(
        &mut self,
        layer: &BlinkLayer,
        state: EmotionalState,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
        rng: &mut R,
    ) {
        if let Some(token) = self.pending_fire.take() {
            timers.cancel(token);
        }
        self.arm(layer, state, now_ms, timers, rng);
    }

    pub fn on_fire<R: Rng>(
        &mut self,
        layer: &mut BlinkLayer,
        state: EmotionalState,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
        rng: &mut R,
    ) {
        self.pending_fire = None;
        if layer.is_blinking {
            return;
        }
        let blink_type = Self::type_for(state, rng);
        self.start(layer, blink_type, now_ms, timers);
    }

    pub fn on_end<R: Rng>(
        &mut self,
        layer: &mut BlinkLayer,
        state: EmotionalState,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
        rng: &mut R,
    ) {
        layer.is_blinking = false;
        self.arm(layer, state, now_ms, timers, rng);
    }

    /// Manual blink; refused while another blink is still held.
    pub fn trigger(
        &mut self,
        layer: &mut BlinkLayer,
        blink_type: BlinkType,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
    ) -> bool {
        if layer.is_blinking {
            return false;
        }
        if let Some(token) = self.pending_fire.take() {
            timers.cancel(token);
        }
        self.start(layer, blink_type, now_ms, timers);
        true
    }

    pub fn on_frame(&self, layer: &mut BlinkLayer, now_ms: i64) {
        layer.timer_phase_ms = (now_ms - self.clock_origin_ms).rem_euclid(BLINK_CLOCK_MS) as u32;
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue<TimerEvent>) {
        if let Some(token) = self.pending_fire.take() {
            timers.cancel(token);
        }
    }

    fn start(
        &mut self,
        layer: &mut BlinkLayer,
        blink_type: BlinkType,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
    ) {
        layer.is_blinking = true;
        layer.blink_type = blink_type;
        self.started += 1;
        // The hold timer is never cancelled: a started blink always completes.
        timers.schedule(now_ms, blink_type.hold_ms(), TimerEvent::Blink(BlinkEvent::End));
        debug!(?blink_type, "blink");
    }
}
