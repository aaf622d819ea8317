use crate::emotion::EmotionalState;
use crate::noise::NoiseChannels;
use crate::snapshot::{BrowOffset, EyebrowAdjust, MicroMovement, MouthJitter, Offset2};

const PUPIL_FREQUENCY: f64 = 0.2;
const PUPIL_AMPLITUDE: f64 = 2.0;
const EYEBROW_FREQUENCY: f64 = 0.125;
const EYEBROW_AMPLITUDE: f64 = 1.0;
const HEAD_FREQUENCY: f64 = 0.1;
const HEAD_AMPLITUDE: f64 = 0.5;
const MOUTH_FREQUENCY: f64 = 0.167;
const MOUTH_WIDTH_AMPLITUDE: f64 = 1.0;
const MOUTH_DEPTH_AMPLITUDE: f64 = 0.5;

/// Samples the noise channels once per frame into the micro-movement layer.
#[derive(Debug)]
pub struct MicroMovementDriver {
    channels: NoiseChannels,
    origin_ms: i64,
}

impl MicroMovementDriver {
    pub fn new(now_ms: i64) -> Self {
        Self {
            channels: NoiseChannels::default(),
            origin_ms: now_ms,
        }
    }

    /// The drift clock restarts whenever the state changes.
    pub fn on_state_change(
        &mut self,
        layer: &mut MicroMovement,
        state: EmotionalState,
        now_ms: i64,
    ) {
        self.origin_ms = now_ms;
        if !state.allows_micro_movement() {
            *layer = MicroMovement::default();
        }
    }

    pub fn on_frame(&self, layer: &mut MicroMovement, state: EmotionalState, now_ms: i64) {
        if !state.allows_micro_movement() {
            *layer = MicroMovement::default();
            return;
        }

        let elapsed = (now_ms - self.origin_ms) as f64 / 1000.0;
        *layer = self.sample(elapsed);
    }

    /// Offsets for `elapsed` seconds into the drift clock.
    pub fn sample(&self, elapsed: f64) -> MicroMovement {
        let NoiseChannels {
            pupil,
            eyebrow,
            head,
            mouth,
        } = &self.channels;

        let (x, y) = pupil.sample2d(elapsed, PUPIL_FREQUENCY, PUPIL_AMPLITUDE);
        let brow = |shift: f64| {
            eyebrow.sample(elapsed + shift, EYEBROW_FREQUENCY, EYEBROW_AMPLITUDE)
        };

        MicroMovement {
            pupil_drift: Offset2 { x, y },
            eyebrow_adjust: EyebrowAdjust {
                left: BrowOffset {
                    rotation: brow(0.0),
                    y: brow(1.0),
                },
                right: BrowOffset {
                    rotation: brow(2.0),
                    y: brow(3.0),
                },
            },
            head_tilt: head.sample(elapsed, HEAD_FREQUENCY, HEAD_AMPLITUDE),
            mouth: MouthJitter {
                width: mouth.sample(elapsed, MOUTH_FREQUENCY, MOUTH_WIDTH_AMPLITUDE),
                depth: mouth.sample(elapsed + 1.0, MOUTH_FREQUENCY, MOUTH_DEPTH_AMPLITUDE),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplitudes_are_bounded() {
        let driver = MicroMovementDriver::new(0);
        for i in 0..5_000 {
            let m = driver.sample(i as f64 * 0.016);
            assert!(m.pupil_drift.x.abs() <= 2.0 && m.pupil_drift.y.abs() <= 2.0);
            assert!(m.eyebrow_adjust.left.rotation.abs() <= 1.0);
            assert!(m.eyebrow_adjust.right.y.abs() <= 1.0);
            assert!(m.head_tilt.abs() <= 0.5);
            assert!(m.mouth.width.abs() <= 1.0);
            assert!(m.mouth.depth.abs() <= 0.5);
        }
    }

    #[test]
    fn test_zeroed_outside_drifting_states() {
        let driver = MicroMovementDriver::new(0);
        let mut layer = MicroMovement::default();

        driver.on_frame(&mut layer, EmotionalState::Idle, 1_730);
        assert_ne!(layer, MicroMovement::default());

        driver.on_frame(&mut layer, EmotionalState::MaximumGrump, 1_746);
        assert_eq!(layer, MicroMovement::default());
    }

    #[test]
    fn test_leaving_drifting_state_zeroes_immediately() {
        let mut driver = MicroMovementDriver::new(0);
        let mut layer = MicroMovement::default();
        driver.on_frame(&mut layer, EmotionalState::Listening, 2_345);

        driver.on_state_change(&mut layer, EmotionalState::Processing, 2_400);
        assert_eq!(layer, MicroMovement::default());
    }

    #[test]
    fn test_deterministic_for_same_elapsed() {
        let a = MicroMovementDriver::new(0);
        let b = MicroMovementDriver::new(10_000);
        assert_eq!(a.sample(3.3), b.sample(3.3));
    }

    #[test]
    fn test_clock_restarts_on_state_change() {
        let mut driver = MicroMovementDriver::new(0);
        let mut layer = MicroMovement::default();
        driver.on_state_change(&mut layer, EmotionalState::SoftMode, 5_000);
        driver.on_frame(&mut layer, EmotionalState::SoftMode, 6_500);
        assert_eq!(layer, driver.sample(1.5));
    }
}
