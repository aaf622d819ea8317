//! The render-facing record of every animation parameter.
//!
//! Each sub-animation owns one layer of the snapshot and is only ever handed a
//! `&mut` to that layer. Attributes touched by more than one animation (pupil,
//! eyelid, eyebrow, head tilt, mouth) are split into a base value and
//! per-animation offsets, and [`AnimationSnapshot::composed_face`] sums them.

use serde::{Deserialize, Serialize};

use crate::blink::BlinkType;
use crate::context::{ConversationEntry, TimeFacts};
use crate::emotion::{EmotionalState, GlowColor, MouthShape, StateConfig};
use crate::particles::ParticleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessoryType {
    CoffeeMug,
    PartyHat,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Offset2 {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkLayer {
    pub is_blinking: bool,
    pub blink_type: BlinkType,
    /// Position within the 4 s blink clock, in ms.
    pub timer_phase_ms: u32,
}

impl Default for BlinkLayer {
    fn default() -> Self {
        Self {
            is_blinking: false,
            blink_type: BlinkType::Standard,
            timer_phase_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyebrowPose {
    pub rotation: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeScale {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PupilPose {
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyelidPose {
    pub top_y: f64,
    pub bottom_y: f64,
}

pub const EYELID_REST_TOP: f64 = -24.0;
pub const EYELID_REST_BOTTOM: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthPose {
    pub shape: MouthShape,
    pub width: f64,
    pub height: f64,
    pub curve_depth: f64,
}

/// Base face geometry. Written by the state machine and eye tracking only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceGeometry {
    pub left_eyebrow: EyebrowPose,
    pub right_eyebrow: EyebrowPose,
    pub left_eye: EyeScale,
    pub right_eye: EyeScale,
    pub left_pupil: PupilPose,
    pub right_pupil: PupilPose,
    pub left_eyelid: EyelidPose,
    pub right_eyelid: EyelidPose,
    pub mouth: MouthPose,
}

impl Default for FaceGeometry {
    fn default() -> Self {
        let idle = StateConfig::idle();
        let pupil = PupilPose { x: 0.0, y: 0.0, size: 12.0 };
        let eyelid = EyelidPose {
            top_y: EYELID_REST_TOP,
            bottom_y: EYELID_REST_BOTTOM,
        };
        let eye = EyeScale { x: 1.0, y: 1.0 };

        Self {
            left_eyebrow: EyebrowPose {
                rotation: idle.left_eyebrow_rotation,
                ..Default::default()
            },
            right_eyebrow: EyebrowPose {
                rotation: idle.right_eyebrow_rotation,
                ..Default::default()
            },
            left_eye: eye,
            right_eye: eye,
            left_pupil: pupil,
            right_pupil: pupil,
            left_eyelid: eyelid,
            right_eyelid: eyelid,
            mouth: MouthPose {
                shape: idle.mouth,
                width: 40.0,
                height: 2.0,
                curve_depth: 0.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glow {
    pub intensity: f64,
    pub pulse_rate: f64,
    pub color: GlowColor,
}

impl Default for Glow {
    fn default() -> Self {
        let idle = StateConfig::idle();
        Self {
            intensity: idle.glow_intensity,
            pulse_rate: idle.glow_pulse_rate,
            color: idle.glow_color,
        }
    }
}

/// Offsets produced by the eye-roll choreography.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeRollLayer {
    pub active: bool,
    pub progress: f64,
    pub pupil_offset: Offset2,
    pub eyelid_top_offset: f64,
    pub eyelid_bottom_offset: f64,
    pub eyebrow_rotation_offset: f64,
    pub eyebrow_y_offset: f64,
    pub head_tilt: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenShake {
    pub active: bool,
    pub intensity: f64,
}

impl Default for ScreenShake {
    fn default() -> Self {
        Self {
            active: false,
            intensity: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrowOffset {
    pub rotation: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyebrowAdjust {
    pub left: BrowOffset,
    pub right: BrowOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MouthJitter {
    pub width: f64,
    pub depth: f64,
}

/// Noise-driven offsets; all zero outside the drifting states.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MicroMovement {
    pub pupil_drift: Offset2,
    pub eyebrow_adjust: EyebrowAdjust,
    pub head_tilt: f64,
    pub mouth: MouthJitter,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedPatterns {
    pub repeat_questions: usize,
    pub sentiment_score: f64,
    pub keyword_matches: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextState {
    pub time: TimeFacts,
    pub session_length_ms: i64,
    pub message_count: usize,
    pub last_message_ms: i64,
    pub conversation: Vec<ConversationEntry>,
    pub detected_patterns: DetectedPatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationSnapshot {
    pub current_state: EmotionalState,
    pub last_state_change_ms: i64,
    pub blink: BlinkLayer,
    pub face: FaceGeometry,
    pub glow: Glow,
    pub breathing_scale: f64,
    pub eye_roll: EyeRollLayer,
    pub screen_shake: ScreenShake,
    pub particle_type: Option<ParticleType>,
    pub show_accessories: bool,
    pub accessory_type: Option<AccessoryType>,
    pub micro: MicroMovement,
    pub context: ContextState,
    pub idle_time_ms: i64,
}

impl AnimationSnapshot {
    pub fn new(now_ms: i64) -> Self {
        Self {
            current_state: EmotionalState::Idle,
            last_state_change_ms: now_ms,
            blink: BlinkLayer::default(),
            face: FaceGeometry::default(),
            glow: Glow::default(),
            breathing_scale: 1.0,
            eye_roll: EyeRollLayer::default(),
            screen_shake: ScreenShake::default(),
            particle_type: None,
            show_accessories: false,
            accessory_type: None,
            micro: MicroMovement::default(),
            context: ContextState {
                last_message_ms: now_ms,
                ..Default::default()
            },
            idle_time_ms: 0,
        }
    }

    /// Base geometry plus the eye-roll and micro-movement layers.
    pub fn composed_face(&self) -> ComposedFace {
        let face = &self.face;
        let roll = &self.eye_roll;
        let micro = &self.micro;

        ComposedFace {
            left_pupil: Offset2 {
                x: face.left_pupil.x + roll.pupil_offset.x + micro.pupil_drift.x,
                y: face.left_pupil.y + roll.pupil_offset.y + micro.pupil_drift.y,
            },
            right_pupil: Offset2 {
                x: face.right_pupil.x + roll.pupil_offset.x + micro.pupil_drift.x,
                y: face.right_pupil.y + roll.pupil_offset.y + micro.pupil_drift.y,
            },
            left_eyelid: EyelidPose {
                top_y: face.left_eyelid.top_y + roll.eyelid_top_offset,
                bottom_y: face.left_eyelid.bottom_y + roll.eyelid_bottom_offset,
            },
            right_eyelid: EyelidPose {
                top_y: face.right_eyelid.top_y + roll.eyelid_top_offset,
                bottom_y: face.right_eyelid.bottom_y + roll.eyelid_bottom_offset,
            },
            left_eyebrow_rotation: face.left_eyebrow.rotation
                + roll.eyebrow_rotation_offset
                + micro.eyebrow_adjust.left.rotation,
            right_eyebrow_rotation: face.right_eyebrow.rotation
                + roll.eyebrow_rotation_offset
                + micro.eyebrow_adjust.right.rotation,
            left_eyebrow_y: face.left_eyebrow.y
                + roll.eyebrow_y_offset
                + micro.eyebrow_adjust.left.y,
            right_eyebrow_y: face.right_eyebrow.y
                + roll.eyebrow_y_offset
                + micro.eyebrow_adjust.right.y,
            head_tilt: roll.head_tilt + micro.head_tilt,
            mouth_width: face.mouth.width + micro.mouth.width,
            mouth_curve_depth: face.mouth.curve_depth + micro.mouth.depth,
        }
    }
}

/// Final per-paint values for the layered attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComposedFace {
    pub left_pupil: Offset2,
    pub right_pupil: Offset2,
    pub left_eyelid: EyelidPose,
    pub right_eyelid: EyelidPose,
    pub left_eyebrow_rotation: f64,
    pub right_eyebrow_rotation: f64,
    pub left_eyebrow_y: f64,
    pub right_eyebrow_y: f64,
    pub head_tilt: f64,
    pub mouth_width: f64,
    pub mouth_curve_depth: f64,
}
