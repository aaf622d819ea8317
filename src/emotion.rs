use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named moods the mascot can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmotionalState {
    Idle,
    Listening,
    Processing,
    Responding,
    Skeptical,
    Annoyed,
    Impressed,
    Suspicious,
    SoftMode,
    MaximumGrump,
    Sleepy,
    Error,
    ThinkingDeep,
    Smug,
    ExasperatedSigh,
    ReluctantAgreement,
    Sleep,
    Jumpscare,
    Birthday,
    #[serde(rename = "threeAM")]
    ThreeAm,
    Furious,
}

impl EmotionalState {
    pub const ALL: [EmotionalState; 21] = [
        EmotionalState::Idle,
        EmotionalState::Listening,
        EmotionalState::Processing,
        EmotionalState::Responding,
        EmotionalState::Skeptical,
        EmotionalState::Annoyed,
        EmotionalState::Impressed,
        EmotionalState::Suspicious,
        EmotionalState::SoftMode,
        EmotionalState::MaximumGrump,
        EmotionalState::Sleepy,
        EmotionalState::Error,
        EmotionalState::ThinkingDeep,
        EmotionalState::Smug,
        EmotionalState::ExasperatedSigh,
        EmotionalState::ReluctantAgreement,
        EmotionalState::Sleep,
        EmotionalState::Jumpscare,
        EmotionalState::Birthday,
        EmotionalState::ThreeAm,
        EmotionalState::Furious,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Responding => "responding",
            Self::Skeptical => "skeptical",
            Self::Annoyed => "annoyed",
            Self::Impressed => "impressed",
            Self::Suspicious => "suspicious",
            Self::SoftMode => "softMode",
            Self::MaximumGrump => "maximumGrump",
            Self::Sleepy => "sleepy",
            Self::Error => "error",
            Self::ThinkingDeep => "thinkingDeep",
            Self::Smug => "smug",
            Self::ExasperatedSigh => "exasperatedSigh",
            Self::ReluctantAgreement => "reluctantAgreement",
            Self::Sleep => "sleep",
            Self::Jumpscare => "jumpscare",
            Self::Birthday => "birthday",
            Self::ThreeAm => "threeAM",
            Self::Furious => "furious",
        }
    }

    /// Coarse 0-100 score that gates cosmetic unlocks.
    pub fn annoyance_level(self) -> u8 {
        match self {
            Self::MaximumGrump => 100,
            Self::Furious => 90,
            Self::Error => 80,
            Self::Annoyed => 60,
            Self::Suspicious => 40,
            Self::Skeptical => 30,
            _ => 0,
        }
    }

    /// States during which the face drifts with noise-driven micro-movement.
    pub fn allows_micro_movement(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Listening | Self::Responding | Self::SoftMode
        )
    }

    /// Parse a state name; anything unrecognised is treated as `Idle`.
    pub fn parse_or_idle(name: &str) -> Self {
        name.parse().unwrap_or(Self::Idle)
    }
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EmotionalState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.name() == s)
            .ok_or_else(|| format!("Unknown emotional state: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MouthShape {
    Flat,
    Frown,
    SlightFrown,
    Smirk,
    Open,
    Pursed,
    Tight,
    AlmostSmile,
    Part,
    Muttering,
    ExaggeratedFrown,
    Neutral,
    Wavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GlowColor {
    Red,
    Orange,
    Soft,
    Intense,
}

/// Baseline face and glow parameters registered for a state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    pub left_eyebrow_rotation: f64,
    pub right_eyebrow_rotation: f64,
    pub mouth: MouthShape,
    pub glow_intensity: f64,
    pub glow_pulse_rate: f64,
    pub glow_color: GlowColor,
}

const fn cfg(
    left: f64,
    right: f64,
    mouth: MouthShape,
    intensity: f64,
    pulse_rate: f64,
    color: GlowColor,
) -> StateConfig {
    StateConfig {
        left_eyebrow_rotation: left,
        right_eyebrow_rotation: right,
        mouth,
        glow_intensity: intensity,
        glow_pulse_rate: pulse_rate,
        glow_color: color,
    }
}

use EmotionalState as S;
use GlowColor as G;
use MouthShape as M;

const IDLE_CONFIG: StateConfig = cfg(-5.0, 5.0, M::Flat, 0.4, 2.0, G::Red);

// `Furious` is deliberately absent and resolves to idle.
const STATE_CONFIGS: &[(EmotionalState, StateConfig)] = &[
    (S::Idle, IDLE_CONFIG),
    (S::Listening, cfg(-3.0, 3.0, M::Open, 0.6, 1.0, G::Orange)),
    (S::Processing, cfg(-12.0, 12.0, M::Pursed, 0.5, 1.5, G::Orange)),
    (S::Responding, cfg(-5.0, 5.0, M::Open, 0.3, 2.0, G::Red)),
    (S::Skeptical, cfg(-5.0, -18.0, M::Smirk, 0.4, 1.5, G::Red)),
    (S::Annoyed, cfg(-18.0, 18.0, M::Tight, 0.6, 1.2, G::Red)),
    (S::MaximumGrump, cfg(-25.0, 25.0, M::ExaggeratedFrown, 0.8, 0.8, G::Intense)),
    (S::Impressed, cfg(2.0, -2.0, M::AlmostSmile, 0.5, 1.8, G::Orange)),
    (S::Suspicious, cfg(-20.0, -8.0, M::Tight, 0.4, 1.8, G::Red)),
    (S::SoftMode, cfg(5.0, -5.0, M::Flat, 0.2, 2.5, G::Soft)),
    (S::Sleepy, cfg(8.0, -8.0, M::Flat, 0.2, 4.0, G::Soft)),
    (S::Error, cfg(-10.0, 15.0, M::Frown, 0.6, 0.5, G::Intense)),
    (S::ThinkingDeep, cfg(-15.0, 15.0, M::Pursed, 0.5, 1.2, G::Orange)),
    (S::Smug, cfg(-5.0, -20.0, M::Smirk, 0.5, 1.5, G::Red)),
    (S::ExasperatedSigh, cfg(-8.0, 8.0, M::Open, 0.4, 2.0, G::Red)),
    (S::ReluctantAgreement, cfg(-3.0, 3.0, M::Flat, 0.3, 2.0, G::Red)),
    (S::Sleep, cfg(10.0, -10.0, M::Flat, 0.1, 5.0, G::Soft)),
    (S::Jumpscare, cfg(0.0, 0.0, M::Open, 0.8, 0.3, G::Intense)),
    (S::Birthday, cfg(-15.0, 15.0, M::Tight, 0.5, 1.5, G::Orange)),
    (S::ThreeAm, cfg(5.0, -5.0, M::Flat, 0.2, 3.0, G::Soft)),
];

impl StateConfig {
    /// Registered config, if any.
    pub fn lookup(state: EmotionalState) -> Option<&'static StateConfig> {
        STATE_CONFIGS
            .iter()
            .find(|(registered, _)| *registered == state)
            .map(|(_, config)| config)
    }

    /// Total lookup: unregistered states get idle's config.
    pub fn for_state(state: EmotionalState) -> &'static StateConfig {
        Self::lookup(state).unwrap_or(&IDLE_CONFIG)
    }

    pub fn idle() -> &'static StateConfig {
        &IDLE_CONFIG
    }
}
