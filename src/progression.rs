use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{KeyValueStore, Result};
use crate::emotion::EmotionalState;

pub const STORAGE_KEY: &str = "grump_achievements_v2";

const BASE_XP: u32 = 10;
const ANNOYED_BONUS_XP: u32 = 5;
const MAXIMUM_GRUMP_BONUS_XP: u32 = 20;
const XP_PER_LEVEL: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnlockId {
    #[serde(rename = "eyeRoll_full")]
    EyeRollFull,
    #[serde(rename = "messageSlam_enhanced")]
    MessageSlamEnhanced,
    #[serde(rename = "eyeRoll_double")]
    EyeRollDouble,
    #[serde(rename = "screenShake_intense")]
    ScreenShakeIntense,
    #[serde(rename = "rage_glow")]
    RageGlow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unlockable {
    pub id: UnlockId,
    pub name: &'static str,
    pub min_annoyance: u8,
    pub prerequisites: &'static [UnlockId],
}

/// Evaluated in this order, so a prerequisite unlocked earlier in the same
/// pass counts for the items after it.
pub const UNLOCKABLES: &[Unlockable] = &[
    Unlockable {
        id: UnlockId::EyeRollFull,
        name: "Eye Roll (Full)",
        min_annoyance: 20,
        prerequisites: &[],
    },
    Unlockable {
        id: UnlockId::MessageSlamEnhanced,
        name: "Message Slam (Enhanced)",
        min_annoyance: 40,
        prerequisites: &[],
    },
    Unlockable {
        id: UnlockId::EyeRollDouble,
        name: "Eye Roll (Double)",
        min_annoyance: 50,
        prerequisites: &[UnlockId::EyeRollFull],
    },
    Unlockable {
        id: UnlockId::ScreenShakeIntense,
        name: "Screen Shake (Intense)",
        min_annoyance: 60,
        prerequisites: &[],
    },
    Unlockable {
        id: UnlockId::RageGlow,
        name: "Rage Glow",
        min_annoyance: 80,
        prerequisites: &[],
    },
];

impl UnlockId {
    pub fn unlockable(self) -> &'static Unlockable {
        let index = match self {
            Self::EyeRollFull => 0,
            Self::MessageSlamEnhanced => 1,
            Self::EyeRollDouble => 2,
            Self::ScreenShakeIntense => 3,
            Self::RageGlow => 4,
        };
        &UNLOCKABLES[index]
    }

    pub fn name(self) -> &'static str {
        self.unlockable().name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub unlocked: Vec<UnlockId>,
    pub xp: u32,
    pub level: u32,
}

impl Default for ProgressionState {
    fn default() -> Self {
        Self {
            unlocked: Vec::new(),
            xp: 0,
            level: 1,
        }
    }
}

pub fn level_for(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

pub fn xp_for_state(state: EmotionalState) -> u32 {
    match state {
        EmotionalState::Annoyed => BASE_XP + ANNOYED_BONUS_XP,
        EmotionalState::MaximumGrump => BASE_XP + MAXIMUM_GRUMP_BONUS_XP,
        _ => BASE_XP,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XpGain {
    pub gained: u32,
    pub xp: u32,
    pub level: u32,
    pub leveled_up: bool,
}

/// XP, level and the monotonic unlock set.
#[derive(Debug, Clone, Default)]
pub struct ProgressionTracker {
    state: ProgressionState,
}

impl ProgressionTracker {
    pub fn new(state: ProgressionState) -> Self {
        Self { state }
    }

    /// Best effort: a missing, unreadable or malformed record yields defaults.
    /// The stored level is recomputed from XP and repeated unlocks are dropped.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut state = match store.get(STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<ProgressionState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "malformed progression record, using defaults");
                    ProgressionState::default()
                }
            },
            Ok(None) => ProgressionState::default(),
            Err(e) => {
                warn!(error = %e, "could not read progression record, using defaults");
                ProgressionState::default()
            }
        };
        state.level = level_for(state.xp);
        let mut seen = HashSet::new();
        state.unlocked.retain(|id| seen.insert(*id));
        Self { state }
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state)?;
        store.put(STORAGE_KEY, &json)
    }

    /// Write failures are logged and otherwise ignored.
    pub fn persist(&self, store: &mut dyn KeyValueStore) {
        if let Err(e) = self.save(store) {
            warn!(error = %e, "failed to persist progression");
        }
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn is_unlocked(&self, id: UnlockId) -> bool {
        self.state.unlocked.contains(&id)
    }

    /// Unlock everything the annoyance level now qualifies for.
    pub fn observe(&mut self, annoyance: u8) -> Vec<UnlockId> {
        let mut unlocked: HashSet<UnlockId> = self.state.unlocked.iter().copied().collect();
        let mut newly = Vec::new();

        for item in UNLOCKABLES {
            if unlocked.contains(&item.id) {
                continue;
            }
            let prerequisites_met = item.prerequisites.iter().all(|p| unlocked.contains(p));
            if annoyance >= item.min_annoyance && prerequisites_met {
                unlocked.insert(item.id);
                self.state.unlocked.push(item.id);
                newly.push(item.id);
                info!(unlock = item.name, annoyance, "feature unlocked");
            }
        }
        newly
    }

    pub fn record_interaction(&mut self, resulting_state: EmotionalState) -> XpGain {
        let gained = xp_for_state(resulting_state);
        let previous_level = self.state.level;

        self.state.xp = self.state.xp.saturating_add(gained);
        self.state.level = level_for(self.state.xp);

        let leveled_up = self.state.level > previous_level;
        if leveled_up {
            info!(level = self.state.level, xp = self.state.xp, "level up");
        }

        XpGain {
            gained,
            xp: self.state.xp,
            level: self.state.level,
            leveled_up,
        }
    }

    pub fn reset(&mut self) {
        self.state = ProgressionState::default();
    }
}
