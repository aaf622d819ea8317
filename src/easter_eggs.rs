use chrono::NaiveDateTime;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::context::time_context;
use crate::emotion::EmotionalState;
use crate::particles::ParticleType;
use crate::snapshot::AccessoryType;

const STARE_SILENCE_MS: i64 = 30_000;
const STARE_HOLD_MS: i64 = 30_000;
const HEART_EYES_CHANCE: f64 = 0.001;
const HEART_EYES_COOLDOWN_MS: i64 = 5_000;

const BIRTHDAY_KEYWORDS: &[&str] = &["birthday", "born", "birth date", "my birthday is", "turned"];
const LOVE_KEYWORDS: &[&str] = &["i love you", "love you", "i'm in love", "i love grump"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EasterEgg {
    MondayMorning,
    ThreeAmGrump,
    BirthdayGrump,
    LoveConfession,
    TheStare,
    HeartEyes,
}

impl EasterEgg {
    pub fn name(self) -> &'static str {
        match self {
            Self::MondayMorning => "Monday Morning",
            Self::ThreeAmGrump => "3AM Grump",
            Self::BirthdayGrump => "Birthday Grump",
            Self::LoveConfession => "Love Confession",
            Self::TheStare => "The Stare",
            Self::HeartEyes => "Heart Eyes",
        }
    }

    pub fn trigger(self) -> EasterEggTrigger {
        let (state, particle_type, accessory_type, message) = match self {
            Self::MondayMorning => (
                EmotionalState::MaximumGrump,
                None,
                None,
                "My condolences. It's Monday.",
            ),
            Self::ThreeAmGrump => (
                EmotionalState::ThreeAm,
                Some(ParticleType::CoffeeSteam),
                Some(AccessoryType::CoffeeMug),
                "Why are either of us awake right now.",
            ),
            Self::BirthdayGrump => (
                EmotionalState::Birthday,
                Some(ParticleType::Confetti),
                Some(AccessoryType::PartyHat),
                "Fine. Happy birthday. I guess.",
            ),
            Self::LoveConfession => (EmotionalState::Suspicious, None, None, "That's concerning."),
            Self::TheStare => (EmotionalState::Idle, None, None, "..."),
            Self::HeartEyes => (
                EmotionalState::Impressed,
                Some(ParticleType::Sparkle),
                None,
                "...",
            ),
        };

        EasterEggTrigger {
            egg: self,
            name: self.name(),
            state,
            particle_type,
            accessory_type,
            message: Some(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EasterEggTrigger {
    pub egg: EasterEgg,
    pub name: &'static str,
    pub state: EmotionalState,
    pub particle_type: Option<ParticleType>,
    pub accessory_type: Option<AccessoryType>,
    pub message: Option<&'static str>,
}

fn mentions_any(message: &str, keywords: &[&str]) -> bool {
    let lower = message.to_lowercase();
    keywords.iter().any(|keyword| lower.contains(keyword))
}

/// Picks at most one easter egg per evaluation, in fixed priority order.
#[derive(Debug, Clone)]
pub struct EasterEggArbiter {
    last_interaction_ms: i64,
    stare_start_ms: Option<i64>,
    heart_eyes_disarmed_until: Option<i64>,
}

impl EasterEggArbiter {
    pub fn new(now_ms: i64) -> Self {
        Self {
            last_interaction_ms: now_ms,
            stare_start_ms: None,
            heart_eyes_disarmed_until: None,
        }
    }

    pub fn evaluate<R: Rng>(
        &mut self,
        message: Option<&str>,
        now: NaiveDateTime,
        now_ms: i64,
        rng: &mut R,
    ) -> Option<EasterEggTrigger> {
        let egg = self
            .check_monday_morning(now)
            .or_else(|| self.check_three_am(now))
            .or_else(|| message.and_then(|text| self.check_birthday(text)))
            .or_else(|| message.and_then(|text| self.check_love_confession(text)))
            .or_else(|| self.check_stare(now_ms))
            .or_else(|| self.check_heart_eyes(now_ms, rng))?;

        info!(egg = egg.name(), "easter egg triggered");
        Some(egg.trigger())
    }

    pub fn check_monday_morning(&self, now: NaiveDateTime) -> Option<EasterEgg> {
        let time = time_context(now);
        let morning = (8..10).contains(&time.facts.hour);
        (time.facts.is_monday && morning).then_some(EasterEgg::MondayMorning)
    }

    pub fn check_three_am(&self, now: NaiveDateTime) -> Option<EasterEgg> {
        time_context(now).facts.is_3am.then_some(EasterEgg::ThreeAmGrump)
    }

    pub fn check_birthday(&self, message: &str) -> Option<EasterEgg> {
        mentions_any(message, BIRTHDAY_KEYWORDS).then_some(EasterEgg::BirthdayGrump)
    }

    pub fn check_love_confession(&self, message: &str) -> Option<EasterEgg> {
        mentions_any(message, LOVE_KEYWORDS).then_some(EasterEgg::LoveConfession)
    }

    /// Silence has to outlast the threshold once to start the stare, then
    /// the stare itself has to be held just as long.
    pub fn check_stare(&mut self, now_ms: i64) -> Option<EasterEgg> {
        if now_ms - self.last_interaction_ms <= STARE_SILENCE_MS {
            self.stare_start_ms = None;
            return None;
        }

        let started = *self.stare_start_ms.get_or_insert(now_ms);
        (now_ms - started > STARE_HOLD_MS).then_some(EasterEgg::TheStare)
    }

    pub fn check_heart_eyes<R: Rng>(&mut self, now_ms: i64, rng: &mut R) -> Option<EasterEgg> {
        if let Some(until) = self.heart_eyes_disarmed_until {
            if now_ms < until {
                return None;
            }
            self.heart_eyes_disarmed_until = None;
        }

        if rng.gen::<f64>() < HEART_EYES_CHANCE {
            self.heart_eyes_disarmed_until = Some(now_ms + HEART_EYES_COOLDOWN_MS);
            return Some(EasterEgg::HeartEyes);
        }
        None
    }

    pub fn heart_eyes_armed(&self, now_ms: i64) -> bool {
        self.heart_eyes_disarmed_until.map_or(true, |until| now_ms >= until)
    }

    pub fn update_interaction(&mut self, now_ms: i64) {
        self.last_interaction_ms = now_ms;
        self.stare_start_ms = None;
    }

    pub fn reset(&mut self, now_ms: i64) {
        self.update_interaction(now_ms);
        self.heart_eyes_disarmed_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::rngs::mock::StepRng;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        // January 2024: the 1st is a Monday.
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn test_monday_morning_beats_birthday() {
        let mut arbiter = EasterEggArbiter::new(0);
        let trigger = arbiter
            .evaluate(Some("it's my birthday today"), at(1, 9), 0, &mut never())
            .unwrap();

        assert_eq!(trigger.egg, EasterEgg::MondayMorning);
        assert_eq!(trigger.state, EmotionalState::MaximumGrump);
        assert_eq!(trigger.message, Some("My condolences. It's Monday."));
    }

    #[test]
    fn test_three_am_any_weekday() {
        let mut arbiter = EasterEggArbiter::new(0);
        for day in 1..=7 {
            let trigger = arbiter.evaluate(None, at(day, 3), 0, &mut never()).unwrap();
            assert_eq!(trigger.egg, EasterEgg::ThreeAmGrump);
            assert_eq!(trigger.state, EmotionalState::ThreeAm);
            assert_eq!(trigger.particle_type, Some(ParticleType::CoffeeSteam));
            assert_eq!(trigger.accessory_type, Some(AccessoryType::CoffeeMug));
        }
    }

    #[test]
    fn test_birthday_needs_a_message() {
        let mut arbiter = EasterEggArbiter::new(0);
        assert!(arbiter.evaluate(None, at(2, 12), 0, &mut never()).is_none());

        let trigger = arbiter
            .evaluate(Some("I just turned 30"), at(2, 12), 0, &mut never())
            .unwrap();
        assert_eq!(trigger.egg, EasterEgg::BirthdayGrump);
        assert_eq!(trigger.particle_type, Some(ParticleType::Confetti));
        assert_eq!(trigger.accessory_type, Some(AccessoryType::PartyHat));
    }

    #[test]
    fn test_birthday_beats_love_confession() {
        let mut arbiter = EasterEggArbiter::new(0);
        let trigger = arbiter
            .evaluate(Some("I love you, happy birthday"), at(2, 12), 0, &mut never())
            .unwrap();
        assert_eq!(trigger.egg, EasterEgg::BirthdayGrump);

        let trigger = arbiter
            .evaluate(Some("I LOVE YOU grump"), at(2, 12), 0, &mut never())
            .unwrap();
        assert_eq!(trigger.egg, EasterEgg::LoveConfession);
        assert_eq!(trigger.state, EmotionalState::Suspicious);
    }

    #[test]
    fn test_stare_needs_a_minute_of_silence() {
        let mut arbiter = EasterEggArbiter::new(0);
        let noon = at(2, 12);
        let mut fired_at = None;

        for second in 1..=90 {
            let now_ms = second * 1000;
            if let Some(trigger) = arbiter.evaluate(None, noon, now_ms, &mut never()) {
                assert_eq!(trigger.egg, EasterEgg::TheStare);
                fired_at.get_or_insert(now_ms);
            }
        }

        // Silence passes 30 s at t=31 s, the stare is held past 30 s at t=62 s.
        assert_eq!(fired_at, Some(62_000));
    }

    #[test]
    fn test_interaction_resets_stare() {
        let mut arbiter = EasterEggArbiter::new(0);
        let noon = at(2, 12);
        for second in 1..=50 {
            arbiter.evaluate(None, noon, second * 1000, &mut never());
        }
        arbiter.update_interaction(50_000);
        assert!(arbiter.check_stare(100_000).is_none());
        assert!(arbiter.check_stare(131_000).is_some());
    }

    #[test]
    fn test_heart_eyes_self_disarms_for_five_seconds() {
        let mut arbiter = EasterEggArbiter::new(0);
        let noon = at(2, 12);

        let trigger = arbiter.evaluate(None, noon, 1_000, &mut always()).unwrap();
        assert_eq!(trigger.egg, EasterEgg::HeartEyes);
        assert_eq!(trigger.state, EmotionalState::Impressed);
        assert_eq!(trigger.particle_type, Some(ParticleType::Sparkle));
        assert!(!arbiter.heart_eyes_armed(1_000));

        arbiter.update_interaction(1_000);
        assert!(arbiter.evaluate(None, noon, 5_999, &mut always()).is_none());
        assert!(arbiter.heart_eyes_armed(6_000));

        arbiter.update_interaction(6_000);
        let again = arbiter.evaluate(None, noon, 6_000, &mut always()).unwrap();
        assert_eq!(again.egg, EasterEgg::HeartEyes);
    }

    #[test]
    fn test_reset_rearms_heart_eyes() {
        let mut arbiter = EasterEggArbiter::new(0);
        arbiter.check_heart_eyes(0, &mut always());
        assert!(!arbiter.heart_eyes_armed(10));
        arbiter.reset(10);
        assert!(arbiter.heart_eyes_armed(10));
    }

    #[test]
    fn test_quiet_afternoon_has_no_egg() {
        let mut arbiter = EasterEggArbiter::new(0);
        assert!(arbiter
            .evaluate(Some("how do I reset my password"), at(3, 15), 1_000, &mut never())
            .is_none());
    }
}
