//! The engine facade.
//!
//! `GrumpEngine` owns every component, the timer queue and the random source.
//! Nothing runs on its own: the host calls [`GrumpEngine::tick`] once per
//! frame, due timers are dispatched in order, and then the per-frame samplers
//! (blink clock, micro-movement, breathing, particle expiry) run.

use chrono::NaiveDateTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::blink::{BlinkEvent, BlinkScheduler, BlinkType};
use crate::context::{
    time_context, ContextAnalyzer, ConversationPatterns, MessageAnalysis, Sender, SessionContext,
    TimeContext,
};
use crate::core::{CancelToken, Clock, KeyValueStore, TimerQueue};
use crate::easter_eggs::{EasterEgg, EasterEggArbiter, EasterEggTrigger};
use crate::emotion::EmotionalState;
use crate::eye_roll::{EyeRollChoreographer, EyeRollVariation};
use crate::machine::EmotionalStateMachine;
use crate::micro::MicroMovementDriver;
use crate::particles::{Particle, ParticleEvent, ParticleFrame, ParticleSpawner, ParticleType};
use crate::progression::{ProgressionState, ProgressionTracker, UnlockId, XpGain};
use crate::snapshot::{AccessoryType, AnimationSnapshot, DetectedPatterns};

const RESPONDING_HOLD_MS: i64 = 2000;
const ANGER_CLEAR_MS: i64 = 500;
const SPARKLE_CLEAR_MS: i64 = 400;
const SPARKLE_CHANCE: f64 = 0.05;
const GRUMP_SHAKE: f64 = 0.5;
const ERROR_SHAKE: f64 = 0.3;
const EYE_TRACKING_SPAN: f64 = 12.0;

/// Everything the engine can schedule on its timer queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Blink(BlinkEvent),
    EyeRollStep(u32),
    Particle(ParticleEvent),
    ScreenShakeEnd,
    ClearParticles,
    ReturnToIdle,
    PersistProgression,
    ContextTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub seed: Option<u64>,
    pub context_tick_ms: i64,
    pub persist_debounce_ms: i64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            seed: None,
            context_tick_ms: 1000,
            persist_debounce_ms: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub transitions: u64,
    pub messages: u64,
    pub replies: u64,
    pub errors: u64,
    pub easter_eggs: u64,
    pub blinks: u64,
    pub eye_rolls: u64,
}

/// What one `send_message` call did.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub analysis: MessageAnalysis,
    pub trigger: Option<EasterEggTrigger>,
    pub state: EmotionalState,
    pub xp: XpGain,
    pub unlocked: Vec<UnlockId>,
}

pub struct GrumpEngine<C: Clock, S: KeyValueStore> {
    clock: C,
    store: S,
    settings: EngineSettings,
    rng: StdRng,
    timers: TimerQueue<TimerEvent>,

    machine: EmotionalStateMachine,
    analyzer: ContextAnalyzer,
    arbiter: EasterEggArbiter,
    blink: BlinkScheduler,
    eye_roll: EyeRollChoreographer,
    micro: MicroMovementDriver,
    particles: ParticleSpawner,
    progression: ProgressionTracker,

    context_timer: Option<CancelToken>,
    return_timer: Option<CancelToken>,
    particle_clear_timer: Option<CancelToken>,
    persist_timer: Option<CancelToken>,

    last_egg: Option<EasterEgg>,
    last_analysis: Option<MessageAnalysis>,
    stats: EngineStats,
}

impl<C: Clock, S: KeyValueStore> GrumpEngine<C, S> {
    pub fn new(clock: C, store: S, settings: EngineSettings) -> Self {
        let now = clock.now_ms();
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let progression = ProgressionTracker::load(&store);

        let mut engine = Self {
            clock,
            store,
            settings,
            rng,
            timers: TimerQueue::new(),
            machine: EmotionalStateMachine::new(now),
            analyzer: ContextAnalyzer::new(now),
            arbiter: EasterEggArbiter::new(now),
            blink: BlinkScheduler::new(now),
            eye_roll: EyeRollChoreographer::new(),
            micro: MicroMovementDriver::new(now),
            particles: ParticleSpawner::new(),
            progression,
            context_timer: None,
            return_timer: None,
            particle_clear_timer: None,
            persist_timer: None,
            last_egg: None,
            last_analysis: None,
            stats: EngineStats::default(),
        };

        engine.blink.arm(
            &engine.machine.snapshot().blink,
            EmotionalState::Idle,
            now,
            &mut engine.timers,
            &mut engine.rng,
        );
        engine.context_timer = Some(engine.timers.schedule(
            now,
            settings.context_tick_ms,
            TimerEvent::ContextTick,
        ));
        engine.refresh_context(now);

        info!(
            xp = engine.progression.state().xp,
            level = engine.progression.state().level,
            "engine started"
        );
        engine
    }

    pub fn snapshot(&self) -> &AnimationSnapshot {
        self.machine.snapshot()
    }

    pub fn current_state(&self) -> EmotionalState {
        self.machine.current_state()
    }

    pub fn particles(&self) -> &[Particle] {
        self.particles.particles()
    }

    pub fn particle_frames(&self) -> Vec<ParticleFrame> {
        self.particles.frames(self.clock.now_ms())
    }

    pub fn progression(&self) -> &ProgressionState {
        self.progression.state()
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            blinks: self.blink.blinks_started(),
            eye_rolls: self.eye_roll.completed(),
            ..self.stats
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    /// Run every timer that is due, then sample the per-frame animations.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        while let Some((due, event)) = self.timers.pop_due(now) {
            self.dispatch(due, event);
        }
        self.frame(now);
    }

    fn dispatch(&mut self, due: i64, event: TimerEvent) {
        match event {
            TimerEvent::Blink(BlinkEvent::Fire) => {
                let state = self.machine.current_state();
                self.blink.on_fire(
                    self.machine.blink_layer_mut(),
                    state,
                    due,
                    &mut self.timers,
                    &mut self.rng,
                );
            }
            TimerEvent::Blink(BlinkEvent::End) => {
                let state = self.machine.current_state();
                self.blink.on_end(
                    self.machine.blink_layer_mut(),
                    state,
                    due,
                    &mut self.timers,
                    &mut self.rng,
                );
            }
            TimerEvent::EyeRollStep(step) => {
                self.eye_roll
                    .on_step(step, self.machine.eye_roll_layer_mut(), due, &mut self.timers);
            }
            TimerEvent::Particle(event) => {
                self.particles.on_event(event, due, &mut self.timers, &mut self.rng);
            }
            TimerEvent::ScreenShakeEnd => self.machine.end_screen_shake(),
            TimerEvent::ClearParticles => {
                self.particle_clear_timer = None;
                self.set_particles_at(None, due);
            }
            TimerEvent::ReturnToIdle => {
                self.return_timer = None;
                self.apply_state(EmotionalState::Idle, due);
            }
            TimerEvent::PersistProgression => {
                self.persist_timer = None;
                self.progression.persist(&mut self.store);
            }
            TimerEvent::ContextTick => {
                self.context_timer = Some(self.timers.schedule(
                    due,
                    self.settings.context_tick_ms,
                    TimerEvent::ContextTick,
                ));
                self.ambient_tick(due);
            }
        }
    }

    fn frame(&mut self, now: i64) {
        let state = self.machine.current_state();
        self.blink.on_frame(self.machine.blink_layer_mut(), now);
        self.micro.on_frame(self.machine.micro_layer_mut(), state, now);
        self.machine.breathe(now);
        self.machine.refresh_idle_time(now);

        self.particles.on_frame(now);
        if self.particles.is_spent() {
            self.set_particles_at(None, now);
        }
    }

    pub fn transition_to(&mut self, state: EmotionalState) -> EmotionalState {
        let now = self.clock.now_ms();
        self.apply_state(state, now)
    }

    /// Unknown names act as `idle`.
    pub fn transition_to_named(&mut self, name: &str) -> EmotionalState {
        self.transition_to(EmotionalState::parse_or_idle(name))
    }

    fn apply_state(&mut self, state: EmotionalState, now: i64) -> EmotionalState {
        let previous = self.machine.transition_to(state, now);

        // Re-entering the current state keeps the blink cycle and drift clock running.
        if previous != state {
            self.stats.transitions += 1;
            self.blink.on_state_change(
                &self.machine.snapshot().blink,
                state,
                now,
                &mut self.timers,
                &mut self.rng,
            );
            self.micro
                .on_state_change(self.machine.micro_layer_mut(), state, now);
        }

        if !self.progression.observe(state.annoyance_level()).is_empty() {
            self.schedule_persist(now);
        }
        previous
    }

    pub fn set_particles(&mut self, kind: Option<ParticleType>) {
        let now = self.clock.now_ms();
        self.set_particles_at(kind, now);
    }

    fn set_particles_at(&mut self, kind: Option<ParticleType>, now: i64) {
        if let Some(token) = self.particle_clear_timer.take() {
            self.timers.cancel(token);
        }
        self.machine.set_particle_type(kind);
        self.particles.set_type(kind, now, &mut self.timers, &mut self.rng);
    }

    fn clear_particles_after(&mut self, delay_ms: i64, now: i64) {
        self.particle_clear_timer =
            Some(self.timers.schedule(now, delay_ms, TimerEvent::ClearParticles));
    }

    pub fn set_accessory(&mut self, accessory: Option<AccessoryType>) {
        self.machine.set_accessory(accessory);
    }

    pub fn trigger_screen_shake(&mut self, intensity: f64) {
        let now = self.clock.now_ms();
        self.machine.trigger_screen_shake(intensity, now, &mut self.timers);
    }

    pub fn update_eye_tracking(&mut self, position: f64) {
        self.machine.update_eye_tracking(position);
    }

    /// Ignored while another eye-roll is running.
    pub fn trigger_eye_roll(&mut self, variation: EyeRollVariation) -> bool {
        let now = self.clock.now_ms();
        self.eye_roll.start(
            variation,
            self.machine.eye_roll_layer_mut(),
            now,
            &mut self.timers,
        )
    }

    /// Ignored while another blink is held.
    pub fn trigger_blink(&mut self, blink_type: BlinkType) -> bool {
        let now = self.clock.now_ms();
        self.blink
            .trigger(self.machine.blink_layer_mut(), blink_type, now, &mut self.timers)
    }

    pub fn surprise_blink(&mut self) -> bool {
        self.trigger_blink(BlinkType::QuickDouble)
    }

    pub fn annoyed_blink(&mut self) -> bool {
        self.trigger_blink(BlinkType::Heavy)
    }

    pub fn slow_blink(&mut self) -> bool {
        self.trigger_blink(BlinkType::Slow)
    }

    pub fn skeptical_blink(&mut self) -> bool {
        self.trigger_blink(BlinkType::Half)
    }

    pub fn wink(&mut self) -> bool {
        self.trigger_blink(BlinkType::Wink)
    }

    fn interaction(&mut self, now: i64) {
        self.arbiter.update_interaction(now);
        self.last_egg = None;
        if let Some(token) = self.return_timer.take() {
            self.timers.cancel(token);
        }
    }

    /// The text box changed. `cursor` is a character offset into `text`.
    pub fn input_changed(&mut self, text: &str, cursor: usize) {
        let now = self.clock.now_ms();
        self.interaction(now);

        let length = text.chars().count();
        if length == 0 {
            self.machine.update_eye_tracking(0.0);
            self.apply_state(EmotionalState::Idle, now);
            return;
        }

        let ratio = cursor.min(length) as f64 / length as f64;
        self.machine
            .update_eye_tracking(ratio * EYE_TRACKING_SPAN - EYE_TRACKING_SPAN / 2.0);
        self.apply_state(EmotionalState::Listening, now);
    }

    /// Blank input is ignored.
    pub fn send_message(&mut self, text: &str) -> Option<MessageOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let now = self.clock.now_ms();
        let wall = self.clock.now();
        let unlocked_before = self.progression.state().unlocked.len();

        let analysis = self.analyzer.analyze_message(text);
        self.analyzer.add_message(Sender::User, text, now);
        self.interaction(now);

        let trigger = self.arbiter.evaluate(Some(text), wall, now, &mut self.rng);
        match (&trigger, analysis.emotional_state) {
            (Some(trigger), _) => self.apply_trigger(trigger, now),
            (None, Some(state)) => {
                self.apply_state(state, now);
                self.react_to(state, now);
            }
            (None, None) => {
                self.apply_state(EmotionalState::Processing, now);
            }
        }

        let state = self.machine.current_state();
        let xp = self.progression.record_interaction(state);
        self.schedule_persist(now);

        self.stats.messages += 1;
        self.last_analysis = Some(analysis.clone());
        self.refresh_context(now);

        let unlocked = self.progression.state().unlocked[unlocked_before..].to_vec();
        debug!(state = %state, xp = xp.xp, "message handled");

        Some(MessageOutcome {
            analysis,
            trigger,
            state,
            xp,
            unlocked,
        })
    }

    fn react_to(&mut self, state: EmotionalState, now: i64) {
        match state {
            EmotionalState::MaximumGrump => {
                self.machine
                    .trigger_screen_shake(GRUMP_SHAKE, now, &mut self.timers);
                self.set_particles_at(Some(ParticleType::AngerParticle), now);
                self.clear_particles_after(ANGER_CLEAR_MS, now);
            }
            EmotionalState::Skeptical => {
                self.eye_roll.start(
                    EyeRollVariation::Half,
                    self.machine.eye_roll_layer_mut(),
                    now,
                    &mut self.timers,
                );
            }
            EmotionalState::Impressed => {
                if self.rng.gen::<f64>() < SPARKLE_CHANCE {
                    self.set_particles_at(Some(ParticleType::Sparkle), now);
                    self.clear_particles_after(SPARKLE_CLEAR_MS, now);
                }
            }
            _ => {}
        }
    }

    fn apply_trigger(&mut self, trigger: &EasterEggTrigger, now: i64) {
        self.apply_state(trigger.state, now);
        if trigger.particle_type.is_some() {
            self.set_particles_at(trigger.particle_type, now);
        }
        if trigger.accessory_type.is_some() {
            self.machine.set_accessory(trigger.accessory_type);
        }
        self.last_egg = Some(trigger.egg);
        self.stats.easter_eggs += 1;
    }

    /// The assistant is composing a reply.
    pub fn reply_pending(&mut self) {
        self.transition_to(EmotionalState::Processing);
    }

    /// Recorded in the conversation but never keyword-analyzed.
    pub fn receive_reply(&mut self, text: &str) {
        let now = self.clock.now_ms();
        self.analyzer.add_message(Sender::Grump, text, now);
        self.apply_state(EmotionalState::Responding, now);

        if let Some(token) = self.return_timer.take() {
            self.timers.cancel(token);
        }
        self.return_timer = Some(self.timers.schedule(
            now,
            RESPONDING_HOLD_MS,
            TimerEvent::ReturnToIdle,
        ));

        self.stats.replies += 1;
        self.refresh_context(now);
    }

    pub fn report_error(&mut self) {
        let now = self.clock.now_ms();
        self.apply_state(EmotionalState::Error, now);
        self.set_particles_at(Some(ParticleType::GlitchRectangle), now);
        self.machine
            .trigger_screen_shake(ERROR_SHAKE, now, &mut self.timers);
        self.stats.errors += 1;
    }

    fn ambient_tick(&mut self, now: i64) {
        self.refresh_context(now);
        if self.machine.current_state() != EmotionalState::Idle {
            return;
        }

        let wall = self.clock.now();
        match self.arbiter.evaluate(None, wall, now, &mut self.rng) {
            Some(trigger) => {
                if self.last_egg != Some(trigger.egg) {
                    self.apply_trigger(&trigger, now);
                }
            }
            None => self.ambient_fallback(wall, now),
        }
    }

    fn ambient_fallback(&mut self, wall: NaiveDateTime, now: i64) {
        let time = time_context(wall);
        if let Some(state) = time.time_based_state {
            self.apply_state(state, now);
            if time.facts.is_3am {
                self.set_particles_at(Some(ParticleType::CoffeeSteam), now);
                self.machine.set_accessory(Some(AccessoryType::CoffeeMug));
            }
            return;
        }

        let session = self.analyzer.session_context(now);
        if let Some(state) = session.session_based_state {
            self.apply_state(state, now);
            if session.overtime {
                self.set_particles_at(Some(ParticleType::SleepZ), now);
            }
        }
    }

    fn refresh_context(&mut self, now: i64) {
        let time = time_context(self.clock.now());
        let session = self.analyzer.session_context(now);
        let patterns = self.analyzer.conversation_patterns();
        let conversation: Vec<_> = self.analyzer.conversation().cloned().collect();
        let keyword_matches = self
            .last_analysis
            .as_ref()
            .map(|analysis| analysis.keyword_matches.clone())
            .unwrap_or_default();

        let context = self.machine.context_mut();
        context.time = time.facts;
        context.session_length_ms = session.session_length_ms;
        context.message_count = session.message_count;
        if let Some(last) = conversation.last() {
            context.last_message_ms = last.timestamp_ms;
        }
        context.conversation = conversation;
        context.detected_patterns = DetectedPatterns {
            repeat_questions: patterns.repeat_questions,
            sentiment_score: patterns.sentiment_trajectory.last().copied().unwrap_or(0.0),
            keyword_matches,
        };
    }

    pub fn time_context(&self) -> TimeContext {
        time_context(self.clock.now())
    }

    pub fn session_context(&self) -> SessionContext {
        self.analyzer.session_context(self.clock.now_ms())
    }

    pub fn conversation_patterns(&self) -> ConversationPatterns {
        self.analyzer.conversation_patterns()
    }

    pub fn recommended_state(&mut self, message: Option<&str>) -> Option<EmotionalState> {
        let wall = self.clock.now();
        let now = self.clock.now_ms();
        self.analyzer.recommended_state(message, wall, now)
    }

    /// Fresh conversation: histories cleared, session clock restarted,
    /// heart eyes re-armed.
    pub fn reset_session(&mut self) {
        let now = self.clock.now_ms();
        self.analyzer.reset_session(now);
        self.arbiter.reset(now);
        self.last_egg = None;
        self.last_analysis = None;
        self.refresh_context(now);
        info!("session reset");
    }

    pub fn reset_progression(&mut self) {
        let now = self.clock.now_ms();
        self.progression.reset();
        self.schedule_persist(now);
        self.apply_state(EmotionalState::Idle, now);
        info!("progression reset");
    }

    fn schedule_persist(&mut self, now: i64) {
        if let Some(token) = self.persist_timer.take() {
            self.timers.cancel(token);
        }
        self.persist_timer = Some(self.timers.schedule(
            now,
            self.settings.persist_debounce_ms,
            TimerEvent::PersistProgression,
        ));
    }

    /// Cancel every timer. A pending progression write is flushed first.
    pub fn shutdown(&mut self) {
        if let Some(token) = self.persist_timer.take() {
            self.timers.cancel(token);
            self.progression.persist(&mut self.store);
        }

        self.eye_roll
            .cancel(self.machine.eye_roll_layer_mut(), &mut self.timers);
        self.particles.cancel(&mut self.timers);
        self.blink.cancel(&mut self.timers);
        self.timers.clear();

        self.context_timer = None;
        self.return_timer = None;
        self.particle_clear_timer = None;
        info!("engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ManualClock, MemoryStore};
    use crate::progression::STORAGE_KEY;
    use crate::snapshot::MicroMovement;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        // January 2024: the 1st is a Monday.
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn engine_at(start: NaiveDateTime) -> (GrumpEngine<ManualClock, MemoryStore>, ManualClock) {
        let clock = ManualClock::new(start);
        let settings = EngineSettings {
            seed: Some(7),
            ..Default::default()
        };
        (GrumpEngine::new(clock.clone(), MemoryStore::new(), settings), clock)
    }

    fn run_for(engine: &mut GrumpEngine<ManualClock, MemoryStore>, clock: &ManualClock, ms: i64) {
        let mut elapsed = 0;
        while elapsed < ms {
            let step = (ms - elapsed).min(16);
            clock.advance_ms(step);
            engine.tick();
            elapsed += step;
        }
    }

    #[test]
    fn test_monday_morning_beats_birthday_message() {
        let (mut engine, _clock) = engine_at(at(1, 9));
        let outcome = engine.send_message("it's my birthday today!").unwrap();

        assert_eq!(outcome.trigger.map(|t| t.egg), Some(EasterEgg::MondayMorning));
        assert_eq!(outcome.state, EmotionalState::MaximumGrump);
        assert_eq!(engine.current_state(), EmotionalState::MaximumGrump);
        assert_eq!(outcome.xp.gained, 30);
    }

    #[test]
    fn test_birthday_message_brings_party_hat() {
        let (mut engine, _clock) = engine_at(at(2, 12));
        let outcome = engine.send_message("I was born today").unwrap();

        assert_eq!(outcome.state, EmotionalState::Birthday);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.particle_type, Some(ParticleType::Confetti));
        assert_eq!(snapshot.accessory_type, Some(AccessoryType::PartyHat));
        assert!(snapshot.show_accessories);
        assert_eq!(engine.particles().len(), 20);
    }

    #[test]
    fn test_maximum_grump_reaction() {
        let (mut engine, clock) = engine_at(at(2, 12));
        let outcome = engine.send_message("this is the worst day").unwrap();

        assert_eq!(outcome.state, EmotionalState::MaximumGrump);
        assert!(outcome.trigger.is_none());
        assert!(engine.snapshot().screen_shake.active);
        assert_eq!(engine.snapshot().screen_shake.intensity, 0.5);
        assert_eq!(engine.snapshot().particle_type, Some(ParticleType::AngerParticle));
        assert_eq!(engine.particles().len(), 8);

        run_for(&mut engine, &clock, 300);
        assert!(!engine.snapshot().screen_shake.active);
        assert!(engine.snapshot().particle_type.is_some());

        run_for(&mut engine, &clock, 200);
        assert!(engine.snapshot().particle_type.is_none());
        assert!(engine.particles().is_empty());
    }

    #[test]
    fn test_skeptical_message_rolls_eyes() {
        let (mut engine, clock) = engine_at(at(2, 12));
        let outcome = engine.send_message("are you sure about that").unwrap();

        assert_eq!(outcome.state, EmotionalState::Skeptical);
        assert!(engine.snapshot().eye_roll.active);

        run_for(&mut engine, &clock, 500);
        let face = engine.snapshot().composed_face();
        assert!(engine.snapshot().eye_roll.progress > 0.4);
        assert!(face.head_tilt < 0.0);

        run_for(&mut engine, &clock, 500);
        assert!(!engine.snapshot().eye_roll.active);
        assert_eq!(engine.stats().eye_rolls, 1);
    }

    #[test]
    fn test_plain_message_goes_to_processing() {
        let (mut engine, clock) = engine_at(at(2, 12));
        let outcome = engine.send_message("what is the capital of peru").unwrap();

        assert_eq!(outcome.state, EmotionalState::Processing);
        assert_eq!(outcome.xp.gained, 10);

        run_for(&mut engine, &clock, 100);
        assert_eq!(engine.snapshot().micro, MicroMovement::default());
    }

    #[test]
    fn test_blank_message_is_ignored() {
        let (mut engine, _clock) = engine_at(at(2, 12));
        assert!(engine.send_message("   ").is_none());
        assert_eq!(engine.stats().messages, 0);
        assert_eq!(engine.current_state(), EmotionalState::Idle);
    }

    #[test]
    fn test_reply_returns_to_idle_after_two_seconds() {
        let (mut engine, clock) = engine_at(at(2, 12));
        engine.send_message("what is the capital of peru");
        engine.reply_pending();
        assert_eq!(engine.current_state(), EmotionalState::Processing);

        engine.receive_reply("Lima. Obviously.");
        assert_eq!(engine.current_state(), EmotionalState::Responding);
        assert_eq!(engine.snapshot().context.message_count, 2);

        run_for(&mut engine, &clock, 1_990);
        assert_eq!(engine.current_state(), EmotionalState::Responding);
        run_for(&mut engine, &clock, 20);
        assert_eq!(engine.current_state(), EmotionalState::Idle);
    }

    #[test]
    fn test_typing_cancels_pending_return_to_idle() {
        let (mut engine, clock) = engine_at(at(2, 12));
        engine.receive_reply("hmph");
        run_for(&mut engine, &clock, 500);
        engine.input_changed("wait", 4);

        run_for(&mut engine, &clock, 2_000);
        assert_eq!(engine.current_state(), EmotionalState::Listening);
    }

    #[test]
    fn test_error_glitches_and_shakes() {
        let (mut engine, clock) = engine_at(at(2, 12));
        engine.report_error();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_state, EmotionalState::Error);
        assert_eq!(snapshot.particle_type, Some(ParticleType::GlitchRectangle));
        assert_eq!(snapshot.screen_shake.intensity, 0.3);
        assert_eq!(engine.particles().len(), 5);

        run_for(&mut engine, &clock, 500);
        assert!(engine.particles().is_empty());
        assert!(engine.snapshot().particle_type.is_none());
    }

    #[test]
    fn test_input_drives_eye_tracking() {
        let (mut engine, _clock) = engine_at(at(2, 12));

        engine.input_changed("hello", 5);
        assert_eq!(engine.current_state(), EmotionalState::Listening);
        assert_eq!(engine.snapshot().face.left_pupil.x, 6.0);

        engine.input_changed("hello", 0);
        assert_eq!(engine.snapshot().face.right_pupil.x, -6.0);

        engine.input_changed("", 0);
        assert_eq!(engine.current_state(), EmotionalState::Idle);
        assert_eq!(engine.snapshot().face.left_pupil.x, 0.0);
    }

    #[test]
    fn test_late_night_ambient_tick_gets_sleepy() {
        let (mut engine, clock) = engine_at(at(2, 23));
        run_for(&mut engine, &clock, 1_000);
        assert_eq!(engine.current_state(), EmotionalState::Sleepy);
        assert_eq!(engine.snapshot().context.time.hour, 23);
    }

    #[test]
    fn test_three_am_ambient_tick() {
        let (mut engine, clock) = engine_at(at(3, 3));
        run_for(&mut engine, &clock, 1_000);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.current_state, EmotionalState::ThreeAm);
        assert_eq!(snapshot.particle_type, Some(ParticleType::CoffeeSteam));
        assert_eq!(snapshot.accessory_type, Some(AccessoryType::CoffeeMug));
        assert_eq!(engine.stats().easter_eggs, 1);
    }

    #[test]
    fn test_ambient_tick_leaves_active_states_alone() {
        let (mut engine, clock) = engine_at(at(2, 23));
        engine.input_changed("typing away", 3);
        run_for(&mut engine, &clock, 3_000);
        assert_eq!(engine.current_state(), EmotionalState::Listening);
    }

    #[test]
    fn test_blinks_keep_coming_for_a_minute() {
        let (mut engine, clock) = engine_at(at(2, 12));
        let mut was_blinking = false;
        let mut observed = 0;

        for _ in 0..(60_000 / 16) {
            clock.advance_ms(16);
            engine.tick();
            let blinking = engine.snapshot().blink.is_blinking;
            if blinking && !was_blinking {
                observed += 1;
            }
            was_blinking = blinking;
        }

        assert!(engine.stats().blinks >= 9);
        assert!(observed >= 9);
    }

    #[test]
    fn test_typing_keeps_blinks_and_drift_alive() {
        let (mut engine, clock) = engine_at(at(2, 12));
        let mut text = String::new();
        let mut max_drift: f64 = 0.0;

        for keystroke in 0..150 {
            text.push(if keystroke % 6 == 5 { ' ' } else { 'a' });
            engine.input_changed(&text, text.len());
            run_for(&mut engine, &clock, 400);

            let drift = engine.snapshot().micro.pupil_drift;
            max_drift = max_drift.max(drift.x.abs()).max(drift.y.abs());
        }

        assert_eq!(engine.current_state(), EmotionalState::Listening);
        assert!(engine.stats().blinks >= 9);
        assert!(max_drift > 0.3);
        assert_eq!(engine.stats().transitions, 1);
    }

    #[test]
    fn test_progression_writes_are_debounced() {
        let (mut engine, clock) = engine_at(at(2, 12));

        engine.send_message("first question here");
        run_for(&mut engine, &clock, 100);
        engine.send_message("second question there");
        run_for(&mut engine, &clock, 100);
        assert_eq!(engine.store().writes, 0);

        run_for(&mut engine, &clock, 100);
        assert_eq!(engine.store().writes, 1);

        let raw = engine.store().get(STORAGE_KEY).unwrap().unwrap();
        let saved: ProgressionState = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.xp, 20);
    }

    #[test]
    fn test_progression_loads_from_store() {
        let mut store = MemoryStore::new();
        store
            .put(STORAGE_KEY, r#"{"unlocked": ["eyeRoll_full"], "xp": 95, "level": 1}"#)
            .unwrap();
        let clock = ManualClock::new(at(2, 12));
        let mut engine = GrumpEngine::new(clock, store, EngineSettings::default());

        let outcome = engine.send_message("what is the capital of peru").unwrap();
        assert_eq!(outcome.xp.level, 2);
        assert!(outcome.xp.leveled_up);
        assert_eq!(engine.progression().unlocked, vec![UnlockId::EyeRollFull]);
    }

    #[test]
    fn test_grumpy_state_unlocks_features() {
        let (mut engine, _clock) = engine_at(at(2, 12));
        let outcome = engine.send_message("I hate this so much").unwrap();

        assert_eq!(outcome.state, EmotionalState::MaximumGrump);
        assert_eq!(outcome.unlocked.len(), 5);

        engine.transition_to(EmotionalState::Idle);
        assert_eq!(engine.progression().unlocked.len(), 5);
    }

    #[test]
    fn test_reset_progression() {
        let (mut engine, clock) = engine_at(at(2, 12));
        engine.transition_to(EmotionalState::Annoyed);
        engine.send_message("again?");
        engine.reset_progression();

        assert_eq!(engine.progression(), &ProgressionState::default());
        assert_eq!(engine.current_state(), EmotionalState::Idle);

        run_for(&mut engine, &clock, 200);
        let raw = engine.store().get(STORAGE_KEY).unwrap().unwrap();
        let saved: ProgressionState = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved, ProgressionState::default());
    }

    #[test]
    fn test_named_transition() {
        let (mut engine, _clock) = engine_at(at(2, 12));
        engine.transition_to_named("smug");
        assert_eq!(engine.current_state(), EmotionalState::Smug);
        engine.transition_to_named("grumpy-ish");
        assert_eq!(engine.current_state(), EmotionalState::Idle);
    }

    #[test]
    fn test_manual_blinks_do_not_overlap() {
        let (mut engine, clock) = engine_at(at(2, 12));
        assert!(engine.surprise_blink());
        assert!(!engine.annoyed_blink());
        run_for(&mut engine, &clock, 250);
        assert!(engine.wink());
        assert_eq!(engine.snapshot().blink.blink_type, BlinkType::Wink);
    }

    #[test]
    fn test_reset_session_clears_history() {
        let (mut engine, _clock) = engine_at(at(2, 12));
        engine.send_message("what's my balance?");
        engine.receive_reply("Check the app.");
        engine.reset_session();

        assert_eq!(engine.session_context().message_count, 0);
        assert!(engine.snapshot().context.conversation.is_empty());
        let outcome = engine.send_message("whats my balance").unwrap();
        assert!(!outcome.analysis.is_repeat_question);
    }

    #[test]
    fn test_shutdown_cancels_timers_and_flushes() {
        let (mut engine, _clock) = engine_at(at(2, 12));
        engine.send_message("this is terrible");
        engine.trigger_eye_roll(EyeRollVariation::Slow);
        assert!(engine.pending_timers() > 0);

        engine.shutdown();

        assert_eq!(engine.pending_timers(), 0);
        assert_eq!(engine.store().writes, 1);
        assert!(!engine.snapshot().eye_roll.active);
        assert!(engine.particles().is_empty());
    }

    #[test]
    fn test_recommended_state() {
        let (mut engine, _clock) = engine_at(at(1, 9));
        assert_eq!(
            engine.recommended_state(Some("are you sure")),
            Some(EmotionalState::MaximumGrump)
        );
    }
}
