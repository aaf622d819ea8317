use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::{CancelToken, TimerQueue};
use crate::engine::TimerEvent;

pub const CONFETTI_PALETTE: [&str; 5] = ["#ff6b6b", "#4ecdc4", "#ffe66d", "#95e1d3", "#f38181"];

const SLEEP_Z_RESPAWN_MS: i64 = 1500;
const STEAM_RESPAWN_MS: i64 = 800;
const STEAM_CAP: usize = 10;
const GLITCH_JITTER_MS: i64 = 50;
const GLITCH_TOTAL_MS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParticleType {
    SleepZ,
    Confetti,
    CoffeeSteam,
    AngerParticle,
    Sparkle,
    GlitchRectangle,
}

impl ParticleType {
    /// Particles spawned when the type becomes active.
    pub fn burst_size(self) -> usize {
        match self {
            Self::SleepZ | Self::Sparkle => 3,
            Self::Confetti => 20,
            Self::CoffeeSteam | Self::GlitchRectangle => 5,
            Self::AngerParticle => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleEvent {
    Respawn,
    GlitchJitter,
    GlitchEnd,
}

/// Where a particle is drawn at one instant, in percent of the container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParticleFrame {
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Particle {
    pub id: Uuid,
    pub kind: ParticleType,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub scale: f64,
    pub color: Option<&'static str>,
    pub spawned_ms: i64,
    pub lifetime_ms: i64,
    /// Total horizontal travel, used by confetti.
    pub drift_x: f64,
}

impl Particle {
    fn new(kind: ParticleType, now_ms: i64, lifetime_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            x: 50.0,
            y: 50.0,
            rotation: 0.0,
            scale: 1.0,
            color: None,
            spawned_ms: now_ms,
            lifetime_ms,
            drift_x: 0.0,
        }
    }

    /// Steam loops for as long as it is displayed.
    pub fn loops(&self) -> bool {
        self.kind == ParticleType::CoffeeSteam
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        !self.loops() && now_ms - self.spawned_ms >= self.lifetime_ms
    }

    pub fn sample(&self, now_ms: i64) -> ParticleFrame {
        let elapsed = (now_ms - self.spawned_ms).max(0) as f64;
        let lifetime = self.lifetime_ms.max(1) as f64;
        let t = if self.loops() {
            (elapsed % lifetime) / lifetime
        } else {
            (elapsed / lifetime).min(1.0)
        };
        let clock = now_ms as f64;

        match self.kind {
            ParticleType::SleepZ => ParticleFrame {
                x: self.x + (clock / 1000.0).sin() * 5.0,
                y: self.y - 30.0 * t,
                rotation: self.rotation,
                scale: self.scale * keyframes(&[0.8, 1.4, 1.4, 0.8], t),
                opacity: keyframes(&[0.0, 1.0, 1.0, 0.0], t),
            },
            ParticleType::Confetti => ParticleFrame {
                x: self.x + self.drift_x * t,
                y: self.y + 100.0 * t,
                rotation: self.rotation + 360.0 * t,
                scale: self.scale,
                opacity: keyframes(&[1.0, 1.0, 0.0], t),
            },
            ParticleType::CoffeeSteam => ParticleFrame {
                x: self.x + (clock / 500.0 + self.id.as_u128() as f64 % 7.0).sin() * 3.0,
                y: self.y - 40.0 * t,
                rotation: self.rotation,
                scale: keyframes(&[0.3, 0.6, 0.6, 0.3], t),
                opacity: keyframes(&[0.0, 0.6, 0.6, 0.0], t),
            },
            ParticleType::AngerParticle => {
                let radians = self.rotation * PI / 180.0;
                ParticleFrame {
                    x: self.x + radians.cos() * 30.0 * t,
                    y: self.y + radians.sin() * 30.0 * t,
                    rotation: self.rotation,
                    scale: keyframes(&[0.0, 1.5, 2.0], t),
                    opacity: keyframes(&[1.0, 1.0, 0.0], t),
                }
            }
            ParticleType::Sparkle => ParticleFrame {
                x: self.x,
                y: self.y,
                rotation: self.rotation + 180.0 * t,
                scale: self.scale * keyframes(&[0.0, 1.2, 1.2, 0.0], t),
                opacity: keyframes(&[0.0, 1.0, 1.0, 0.0], t),
            },
            ParticleType::GlitchRectangle => {
                let flicker = (elapsed % GLITCH_JITTER_MS as f64) / GLITCH_JITTER_MS as f64;
                ParticleFrame {
                    x: self.x,
                    y: self.y,
                    rotation: self.rotation,
                    scale: self.scale,
                    opacity: keyframes(&[1.0, 0.5, 1.0, 0.5, 1.0, 0.0], flicker),
                }
            }
        }
    }
}

/// Linear interpolation across evenly spaced keyframes, `t` in [0, 1].
fn keyframes(values: &[f64], t: f64) -> f64 {
    match values.len() {
        0 => 0.0,
        1 => values[0],
        n => {
            let position = t.clamp(0.0, 1.0) * (n - 1) as f64;
            let index = (position.floor() as usize).min(n - 2);
            let local = position - index as f64;
            values[index] + (values[index + 1] - values[index]) * local
        }
    }
}

fn spread<R: Rng>(rng: &mut R, center: f64, width: f64) -> f64 {
    center + rng.gen::<f64>() * width - width / 2.0
}

fn spawn_one<R: Rng>(kind: ParticleType, index: usize, now_ms: i64, rng: &mut R) -> Particle {
    match kind {
        ParticleType::SleepZ => {
            let mut p = Particle::new(kind, now_ms, 2000);
            p.x = spread(rng, 50.0, 20.0);
            p.y = spread(rng, 50.0, 20.0);
            p.rotation = rng.gen::<f64>() * 360.0;
            p.scale = 0.8 + rng.gen::<f64>() * 0.4;
            p
        }
        ParticleType::Confetti => {
            let lifetime = 2000 + (rng.gen::<f64>() * 1000.0) as i64;
            let mut p = Particle::new(kind, now_ms, lifetime);
            p.x = spread(rng, 50.0, 40.0);
            p.y = spread(rng, 50.0, 40.0);
            p.rotation = rng.gen::<f64>() * 360.0;
            p.scale = 0.5 + rng.gen::<f64>() * 0.5;
            p.color = Some(CONFETTI_PALETTE[rng.gen_range(0..CONFETTI_PALETTE.len())]);
            p.drift_x = (rng.gen::<f64>() - 0.5) * 50.0;
            p
        }
        ParticleType::CoffeeSteam => {
            let mut p = Particle::new(kind, now_ms, 3000);
            p.x = spread(rng, 50.0, 10.0);
            p.y = 70.0 + rng.gen::<f64>() * 10.0;
            p.rotation = rng.gen::<f64>() * 20.0 - 10.0;
            p.scale = 0.3 + rng.gen::<f64>() * 0.3;
            p
        }
        ParticleType::AngerParticle => {
            let mut p = Particle::new(kind, now_ms, 500);
            p.rotation = 45.0 * index as f64;
            p
        }
        ParticleType::Sparkle => {
            let mut p = Particle::new(kind, now_ms, 400);
            p.x = spread(rng, 50.0, 30.0);
            p.y = spread(rng, 50.0, 30.0);
            p.rotation = rng.gen::<f64>() * 360.0;
            p
        }
        ParticleType::GlitchRectangle => {
            let mut p = Particle::new(kind, now_ms, GLITCH_TOTAL_MS);
            scramble(&mut p, rng);
            p.scale = 0.5 + rng.gen::<f64>() * 0.5;
            p
        }
    }
}

fn scramble<R: Rng>(particle: &mut Particle, rng: &mut R) {
    particle.x = rng.gen::<f64>() * 100.0;
    particle.y = rng.gen::<f64>() * 100.0;
    particle.rotation = rng.gen::<f64>() * 90.0;
}

/// Owns the live particle set for the single active particle type.
#[derive(Debug, Default)]
pub struct ParticleSpawner {
    active: Option<ParticleType>,
    particles: Vec<Particle>,
    repeat: Option<CancelToken>,
    glitch_end: Option<CancelToken>,
}

impl ParticleSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<ParticleType> {
        self.active
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// A type is still set but nothing is alive or scheduled to spawn.
    pub fn is_spent(&self) -> bool {
        self.active.is_some()
            && self.particles.is_empty()
            && self.repeat.is_none()
            && self.glitch_end.is_none()
    }

    pub fn frames(&self, now_ms: i64) -> Vec<ParticleFrame> {
        self.particles.iter().map(|p| p.sample(now_ms)).collect()
    }

    /// Replaces whatever was active. `None` clears everything immediately.
    pub fn set_type<R: Rng>(
        &mut self,
        kind: Option<ParticleType>,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
        rng: &mut R,
    ) {
        self.cancel(timers);
        self.active = kind;

        let Some(kind) = kind else {
            return;
        };

        self.particles = (0..kind.burst_size())
            .map(|i| spawn_one(kind, i, now_ms, rng))
            .collect();
        debug!(?kind, count = self.particles.len(), "particle burst");

        match kind {
            ParticleType::SleepZ => {
                self.repeat = Some(timers.schedule(
                    now_ms,
                    SLEEP_Z_RESPAWN_MS,
                    TimerEvent::Particle(ParticleEvent::Respawn),
                ));
            }
            ParticleType::CoffeeSteam => {
                self.repeat = Some(timers.schedule(
                    now_ms,
                    STEAM_RESPAWN_MS,
                    TimerEvent::Particle(ParticleEvent::Respawn),
                ));
            }
            ParticleType::GlitchRectangle => {
                self.repeat = Some(timers.schedule(
                    now_ms,
                    GLITCH_JITTER_MS,
                    TimerEvent::Particle(ParticleEvent::GlitchJitter),
                ));
                self.glitch_end = Some(timers.schedule(
                    now_ms,
                    GLITCH_TOTAL_MS,
                    TimerEvent::Particle(ParticleEvent::GlitchEnd),
                ));
            }
            ParticleType::Confetti | ParticleType::AngerParticle | ParticleType::Sparkle => {}
        }
    }

    pub fn on_event<R: Rng>(
        &mut self,
        event: ParticleEvent,
        now_ms: i64,
        timers: &mut TimerQueue<TimerEvent>,
        rng: &mut R,
    ) {
        match (event, self.active) {
            (ParticleEvent::Respawn, Some(ParticleType::SleepZ)) => {
                self.particles.push(spawn_one(ParticleType::SleepZ, 0, now_ms, rng));
                self.repeat = Some(timers.schedule(
                    now_ms,
                    SLEEP_Z_RESPAWN_MS,
                    TimerEvent::Particle(ParticleEvent::Respawn),
                ));
            }
            (ParticleEvent::Respawn, Some(ParticleType::CoffeeSteam)) => {
                let mut puff = spawn_one(ParticleType::CoffeeSteam, 0, now_ms, rng);
                puff.y = 70.0;
                self.particles.push(puff);
                if self.particles.len() > STEAM_CAP {
                    let excess = self.particles.len() - STEAM_CAP;
                    self.particles.drain(..excess);
                }
                self.repeat = Some(timers.schedule(
                    now_ms,
                    STEAM_RESPAWN_MS,
                    TimerEvent::Particle(ParticleEvent::Respawn),
                ));
            }
            (ParticleEvent::GlitchJitter, Some(ParticleType::GlitchRectangle)) => {
                for particle in &mut self.particles {
                    scramble(particle, rng);
                }
                self.repeat = Some(timers.schedule(
                    now_ms,
                    GLITCH_JITTER_MS,
                    TimerEvent::Particle(ParticleEvent::GlitchJitter),
                ));
            }
            (ParticleEvent::GlitchEnd, _) => {
                if let Some(token) = self.repeat.take() {
                    timers.cancel(token);
                }
                self.glitch_end = None;
                self.particles.clear();
            }
            _ => {}
        }
    }

    /// Drop particles whose animation has finished.
    pub fn on_frame(&mut self, now_ms: i64) {
        self.particles.retain(|p| !p.is_expired(now_ms));
    }

    pub fn cancel(&mut self, timers: &mut TimerQueue<TimerEvent>) {
        for token in [self.repeat.take(), self.glitch_end.take()].into_iter().flatten() {
            timers.cancel(token);
        }
        self.particles.clear();
    }
}
