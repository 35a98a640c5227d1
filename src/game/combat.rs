//! Space rivalry entities: lasers, asteroids, debris, power-ups

use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;

use super::physics::Rect;
use super::PlayerSlot;

pub const BASE_ASTEROID_SIZE: f32 = 30.0;
pub const LASER_WIDTH: f32 = 4.0;
pub const LASER_HEIGHT: f32 = 15.0;
pub const LASER_SPEED: f32 = 10.0;
pub const DEBRIS_SIZE: f32 = 20.0;
pub const DEBRIS_SPEED: f32 = 3.0;
pub const POWERUP_SIZE: f32 = 25.0;
pub const POWERUP_SPEED: f32 = 2.0;
pub const POWERUP_DROP_CHANCE: f64 = 0.2;
pub const EXPLOSION_RADIUS: f32 = 100.0;
pub const EXPLOSION_LIFETIME_MS: f64 = 500.0;
/// Horizontal offset of the two fragments of a split asteroid
pub const SPLIT_OFFSET: f32 = 20.0;
pub const SHOT_COOLDOWN_MS: f64 = 500.0;
pub const RAPID_FIRE_COOLDOWN_MS: f64 = 250.0;
/// Consecutive hits needed for each extra combo multiplier step
pub const COMBO_STEP: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AsteroidKind {
    Normal,
    Fast,
    Split,
    Exploding,
}

/// Per-kind movement and reward
#[derive(Debug, Clone, Copy)]
pub struct AsteroidStats {
    pub speed: f32,
    pub size: f32,
    pub points: u32,
}

impl AsteroidKind {
    pub const ALL: [AsteroidKind; 4] = [
        AsteroidKind::Normal,
        AsteroidKind::Fast,
        AsteroidKind::Split,
        AsteroidKind::Exploding,
    ];

    pub fn stats(self) -> AsteroidStats {
        match self {
            AsteroidKind::Normal => AsteroidStats {
                speed: 3.0,
                size: BASE_ASTEROID_SIZE,
                points: 100,
            },
            AsteroidKind::Fast => AsteroidStats {
                speed: 5.0,
                size: BASE_ASTEROID_SIZE * 0.7,
                points: 150,
            },
            AsteroidKind::Split => AsteroidStats {
                speed: 2.0,
                size: BASE_ASTEROID_SIZE * 1.2,
                points: 200,
            },
            AsteroidKind::Exploding => AsteroidStats {
                speed: 2.0,
                size: BASE_ASTEROID_SIZE * 1.3,
                points: 300,
            },
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerUpKind {
    RapidFire,
    Shield,
    DoubleBullets,
    SlowMotion,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::RapidFire,
        PowerUpKind::Shield,
        PowerUpKind::DoubleBullets,
        PowerUpKind::SlowMotion,
    ];

    pub fn duration_ms(self) -> f64 {
        match self {
            PowerUpKind::RapidFire => 5000.0,
            PowerUpKind::Shield => 8000.0,
            PowerUpKind::DoubleBullets => 6000.0,
            PowerUpKind::SlowMotion => 4000.0,
        }
    }

    pub fn random<R: Rng>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Laser {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Asteroid {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: AsteroidKind,
    pub speed: f32,
    pub size: f32,
    pub points: u32,
}

impl Asteroid {
    pub fn new(kind: AsteroidKind, x: f32, y: f32) -> Self {
        let stats = kind.stats();
        Self {
            x,
            y,
            kind,
            speed: stats.speed,
            size: stats.size,
            points: stats.points,
        }
    }

    pub fn hit_box(&self) -> Rect {
        Rect::centered(self.x, self.y, self.size, self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerUp {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PowerUpKind,
}

/// Wreckage thrown at the opponent of whoever destroyed an asteroid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Debris {
    pub x: f32,
    pub y: f32,
    pub target_player: PlayerSlot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Explosion {
    pub x: f32,
    pub y: f32,
    /// Match clock (ms) at creation
    pub created: f64,
}

/// Timed power-up effects, keyed by kind with their expiry on the match clock
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ActiveEffects {
    ends_at: BTreeMap<PowerUpKind, f64>,
}

impl ActiveEffects {
    pub fn activate(&mut self, kind: PowerUpKind, now_ms: f64) {
        self.ends_at.insert(kind, now_ms + kind.duration_ms());
    }

    pub fn is_active(&self, kind: PowerUpKind) -> bool {
        self.ends_at.contains_key(&kind)
    }

    /// Drop every effect whose expiry has been reached
    pub fn expire(&mut self, now_ms: f64) {
        self.ends_at.retain(|_, ends_at| now_ms < *ends_at);
    }

    pub fn shot_cooldown_ms(&self) -> f64 {
        if self.is_active(PowerUpKind::RapidFire) {
            RAPID_FIRE_COOLDOWN_MS
        } else {
            SHOT_COOLDOWN_MS
        }
    }
}

/// Score for a hit given the combo count *after* this hit
pub fn combo_score(points: u32, combo: u32) -> u32 {
    points * (1 + combo / COMBO_STEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_multiplier_steps_every_five_hits() {
        assert_eq!(combo_score(100, 1), 100);
        assert_eq!(combo_score(100, 4), 100);
        assert_eq!(combo_score(100, 5), 200);
        assert_eq!(combo_score(300, 10), 900);
    }

    #[test]
    fn effects_expire_on_the_match_clock() {
        let mut effects = ActiveEffects::default();
        effects.activate(PowerUpKind::RapidFire, 1000.0);
        assert!(effects.is_active(PowerUpKind::RapidFire));
        assert_eq!(effects.shot_cooldown_ms(), RAPID_FIRE_COOLDOWN_MS);

        effects.expire(5999.0);
        assert!(effects.is_active(PowerUpKind::RapidFire));
        effects.expire(6000.0);
        assert!(!effects.is_active(PowerUpKind::RapidFire));
        assert_eq!(effects.shot_cooldown_ms(), SHOT_COOLDOWN_MS);
    }

    #[test]
    fn asteroid_kinds_serialize_upper_case() {
        let a = Asteroid::new(AsteroidKind::Exploding, 0.0, 0.0);
        let json = serde_json::to_value(a).unwrap();
        assert_eq!(json["type"], "EXPLODING");
        assert_eq!(json["points"], 300);
    }
}
