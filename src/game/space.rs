//! Space rivalry: two ships on the bottom edge shooting a shared asteroid field

use rand::Rng;
use serde::Serialize;

use crate::util::time::{frames, MAX_TICK_DELTA};

use super::combat::{
    combo_score, ActiveEffects, Asteroid, AsteroidKind, Debris, Explosion, Laser, PowerUp,
    PowerUpKind, DEBRIS_SIZE, DEBRIS_SPEED, EXPLOSION_LIFETIME_MS, EXPLOSION_RADIUS, LASER_HEIGHT,
    LASER_SPEED, LASER_WIDTH, POWERUP_DROP_CHANCE, POWERUP_SIZE, POWERUP_SPEED, SPLIT_OFFSET,
};
use super::physics::{PhysicsSystem, Rect};
use super::{InputCommand, PlayerSlot};

pub const GAME_WIDTH: f32 = 800.0;
pub const GAME_HEIGHT: f32 = 600.0;
pub const SHIP_WIDTH: f32 = 40.0;
pub const SHIP_HEIGHT: f32 = 30.0;
/// Vertical centre used for every ship collision
pub const SHIP_Y: f32 = GAME_HEIGHT - SHIP_HEIGHT;
/// Lasers leave the ship slightly above its hull
pub const MUZZLE_Y: f32 = GAME_HEIGHT - SHIP_HEIGHT - 10.0;
/// Horizontal spread of a double-bullet volley
pub const DOUBLE_SHOT_SPREAD: f32 = 10.0;
pub const MOVEMENT_SPEED: f32 = 10.0;
pub const INITIAL_HEALTH: u32 = 75;
pub const ASTEROID_DAMAGE: u32 = 20;
pub const DEBRIS_DAMAGE: u32 = 10;
pub const MAX_DIFFICULTY: f32 = 10.0;
/// Difficulty gained per second of play
pub const DIFFICULTY_PER_SEC: f32 = 0.1 / 30.0;
/// Asteroid spawn chance per tick at difficulty 1
pub const BASE_SPAWN_CHANCE: f32 = 0.02;

/// One player's ship and everything it owns
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ship {
    pub x: f32,
    pub health: u32,
    pub score: u32,
    pub combo: u32,
    pub lasers: Vec<Laser>,
    pub active_effects: ActiveEffects,
    #[serde(skip)]
    last_shot_ms: Option<f64>,
}

impl Ship {
    fn new(x: f32) -> Self {
        Self {
            x,
            health: INITIAL_HEALTH,
            score: 0,
            combo: 0,
            lasers: Vec::new(),
            active_effects: ActiveEffects::default(),
            last_shot_ms: None,
        }
    }

    fn take_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    fn hit_box(&self) -> Rect {
        Rect::centered(self.x, SHIP_Y, SHIP_WIDTH, SHIP_HEIGHT)
    }
}

/// Horizontal lane each ship is confined to
fn lane(slot: PlayerSlot) -> (f32, f32) {
    match slot {
        PlayerSlot::Player1 => (SHIP_WIDTH / 2.0, GAME_WIDTH / 2.0 - SHIP_WIDTH / 2.0),
        PlayerSlot::Player2 => (GAME_WIDTH / 2.0 + SHIP_WIDTH / 2.0, GAME_WIDTH - SHIP_WIDTH / 2.0),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceRivalry {
    pub ship1: Ship,
    pub ship2: Ship,
    pub asteroids: Vec<Asteroid>,
    pub debris: Vec<Debris>,
    pub powerups: Vec<PowerUp>,
    pub explosions: Vec<Explosion>,
    pub difficulty: f32,
    /// Milliseconds of simulated play; drives cooldowns and effect timers
    pub clock_ms: f64,
}

impl Default for SpaceRivalry {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceRivalry {
    pub fn new() -> Self {
        Self {
            ship1: Ship::new(GAME_WIDTH / 4.0),
            ship2: Ship::new(3.0 * GAME_WIDTH / 4.0),
            asteroids: Vec::new(),
            debris: Vec::new(),
            powerups: Vec::new(),
            explosions: Vec::new(),
            difficulty: 1.0,
            clock_ms: 0.0,
        }
    }

    pub fn ship(&self, slot: PlayerSlot) -> &Ship {
        match slot {
            PlayerSlot::Player1 => &self.ship1,
            PlayerSlot::Player2 => &self.ship2,
        }
    }

    pub fn ship_mut(&mut self, slot: PlayerSlot) -> &mut Ship {
        match slot {
            PlayerSlot::Player1 => &mut self.ship1,
            PlayerSlot::Player2 => &mut self.ship2,
        }
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.ship1.score, self.ship2.score)
    }

    /// Apply a ship command. Returns false for commands this variant ignores.
    pub fn handle_input(&mut self, slot: PlayerSlot, input: InputCommand) -> bool {
        let (min_x, max_x) = lane(slot);
        match input {
            InputCommand::Left => {
                let ship = self.ship_mut(slot);
                ship.x = PhysicsSystem::step_clamped(ship.x, -MOVEMENT_SPEED, min_x, max_x);
            }
            InputCommand::Right => {
                let ship = self.ship_mut(slot);
                ship.x = PhysicsSystem::step_clamped(ship.x, MOVEMENT_SPEED, min_x, max_x);
            }
            InputCommand::Shoot => self.shoot(slot),
            InputCommand::Up | InputCommand::Down => return false,
        }
        true
    }

    fn shoot(&mut self, slot: PlayerSlot) {
        let now = self.clock_ms;
        let ship = self.ship_mut(slot);
        let cooldown = ship.active_effects.shot_cooldown_ms();
        if let Some(last) = ship.last_shot_ms {
            if now - last < cooldown {
                return;
            }
        }

        if ship.active_effects.is_active(PowerUpKind::DoubleBullets) {
            ship.lasers.push(Laser {
                x: ship.x - DOUBLE_SHOT_SPREAD,
                y: MUZZLE_Y,
            });
            ship.lasers.push(Laser {
                x: ship.x + DOUBLE_SHOT_SPREAD,
                y: MUZZLE_Y,
            });
        } else {
            ship.lasers.push(Laser { x: ship.x, y: MUZZLE_Y });
        }
        ship.last_shot_ms = Some(now);
    }

    /// Advance one tick. Returns the winner once a ship is destroyed.
    ///
    /// Motion and collisions run in sub-steps of at most one frame so a laser
    /// cannot pass through an asteroid on a long tick.
    pub fn step<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Option<PlayerSlot> {
        let total = frames(dt);
        let dt = dt.clamp(0.0, MAX_TICK_DELTA);
        self.clock_ms += f64::from(dt) * 1000.0;

        let slow_motion = self.ship1.active_effects.is_active(PowerUpKind::SlowMotion)
            || self.ship2.active_effects.is_active(PowerUpKind::SlowMotion);
        let hazard_speed = if slow_motion { 0.5 } else { 1.0 };

        let steps = total.ceil().max(1.0) as u32;
        let sub = total / steps as f32;
        for _ in 0..steps {
            self.update_lasers(sub);
            self.update_hazards(sub, hazard_speed);

            self.resolve_laser_hits(PlayerSlot::Player1, rng);
            self.resolve_laser_hits(PlayerSlot::Player2, rng);
            self.resolve_ship_hits();
            self.resolve_pickups();
            if self.winner().is_some() {
                break;
            }
        }
        self.expire_timers();

        self.difficulty = (self.difficulty + DIFFICULTY_PER_SEC * dt).min(MAX_DIFFICULTY);
        let spawn_chance = f64::from(BASE_SPAWN_CHANCE * self.difficulty).min(1.0);
        if rng.gen_bool(spawn_chance) {
            self.spawn_asteroid(rng);
        }

        self.winner()
    }

    fn update_lasers(&mut self, f: f32) {
        for ship in [&mut self.ship1, &mut self.ship2] {
            for laser in ship.lasers.iter_mut() {
                laser.y -= LASER_SPEED * f;
            }
            let before = ship.lasers.len();
            ship.lasers.retain(|l| l.y > 0.0);
            if ship.lasers.len() < before {
                // a laser left the field without hitting anything
                ship.combo = 0;
            }
        }
    }

    fn update_hazards(&mut self, f: f32, hazard_speed: f32) {
        for asteroid in self.asteroids.iter_mut() {
            asteroid.y += asteroid.speed * hazard_speed * f;
        }
        self.asteroids.retain(|a| a.y < GAME_HEIGHT + a.size);

        for powerup in self.powerups.iter_mut() {
            powerup.y += POWERUP_SPEED * f;
        }
        self.powerups.retain(|p| p.y < GAME_HEIGHT);

        for debris in self.debris.iter_mut() {
            debris.y += DEBRIS_SPEED * f;
        }
        self.debris.retain(|d| d.y < GAME_HEIGHT);
    }

    fn expire_timers(&mut self) {
        let now = self.clock_ms;
        self.ship1.active_effects.expire(now);
        self.ship2.active_effects.expire(now);
        self.explosions
            .retain(|e| now - e.created < EXPLOSION_LIFETIME_MS);
    }

    fn resolve_laser_hits<R: Rng>(&mut self, slot: PlayerSlot, rng: &mut R) {
        let lasers = std::mem::take(&mut self.ship_mut(slot).lasers);
        let mut remaining = Vec::with_capacity(lasers.len());

        for laser in lasers {
            let beam = Rect::centered(laser.x, laser.y, LASER_WIDTH, LASER_HEIGHT);
            let hit = self
                .asteroids
                .iter()
                .position(|a| PhysicsSystem::overlaps(&beam, &a.hit_box()));
            match hit {
                Some(idx) => {
                    let asteroid = self.asteroids.remove(idx);
                    self.destroy_asteroid(slot, asteroid, rng);
                }
                None => remaining.push(laser),
            }
        }

        self.ship_mut(slot).lasers = remaining;
    }

    fn destroy_asteroid<R: Rng>(&mut self, shooter: PlayerSlot, asteroid: Asteroid, rng: &mut R) {
        match asteroid.kind {
            AsteroidKind::Split => {
                for offset in [-SPLIT_OFFSET, SPLIT_OFFSET] {
                    self.asteroids.push(Asteroid::new(
                        AsteroidKind::Normal,
                        asteroid.x + offset,
                        asteroid.y,
                    ));
                }
            }
            AsteroidKind::Exploding => {
                self.explosions.push(Explosion {
                    x: asteroid.x,
                    y: asteroid.y,
                    created: self.clock_ms,
                });
                self.asteroids.retain(|other| {
                    PhysicsSystem::distance(asteroid.x, asteroid.y, other.x, other.y) >= EXPLOSION_RADIUS
                });
            }
            AsteroidKind::Normal | AsteroidKind::Fast => {}
        }

        let ship = self.ship_mut(shooter);
        ship.combo += 1;
        ship.score += combo_score(asteroid.points, ship.combo);

        if rng.gen_bool(POWERUP_DROP_CHANCE) {
            self.powerups.push(PowerUp {
                x: asteroid.x,
                y: asteroid.y,
                kind: PowerUpKind::random(rng),
            });
        }

        self.debris.push(Debris {
            x: asteroid.x,
            y: asteroid.y,
            target_player: shooter.opponent(),
        });
    }

    fn resolve_ship_hits(&mut self) {
        for slot in [PlayerSlot::Player1, PlayerSlot::Player2] {
            let ship = self.ship(slot);
            if ship.active_effects.is_active(PowerUpKind::Shield) {
                continue;
            }
            let hull = ship.hit_box();

            let mut damage = 0;
            self.asteroids.retain(|a| {
                let hit = PhysicsSystem::overlaps(&hull, &a.hit_box());
                if hit {
                    damage += ASTEROID_DAMAGE;
                }
                !hit
            });
            self.debris.retain(|d| {
                let hit = d.target_player == slot
                    && PhysicsSystem::overlaps(
                        &hull,
                        &Rect::centered(d.x, d.y, DEBRIS_SIZE, DEBRIS_SIZE),
                    );
                if hit {
                    damage += DEBRIS_DAMAGE;
                }
                !hit
            });

            self.ship_mut(slot).take_damage(damage);
        }
    }

    fn resolve_pickups(&mut self) {
        let now = self.clock_ms;
        for slot in [PlayerSlot::Player1, PlayerSlot::Player2] {
            let hull = self.ship(slot).hit_box();
            let mut collected = Vec::new();
            self.powerups.retain(|p| {
                let hit = PhysicsSystem::overlaps(
                    &hull,
                    &Rect::centered(p.x, p.y, POWERUP_SIZE, POWERUP_SIZE),
                );
                if hit {
                    collected.push(p.kind);
                }
                !hit
            });
            let effects = &mut self.ship_mut(slot).active_effects;
            for kind in collected {
                effects.activate(kind, now);
            }
        }
    }

    fn spawn_asteroid<R: Rng>(&mut self, rng: &mut R) {
        let kind = AsteroidKind::random(rng);
        let size = kind.stats().size;
        self.asteroids
            .push(Asteroid::new(kind, rng.gen_range(0.0..GAME_WIDTH), -size));
    }

    fn winner(&self) -> Option<PlayerSlot> {
        if self.ship1.health == 0 {
            Some(PlayerSlot::Player2)
        } else if self.ship2.health == 0 {
            Some(PlayerSlot::Player1)
        } else {
            None
        }
    }

    /// Forfeit scoring: winner keeps the higher of the two scores, loser gets zero
    pub fn apply_forfeit(&mut self, winner: PlayerSlot) {
        let best = self.ship1.score.max(self.ship2.score);
        self.ship_mut(winner).score = best;
        self.ship_mut(winner.opponent()).score = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f32 = 1.0 / 60.0;

    fn quiet() -> (SpaceRivalry, ChaCha8Rng) {
        let mut game = SpaceRivalry::new();
        // no random spawns unless a test wants them
        game.difficulty = 0.0;
        (game, ChaCha8Rng::seed_from_u64(5))
    }

    #[test]
    fn ships_stay_in_their_half() {
        let (mut game, _) = quiet();
        for _ in 0..100 {
            game.handle_input(PlayerSlot::Player1, InputCommand::Right);
            game.handle_input(PlayerSlot::Player2, InputCommand::Left);
        }
        assert_eq!(game.ship1.x, GAME_WIDTH / 2.0 - SHIP_WIDTH / 2.0);
        assert_eq!(game.ship2.x, GAME_WIDTH / 2.0 + SHIP_WIDTH / 2.0);
        assert!(!game.handle_input(PlayerSlot::Player1, InputCommand::Up));
    }

    #[test]
    fn shooting_respects_cooldown() {
        let (mut game, _) = quiet();
        game.handle_input(PlayerSlot::Player1, InputCommand::Shoot);
        game.handle_input(PlayerSlot::Player1, InputCommand::Shoot);
        assert_eq!(game.ship1.lasers.len(), 1);

        game.clock_ms += 500.0;
        game.handle_input(PlayerSlot::Player1, InputCommand::Shoot);
        assert_eq!(game.ship1.lasers.len(), 2);
    }

    #[test]
    fn double_bullets_fire_two_lasers() {
        let (mut game, _) = quiet();
        game.ship2
            .active_effects
            .activate(PowerUpKind::DoubleBullets, game.clock_ms);
        game.handle_input(PlayerSlot::Player2, InputCommand::Shoot);
        assert_eq!(game.ship2.lasers.len(), 2);
    }

    #[test]
    fn laser_hit_scores_and_throws_debris_at_opponent() {
        let (mut game, mut rng) = quiet();
        game.asteroids.push(Asteroid::new(AsteroidKind::Normal, 200.0, 300.0));
        game.ship1.lasers.push(Laser { x: 200.0, y: 305.0 });

        game.step(0.0, &mut rng);

        assert!(game.asteroids.is_empty());
        assert!(game.ship1.lasers.is_empty());
        assert_eq!(game.ship1.combo, 1);
        assert_eq!(game.ship1.score, 100);
        assert_eq!(game.debris.len(), 1);
        assert_eq!(game.debris[0].target_player, PlayerSlot::Player2);
    }

    #[test]
    fn long_tick_laser_still_meets_fast_asteroid() {
        let (mut game, mut rng) = quiet();
        // closing at 15 px per frame: a single 6-frame jump would carry them past each other
        game.asteroids.push(Asteroid::new(AsteroidKind::Fast, 200.0, 200.0));
        game.ship1.lasers.push(Laser { x: 200.0, y: 240.0 });

        game.step(MAX_TICK_DELTA, &mut rng);

        assert!(game.ship1.lasers.is_empty());
        assert!(game.asteroids.iter().all(|a| a.kind != AsteroidKind::Fast));
        assert_eq!(game.ship1.combo, 1);
        assert_eq!(game.ship1.score, combo_score(AsteroidKind::Fast.stats().points, 1));
    }

    #[test]
    fn split_asteroid_leaves_two_fragments() {
        let (mut game, mut rng) = quiet();
        game.asteroids.push(Asteroid::new(AsteroidKind::Split, 400.0, 200.0));
        game.ship2.lasers.push(Laser { x: 400.0, y: 200.0 });

        game.step(0.0, &mut rng);

        assert_eq!(game.asteroids.len(), 2);
        assert!(game.asteroids.iter().all(|a| a.kind == AsteroidKind::Normal));
        assert_eq!(game.ship2.score, 200);
    }

    #[test]
    fn exploding_asteroid_clears_its_neighbourhood() {
        let (mut game, mut rng) = quiet();
        game.asteroids.push(Asteroid::new(AsteroidKind::Exploding, 400.0, 200.0));
        game.asteroids.push(Asteroid::new(AsteroidKind::Normal, 450.0, 220.0));
        game.asteroids.push(Asteroid::new(AsteroidKind::Normal, 700.0, 200.0));
        game.ship1.lasers.push(Laser { x: 400.0, y: 200.0 });

        game.step(0.0, &mut rng);

        assert_eq!(game.asteroids.len(), 1);
        assert_eq!(game.asteroids[0].x, 700.0);
        assert_eq!(game.explosions.len(), 1);
    }

    #[test]
    fn missed_laser_resets_combo() {
        let (mut game, mut rng) = quiet();
        game.ship1.combo = 7;
        game.ship1.lasers.push(Laser { x: 100.0, y: 5.0 });
        game.step(DT, &mut rng);
        assert!(game.ship1.lasers.is_empty());
        assert_eq!(game.ship1.combo, 0);
    }

    #[test]
    fn asteroid_hits_ship_unless_shielded() {
        let (mut game, mut rng) = quiet();
        game.asteroids.push(Asteroid::new(AsteroidKind::Normal, game.ship1.x, SHIP_Y));
        game.asteroids.push(Asteroid::new(AsteroidKind::Normal, game.ship2.x, SHIP_Y));
        game.ship2.active_effects.activate(PowerUpKind::Shield, game.clock_ms);

        game.step(0.0, &mut rng);

        assert_eq!(game.ship1.health, INITIAL_HEALTH - ASTEROID_DAMAGE);
        assert_eq!(game.ship2.health, INITIAL_HEALTH);
        assert_eq!(game.asteroids.len(), 1);
    }

    #[test]
    fn debris_only_hurts_its_target() {
        let (mut game, mut rng) = quiet();
        game.ship2.x = GAME_WIDTH / 2.0 + SHIP_WIDTH / 2.0;
        game.ship1.x = GAME_WIDTH / 2.0 - SHIP_WIDTH / 2.0;
        let mid = GAME_WIDTH / 2.0;
        game.debris.push(Debris {
            x: mid - 15.0,
            y: SHIP_Y,
            target_player: PlayerSlot::Player2,
        });

        game.step(0.0, &mut rng);
        assert_eq!(game.ship1.health, INITIAL_HEALTH);
        assert_eq!(game.debris.len(), 1);
    }

    #[test]
    fn pickup_activates_effect() {
        let (mut game, mut rng) = quiet();
        game.powerups.push(PowerUp {
            x: game.ship1.x,
            y: SHIP_Y,
            kind: PowerUpKind::RapidFire,
        });
        game.step(0.0, &mut rng);
        assert!(game.powerups.is_empty());
        assert!(game.ship1.active_effects.is_active(PowerUpKind::RapidFire));
    }

    #[test]
    fn slow_motion_halves_hazard_speed() {
        let (mut game, mut rng) = quiet();
        game.asteroids.push(Asteroid::new(AsteroidKind::Normal, 400.0, 100.0));
        game.ship2.active_effects.activate(PowerUpKind::SlowMotion, 0.0);
        game.step(DT, &mut rng);
        assert!((game.asteroids[0].y - 101.5).abs() < 1e-3);
    }

    #[test]
    fn destroyed_ship_loses() {
        let (mut game, mut rng) = quiet();
        game.ship1.health = 10;
        game.debris.push(Debris {
            x: game.ship1.x,
            y: SHIP_Y,
            target_player: PlayerSlot::Player1,
        });
        assert_eq!(game.step(0.0, &mut rng), Some(PlayerSlot::Player2));
        assert_eq!(game.ship1.health, 0);
    }

    #[test]
    fn health_never_increases_and_never_goes_negative() {
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let mut game = SpaceRivalry::new();
        game.difficulty = MAX_DIFFICULTY;
        let mut last = (game.ship1.health, game.ship2.health);

        for i in 0..30_000u32 {
            let cmd = match i % 4 {
                0 => InputCommand::Left,
                1 => InputCommand::Shoot,
                2 => InputCommand::Right,
                _ => InputCommand::Shoot,
            };
            game.handle_input(PlayerSlot::Player1, cmd);
            game.handle_input(PlayerSlot::Player2, cmd);
            let done = game.step(DT, &mut rng).is_some();

            let now = (game.ship1.health, game.ship2.health);
            assert!(now.0 <= last.0 && now.1 <= last.1, "health rose at tick {}", i);
            assert!(now.0 <= INITIAL_HEALTH && now.1 <= INITIAL_HEALTH);
            last = now;
            if done {
                break;
            }
        }
    }

    #[test]
    fn difficulty_is_capped() {
        let (mut game, mut rng) = quiet();
        game.difficulty = MAX_DIFFICULTY - 0.0001;
        for _ in 0..10 {
            game.step(MAX_TICK_DELTA, &mut rng);
        }
        assert_eq!(game.difficulty, MAX_DIFFICULTY);
    }

    #[test]
    fn forfeit_moves_best_score_to_winner() {
        let (mut game, _) = quiet();
        game.ship1.score = 400;
        game.ship2.score = 900;
        game.apply_forfeit(PlayerSlot::Player1);
        assert_eq!(game.scores(), (900, 0));
    }
}
