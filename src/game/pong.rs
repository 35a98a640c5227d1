//! Classic 2D pong: server-authoritative paddle and ball physics

use rand::Rng;
use serde::Serialize;

use crate::util::time::frames;

use super::physics::{PhysicsSystem, Rect};
use super::{InputCommand, PlayerSlot};

pub const GAME_WIDTH: f32 = 800.0;
pub const GAME_HEIGHT: f32 = 400.0;
pub const PADDLE_WIDTH: f32 = 15.0;
pub const PADDLE_HEIGHT: f32 = 80.0;
/// Distance between each side wall and its paddle
pub const PADDLE_MARGIN: f32 = 50.0;
pub const BALL_SIZE: f32 = 10.0;
pub const PADDLE_SPEED: f32 = 11.0;
pub const INITIAL_BALL_SPEED: f32 = 7.0;
pub const MAX_BALL_SPEED: f32 = 15.0;
pub const BALL_SPEEDUP: f32 = 0.2;
/// Relative speed jitter applied on every paddle hit
pub const HIT_JITTER: f32 = 0.1;
/// 75 degrees
pub const MAX_DEFLECTION: f32 = 5.0 * std::f32::consts::PI / 12.0;
pub const POINT_TARGET: u32 = 11;

/// Kinematic and score state. Speeds are per nominal 1/60 s frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassicPong {
    pub paddle1_y: f32,
    pub paddle2_y: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_speed_x: f32,
    pub ball_speed_y: f32,
    pub score1: u32,
    pub score2: u32,
    pub combo1: u32,
    pub combo2: u32,
}

impl ClassicPong {
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut pong = Self {
            paddle1_y: (GAME_HEIGHT - PADDLE_HEIGHT) / 2.0,
            paddle2_y: (GAME_HEIGHT - PADDLE_HEIGHT) / 2.0,
            ball_x: 0.0,
            ball_y: 0.0,
            ball_speed_x: 0.0,
            ball_speed_y: 0.0,
            score1: 0,
            score2: 0,
            combo1: 0,
            combo2: 0,
        };
        pong.serve(rng);
        pong
    }

    /// Put the ball back in the centre with a random heading
    pub fn serve<R: Rng>(&mut self, rng: &mut R) {
        self.ball_x = GAME_WIDTH / 2.0;
        self.ball_y = GAME_HEIGHT / 2.0;
        self.ball_speed_x = if rng.gen_bool(0.5) {
            INITIAL_BALL_SPEED
        } else {
            -INITIAL_BALL_SPEED
        };
        self.ball_speed_y = INITIAL_BALL_SPEED * rng.gen_range(-1.0..1.0);
    }

    /// Apply a paddle command for `slot`. Returns false for commands pong ignores.
    pub fn move_paddle(&mut self, slot: PlayerSlot, input: InputCommand) -> bool {
        let delta = match input {
            InputCommand::Up => -PADDLE_SPEED,
            InputCommand::Down => PADDLE_SPEED,
            _ => return false,
        };
        let paddle = match slot {
            PlayerSlot::Player1 => &mut self.paddle1_y,
            PlayerSlot::Player2 => &mut self.paddle2_y,
        };
        *paddle = PhysicsSystem::step_clamped(*paddle, delta, 0.0, GAME_HEIGHT - PADDLE_HEIGHT);
        true
    }

    pub fn scores(&self) -> (u32, u32) {
        (self.score1, self.score2)
    }

    /// Advance one tick. Returns the winning side once the point target is reached.
    ///
    /// Long ticks are integrated in sub-steps of at most one frame so the ball
    /// cannot travel past a paddle between collision checks.
    pub fn step<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Option<PlayerSlot> {
        let total = frames(dt);
        let steps = total.ceil().max(1.0) as u32;
        let sub = total / steps as f32;

        for _ in 0..steps {
            self.advance_ball(sub);
            self.resolve_paddle_hits(rng);

            let before = self.scores();
            if let Some(winner) = self.check_scoring(rng) {
                return Some(winner);
            }
            if self.scores() != before {
                // a fresh serve starts moving on the next tick
                break;
            }
        }
        None
    }

    fn advance_ball(&mut self, frames: f32) {
        let half = BALL_SIZE / 2.0;
        let next_x = self.ball_x + self.ball_speed_x * frames;
        let mut next_y = self.ball_y + self.ball_speed_y * frames;

        if next_y - half <= 0.0 {
            next_y = half;
            self.ball_speed_y = self.ball_speed_y.abs();
        } else if next_y + half >= GAME_HEIGHT {
            next_y = GAME_HEIGHT - half;
            self.ball_speed_y = -self.ball_speed_y.abs();
        }

        self.ball_x = next_x;
        self.ball_y = next_y;
    }

    fn ball_rect(&self) -> Rect {
        Rect::centered(self.ball_x, self.ball_y, BALL_SIZE, BALL_SIZE)
    }

    fn resolve_paddle_hits<R: Rng>(&mut self, rng: &mut R) {
        let left = Rect::new(PADDLE_MARGIN, self.paddle1_y, PADDLE_WIDTH, PADDLE_HEIGHT);
        if self.ball_speed_x < 0.0 && PhysicsSystem::touches(&self.ball_rect(), &left) {
            self.ball_x = left.right() + BALL_SIZE / 2.0;
            self.deflect(self.paddle1_y, PlayerSlot::Player1, rng);
            self.combo1 += 1;
            self.combo2 = 0;
        }

        let right_x = GAME_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH;
        let right = Rect::new(right_x, self.paddle2_y, PADDLE_WIDTH, PADDLE_HEIGHT);
        if self.ball_speed_x > 0.0 && PhysicsSystem::touches(&self.ball_rect(), &right) {
            self.ball_x = right.left() - BALL_SIZE / 2.0;
            self.deflect(self.paddle2_y, PlayerSlot::Player2, rng);
            self.combo2 += 1;
            self.combo1 = 0;
        }
    }

    /// Outgoing angle follows where the ball met the paddle (centre = flat)
    fn deflect<R: Rng>(&mut self, paddle_y: f32, side: PlayerSlot, rng: &mut R) {
        let half_paddle = PADDLE_HEIGHT / 2.0;
        let relative_hit = ((self.ball_y - (paddle_y + half_paddle)) / half_paddle).clamp(-1.0, 1.0);
        let angle = relative_hit * MAX_DEFLECTION;

        let current_speed = self.ball_speed_x.hypot(self.ball_speed_y);
        let new_speed = (current_speed + BALL_SPEEDUP).min(MAX_BALL_SPEED)
            * (1.0 + rng.gen_range(-HIT_JITTER..HIT_JITTER));

        let direction = match side {
            PlayerSlot::Player1 => 1.0,
            PlayerSlot::Player2 => -1.0,
        };
        // vertical heading is kept; only its magnitude follows the hit point
        let y_direction = if self.ball_speed_y > 0.0 { 1.0 } else { -1.0 };
        self.ball_speed_x = direction * (new_speed * angle.cos()).abs();
        self.ball_speed_y = y_direction
            * (new_speed * angle.sin()).abs()
            * (1.0 + rng.gen_range(-HIT_JITTER..HIT_JITTER));
    }

    fn check_scoring<R: Rng>(&mut self, rng: &mut R) -> Option<PlayerSlot> {
        if self.ball_x <= 0.0 {
            self.score2 += 1;
        } else if self.ball_x >= GAME_WIDTH {
            self.score1 += 1;
        } else {
            return None;
        }
        self.combo1 = 0;
        self.combo2 = 0;

        if self.score1 >= POINT_TARGET || self.score2 >= POINT_TARGET {
            return Some(if self.score1 > self.score2 {
                PlayerSlot::Player1
            } else {
                PlayerSlot::Player2
            });
        }

        self.serve(rng);
        None
    }

    /// Forfeit scoring: winner keeps the higher of the two scores, loser gets zero
    pub fn apply_forfeit(&mut self, winner: PlayerSlot) {
        let best = self.score1.max(self.score2);
        let (w, l) = match winner {
            PlayerSlot::Player1 => (&mut self.score1, &mut self.score2),
            PlayerSlot::Player2 => (&mut self.score2, &mut self.score1),
        };
        *w = best;
        *l = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn ball_stays_inside_vertical_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut pong = ClassicPong::new(&mut rng);

        for i in 0..20_000 {
            // vary dt to include stalls and fast ticks
            let dt = match i % 5 {
                0 => 0.001,
                1 => DT,
                2 => 0.05,
                3 => 0.25,
                _ => DT * 2.0,
            };
            if i % 3 == 0 {
                pong.move_paddle(PlayerSlot::Player1, InputCommand::Up);
                pong.move_paddle(PlayerSlot::Player2, InputCommand::Down);
            }
            if pong.step(dt, &mut rng).is_some() {
                pong.score1 = 0;
                pong.score2 = 0;
                pong.serve(&mut rng);
            }
            assert!(
                (0.0..=GAME_HEIGHT).contains(&pong.ball_y),
                "ball_y {} escaped at tick {}",
                pong.ball_y,
                i
            );
        }
    }

    #[test]
    fn paddles_are_clamped() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut pong = ClassicPong::new(&mut rng);
        for _ in 0..100 {
            pong.move_paddle(PlayerSlot::Player1, InputCommand::Up);
            pong.move_paddle(PlayerSlot::Player2, InputCommand::Down);
        }
        assert_eq!(pong.paddle1_y, 0.0);
        assert_eq!(pong.paddle2_y, GAME_HEIGHT - PADDLE_HEIGHT);
        assert!(!pong.move_paddle(PlayerSlot::Player1, InputCommand::Shoot));
    }

    #[test]
    fn centre_hit_returns_flat_and_faster() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut pong = ClassicPong::new(&mut rng);
        pong.paddle1_y = 160.0;
        pong.ball_x = PADDLE_MARGIN + PADDLE_WIDTH + 4.0;
        pong.ball_y = 200.0;
        pong.ball_speed_x = -7.0;
        pong.ball_speed_y = 0.0;

        assert_eq!(pong.step(DT, &mut rng), None);
        assert!(pong.ball_speed_x > 0.0);
        assert!(pong.ball_speed_y.abs() < 1e-3);
        assert_eq!(pong.combo1, 1);
    }

    #[test]
    fn edge_hit_deflects_and_speed_is_capped() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut pong = ClassicPong::new(&mut rng);
        pong.paddle2_y = 100.0;
        pong.ball_x = GAME_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH - 4.0;
        pong.ball_y = 100.0 + PADDLE_HEIGHT;
        pong.ball_speed_x = MAX_BALL_SPEED;
        pong.ball_speed_y = 1.0;

        pong.step(0.0, &mut rng);
        assert!(pong.ball_speed_x < 0.0);
        assert!(pong.ball_speed_y > 1.0, "edge hit should steepen the descent");
        let speed = pong.ball_speed_x.hypot(pong.ball_speed_y);
        assert!(speed <= MAX_BALL_SPEED * (1.0 + HIT_JITTER) * (1.0 + HIT_JITTER));
    }

    #[test]
    fn deflection_keeps_vertical_heading() {
        let mut rng = ChaCha8Rng::seed_from_u64(10);
        let mut pong = ClassicPong::new(&mut rng);
        pong.paddle1_y = 100.0;
        pong.ball_x = PADDLE_MARGIN + PADDLE_WIDTH + 4.0;
        // bottom edge of the paddle, ball travelling upward
        pong.ball_y = 100.0 + PADDLE_HEIGHT;
        pong.ball_speed_x = -7.0;
        pong.ball_speed_y = -2.0;

        pong.step(0.0, &mut rng);
        assert!(pong.ball_speed_x > 0.0);
        assert!(pong.ball_speed_y < -2.0);
    }

    #[test]
    fn stalled_tick_cannot_skip_a_paddle() {
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut pong = ClassicPong::new(&mut rng);
        let paddle_left = GAME_WIDTH - PADDLE_MARGIN - PADDLE_WIDTH;
        pong.paddle2_y = 160.0;
        pong.ball_x = paddle_left - 50.0;
        pong.ball_y = 200.0;
        pong.ball_speed_x = MAX_BALL_SPEED;
        pong.ball_speed_y = 0.0;

        // six frames worth of travel in a single measured tick
        assert_eq!(pong.step(0.1, &mut rng), None);
        assert!(pong.ball_speed_x < 0.0, "ball passed the paddle at x={}", pong.ball_x);
        assert!(pong.ball_x < paddle_left);
        assert_eq!(pong.scores(), (0, 0));
        assert_eq!(pong.combo2, 1);
    }

    #[test]
    fn ball_moving_away_is_not_hit() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut pong = ClassicPong::new(&mut rng);
        pong.paddle1_y = 160.0;
        pong.ball_x = PADDLE_MARGIN + PADDLE_WIDTH;
        pong.ball_y = 200.0;
        pong.ball_speed_x = 7.0;
        pong.ball_speed_y = 0.0;
        pong.step(0.0, &mut rng);
        assert_eq!(pong.ball_speed_x, 7.0);
        assert_eq!(pong.combo1, 0);
    }

    #[test]
    fn reaching_eleven_ends_the_match() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut pong = ClassicPong::new(&mut rng);
        pong.score1 = 10;
        pong.score2 = 4;
        pong.paddle2_y = 0.0;
        pong.ball_x = GAME_WIDTH - 2.0;
        pong.ball_y = 350.0;
        pong.ball_speed_x = 7.0;
        pong.ball_speed_y = 0.0;

        assert_eq!(pong.step(DT, &mut rng), Some(PlayerSlot::Player1));
        assert_eq!(pong.scores(), (11, 4));
    }

    #[test]
    fn point_without_win_reserves() {
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut pong = ClassicPong::new(&mut rng);
        pong.paddle1_y = GAME_HEIGHT - PADDLE_HEIGHT;
        pong.ball_x = 2.0;
        pong.ball_y = 20.0;
        pong.ball_speed_x = -7.0;
        pong.ball_speed_y = 0.0;

        assert_eq!(pong.step(DT, &mut rng), None);
        assert_eq!(pong.scores(), (0, 1));
        assert_eq!(pong.ball_x, GAME_WIDTH / 2.0);
        assert_eq!(pong.ball_y, GAME_HEIGHT / 2.0);
    }

    #[test]
    fn forfeit_gives_winner_the_best_score() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut pong = ClassicPong::new(&mut rng);
        pong.score1 = 7;
        pong.score2 = 3;
        pong.apply_forfeit(PlayerSlot::Player2);
        assert_eq!(pong.scores(), (0, 7));
    }
}
