//! Host-side Pong physics on a 512x512 screen, stepped once per rendered frame.
//!
//! Only the session host runs [`PongTable::step`]; every other client mirrors the
//! host's broadcasts. Velocities are in pixels per frame.

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::Rng;

use crate::{
    dto::common::PongSide,
    state::session::{DEFAULT_BALL_POS, DEFAULT_PADDLE_Y, WINNING_SCORE},
};

pub const FIELD_SIZE: f32 = 512.0;
pub const PADDLE_HEIGHT: f32 = 80.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const PLAYER_PADDLE_SPEED: f32 = 8.0;
pub const AI_PADDLE_SPEED: f32 = 4.0;
/// Scales the AI's aim point so it misses now and then.
pub const AI_DIFFICULTY: f32 = 0.92;
pub const AI_DEAD_ZONE: f32 = 10.0;
pub const BALL_SIZE: f32 = 8.0;
pub const BALL_BASE_SPEED: f32 = 3.0;
/// x of the left paddle's hitting face.
pub const LEFT_PADDLE_FACE: f32 = 60.0;
/// x of the right paddle's hitting face.
pub const RIGHT_PADDLE_FACE: f32 = 452.0;
/// How far off-centre hits deflect the ball vertically.
pub const BOUNCE_SPREAD: f32 = 0.8;
/// Score flash shown before the ball is served again.
pub const SCORE_FLASH: Duration = Duration::from_millis(1_200);

const PADDLE_MAX_Y: f32 = FIELD_SIZE - PADDLE_HEIGHT;

/// Vertical paddle input for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaddleInput {
    pub up: bool,
    pub down: bool,
}

impl PaddleInput {
    /// True when any direction is held.
    pub fn is_active(&self) -> bool {
        self.up || self.down
    }
}

/// What one host step changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Score flash in progress; the ball is frozen.
    Flashing,
    /// Ball advanced (and may have bounced).
    BallMoved,
    /// Flash ended and the ball was served from the centre.
    BallServed,
    /// Ball left the field and `side` scored.
    Scored { side: PongSide, game_over: bool },
}

/// Paddles, ball, and score of one cabinet.
#[derive(Debug, Clone, PartialEq)]
pub struct PongTable {
    pub left_paddle_y: f32,
    pub right_paddle_y: f32,
    pub ball: Vec2,
    pub velocity: Vec2,
    pub left_score: u32,
    pub right_score: u32,
    /// Side currently flashing after a point.
    pub scoring: Option<PongSide>,
    scored_at: Option<Instant>,
}

impl Default for PongTable {
    fn default() -> Self {
        Self {
            left_paddle_y: DEFAULT_PADDLE_Y,
            right_paddle_y: DEFAULT_PADDLE_Y,
            ball: Vec2::splat(DEFAULT_BALL_POS),
            velocity: Vec2::new(BALL_BASE_SPEED, 0.0),
            left_score: 0,
            right_score: 0,
            scoring: None,
            scored_at: None,
        }
    }
}

impl PongTable {
    /// Put the ball back in the centre, heading left or right at base speed.
    pub fn serve<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let direction = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        self.ball = Vec2::splat(DEFAULT_BALL_POS);
        self.velocity = Vec2::new(BALL_BASE_SPEED * direction, 0.0);
    }

    /// Zero both scores and clear any flash.
    pub fn reset_scores(&mut self) {
        self.left_score = 0;
        self.right_score = 0;
        self.clear_flash();
    }

    /// Stop the score flash without serving.
    pub fn clear_flash(&mut self) {
        self.scoring = None;
        self.scored_at = None;
    }

    /// Start the score flash for `side` at `now`.
    pub fn flash(&mut self, side: PongSide, now: Instant) {
        self.scoring = Some(side);
        self.scored_at = Some(now);
    }

    /// Move a human paddle; returns whether input was applied.
    pub fn move_paddle(&mut self, side: PongSide, input: PaddleInput) -> bool {
        let paddle = match side {
            PongSide::Left => &mut self.left_paddle_y,
            PongSide::Right => &mut self.right_paddle_y,
        };
        if input.up {
            *paddle = (*paddle - PLAYER_PADDLE_SPEED).max(0.0);
        }
        if input.down {
            *paddle = (*paddle + PLAYER_PADDLE_SPEED).min(PADDLE_MAX_Y);
        }
        input.is_active()
    }

    /// Steer the right paddle toward where the ball will cross it; returns whether it moved.
    pub fn drive_ai(&mut self) -> bool {
        if self.velocity.x == 0.0 {
            return false;
        }
        let frames_to_intercept = (RIGHT_PADDLE_FACE - self.ball.x) / self.velocity.x.abs();
        let predicted_y = self.ball.y + self.velocity.y * frames_to_intercept;
        let target_y = predicted_y * AI_DIFFICULTY;
        let centre = self.right_paddle_y + PADDLE_HEIGHT / 2.0;

        let before = self.right_paddle_y;
        if centre < target_y - AI_DEAD_ZONE {
            self.right_paddle_y = (self.right_paddle_y + AI_PADDLE_SPEED).min(PADDLE_MAX_Y);
        } else if centre > target_y + AI_DEAD_ZONE {
            self.right_paddle_y = (self.right_paddle_y - AI_PADDLE_SPEED).max(0.0);
        }
        self.right_paddle_y != before
    }

    /// Advance the ball one frame.
    pub fn step<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) -> StepOutcome {
        if let Some(scored_at) = self.scored_at {
            if now.duration_since(scored_at) < SCORE_FLASH {
                return StepOutcome::Flashing;
            }
            self.clear_flash();
            self.serve(rng);
            return StepOutcome::BallServed;
        }

        self.ball += self.velocity;

        if self.ball.y < 0.0 || self.ball.y > FIELD_SIZE {
            self.velocity.y = -self.velocity.y;
        }

        if self.ball.x < 0.0 {
            self.right_score += 1;
            return self.point(PongSide::Right, now);
        }
        if self.ball.x >= FIELD_SIZE {
            self.left_score += 1;
            return self.point(PongSide::Left, now);
        }

        let half = BALL_SIZE / 2.0;
        if self.velocity.x < 0.0 {
            let touching = self.ball.x - half <= LEFT_PADDLE_FACE
                && self.ball.x + half > LEFT_PADDLE_FACE - PADDLE_WIDTH;
            if touching && covers(self.left_paddle_y, self.ball.y) {
                self.ball.x = LEFT_PADDLE_FACE + half;
                self.velocity = deflect(1.0, self.ball.y, self.left_paddle_y);
            }
        } else {
            let touching = self.ball.x + half >= RIGHT_PADDLE_FACE
                && self.ball.x - half < RIGHT_PADDLE_FACE + PADDLE_WIDTH;
            if touching && covers(self.right_paddle_y, self.ball.y) {
                self.ball.x = RIGHT_PADDLE_FACE - half;
                self.velocity = deflect(-1.0, self.ball.y, self.right_paddle_y);
            }
        }

        StepOutcome::BallMoved
    }

    fn point(&mut self, side: PongSide, now: Instant) -> StepOutcome {
        let score = match side {
            PongSide::Left => self.left_score,
            PongSide::Right => self.right_score,
        };
        let game_over = score >= WINNING_SCORE;
        if game_over {
            self.clear_flash();
        } else {
            self.flash(side, now);
        }
        StepOutcome::Scored { side, game_over }
    }
}

fn covers(paddle_y: f32, ball_y: f32) -> bool {
    ball_y >= paddle_y && ball_y <= paddle_y + PADDLE_HEIGHT
}

/// New velocity after a paddle hit: heading `direction` on x, angled by where the
/// ball met the paddle, always at base speed.
fn deflect(direction: f32, ball_y: f32, paddle_y: f32) -> Vec2 {
    let relative = (ball_y - paddle_y) / PADDLE_HEIGHT;
    let vertical = (relative - 0.5) * BOUNCE_SPREAD;
    Vec2::new(direction, vertical).normalize() * BALL_BASE_SPEED
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn paddle_bounces_keep_ball_speed_constant() {
        let mut rng = rng();
        let now = Instant::now();
        for offset in [0.0, 10.0, 40.0, 70.0, 79.0] {
            let mut table = PongTable {
                left_paddle_y: 200.0,
                ball: Vec2::new(LEFT_PADDLE_FACE + 5.0, 200.0 + offset),
                velocity: Vec2::new(-2.0, 0.5),
                ..PongTable::default()
            };
            table.step(now, &mut rng);
            assert!(table.velocity.x > 0.0, "offset {offset} should bounce");
            assert!((table.velocity.length() - BALL_BASE_SPEED).abs() < 1e-4);
        }
    }

    #[test]
    fn right_paddle_sends_ball_back_left() {
        let mut table = PongTable {
            right_paddle_y: 100.0,
            ball: Vec2::new(RIGHT_PADDLE_FACE - 6.0, 140.0),
            velocity: Vec2::new(3.0, 0.0),
            ..PongTable::default()
        };
        assert_eq!(table.step(Instant::now(), &mut rng()), StepOutcome::BallMoved);
        assert!(table.velocity.x < 0.0);
        assert_eq!(table.ball.x, RIGHT_PADDLE_FACE - BALL_SIZE / 2.0);
        // Dead centre hit leaves the ball flat.
        assert!(table.velocity.y.abs() < 1e-6);
    }

    #[test]
    fn walls_flip_vertical_speed() {
        let mut table = PongTable {
            ball: Vec2::new(256.0, 1.0),
            velocity: Vec2::new(1.0, -2.0),
            ..PongTable::default()
        };
        table.step(Instant::now(), &mut rng());
        assert_eq!(table.velocity.y, 2.0);
    }

    #[test]
    fn missed_ball_scores_then_flashes_then_serves() {
        let mut rng = rng();
        let start = Instant::now();
        let mut table = PongTable {
            left_paddle_y: 400.0,
            ball: Vec2::new(1.0, 100.0),
            velocity: Vec2::new(-3.0, 0.0),
            ..PongTable::default()
        };

        assert_eq!(
            table.step(start, &mut rng),
            StepOutcome::Scored {
                side: PongSide::Right,
                game_over: false
            }
        );
        assert_eq!(table.right_score, 1);
        assert_eq!(table.scoring, Some(PongSide::Right));

        let frozen = table.ball;
        assert_eq!(
            table.step(start + Duration::from_millis(600), &mut rng),
            StepOutcome::Flashing
        );
        assert_eq!(table.ball, frozen);

        assert_eq!(table.step(start + SCORE_FLASH, &mut rng), StepOutcome::BallServed);
        assert_eq!(table.ball, Vec2::splat(256.0));
        assert_eq!(table.velocity.length(), BALL_BASE_SPEED);
        assert_eq!(table.velocity.y, 0.0);
        assert_eq!(table.scoring, None);
    }

    #[test]
    fn tenth_point_ends_the_game_without_flash() {
        let mut table = PongTable {
            left_score: 9,
            right_paddle_y: 0.0,
            ball: Vec2::new(510.0, 400.0),
            velocity: Vec2::new(3.0, 0.0),
            ..PongTable::default()
        };
        assert_eq!(
            table.step(Instant::now(), &mut rng()),
            StepOutcome::Scored {
                side: PongSide::Left,
                game_over: true
            }
        );
        assert_eq!(table.left_score, 10);
        assert_eq!(table.scoring, None);
    }

    #[test]
    fn human_paddles_stay_on_screen() {
        let mut table = PongTable {
            left_paddle_y: 4.0,
            right_paddle_y: 430.0,
            ..PongTable::default()
        };
        assert!(table.move_paddle(PongSide::Left, PaddleInput { up: true, down: false }));
        assert!(table.move_paddle(PongSide::Right, PaddleInput { up: false, down: true }));
        assert_eq!(table.left_paddle_y, 0.0);
        assert_eq!(table.right_paddle_y, PADDLE_MAX_Y);
        assert!(!table.move_paddle(PongSide::Left, PaddleInput::default()));
    }

    #[test]
    fn ai_tracks_the_predicted_intercept() {
        let mut table = PongTable {
            right_paddle_y: 0.0,
            ball: Vec2::new(252.0, 300.0),
            velocity: Vec2::new(3.0, 0.0),
            ..PongTable::default()
        };
        assert!(table.drive_ai());
        assert_eq!(table.right_paddle_y, AI_PADDLE_SPEED);

        // Inside the dead zone the paddle holds still.
        table.right_paddle_y = 300.0 * AI_DIFFICULTY - PADDLE_HEIGHT / 2.0;
        assert!(!table.drive_ai());
    }
}
