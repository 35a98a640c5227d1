//! Experience and level arithmetic

use serde::{Deserialize, Serialize};

pub const BASE_XP: f64 = 100.0;
pub const GROWTH_FACTOR: f64 = 1.5;

/// Experience needed to leave `level`
pub fn xp_to_next_level(level: u32) -> u32 {
    let exponent = level.saturating_sub(1) as i32;
    (BASE_XP * GROWTH_FACTOR.powi(exponent)).floor() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// Experience accumulated inside the current level
    pub xp: u32,
}

impl Default for LevelProgress {
    fn default() -> Self {
        Self { level: 1, xp: 0 }
    }
}

impl LevelProgress {
    /// Add experience, rolling over as many levels as it covers
    pub fn add_xp(&mut self, amount: u32) {
        self.xp = self.xp.saturating_add(amount);
        loop {
            let needed = xp_to_next_level(self.level);
            if self.xp < needed {
                break;
            }
            self.xp -= needed;
            self.level += 1;
        }
    }
}
