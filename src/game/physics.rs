//! Shared kinematics and collision helpers

/// Axis-aligned rectangle given by its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Rectangle of size (w, h) centred on (cx, cy)
    pub fn centered(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self {
            x: cx - w / 2.0,
            y: cy - h / 2.0,
            w,
            h,
        }
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// Collision helpers used by both physics variants
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Inclusive overlap: touching edges count as a hit (paddle contact)
    pub fn touches(a: &Rect, b: &Rect) -> bool {
        a.left() <= b.right() && a.right() >= b.left() && a.top() <= b.bottom() && a.bottom() >= b.top()
    }

    /// Strict overlap: boxes that only share an edge do not collide (projectiles and hazards)
    pub fn overlaps(a: &Rect, b: &Rect) -> bool {
        a.left() < b.right() && a.right() > b.left() && a.top() < b.bottom() && a.bottom() > b.top()
    }

    /// Euclidean distance between two points
    pub fn distance(x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
        let dx = x2 - x1;
        let dy = y2 - y1;
        (dx * dx + dy * dy).sqrt()
    }

    /// Move `value` by `delta` and keep it inside [min, max]
    pub fn step_clamped(value: f32, delta: f32, min: f32, max: f32) -> f32 {
        (value + delta).clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_collide() {
        let paddle = Rect::new(50.0, 100.0, 15.0, 80.0);
        let ball = Rect::centered(70.0, 140.0, 10.0, 10.0);
        assert!(PhysicsSystem::touches(&paddle, &ball));

        let far = Rect::centered(90.0, 140.0, 10.0, 10.0);
        assert!(!PhysicsSystem::touches(&paddle, &far));
    }

    #[test]
    fn strict_overlap_ignores_shared_edges() {
        let laser = Rect::centered(0.0, 0.0, 10.0, 10.0);
        assert!(PhysicsSystem::overlaps(&laser, &Rect::centered(9.0, 0.0, 10.0, 10.0)));
        assert!(!PhysicsSystem::overlaps(&laser, &Rect::centered(10.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn step_clamped_holds_bounds() {
        assert_eq!(PhysicsSystem::step_clamped(5.0, -11.0, 0.0, 320.0), 0.0);
        assert_eq!(PhysicsSystem::step_clamped(315.0, 11.0, 0.0, 320.0), 320.0);
    }
}
