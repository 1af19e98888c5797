use serde::{Deserialize, Serialize};

/// Integer point (or displacement) on the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise sum of `self` and `delta`.
    pub fn translate(self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y)
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Vec2) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        dx.hypot(dy)
    }

    /// Sum of the absolute components.
    pub fn manhattan_len(self) -> i32 {
        self.x.abs() + self.y.abs()
    }

    pub fn offset_to(self, other: Vec2) -> Vec2 {
        Self::new(other.x - self.x, other.y - self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean_and_symmetric() {
        let a = Vec2::new(1, 2);
        let b = Vec2::new(4, 6);
        assert_eq!(a.distance_to(b), 5.0);
        assert_eq!(b.distance_to(a), 5.0);
        assert_eq!(a.distance_to(a), 0.0);
    }

    #[test]
    fn translate_and_offset() {
        let a = Vec2::new(10, -3);
        let delta = Vec2::new(-4, 7);
        let b = a.translate(delta);
        assert_eq!(b, Vec2::new(6, 4));
        assert_eq!(a.offset_to(b), delta);
        assert_eq!(delta.manhattan_len(), 11);
    }
}
