use opencv::core::Scalar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::track::TrackId;

/// A BGR color, as OpenCV draws it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    pub const GREEN: Color = Color::new(0, 255, 0);

    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }

    pub fn to_scalar(self) -> Scalar {
        Scalar::new(self.b as f64, self.g as f64, self.r as f64, 0.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::GREEN
    }
}

/// Fixed set of track colors generated from an explicit seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// `size` colors drawn from a `StdRng` seeded with `seed`; a zero size
    /// yields a one-color green palette.
    pub fn seeded(size: usize, seed: u64) -> Self {
        if size == 0 {
            return Self {
                colors: vec![Color::GREEN],
            };
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let colors = (0..size)
            .map(|_| Color::new(rng.gen_range(0..255), rng.gen_range(0..255), rng.gen_range(0..255)))
            .collect();
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// `palette[id mod len]`.
    pub fn color_for(&self, id: TrackId) -> Color {
        self.colors[id as usize % self.colors.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_palette() {
        assert_eq!(Palette::seeded(200, 7), Palette::seeded(200, 7));
        assert_ne!(Palette::seeded(200, 7), Palette::seeded(200, 8));
    }

    #[test]
    fn test_color_is_pure_function_of_id_mod_size() {
        let palette = Palette::seeded(10, 0);
        assert_eq!(palette.color_for(3), palette.color_for(13));
        assert_eq!(palette.color_for(3), palette.color_for(3));
        assert_eq!(palette.color_for(0), palette.color_for(10));
        assert_eq!(palette.color_for(3), Palette::seeded(10, 0).color_for(23));
    }

    #[test]
    fn test_zero_size_palette_falls_back_to_green() {
        let palette = Palette::seeded(0, 1);
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.color_for(42), Color::GREEN);
    }

    #[test]
    fn test_scalar_is_bgr() {
        let s = Color::new(1, 2, 3).to_scalar();
        assert_eq!((s[0], s[1], s[2]), (1.0, 2.0, 3.0));
    }
}
