//! Procedural crack patterns
//!
//! A crack is a set of branching line segments radiating from an impact
//! point. Segments are thickened into thin capsules, merged through the
//! boolean adapter and applied to the world as ordinary cuts.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crumble_geometry::boolean::{self, PolygonWithHoles};
use crumble_geometry::{Bounds, Contour};

use super::{CutStats, World};
use crate::TerrainError;

/// Shape of a radial crack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrackConfig {
    /// Maximum reach from the origin
    pub radius: f32,
    /// Primary branches leaving the origin
    pub branches: usize,
    /// Segments per branch
    pub segments_per_branch: usize,
    /// Full width of the carved groove
    pub thickness: f32,
    /// Maximum heading change per segment, radians
    pub jitter: f32,
    /// Chance per segment of spawning a side branch
    pub split_chance: f32,
    /// Side branches stop splitting at this depth
    pub max_depth: u32,
}

impl Default for CrackConfig {
    fn default() -> Self {
        Self {
            radius: 8.0,
            branches: 5,
            segments_per_branch: 4,
            thickness: 0.3,
            jitter: 0.5,
            split_chance: 0.25,
            max_depth: 2,
        }
    }
}

/// A deterministic set of crack segments
#[derive(Debug, Clone, PartialEq)]
pub struct CrackPattern {
    segments: Vec<(Vec2, Vec2)>,
    thickness: f32,
}

struct Walker {
    start: Vec2,
    heading: f32,
    steps: usize,
    depth: u32,
}

impl CrackPattern {
    /// Branching crack around `origin`; the same seed yields the same pattern
    pub fn radial(origin: Vec2, config: &CrackConfig, seed: u64) -> Self {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let steps = config.segments_per_branch.max(1);
        let step_length = config.radius / steps as f32;
        let jitter = config.jitter.abs();

        let mut walkers: Vec<Walker> = (0..config.branches)
            .map(|i| {
                let base = std::f32::consts::TAU * i as f32 / config.branches as f32;
                Walker {
                    start: origin,
                    heading: base + sample(&mut rng, jitter),
                    steps,
                    depth: 0,
                }
            })
            .collect();

        let mut segments = Vec::new();
        while let Some(walker) = walkers.pop() {
            let mut position = walker.start;
            let mut heading = walker.heading;
            for step in 0..walker.steps {
                let next = position + Vec2::from_angle(heading) * step_length;
                if next.distance(origin) > config.radius * (1.0 + 1e-5) {
                    break;
                }
                segments.push((position, next));

                let remaining = walker.steps - step - 1;
                if remaining > 0
                    && walker.depth < config.max_depth
                    && rng.gen::<f32>() < config.split_chance
                {
                    let side = if rng.gen::<bool>() { 1.0 } else { -1.0 };
                    walkers.push(Walker {
                        start: next,
                        heading: heading + side * (0.5 + sample(&mut rng, jitter)),
                        steps: remaining,
                        depth: walker.depth + 1,
                    });
                }

                position = next;
                heading += sample(&mut rng, jitter);
            }
        }

        log::trace!("Crack: {} segments from seed {}", segments.len(), seed);
        Self {
            segments,
            thickness: config.thickness,
        }
    }

    pub fn segments(&self) -> &[(Vec2, Vec2)] {
        &self.segments
    }

    pub fn bounds(&self) -> Bounds {
        self.segments
            .iter()
            .fold(Bounds::EMPTY, |mut acc, (a, b)| {
                acc.include_point(*a);
                acc.include_point(*b);
                acc
            })
            .expanded(self.thickness)
    }

    /// Thickened segments merged into cut polygons
    pub fn to_polygons(&self) -> Vec<PolygonWithHoles> {
        let grooves: Vec<Contour> = self
            .segments
            .iter()
            .map(|(a, b)| Contour::capsule(*a, *b, self.thickness * 0.5))
            .filter(Contour::is_valid)
            .collect();
        boolean::union_all(&grooves)
    }
}

fn sample(rng: &mut Xoshiro256PlusPlus, jitter: f32) -> f32 {
    if jitter > 0.0 {
        rng.gen_range(-jitter..=jitter)
    } else {
        0.0
    }
}

impl World {
    /// Carve a crack pattern into the terrain
    pub fn cut_crack(
        &mut self,
        pattern: &CrackPattern,
        min_surface_area: f32,
    ) -> Result<CutStats, TerrainError> {
        let mut stats = CutStats::default();
        for polygon in pattern.to_polygons() {
            let bounds = polygon.outer.bounds();
            stats.merge(self.cut_with_holes(&polygon, bounds, min_surface_area)?);
        }
        log::debug!(
            "Crack: {} segments cut {} shapes",
            pattern.segments().len(),
            stats.shapes_cut
        );
        Ok(stats)
    }
}
