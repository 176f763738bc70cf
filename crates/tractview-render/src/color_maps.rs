//! Color maps for overlays and the legend bar.

use std::collections::HashMap;

use glam::{Vec3, Vec4};

/// A piecewise linear color ramp over `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ColorMap {
    pub name: String,
    /// Evenly spaced stops from 0 to 1.
    pub colors: Vec<Vec3>,
}

impl ColorMap {
    pub fn new(name: impl Into<String>, colors: Vec<Vec3>) -> Self {
        Self {
            name: name.into(),
            colors,
        }
    }

    /// Samples the ramp at `t`, clamped to `[0, 1]`.
    pub fn sample(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        match self.colors.len() {
            0 => Vec3::ZERO,
            1 => self.colors[0],
            len => {
                let n = len - 1;
                let idx = ((t * n as f32).floor() as usize).min(n - 1);
                let frac = t * n as f32 - idx as f32;
                self.colors[idx].lerp(self.colors[idx + 1], frac)
            }
        }
    }

    /// Opaque sample, for vertex colors.
    pub fn sample_rgba(&self, t: f32) -> Vec4 {
        self.sample(t).extend(1.0)
    }
}

/// Named color maps.
#[derive(Default)]
pub struct ColorMapRegistry {
    color_maps: HashMap<String, ColorMap>,
}

impl ColorMapRegistry {
    /// Creates a registry holding the built-in maps.
    pub fn new() -> Self {
        let mut registry = Self::default();
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.register(ColorMap::new("gray", vec![Vec3::ZERO, Vec3::ONE]));

        // Overlay default: blue through green to red.
        self.register(ColorMap::new(
            "rainbow",
            vec![
                Vec3::new(0.0, 0.0, 1.0),
                Vec3::new(0.0, 1.0, 1.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
            ],
        ));

        self.register(ColorMap::new(
            "hot",
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(1.0, 1.0, 1.0),
            ],
        ));

        self.register(ColorMap::new(
            "viridis",
            vec![
                Vec3::new(0.267, 0.004, 0.329),
                Vec3::new(0.253, 0.265, 0.529),
                Vec3::new(0.163, 0.471, 0.558),
                Vec3::new(0.134, 0.658, 0.517),
                Vec3::new(0.477, 0.821, 0.318),
                Vec3::new(0.993, 0.906, 0.144),
            ],
        ));
    }

    pub fn register(&mut self, color_map: ColorMap) {
        self.color_maps.insert(color_map.name.clone(), color_map);
    }

    pub fn get(&self, name: &str) -> Option<&ColorMap> {
        self.color_maps.get(name)
    }

    /// Looks up `name`, falling back to the rainbow map.
    pub fn get_or_default(&self, name: &str) -> Option<&ColorMap> {
        self.get(name).or_else(|| {
            log::warn!("unknown color map '{name}', using rainbow");
            self.get("rainbow")
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.color_maps.keys().map(String::as_str)
    }
}
