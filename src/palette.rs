// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Named continuous colormaps.
//!
//! Each map is a run of evenly spaced RGB stops interpolated linearly,
//! modelled on the matplotlib maps of the same name.  Appending `_r`
//! to any name reverses it.

use crate::error::{FractalError, Result};

type Stops = &'static [(f64, f64, f64)];

const VIRIDIS: Stops = &[
    (0.267, 0.005, 0.329),
    (0.283, 0.141, 0.458),
    (0.254, 0.265, 0.530),
    (0.207, 0.372, 0.553),
    (0.164, 0.471, 0.558),
    (0.128, 0.567, 0.551),
    (0.135, 0.659, 0.518),
    (0.267, 0.749, 0.441),
    (0.478, 0.821, 0.318),
    (0.741, 0.873, 0.150),
    (0.993, 0.906, 0.144),
];

const MAGMA: Stops = &[
    (0.001, 0.000, 0.014),
    (0.078, 0.054, 0.211),
    (0.232, 0.060, 0.437),
    (0.390, 0.100, 0.502),
    (0.550, 0.161, 0.506),
    (0.716, 0.215, 0.475),
    (0.868, 0.288, 0.409),
    (0.967, 0.439, 0.360),
    (0.994, 0.624, 0.427),
    (0.995, 0.803, 0.572),
    (0.987, 0.991, 0.750),
];

const INFERNO: Stops = &[
    (0.001, 0.000, 0.014),
    (0.087, 0.045, 0.225),
    (0.258, 0.039, 0.406),
    (0.416, 0.090, 0.433),
    (0.578, 0.148, 0.404),
    (0.735, 0.216, 0.330),
    (0.865, 0.317, 0.226),
    (0.954, 0.469, 0.099),
    (0.988, 0.645, 0.040),
    (0.964, 0.837, 0.255),
    (0.988, 0.998, 0.645),
];

const PLASMA: Stops = &[
    (0.050, 0.030, 0.528),
    (0.254, 0.014, 0.615),
    (0.417, 0.001, 0.658),
    (0.562, 0.051, 0.642),
    (0.692, 0.165, 0.565),
    (0.798, 0.280, 0.470),
    (0.881, 0.393, 0.383),
    (0.949, 0.517, 0.295),
    (0.988, 0.652, 0.211),
    (0.988, 0.809, 0.145),
    (0.940, 0.975, 0.131),
];

// cyclic: first and last stops are the same colour
const TWILIGHT: Stops = &[
    (0.886, 0.851, 0.887),
    (0.667, 0.757, 0.808),
    (0.424, 0.600, 0.780),
    (0.369, 0.389, 0.729),
    (0.357, 0.153, 0.545),
    (0.184, 0.078, 0.234),
    (0.455, 0.106, 0.353),
    (0.682, 0.267, 0.302),
    (0.792, 0.498, 0.431),
    (0.839, 0.714, 0.678),
    (0.886, 0.851, 0.887),
];

const GREYS: Stops = &[(1.0, 1.0, 1.0), (0.0, 0.0, 0.0)];

const GRAY: Stops = &[(0.0, 0.0, 0.0), (1.0, 1.0, 1.0)];

const BUGN: Stops = &[
    (0.969, 0.988, 0.992),
    (0.898, 0.961, 0.976),
    (0.800, 0.925, 0.902),
    (0.600, 0.847, 0.788),
    (0.400, 0.761, 0.643),
    (0.255, 0.682, 0.463),
    (0.137, 0.545, 0.271),
    (0.000, 0.427, 0.173),
    (0.000, 0.267, 0.106),
];

const HOT: Stops = &[
    (0.042, 0.000, 0.000),
    (0.380, 0.000, 0.000),
    (0.710, 0.000, 0.000),
    (1.000, 0.030, 0.000),
    (1.000, 0.360, 0.000),
    (1.000, 0.690, 0.000),
    (1.000, 1.000, 0.020),
    (1.000, 1.000, 0.500),
    (1.000, 1.000, 1.000),
];

// name, stops, phase shift, reversed
const REGISTRY: &[(&str, Stops, f64, bool)] = &[
    ("viridis", VIRIDIS, 0.0, false),
    ("magma", MAGMA, 0.0, false),
    ("inferno", INFERNO, 0.0, false),
    ("plasma", PLASMA, 0.0, false),
    ("twilight", TWILIGHT, 0.0, false),
    ("twilight_shifted", TWILIGHT, 0.5, true),
    ("greys", GREYS, 0.0, false),
    ("gray", GRAY, 0.0, false),
    ("bugn", BUGN, 0.0, false),
    ("hot", HOT, 0.0, false),
];

/// The palette used when none is named.
pub const DEFAULT_PALETTE: &str = "twilight_shifted";

/// The base names of every known palette.  Each also exists reversed
/// under `<name>_r`.
pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|entry| entry.0).collect()
}

/// A continuous map from [0, 1] to RGB.
#[derive(Copy, Clone, Debug)]
pub struct Palette {
    name: &'static str,
    stops: Stops,
    shift: f64,
    reversed: bool,
}

impl Palette {
    /// Resolves a palette by name, ignoring case.  Fails with
    /// `UnknownPalette` when nothing matches.
    pub fn lookup(name: &str) -> Result<Palette> {
        let wanted = name.trim().to_ascii_lowercase();
        let (base, flip) = if wanted.ends_with("_r") {
            (&wanted[..wanted.len() - 2], true)
        } else {
            (&wanted[..], false)
        };
        REGISTRY
            .iter()
            .find(|entry| entry.0 == base)
            .map(|&(name, stops, shift, reversed)| Palette {
                name,
                stops,
                shift,
                reversed: reversed != flip,
            })
            .ok_or_else(|| FractalError::UnknownPalette(name.to_string()))
    }

    /// The base name of the palette.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Samples the palette at `t`.  Values outside [0, 1] are clamped;
    /// NaN samples the start.
    pub fn sample(&self, t: f64) -> [u8; 3] {
        let mut t = if t.is_nan() { 0.0 } else { t.max(0.0).min(1.0) };
        if self.reversed {
            t = 1.0 - t;
        }
        if self.shift != 0.0 {
            t = (t + self.shift) % 1.0;
        }
        let last = self.stops.len() - 1;
        let scaled = t * last as f64;
        let idx = (scaled as usize).min(last.saturating_sub(1));
        let frac = scaled - idx as f64;
        let (r1, g1, b1) = self.stops[idx];
        let (r2, g2, b2) = self.stops[(idx + 1).min(last)];
        let channel = |a: f64, b: f64| ((a + (b - a) * frac) * 255.0).round().max(0.0).min(255.0) as u8;
        [channel(r1, r2), channel(g1, g2), channel(b1, b2)]
    }

    /// The same palette run the other way; `viridis` becomes
    /// `viridis_r` and back.
    pub fn reversed(&self) -> Palette {
        Palette {
            reversed: !self.reversed,
            ..*self
        }
    }

    /// The darker of the palette and its reverse at `t`, channel by
    /// channel.  Symmetric about 0.5, so both ends of the count range
    /// share a colour.
    pub fn sample_darker(&self, t: f64) -> [u8; 3] {
        let a = self.sample(t);
        let b = self.reversed().sample(t);
        [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])]
    }
}
