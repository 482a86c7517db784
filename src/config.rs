// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The render configuration.  Built once, checked once, and only read
//! afterwards; every entry point takes it by reference.

use crate::error::{FractalError, Result};
use crate::escape::{Evaluator, Mode};
use crate::mapping::Transform;
use crate::palette::{Palette, DEFAULT_PALETTE};
use crate::planes::{Bounds, PlaneMapper, Resolution, SampleGrid};

/// Everything a still render needs apart from the attractor and its
/// parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderParams {
    /// Steps per orbit.
    pub iteration_budget: u32,
    /// Magnitude beyond which an orbit has escaped.
    pub divergence_threshold: f64,
    /// The region of the complex plane to sample.
    pub bounds: Bounds,
    /// Output size in pixels.
    pub resolution: Resolution,
    /// Name of the palette to colour with.
    pub palette: String,
    /// Colour with the darker of the palette and its reverse.
    pub darker: bool,
    /// Julia or Mandelbrot iteration.
    pub mode: Mode,
    /// Count transforms applied before colouring, in order.
    pub transforms: Vec<Transform>,
    /// Worker threads for evaluation.
    pub threads: usize,
}

impl Default for RenderParams {
    fn default() -> Self {
        RenderParams {
            iteration_budget: 256,
            divergence_threshold: 2.0,
            bounds: Bounds::default(),
            resolution: Resolution::default(),
            palette: DEFAULT_PALETTE.to_string(),
            darker: false,
            mode: Mode::Julia,
            transforms: vec![],
            threads: 1,
        }
    }
}

impl RenderParams {
    /// Checks every field, reporting the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.evaluator()?;
        self.bounds.validate()?;
        self.resolution.validate()?;
        Palette::lookup(&self.palette)?;
        Ok(())
    }

    /// The evaluator these parameters describe.
    pub fn evaluator(&self) -> Result<Evaluator> {
        Evaluator::new(self.iteration_budget, self.divergence_threshold)?
            .mode(self.mode)
            .threads(self.threads)
    }

    /// The sample grid these parameters describe.
    pub fn grid(&self) -> Result<SampleGrid> {
        Ok(SampleGrid::new(PlaneMapper::new(
            self.resolution,
            self.bounds,
        )?))
    }

    /// A copy with a different iteration budget.
    pub fn with_budget(&self, iteration_budget: u32) -> Result<RenderParams> {
        if iteration_budget == 0 {
            return Err(FractalError::InvalidParameter(
                "iteration budget must be positive".to_string(),
            ));
        }
        Ok(RenderParams {
            iteration_budget,
            ..self.clone()
        })
    }

    /// A copy whose counts are cycled by `shift` before any other
    /// transform runs.
    pub fn with_color_shift(&self, shift: u32) -> RenderParams {
        let mut transforms = Vec::with_capacity(self.transforms.len() + 1);
        transforms.push(Transform::Shift(shift));
        transforms.extend(self.transforms.iter().cloned());
        RenderParams {
            transforms,
            ..self.clone()
        }
    }

    /// A copy sampling different bounds.
    pub fn with_bounds(&self, bounds: Bounds) -> Result<RenderParams> {
        bounds.validate()?;
        Ok(RenderParams {
            bounds,
            ..self.clone()
        })
    }
}
