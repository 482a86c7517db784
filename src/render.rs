// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The still-image pipeline: evaluate, transform, colour.

use crate::attractor::Attractor;
use crate::config::RenderParams;
use crate::error::Result;
use crate::escape::EscapeField;
use crate::mapping::{apply_transforms, map_to_rgb, map_to_rgb_darker};
use crate::palette::Palette;
use crate::planes::SampleGrid;
use image::RgbImage;
use num::Complex;

/// Evaluates `grid` under `params` and returns the raw field.
pub fn render_field(
    params: &RenderParams,
    grid: &SampleGrid,
    attractor: &Attractor,
    parameter: Complex<f64>,
) -> Result<EscapeField> {
    params.evaluator()?.evaluate(grid, attractor, parameter)
}

/// Evaluates and colours one image.  The palette is resolved before
/// evaluation starts.
pub fn render(
    params: &RenderParams,
    grid: &SampleGrid,
    attractor: &Attractor,
    parameter: Complex<f64>,
) -> Result<RgbImage> {
    Palette::lookup(&params.palette)?;
    let field = render_field(params, grid, attractor, parameter)?;
    colorize(params, &field)
}

/// Applies the configured transforms and palette to a field.
pub fn colorize(params: &RenderParams, field: &EscapeField) -> Result<RgbImage> {
    let shaped;
    let field = if params.transforms.is_empty() {
        field
    } else {
        shaped = apply_transforms(field, &params.transforms, params.iteration_budget);
        &shaped
    };
    if params.darker {
        map_to_rgb_darker(field, params.iteration_budget, &params.palette)
    } else {
        map_to_rgb(field, params.iteration_budget, &params.palette)
    }
}
