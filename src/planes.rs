// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the PlaneMapper struct, which describes a relationship
//! between a rectangle on the integral plane with an origin at 0,0 in
//! the upper-left corner, and a rectangle on the complex plane with an
//! arbitrary pair of bounds on each axis, and the SampleGrid built
//! from it: one complex sample per output pixel.

use crate::error::{FractalError, Result};
use itertools::iproduct;
use num::Complex;

/// The extent of the complex plane we sample.  The real part of each
/// value is the x-component and the imaginary part the y-component.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub re_min: f64,
    /// Right edge.
    pub re_max: f64,
    /// Bottom edge.
    pub im_min: f64,
    /// Top edge.
    pub im_max: f64,
}

impl Bounds {
    /// Validating constructor.  Both axes must be finite and strictly
    /// increasing.
    pub fn new(re_min: f64, re_max: f64, im_min: f64, im_max: f64) -> Result<Bounds> {
        let bounds = Bounds {
            re_min,
            re_max,
            im_min,
            im_max,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Checks the invariants without consuming the value.
    pub fn validate(&self) -> Result<()> {
        let all = [self.re_min, self.re_max, self.im_min, self.im_max];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(FractalError::InvalidRange(format!(
                "bounds must be finite, got {:?}",
                all
            )));
        }
        if self.re_min >= self.re_max {
            return Err(FractalError::InvalidRange(format!(
                "re_min {} is not less than re_max {}",
                self.re_min, self.re_max
            )));
        }
        if self.im_min >= self.im_max {
            return Err(FractalError::InvalidRange(format!(
                "im_min {} is not less than im_max {}",
                self.im_min, self.im_max
            )));
        }
        Ok(())
    }

    /// Linear interpolation between two bounds, `t` in [0, 1].
    pub fn lerp(&self, other: &Bounds, t: f64) -> Bounds {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Bounds {
            re_min: mix(self.re_min, other.re_min),
            re_max: mix(self.re_max, other.re_max),
            im_min: mix(self.im_min, other.im_min),
            im_max: mix(self.im_max, other.im_max),
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds {
            re_min: -2.0,
            re_max: 2.0,
            im_min: -2.0,
            im_max: 2.0,
        }
    }
}

/// Describes the width and height of an integral plane that is
/// assumed to start at 0,0; all values are non-negative integers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Resolution {
    /// Columns.
    pub width: usize,
    /// Rows.
    pub height: usize,
}

impl Resolution {
    /// Validating constructor.
    pub fn new(width: usize, height: usize) -> Result<Resolution> {
        let res = Resolution { width, height };
        res.validate()?;
        Ok(res)
    }

    /// Neither dimension may be zero.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FractalError::InvalidResolution {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution {
            width: 1000,
            height: 1000,
        }
    }
}

/// Describes the column, row of a pixel.  Row 0 is the top of the
/// image.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps points from the integral plane to the complex plane.  Both
/// axes are evenly spaced with the endpoints included, so the corner
/// pixels land exactly on the corners of the bounds.
#[derive(Copy, Clone, Debug)]
pub struct PlaneMapper {
    /// The integral plane.
    pub resolution: Resolution,
    /// The complex plane.
    pub bounds: Bounds,
}

// The k-th of n evenly spaced samples from `from` to `to`, both
// included.  The last sample is pinned to `to`.
fn spaced(from: f64, to: f64, k: usize, n: usize) -> f64 {
    if n <= 1 {
        return from;
    }
    if k + 1 == n {
        return to;
    }
    from + (to - from) * (k as f64) / ((n - 1) as f64)
}

impl PlaneMapper {
    /// Constructor.  Fails if either plane is malformed.
    pub fn new(resolution: Resolution, bounds: Bounds) -> Result<PlaneMapper> {
        bounds.validate()?;
        resolution.validate()?;
        Ok(PlaneMapper { resolution, bounds })
    }

    /// Given a pixel on the integral plane, map it to its sample on
    /// the complex plane.  Columns run left to right along the real
    /// axis; rows run top to bottom, from `im_max` down to `im_min`.
    pub fn pixel_to_point(&self, pixel: &Pixel) -> Complex<f64> {
        let Pixel(column, row) = *pixel;
        Complex::new(
            spaced(
                self.bounds.re_min,
                self.bounds.re_max,
                column,
                self.resolution.width,
            ),
            spaced(
                self.bounds.im_max,
                self.bounds.im_min,
                row,
                self.resolution.height,
            ),
        )
    }
}

/// An H×W row-major array of complex samples, one per output pixel.
#[derive(Clone, Debug)]
pub struct SampleGrid {
    mapper: PlaneMapper,
    points: Vec<Complex<f64>>,
}

impl SampleGrid {
    /// Samples every pixel of the mapper's integral plane.
    pub fn new(mapper: PlaneMapper) -> SampleGrid {
        let res = mapper.resolution;
        let points = iproduct!(0..res.height, 0..res.width)
            .map(|(row, column)| mapper.pixel_to_point(&Pixel(column, row)))
            .collect();
        SampleGrid { mapper, points }
    }

    /// Columns.
    pub fn width(&self) -> usize {
        self.mapper.resolution.width
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.mapper.resolution.height
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Never true for a grid built through `build_grid`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The sample at `row`, `column`.
    pub fn get(&self, row: usize, column: usize) -> Option<Complex<f64>> {
        if row >= self.height() || column >= self.width() {
            return None;
        }
        Some(self.points[row * self.width() + column])
    }

    /// All samples, row-major.
    pub fn points(&self) -> &[Complex<f64>] {
        &self.points
    }

    /// One slice per row, top to bottom.
    pub fn rows(&self) -> std::slice::Chunks<Complex<f64>> {
        self.points.chunks(self.width())
    }

    /// The bounds the grid was sampled from.
    pub fn bounds(&self) -> Bounds {
        self.mapper.bounds
    }

    /// The resolution the grid was sampled at.
    pub fn resolution(&self) -> Resolution {
        self.mapper.resolution
    }
}

/// Builds the grid for the rectangle `[re_min, re_max] × [im_min,
/// im_max]` at `width` × `height` pixels.
pub fn build_grid(
    re_min: f64,
    re_max: f64,
    im_min: f64,
    im_max: f64,
    width: usize,
    height: usize,
) -> Result<SampleGrid> {
    let bounds = Bounds::new(re_min, re_max, im_min, im_max)?;
    let resolution = Resolution::new(width, height)?;
    Ok(SampleGrid::new(PlaneMapper::new(resolution, bounds)?))
}
