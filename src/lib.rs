#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Julia set renderer
//!
//! A Julia set is drawn by taking every point of a rectangle of the
//! complex plane and feeding it through an attractor, typically
//! `z -> z^2 + c`, over and over.  Some points run off to infinity
//! quickly, some slowly, and some never leave.  The number of steps a
//! point survives before its magnitude passes a threshold is its
//! "escape time", and that number, run through a palette, is the
//! colour of its pixel.
//!
//! The Mandelbrot set uses the same loop with the roles swapped: every
//! orbit starts at zero and the point of the plane is the constant.
//!
//! Animations hold everything fixed but one quantity, the constant,
//! the iteration budget, or the region of the plane, and sweep it
//! across frames.

extern crate crossbeam;
extern crate image;
extern crate itertools;
extern crate num;
extern crate png;
#[macro_use]
extern crate log;

pub mod animation;
pub mod attractor;
pub mod config;
pub mod error;
pub mod escape;
pub mod expr;
pub mod mapping;
pub mod output;
pub mod palette;
pub mod planes;
pub mod render;

pub use animation::{build_animation, FrameSequence, Sweep};
pub use attractor::Attractor;
pub use config::RenderParams;
pub use error::FractalError;
pub use escape::{evaluate, evaluate_mandelbrot, EscapeField, Evaluator, Mode};
pub use mapping::{map_to_rgb, Transform};
pub use planes::{build_grid, Bounds, Resolution, SampleGrid};
