// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The error taxonomy shared by every stage of the renderer.  All of
//! these are configuration errors: they are raised at the call
//! boundary, before any iteration begins, and nothing retries them.

use failure::Fail;

/// Everything that can go wrong while building a grid, evaluating a
/// field, colorizing it, or writing it out.
#[derive(Debug, Fail)]
pub enum FractalError {
    /// A non-positive iteration budget, divergence threshold, thread
    /// count, or an empty sweep.
    #[fail(display = "invalid parameter: {}", _0)]
    InvalidParameter(String),

    /// Inverted, degenerate, or non-finite complex plane bounds.
    #[fail(display = "invalid range: {}", _0)]
    InvalidRange(String),

    /// A zero pixel dimension.
    #[fail(display = "invalid resolution: {}x{}", width, height)]
    InvalidResolution {
        /// Requested width in pixels.
        width: usize,
        /// Requested height in pixels.
        height: usize,
    },

    /// The palette name did not resolve to a known colormap.
    #[fail(display = "unknown palette: {}", _0)]
    UnknownPalette(String),

    /// Two arrays that must agree in shape (rows, columns) did not.
    #[fail(
        display = "shape mismatch: expected {:?}, found {:?}",
        expected, found
    )]
    ShapeMismatch {
        /// The shape of the grid.
        expected: (usize, usize),
        /// The shape of the buffer handed in.
        found: (usize, usize),
    },

    /// The attractor expression could not be compiled.
    #[fail(display = "invalid expression at {}: {}", position, message)]
    InvalidExpression {
        /// Byte offset into the source text.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// A field transform string that names no known transform.
    #[fail(display = "unknown transform: {}", _0)]
    UnknownTransform(String),

    /// Writing an image failed.
    #[fail(display = "image error: {}", _0)]
    Image(#[cause] image::ImageError),

    /// Encoding a PNG still failed.
    #[fail(display = "png error: {}", _0)]
    Png(#[cause] png::EncodingError),

    /// Creating an output file failed.
    #[fail(display = "i/o error: {}", _0)]
    Io(#[cause] std::io::Error),
}

impl From<image::ImageError> for FractalError {
    fn from(e: image::ImageError) -> Self {
        FractalError::Image(e)
    }
}

impl From<png::EncodingError> for FractalError {
    fn from(e: png::EncodingError) -> Self {
        FractalError::Png(e)
    }
}

impl From<std::io::Error> for FractalError {
    fn from(e: std::io::Error) -> Self {
        FractalError::Io(e)
    }
}

/// Shorthand used throughout the library.
pub type Result<T> = std::result::Result<T, FractalError>;
