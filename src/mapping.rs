// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turns an escape field into pixels.
//!
//! Before colouring, the counts may be reshaped by a chain of
//! transforms (easing, reversal, cut-offs, colour cycling).  Colouring
//! then divides each count by the iteration budget and samples a named
//! palette at that fraction, or, in the darker mode, the channel-wise
//! minimum of the palette and its reverse.

use crate::error::{FractalError, Result};
use crate::escape::EscapeField;
use crate::palette::Palette;
use image::{Rgb, RgbImage};
use std::fmt;
use std::str::FromStr;

/// One step of count post-processing.  Every transform keeps counts
/// within `[0, budget - 1]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Transform {
    /// Square-root easing, `floor(sqrt(n / budget) * budget)`.  Pulls
    /// slow-escaping detail apart from the fast background.
    Root,
    /// Mirrors the counts, `budget - 1 - n`.
    Reverse,
    /// Zeroes every count below the threshold.
    Cut(u32),
    /// `n % m`; bands the image.
    Modulo(u32),
    /// `n + k`, saturating at `budget - 1`.
    Add(u32),
    /// `(n + k) % budget`; cycles the palette.
    Shift(u32),
}

impl Transform {
    /// Applies the transform to one count.
    pub fn apply(self, n: u32, budget: u32) -> u32 {
        let top = budget.saturating_sub(1);
        let n = n.min(top);
        match self {
            Transform::Root => {
                let b = f64::from(budget);
                ((f64::from(n) / b).sqrt() * b).floor().min(f64::from(top)) as u32
            }
            Transform::Reverse => top - n,
            Transform::Cut(threshold) => {
                if n < threshold {
                    0
                } else {
                    n
                }
            }
            Transform::Modulo(m) => n % m.max(1),
            Transform::Add(k) => n.saturating_add(k).min(top),
            Transform::Shift(k) => ((u64::from(n) + u64::from(k)) % u64::from(budget.max(1))) as u32,
        }
    }
}

impl FromStr for Transform {
    type Err = FractalError;

    fn from_str(s: &str) -> Result<Transform> {
        let unknown = || FractalError::UnknownTransform(s.to_string());
        let mut words = s.split_whitespace();
        let name = words.next().ok_or_else(unknown)?;
        let argument = match words.next() {
            Some(word) => Some(word.parse::<u32>().map_err(|_| unknown())?),
            None => None,
        };
        if words.next().is_some() {
            return Err(unknown());
        }
        match (name, argument) {
            ("root", None) => Ok(Transform::Root),
            ("rev", None) => Ok(Transform::Reverse),
            ("cut", Some(n)) => Ok(Transform::Cut(n)),
            ("mod", Some(n)) if n > 0 => Ok(Transform::Modulo(n)),
            ("add", Some(n)) => Ok(Transform::Add(n)),
            ("shift", Some(n)) => Ok(Transform::Shift(n)),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Transform::Root => write!(f, "root"),
            Transform::Reverse => write!(f, "rev"),
            Transform::Cut(n) => write!(f, "cut {}", n),
            Transform::Modulo(n) => write!(f, "mod {}", n),
            Transform::Add(n) => write!(f, "add {}", n),
            Transform::Shift(n) => write!(f, "shift {}", n),
        }
    }
}

/// Runs the transforms over a copy of `field`, in order.
pub fn apply_transforms(field: &EscapeField, transforms: &[Transform], budget: u32) -> EscapeField {
    let mut out = field.clone();
    for transform in transforms {
        for n in out.counts_mut() {
            *n = transform.apply(*n, budget);
        }
    }
    out
}

fn check_budget(budget: u32) -> Result<()> {
    if budget == 0 {
        return Err(FractalError::InvalidParameter(
            "iteration budget must be positive".to_string(),
        ));
    }
    Ok(())
}

/// Colours `field` with the palette `palette_name`.  The palette is
/// resolved before anything is allocated.
pub fn map_to_rgb(field: &EscapeField, iteration_budget: u32, palette_name: &str) -> Result<RgbImage> {
    let palette = Palette::lookup(palette_name)?;
    check_budget(iteration_budget)?;
    let mut image = RgbImage::new(field.width() as u32, field.height() as u32);
    paint(field, iteration_budget, &palette, false, &mut image);
    Ok(image)
}

/// As `map_to_rgb`, but every cell takes the darker of the palette and
/// its reverse, channel by channel.
pub fn map_to_rgb_darker(
    field: &EscapeField,
    iteration_budget: u32,
    palette_name: &str,
) -> Result<RgbImage> {
    let palette = Palette::lookup(palette_name)?;
    check_budget(iteration_budget)?;
    let mut image = RgbImage::new(field.width() as u32, field.height() as u32);
    paint(field, iteration_budget, &palette, true, &mut image);
    Ok(image)
}

/// As `map_to_rgb`, writing into an existing image.  Palette, budget
/// and shape are all checked before the first pixel is written.
pub fn map_to_rgb_into(
    field: &EscapeField,
    iteration_budget: u32,
    palette_name: &str,
    image: &mut RgbImage,
) -> Result<()> {
    let palette = Palette::lookup(palette_name)?;
    check_budget(iteration_budget)?;
    let found = (image.height() as usize, image.width() as usize);
    if found != field.shape() {
        return Err(FractalError::ShapeMismatch {
            expected: field.shape(),
            found,
        });
    }
    paint(field, iteration_budget, &palette, false, image);
    Ok(())
}

fn paint(field: &EscapeField, budget: u32, palette: &Palette, darker: bool, image: &mut RgbImage) {
    let budget = f64::from(budget);
    for (pixel, &count) in image.pixels_mut().zip(field.counts()) {
        let t = f64::from(count) / budget;
        *pixel = Rgb(if darker {
            palette.sample_darker(t)
        } else {
            palette.sample(t)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> EscapeField {
        EscapeField::from_counts(2, 4, (0..8).collect()).unwrap()
    }

    #[test]
    fn output_has_field_shape() {
        let image = map_to_rgb(&ramp(), 8, "viridis").unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.into_raw().len(), 4 * 2 * 3);
    }

    #[test]
    fn cells_sample_palette_at_count_over_budget() {
        let image = map_to_rgb(&ramp(), 8, "gray").unwrap();
        let gray = Palette::lookup("gray").unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(3, 1), &Rgb(gray.sample(7.0 / 8.0)));
        assert_eq!(image.get_pixel(0, 1), &Rgb(gray.sample(0.5)));
    }

    #[test]
    fn darker_mapping_folds_the_palette_over() {
        let image = map_to_rgb_darker(&ramp(), 8, "gray").unwrap();
        let gray = Palette::lookup("gray").unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(2, 0), &Rgb(gray.sample(0.25)));
        // count 6 of 8 mirrors count 2
        assert_eq!(image.get_pixel(2, 1), image.get_pixel(2, 0));
        assert_ne!(image, map_to_rgb(&ramp(), 8, "gray").unwrap());
        assert!(map_to_rgb_darker(&ramp(), 8, "nope").is_err());
    }

    #[test]
    fn unknown_palette_leaves_buffer_untouched() {
        let mut image = RgbImage::from_pixel(4, 2, Rgb([1, 2, 3]));
        match map_to_rgb_into(&ramp(), 8, "not-a-palette", &mut image) {
            Err(FractalError::UnknownPalette(_)) => {}
            other => panic!("expected UnknownPalette, got {:?}", other),
        }
        assert!(image.pixels().all(|p| *p == Rgb([1, 2, 3])));
        assert!(map_to_rgb(&ramp(), 8, "not-a-palette").is_err());
    }

    #[test]
    fn mismatched_buffer_is_rejected() {
        let mut image = RgbImage::new(3, 3);
        match map_to_rgb_into(&ramp(), 8, "gray", &mut image) {
            Err(FractalError::ShapeMismatch { .. }) => {}
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn transforms_parse_and_print() {
        for text in &["root", "rev", "cut 10", "mod 7", "add 3", "shift 12"] {
            let t: Transform = text.parse().unwrap();
            assert_eq!(&t.to_string(), text);
        }
        for text in &["", "cut", "mod 0", "root 3", "plt viridis", "add x", "cut 1 2"] {
            assert!(text.parse::<Transform>().is_err(), "{} should not parse", text);
        }
    }

    #[test]
    fn transforms_stay_in_range() {
        let budget = 16;
        let all = [
            Transform::Root,
            Transform::Reverse,
            Transform::Cut(5),
            Transform::Modulo(3),
            Transform::Add(40),
            Transform::Shift(9),
        ];
        for t in &all {
            for n in 0..budget {
                assert!(t.apply(n, budget) < budget, "{} took {} out of range", t, n);
            }
        }
        assert_eq!(Transform::Root.apply(4, 16), 8);
        assert_eq!(Transform::Reverse.apply(0, 16), 15);
        assert_eq!(Transform::Cut(5).apply(4, 16), 0);
        assert_eq!(Transform::Cut(5).apply(5, 16), 5);
        assert_eq!(Transform::Shift(9).apply(10, 16), 3);
    }

    #[test]
    fn transform_chain_runs_in_order() {
        let field = ramp();
        let out = apply_transforms(&field, &[Transform::Add(2), Transform::Modulo(4)], 8);
        assert_eq!(out.counts(), &[2, 3, 0, 1, 2, 3, 3, 3]);
        assert_eq!(field.counts()[0], 0);
    }
}
