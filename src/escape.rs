// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Escape-time evaluation.
//!
//! Every sample on the grid is fed through the attractor over and
//! over.  A sample is "active" for as long as the magnitude of its
//! orbit stays at or below the divergence threshold, and its escape
//! count is the number of steps it stayed active.  All samples advance
//! in lock step: one step is applied to every active sample, the mask
//! is recomputed, and the counts of the survivors go up by one.  Once
//! nothing is active the loop stops; finishing the budget would not
//! change a single count, since inactive samples neither move nor
//! count.
//!
//! A sample that never escapes ends the loop with a count equal to the
//! budget, and is then pulled down to `budget - 1` so that an 8-bit
//! (or `budget`-wide) encoding never wraps it to zero.  That makes a
//! sample that never escapes indistinguishable from one that escapes
//! on the very last step.  It is kept for compatibility with images
//! already rendered this way.

use crate::attractor::Attractor;
use crate::error::{FractalError, Result};
use crate::planes::SampleGrid;
use crossbeam::thread::ScopedJoinHandle;
use num::Complex;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// How the grid is fed to the attractor.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Mode {
    /// Orbits start at the grid sample; the parameter is fixed.
    Julia,
    /// Orbits start at zero; the grid sample is the parameter.
    Mandelbrot,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Julia
    }
}

/// A row-major H×W field of escape counts.
#[derive(Clone, Debug, PartialEq)]
pub struct EscapeField {
    width: usize,
    height: usize,
    counts: Vec<u32>,
}

impl EscapeField {
    /// A zeroed field of the given shape.
    pub fn zeros(height: usize, width: usize) -> EscapeField {
        EscapeField {
            width,
            height,
            counts: vec![0; width * height],
        }
    }

    /// Wraps existing counts.  Fails unless `counts` holds exactly
    /// `height * width` values; the error reports the counts as the
    /// single row they arrived in.
    pub fn from_counts(height: usize, width: usize, counts: Vec<u32>) -> Result<EscapeField> {
        if counts.len() != width * height {
            return Err(FractalError::ShapeMismatch {
                expected: (height, width),
                found: (1, counts.len()),
            });
        }
        Ok(EscapeField {
            width,
            height,
            counts,
        })
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The count at `row`, `column`.
    pub fn get(&self, row: usize, column: usize) -> Option<u32> {
        if row >= self.height || column >= self.width {
            return None;
        }
        Some(self.counts[row * self.width + column])
    }

    /// All counts, row-major.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// All counts, row-major, mutably.
    pub fn counts_mut(&mut self) -> &mut [u32] {
        &mut self.counts
    }

    /// The largest count present, or 0 for an empty field.
    pub fn max(&self) -> u32 {
        self.counts.iter().cloned().max().unwrap_or(0)
    }

    /// How many cells hold each distinct count, in count order.
    pub fn histogram(&self) -> BTreeMap<u32, usize> {
        let mut histogram = BTreeMap::new();
        for &count in &self.counts {
            *histogram.entry(count).or_insert(0) += 1;
        }
        histogram
    }
}

fn validate(budget: u32, threshold: f64) -> Result<()> {
    if budget == 0 {
        return Err(FractalError::InvalidParameter(
            "iteration budget must be positive".to_string(),
        ));
    }
    if !(threshold > 0.0) || !threshold.is_finite() {
        return Err(FractalError::InvalidParameter(format!(
            "divergence threshold must be a positive number, got {}",
            threshold
        )));
    }
    Ok(())
}

/// The lock-step loop over one block of samples.  `z` holds the
/// starting orbit values and `parameter` yields the parameter for each
/// sample; `counts` must be zeroed.  With `early_exit` off the loop
/// always runs the whole budget.
fn iterate_block<P>(
    attractor: &Attractor,
    mut z: Vec<Complex<f64>>,
    parameter: P,
    budget: u32,
    threshold: f64,
    counts: &mut [u32],
    early_exit: bool,
) where
    P: Fn(usize) -> Complex<f64>,
{
    let mut active = vec![true; z.len()];
    for _ in 0..budget {
        let mut remaining = 0;
        for (i, zi) in z.iter_mut().enumerate() {
            if !active[i] {
                continue;
            }
            *zi = attractor.apply(*zi, parameter(i));
            // NaN compares false and counts as escaped
            active[i] = zi.norm() <= threshold;
            if active[i] {
                counts[i] += 1;
                remaining += 1;
            }
        }
        if early_exit && remaining == 0 {
            break;
        }
    }
    for count in counts.iter_mut() {
        if *count == budget {
            *count = budget - 1;
        }
    }
}

fn iterate_rows(
    grid_rows: &[Complex<f64>],
    attractor: &Attractor,
    parameter: Complex<f64>,
    mode: Mode,
    budget: u32,
    threshold: f64,
    counts: &mut [u32],
    early_exit: bool,
) {
    match mode {
        Mode::Julia => iterate_block(
            attractor,
            grid_rows.to_vec(),
            |_| parameter,
            budget,
            threshold,
            counts,
            early_exit,
        ),
        Mode::Mandelbrot => iterate_block(
            attractor,
            vec![Complex::new(0.0, 0.0); grid_rows.len()],
            |i| grid_rows[i],
            budget,
            threshold,
            counts,
            early_exit,
        ),
    }
}

/// Evaluates the Julia escape field of `attractor` at `parameter`
/// over `grid`.
pub fn evaluate(
    grid: &SampleGrid,
    attractor: &Attractor,
    parameter: Complex<f64>,
    iteration_budget: u32,
    divergence_threshold: f64,
) -> Result<EscapeField> {
    Evaluator::new(iteration_budget, divergence_threshold)?.evaluate(grid, attractor, parameter)
}

/// As `evaluate`, writing into a caller-owned field.  The field is
/// zeroed first; its shape must match the grid.
pub fn evaluate_into(
    grid: &SampleGrid,
    attractor: &Attractor,
    parameter: Complex<f64>,
    iteration_budget: u32,
    divergence_threshold: f64,
    field: &mut EscapeField,
) -> Result<()> {
    Evaluator::new(iteration_budget, divergence_threshold)?.evaluate_into(
        grid, attractor, parameter, field,
    )
}

/// Evaluates the Mandelbrot escape field: every orbit starts at zero
/// and the grid sample is bound as the parameter.
pub fn evaluate_mandelbrot(
    grid: &SampleGrid,
    attractor: &Attractor,
    iteration_budget: u32,
    divergence_threshold: f64,
) -> Result<EscapeField> {
    Evaluator::new(iteration_budget, divergence_threshold)?
        .mode(Mode::Mandelbrot)
        .evaluate(grid, attractor, Complex::new(0.0, 0.0))
}

/// The per-pixel form: the escape count of a single orbit starting at
/// `z0`.  Agrees with the matching cell of `evaluate`.
pub fn escape_time(
    z0: Complex<f64>,
    attractor: &Attractor,
    parameter: Complex<f64>,
    iteration_budget: u32,
    divergence_threshold: f64,
) -> Result<u32> {
    validate(iteration_budget, divergence_threshold)?;
    let mut z = z0;
    for n in 0..iteration_budget {
        z = attractor.apply(z, parameter);
        if !(z.norm() <= divergence_threshold) {
            return Ok(n);
        }
    }
    Ok(iteration_budget - 1)
}

/// A validated evaluation setup: budget, threshold, mode and the
/// number of worker threads.  Once built it is only read.
#[derive(Copy, Clone, Debug)]
pub struct Evaluator {
    budget: u32,
    threshold: f64,
    mode: Mode,
    threads: usize,
    early_exit: bool,
}

impl Evaluator {
    /// Fails with `InvalidParameter` on a zero budget or a threshold
    /// that is not a positive number.
    pub fn new(iteration_budget: u32, divergence_threshold: f64) -> Result<Evaluator> {
        validate(iteration_budget, divergence_threshold)?;
        Ok(Evaluator {
            budget: iteration_budget,
            threshold: divergence_threshold,
            mode: Mode::Julia,
            threads: 1,
            early_exit: true,
        })
    }

    /// Selects Julia or Mandelbrot iteration.
    pub fn mode(mut self, mode: Mode) -> Evaluator {
        self.mode = mode;
        self
    }

    /// Splits the grid into row blocks and evaluates them on `threads`
    /// workers.  The output does not depend on the thread count.
    pub fn threads(mut self, threads: usize) -> Result<Evaluator> {
        if threads == 0 {
            return Err(FractalError::InvalidParameter(
                "thread count must be positive".to_string(),
            ));
        }
        self.threads = threads;
        Ok(self)
    }

    /// Turns the early exit on or off.  Only useful for checking that
    /// it changes nothing.
    pub fn early_exit(mut self, early_exit: bool) -> Evaluator {
        self.early_exit = early_exit;
        self
    }

    /// The iteration budget.
    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Evaluates into a freshly allocated field.
    pub fn evaluate(
        &self,
        grid: &SampleGrid,
        attractor: &Attractor,
        parameter: Complex<f64>,
    ) -> Result<EscapeField> {
        let (height, width) = grid.shape();
        let mut field = EscapeField::zeros(height, width);
        self.evaluate_into(grid, attractor, parameter, &mut field)?;
        Ok(field)
    }

    /// Evaluates into `field`, which must have the grid's shape.
    pub fn evaluate_into(
        &self,
        grid: &SampleGrid,
        attractor: &Attractor,
        parameter: Complex<f64>,
        field: &mut EscapeField,
    ) -> Result<()> {
        if field.shape() != grid.shape() {
            return Err(FractalError::ShapeMismatch {
                expected: grid.shape(),
                found: field.shape(),
            });
        }
        for count in field.counts.iter_mut() {
            *count = 0;
        }
        trace!(
            "evaluating {:?} grid ({} samples), {:?} mode, budget {}, threshold {}, {} thread(s)",
            grid.shape(),
            grid.len(),
            self.mode,
            self.budget,
            self.threshold,
            self.threads
        );
        if self.threads <= 1 || grid.height() < 2 {
            iterate_rows(
                grid.points(),
                attractor,
                parameter,
                self.mode,
                self.budget,
                self.threshold,
                &mut field.counts,
                self.early_exit,
            );
            return Ok(());
        }
        self.evaluate_threaded(grid, attractor, parameter, field);
        Ok(())
    }

    // Hands out row blocks from a shared queue; each block owns a
    // disjoint slice of the output, so no result merging is needed.
    fn evaluate_threaded(
        &self,
        grid: &SampleGrid,
        attractor: &Attractor,
        parameter: Complex<f64>,
        field: &mut EscapeField,
    ) {
        let width = grid.width();
        let rows_per_block = (grid.height() / (self.threads * 4)).max(1);
        let block_len = rows_per_block * width;
        let blocks: Vec<(&[Complex<f64>], &mut [u32])> = grid
            .points()
            .chunks(block_len)
            .zip(field.counts.chunks_mut(block_len))
            .collect();
        let queue = Arc::new(Mutex::new(blocks.into_iter()));
        let this = *self;
        crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<()>> = (0..self.threads)
                .map(|_| {
                    let queue = queue.clone();
                    spawner.spawn(move |_| loop {
                        let block = { queue.lock().unwrap().next() };
                        match block {
                            Some((points, counts)) => iterate_rows(
                                points,
                                attractor,
                                parameter,
                                this.mode,
                                this.budget,
                                this.threshold,
                                counts,
                                this.early_exit,
                            ),
                            None => {
                                break;
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
        })
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::build_grid;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn quadratic() -> Attractor {
        Attractor::quadratic()
    }

    fn small_grid() -> SampleGrid {
        build_grid(-1.6, 1.6, -1.2, 1.2, 48, 36).unwrap()
    }

    #[test]
    fn rejects_zero_budget_and_threshold() {
        let grid = small_grid();
        let p = Complex::new(-0.8, 0.156);
        match evaluate(&grid, &quadratic(), p, 0, 2.0) {
            Err(FractalError::InvalidParameter(_)) => {}
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
        match evaluate(&grid, &quadratic(), p, 64, 0.0) {
            Err(FractalError::InvalidParameter(_)) => {}
            other => panic!("expected InvalidParameter, got {:?}", other),
        }
        assert!(evaluate(&grid, &quadratic(), p, 64, -1.0).is_err());
        assert!(evaluate(&grid, &quadratic(), p, 64, std::f64::NAN).is_err());
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let grid = small_grid();
        let mut field = EscapeField::zeros(10, 10);
        match evaluate_into(&grid, &quadratic(), Complex::new(0.0, 0.0), 32, 2.0, &mut field) {
            Err(FractalError::ShapeMismatch {
                expected: (36, 48),
                found: (10, 10),
            }) => {}
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn counts_stay_below_budget() {
        let grid = small_grid();
        for &budget in &[1, 2, 7, 256] {
            let field = evaluate(&grid, &quadratic(), Complex::new(-0.8, 0.156), budget, 2.0)
                .unwrap();
            assert_eq!(field.shape(), grid.shape());
            assert!(field.counts().iter().all(|&c| c <= budget - 1));
        }
    }

    #[test]
    fn first_escape_at_step_k_records_k() {
        // z -> 2z from z0 = 1 with threshold 2^k - 0.5 first exceeds
        // the threshold after k + 1 doublings, that is at step k.
        let doubling = Attractor::from_fn(|z, _| z * 2.0);
        let grid = build_grid(1.0, 2.0, -1.0, 0.0, 2, 1).unwrap();
        for k in 0..10u32 {
            let threshold = 2f64.powi(k as i32 + 1) - 0.5;
            let field = evaluate(&grid, &doubling, Complex::new(0.0, 0.0), 64, threshold).unwrap();
            assert_eq!(field.get(0, 0), Some(k));
        }
    }

    #[test]
    fn never_escaping_points_record_budget_minus_one() {
        let identity = Attractor::from_fn(|z, _| z);
        let grid = build_grid(-0.5, 0.5, -0.5, 0.5, 4, 4).unwrap();
        let field = evaluate(&grid, &identity, Complex::new(0.0, 0.0), 100, 2.0).unwrap();
        assert!(field.counts().iter().all(|&c| c == 99));
    }

    #[test]
    fn budget_of_one_yields_zero_everywhere() {
        let field = evaluate(&small_grid(), &quadratic(), Complex::new(0.0, 0.0), 1, 2.0).unwrap();
        assert!(field.counts().iter().all(|&c| c == 0));
    }

    #[test]
    fn early_exit_is_bit_identical_to_full_loop() {
        let grid = small_grid();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let attractors = vec![
            quadratic(),
            Attractor::parse("z^3 + const").unwrap(),
            Attractor::parse("exp(z) + const").unwrap(),
        ];
        for attractor in &attractors {
            for _ in 0..4 {
                let p = Complex::new(rng.gen_range(-1.0, 1.0), rng.gen_range(-1.0, 1.0));
                let budget = rng.gen_range(1, 120);
                let threshold = rng.gen_range(0.5, 10.0);
                let fast = Evaluator::new(budget, threshold).unwrap();
                let full = fast.early_exit(false);
                assert_eq!(
                    fast.evaluate(&grid, attractor, p).unwrap(),
                    full.evaluate(&grid, attractor, p).unwrap()
                );
            }
        }
    }

    #[test]
    fn evaluation_is_idempotent() {
        let grid = small_grid();
        let p = Complex::new(0.285, 0.01);
        let a = evaluate(&grid, &quadratic(), p, 200, 2.0).unwrap();
        let b = evaluate(&grid, &quadratic(), p, 200, 2.0).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn threaded_matches_single_threaded() {
        let grid = build_grid(-1.6, 1.6, -1.2, 1.2, 33, 29).unwrap();
        let p = Complex::new(-0.4, 0.6);
        let single = Evaluator::new(150, 2.0).unwrap();
        let expected = single.evaluate(&grid, &quadratic(), p).unwrap();
        for &threads in &[2, 3, 8] {
            let threaded = single.threads(threads).unwrap();
            assert_eq!(threaded.evaluate(&grid, &quadratic(), p).unwrap(), expected);
        }
        assert!(single.threads(0).is_err());
    }

    #[test]
    fn scalar_form_agrees_with_field() {
        let grid = small_grid();
        let p = Complex::new(-0.8, 0.156);
        let field = evaluate(&grid, &quadratic(), p, 80, 2.0).unwrap();
        for row in 0..grid.height() {
            for column in 0..grid.width() {
                let z0 = grid.get(row, column).unwrap();
                assert_eq!(
                    Some(escape_time(z0, &quadratic(), p, 80, 2.0).unwrap()),
                    field.get(row, column)
                );
            }
        }
    }

    #[test]
    fn mandelbrot_mode_keeps_origin_and_ejects_far_points() {
        let grid = build_grid(-2.0, 2.0, -2.0, 2.0, 5, 5).unwrap();
        let field = evaluate_mandelbrot(&grid, &quadratic(), 50, 2.0).unwrap();
        // centre sample is c = 0, which never escapes
        assert_eq!(field.get(2, 2), Some(49));
        // corner sample is c = -2+2i, gone after the first step
        assert_eq!(field.get(0, 0), Some(0));
    }

    #[test]
    fn histogram_counts_every_cell() {
        let field = EscapeField::from_counts(2, 3, vec![0, 1, 1, 5, 5, 5]).unwrap();
        let histogram = field.histogram();
        assert_eq!(histogram.get(&0), Some(&1));
        assert_eq!(histogram.get(&1), Some(&2));
        assert_eq!(histogram.get(&5), Some(&3));
        assert_eq!(histogram.values().sum::<usize>(), 6);
        assert_eq!(field.max(), 5);
    }

    #[test]
    fn short_counts_report_the_length_given() {
        match EscapeField::from_counts(2, 3, vec![0; 5]) {
            Err(FractalError::ShapeMismatch {
                expected: (2, 3),
                found: (1, 5),
            }) => {}
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn huge_thresholds_still_eject_points_beyond_them() {
        let identity = Attractor::from_fn(|z, _| z);
        let p = Complex::new(0.0, 0.0);
        let outside = build_grid(1e170, 2e170, -1.0, 1.0, 2, 2).unwrap();
        let field = evaluate(&outside, &identity, p, 10, 1e160).unwrap();
        assert_eq!(field.counts(), &[0, 0, 0, 0]);
        assert_eq!(escape_time(Complex::new(1e170, 0.0), &identity, p, 10, 1e160).unwrap(), 0);

        let inside = build_grid(1e150, 2e150, -1.0, 1.0, 2, 2).unwrap();
        let field = evaluate(&inside, &identity, p, 10, 1e160).unwrap();
        assert_eq!(field.counts(), &[9, 9, 9, 9]);
    }

    #[test]
    fn tiny_thresholds_eject_points_just_beyond_them() {
        let identity = Attractor::from_fn(|z, _| z);
        let p = Complex::new(0.0, 0.0);
        let grid = build_grid(5e-170, 6e-170, -1e-200, 1e-200, 2, 2).unwrap();
        let field = evaluate(&grid, &identity, p, 10, 1e-170).unwrap();
        assert_eq!(field.counts(), &[0, 0, 0, 0]);
        assert_eq!(escape_time(Complex::new(1e-171, 0.0), &identity, p, 10, 1e-170).unwrap(), 9);
    }
}
