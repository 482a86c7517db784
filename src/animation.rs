// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Animations are built by sweeping one quantity across frames while
//! everything else stays fixed: the attractor parameter, the
//! iteration budget, the region of the plane being sampled, or the
//! offset by which the colours are cycled.  A colour cycle needs only
//! one evaluation; every frame recolours the same field.
//!
//! No frame depends on any other, so frames are handed out to worker
//! threads from a shared queue.  The output is preallocated with one
//! slot per sweep value and each worker writes only the slot it took,
//! which keeps the frames in sweep order whatever the scheduling.

use crate::attractor::Attractor;
use crate::config::RenderParams;
use crate::error::{FractalError, Result};
use crate::escape::EscapeField;
use crate::palette::Palette;
use crate::planes::{Bounds, SampleGrid};
use crate::render::{colorize, render, render_field};
use crossbeam::thread::ScopedJoinHandle;
use image::RgbImage;
use num::Complex;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex};

/// The quantity varied from frame to frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Sweep {
    /// One attractor parameter per frame; the budget is fixed.
    Parameter(Vec<Complex<f64>>),
    /// One iteration budget per frame; the parameter is fixed.
    Budget(Vec<u32>),
    /// One region of the plane per frame, sampled at the grid's
    /// resolution; parameter and budget are fixed.
    Zoom(Vec<Bounds>),
    /// One colour shift per frame.  The field is evaluated once and
    /// each frame cycles its counts, `(n + shift) % budget`, before the
    /// configured transforms and palette.
    ColorShift(Vec<u32>),
}

impl Sweep {
    /// Number of frames the sweep produces.
    pub fn len(&self) -> usize {
        match self {
            Sweep::Parameter(v) => v.len(),
            Sweep::Budget(v) => v.len(),
            Sweep::Zoom(v) => v.len(),
            Sweep::ColorShift(v) => v.len(),
        }
    }

    /// True for a sweep without frames.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(FractalError::InvalidParameter(
                "a sweep needs at least one frame".to_string(),
            ));
        }
        match self {
            Sweep::Parameter(values) => {
                if let Some(p) = values.iter().find(|p| !p.re.is_finite() || !p.im.is_finite()) {
                    return Err(FractalError::InvalidParameter(format!(
                        "sweep parameter {} is not finite",
                        p
                    )));
                }
            }
            Sweep::Budget(values) => {
                if values.contains(&0) {
                    return Err(FractalError::InvalidParameter(
                        "iteration budget must be positive".to_string(),
                    ));
                }
            }
            Sweep::Zoom(values) => {
                for bounds in values {
                    bounds.validate()?;
                }
            }
            Sweep::ColorShift(_) => {}
        }
        Ok(())
    }
}

/// `n` parameters of modulus `magnitude`, at angles `2πk/n` for `k`
/// in `0..n`.
pub fn circle_sweep(magnitude: f64, n: usize) -> Vec<Complex<f64>> {
    (0..n)
        .map(|k| Complex::from_polar(&magnitude, &(2.0 * PI * k as f64 / n as f64)))
        .collect()
}

/// `n` parameters walking once around the origin, starting from
/// `start`.
pub fn circle_sweep_around(start: Complex<f64>, n: usize) -> Vec<Complex<f64>> {
    (0..n)
        .map(|k| start * Complex::from_polar(&1.0, &(2.0 * PI * k as f64 / n as f64)))
        .collect()
}

/// `n` budgets spaced evenly in log2 space from `2^start_exp`
/// towards `2^end_exp`, the end excluded, truncated to integers.
pub fn log2_budget_sweep(start_exp: f64, end_exp: f64, n: usize) -> Vec<u32> {
    (0..n)
        .map(|k| {
            let exp = start_exp + (end_exp - start_exp) * k as f64 / n as f64;
            (2f64.powf(exp) as u32).max(1)
        })
        .collect()
}

/// `n` budgets evenly spaced from `start` to `end`, both included.
pub fn linear_budget_sweep(start: u32, end: u32, n: usize) -> Vec<u32> {
    if n == 1 {
        return vec![start.max(1)];
    }
    (0..n)
        .map(|k| {
            let t = k as f64 / (n - 1) as f64;
            ((f64::from(start) + (f64::from(end) - f64::from(start)) * t) as u32).max(1)
        })
        .collect()
}

/// `n` colour shifts, `0, step, 2 * step, ...`.
pub fn color_shift_sweep(step: u32, n: usize) -> Vec<u32> {
    (0..n).map(|k| step.saturating_mul(k as u32)).collect()
}

/// `n` regions moving from near `start` to exactly `end`.  Steps
/// shrink geometrically, so a zoom into a small region slows down as
/// it gets closer.
pub fn zoom_sweep(start: Bounds, end: Bounds, n: usize) -> Vec<Bounds> {
    if n == 0 {
        return vec![];
    }
    let steps: Vec<f64> = (0..n)
        .map(|k| {
            let t = if n == 1 { 0.0 } else { k as f64 / (n - 1) as f64 };
            10_000f64.powf(t)
        })
        .rev()
        .collect();
    let total: f64 = steps.iter().sum();
    let mut travelled = 0.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            travelled += step / total;
            let t = if i + 1 == n { 1.0 } else { travelled.min(1.0) };
            start.lerp(&end, t)
        })
        .collect()
}

/// Rendered frames, in sweep order, with the display time of each.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    frames: Vec<RgbImage>,
    frame_duration: u32,
}

impl FrameSequence {
    /// The frames.
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    /// Per-frame display time in milliseconds.
    pub fn frame_duration(&self) -> u32 {
        self.frame_duration
    }

    /// Frame count.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Gives up the frames.
    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

struct FrameJob<'a> {
    grid: &'a SampleGrid,
    attractor: &'a Attractor,
    sweep: &'a Sweep,
    params: &'a RenderParams,
    parameter: Complex<f64>,
    field: Option<EscapeField>,
}

impl<'a> FrameJob<'a> {
    fn render(&self, index: usize) -> Result<RgbImage> {
        match self.sweep {
            Sweep::Parameter(values) => render(self.params, self.grid, self.attractor, values[index]),
            Sweep::Budget(values) => {
                let params = self.params.with_budget(values[index])?;
                render(&params, self.grid, self.attractor, self.parameter)
            }
            Sweep::Zoom(values) => {
                let params = RenderParams {
                    resolution: self.grid.resolution(),
                    ..self.params.with_bounds(values[index])?
                };
                render(&params, &params.grid()?, self.attractor, self.parameter)
            }
            Sweep::ColorShift(values) => match self.field {
                Some(ref field) => colorize(&self.params.with_color_shift(values[index]), field),
                None => Err(FractalError::InvalidParameter(
                    "colour shift frames need an evaluated field".to_string(),
                )),
            },
        }
    }
}

/// Renders one frame per sweep value.
///
/// `params` supplies everything the sweep does not vary: the budget
/// for parameter and zoom sweeps, the threshold, palette, transforms
/// and mode, and the number of frames rendered at once.  `parameter`
/// is the fixed parameter for budget, zoom and colour shift sweeps.
/// Each frame is evaluated on a single thread, apart from the shared
/// field of a colour shift, which uses every thread `params` allows.
/// Everything is validated before the first frame is rendered.
pub fn build_animation(
    grid: &SampleGrid,
    attractor: &Attractor,
    sweep: &Sweep,
    params: &RenderParams,
    parameter: Complex<f64>,
    frame_duration: u32,
) -> Result<FrameSequence> {
    sweep.validate()?;
    Palette::lookup(&params.palette)?;
    params.evaluator()?;
    let field = match sweep {
        Sweep::ColorShift(_) => {
            debug!("evaluating the field shared by every frame");
            Some(render_field(params, grid, attractor, parameter)?)
        }
        _ => None,
    };
    let frame_params = RenderParams {
        threads: 1,
        ..params.clone()
    };
    let job = FrameJob {
        grid,
        attractor,
        sweep,
        params: &frame_params,
        parameter,
        field,
    };

    let count = sweep.len();
    info!("rendering {} frame(s) on {} thread(s)", count, params.threads);
    let mut slots: Vec<Option<Result<RgbImage>>> = (0..count).map(|_| None).collect();

    if params.threads <= 1 {
        for (index, slot) in slots.iter_mut().enumerate() {
            debug!("frame {}/{}", index + 1, count);
            *slot = Some(job.render(index));
        }
    } else {
        let queue = Arc::new(Mutex::new(slots.iter_mut().enumerate()));
        let job = &job;
        crossbeam::scope(|spawner| {
            let handles: Vec<ScopedJoinHandle<()>> = (0..params.threads.min(count))
                .map(|_| {
                    let queue = queue.clone();
                    spawner.spawn(move |_| loop {
                        let next = { queue.lock().unwrap().next() };
                        match next {
                            Some((index, slot)) => {
                                debug!("frame {}/{}", index + 1, count);
                                *slot = Some(job.render(index));
                            }
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

    let frames = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(FractalError::InvalidParameter(
                    "frame was never rendered".to_string(),
                ))
            })
        })
        .collect::<Result<Vec<RgbImage>>>()?;
    Ok(FrameSequence {
        frames,
        frame_duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::{build_grid, Resolution};

    fn close(a: Complex<f64>, b: Complex<f64>) -> bool {
        (a - b).norm() < 1e-12
    }

    fn params(threads: usize) -> RenderParams {
        RenderParams {
            resolution: Resolution {
                width: 20,
                height: 12,
            },
            iteration_budget: 48,
            threads,
            ..RenderParams::default()
        }
    }

    fn grid() -> SampleGrid {
        build_grid(-1.6, 1.6, -1.0, 1.0, 20, 12).unwrap()
    }

    #[test]
    fn circle_sweep_quarter_turns() {
        let sweep = circle_sweep(0.8, 4);
        assert_eq!(sweep.len(), 4);
        assert!(close(sweep[0], Complex::new(0.8, 0.0)));
        assert!(close(sweep[1], Complex::new(0.0, 0.8)));
        assert!(close(sweep[2], Complex::new(-0.8, 0.0)));
        assert!(close(sweep[3], Complex::new(0.0, -0.8)));
        for (k, p) in sweep.iter().enumerate() {
            assert!((p.arg().rem_euclid(2.0 * PI) - PI / 2.0 * k as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn circle_sweep_around_starts_at_start() {
        let start = Complex::new(-0.8, 0.156);
        let sweep = circle_sweep_around(start, 6);
        assert!(close(sweep[0], start));
        for p in &sweep {
            assert!((p.norm() - start.norm()).abs() < 1e-12);
        }
    }

    #[test]
    fn log2_budgets_are_powers_of_two() {
        assert_eq!(
            log2_budget_sweep(4.0, 11.0, 7),
            vec![16, 32, 64, 128, 256, 512, 1024]
        );
        assert_eq!(log2_budget_sweep(4.0, 11.0, 0), Vec::<u32>::new());
    }

    #[test]
    fn linear_budgets_include_both_ends() {
        assert_eq!(linear_budget_sweep(16, 2048, 3), vec![16, 1032, 2048]);
        assert_eq!(linear_budget_sweep(10, 20, 1), vec![10]);
    }

    #[test]
    fn zoom_sweep_ends_on_target_and_narrows() {
        let start = Bounds::default();
        let end = Bounds::new(-0.0002, 0.0002, -0.0002, 0.0002).unwrap();
        let sweep = zoom_sweep(start, end, 10);
        assert_eq!(sweep.len(), 10);
        assert_eq!(sweep[9], end);
        for pair in sweep.windows(2) {
            assert!(pair[1].re_max - pair[1].re_min <= pair[0].re_max - pair[0].re_min);
        }
        assert_eq!(zoom_sweep(start, end, 1), vec![end]);
    }

    #[test]
    fn parameter_sweep_yields_one_frame_per_value_in_order() {
        let sweep = Sweep::Parameter(circle_sweep(0.8, 4));
        let grid = grid();
        let attractor = Attractor::quadratic();
        let frames = build_animation(&grid, &attractor, &sweep, &params(1), Complex::new(0.0, 0.0), 50)
            .unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames.frame_duration(), 50);
        if let Sweep::Parameter(values) = &sweep {
            for (frame, &p) in frames.frames().iter().zip(values) {
                let expected = render(&params(1), &grid, &attractor, p).unwrap();
                assert_eq!(frame, &expected);
            }
        }
    }

    #[test]
    fn threaded_frames_match_sequential_frames() {
        let sweep = Sweep::Budget(log2_budget_sweep(2.0, 7.0, 5));
        let grid = grid();
        let attractor = Attractor::quadratic();
        let p = Complex::new(-0.4, 0.6);
        let sequential = build_animation(&grid, &attractor, &sweep, &params(1), p, 40).unwrap();
        let threaded = build_animation(&grid, &attractor, &sweep, &params(3), p, 40).unwrap();
        assert_eq!(sequential.into_frames(), threaded.into_frames());
    }

    #[test]
    fn zoom_frames_keep_the_grid_resolution() {
        let sweep = Sweep::Zoom(zoom_sweep(
            Bounds::default(),
            Bounds::new(-0.5, 0.5, -0.5, 0.5).unwrap(),
            3,
        ));
        let frames = build_animation(
            &grid(),
            &Attractor::quadratic(),
            &sweep,
            &params(2),
            Complex::new(-0.8, 0.156),
            30,
        )
        .unwrap();
        assert_eq!(frames.len(), 3);
        assert!(frames.frames().iter().all(|f| f.dimensions() == (20, 12)));
    }

    #[test]
    fn color_shift_sweep_steps_evenly() {
        assert_eq!(color_shift_sweep(3, 4), vec![0, 3, 6, 9]);
        assert_eq!(color_shift_sweep(1, 0), Vec::<u32>::new());
    }

    #[test]
    fn color_shift_frames_recolour_one_field_in_order() {
        let grid = grid();
        let attractor = Attractor::quadratic();
        let p = Complex::new(-0.8, 0.156);
        let budget = params(1).iteration_budget;
        let shifts = vec![0, 5, 10, budget];
        let sweep = Sweep::ColorShift(shifts.clone());
        for &threads in &[1, 3] {
            let frames = build_animation(&grid, &attractor, &sweep, &params(threads), p, 20).unwrap();
            assert_eq!(frames.len(), 4);
            let field = render_field(&params(1), &grid, &attractor, p).unwrap();
            for (frame, &shift) in frames.frames().iter().zip(&shifts) {
                let expected = colorize(&params(1).with_color_shift(shift), &field).unwrap();
                assert_eq!(frame, &expected);
            }
            // a whole budget of shift comes back round to the start
            assert_eq!(frames.frames()[3], frames.frames()[0]);
            assert_ne!(frames.frames()[1], frames.frames()[0]);
        }
    }

    #[test]
    fn bad_sweeps_fail_before_rendering() {
        let grid = grid();
        let attractor = Attractor::quadratic();
        let p = Complex::new(0.0, 0.0);
        for sweep in &[
            Sweep::Parameter(vec![]),
            Sweep::Budget(vec![16, 0, 32]),
            Sweep::Parameter(vec![Complex::new(std::f64::NAN, 0.0)]),
            Sweep::ColorShift(vec![]),
        ] {
            match build_animation(&grid, &attractor, sweep, &params(1), p, 50) {
                Err(FractalError::InvalidParameter(_)) => {}
                other => panic!("expected InvalidParameter, got {:?}", other.map(|f| f.len())),
            }
        }
        let unknown = RenderParams {
            palette: "nothing".to_string(),
            ..params(1)
        };
        assert!(build_animation(&grid, &attractor, &Sweep::Budget(vec![8]), &unknown, p, 50).is_err());
    }
}
