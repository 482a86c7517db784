// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

extern crate clap;
extern crate env_logger;
extern crate failure;
extern crate julia;
#[macro_use]
extern crate log;
extern crate num;
extern crate num_cpus;

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use failure::{err_msg, Error};
use julia::animation::{
    build_animation, circle_sweep_around, color_shift_sweep, linear_budget_sweep, log2_budget_sweep,
    zoom_sweep, Sweep,
};
use julia::attractor::{Attractor, DEFAULT_ATTRACTOR};
use julia::expr::Constants;
use julia::mapping::Transform;
use julia::output::{file_name, png_metadata, save_gif, save_png};
use julia::palette::{self, Palette, DEFAULT_PALETTE};
use julia::planes::{Bounds, Resolution};
use julia::render::{colorize, render_field};
use julia::{Mode, RenderParams};
use num::Complex;
use std::str::FromStr;
use std::time::Instant;

/// Given a string and a separator, returns the two values separated by
/// the separator.
fn parse_pair<T: FromStr>(s: &str, separator: char) -> Option<(T, T)> {
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

/// A specific implementation of parse_pair using a comma and expecting
/// floating point numbers.
fn parse_complex(s: &str) -> Option<Complex<f64>> {
    match parse_pair(s, ',') {
        Some((re, im)) => Some(Complex { re, im }),
        None => None,
    }
}

/// Four comma-separated floats: re_min, re_max, im_min, im_max.
fn parse_bounds(s: &str) -> Option<Bounds> {
    let values: Vec<f64> = s
        .split(',')
        .map(|v| f64::from_str(v.trim()))
        .collect::<Result<_, _>>()
        .ok()?;
    match values.as_slice() {
        [re_min, re_max, im_min, im_max] => Some(Bounds {
            re_min: *re_min,
            re_max: *re_max,
            im_min: *im_min,
            im_max: *im_max,
        }),
        _ => None,
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

fn validate_bounds(s: &str) -> Result<(), String> {
    match parse_bounds(s) {
        Some(bounds) => bounds.validate().map_err(|e| e.to_string()),
        None => Err("Could not parse range; expected RE_MIN,RE_MAX,IM_MIN,IM_MAX".to_string()),
    }
}

const OUTPUT: &str = "output";
const ATTRACTOR: &str = "attractor";
const CONST: &str = "const";
const CONST_A: &str = "a";
const CONST_B: &str = "b";
const CONST_C: &str = "c";
const SIZE: &str = "size";
const RANGE: &str = "range";
const ITERATIONS: &str = "iterations";
const MAGNITUDE: &str = "magnitude";
const PALETTE: &str = "palette";
const MAP: &str = "map";
const DARKER: &str = "darker";
const MANDELBROT: &str = "mandelbrot";
const THREADS: &str = "threads";
const HISTOGRAM: &str = "histogram";
const SWEEP: &str = "sweep";
const FRAMES: &str = "frames";
const DURATION: &str = "duration";
const START_EXP: &str = "start-exp";
const END_EXP: &str = "end-exp";
const LINEAR: &str = "linear";
const ZOOM_TO: &str = "zoom-to";
const SHIFT_STEP: &str = "shift-step";

fn render_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    let max_threads = num_cpus::get();
    vec![
        Arg::with_name(OUTPUT)
            .long(OUTPUT)
            .short("o")
            .takes_value(true)
            .help("Output file; derived from the settings when omitted"),
        Arg::with_name(ATTRACTOR)
            .long(ATTRACTOR)
            .short("a")
            .takes_value(true)
            .default_value(DEFAULT_ATTRACTOR)
            .validator(|s| {
                Attractor::parse(&s)
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .help("Attractor in z (current value) and const (parameter)"),
        Arg::with_name(CONST)
            .long(CONST)
            .short("c")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value("-0.8,0.156")
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse constant"))
            .help("The attractor parameter, RE,IM"),
        Arg::with_name(CONST_A)
            .long(CONST_A)
            .takes_value(true)
            .allow_hyphen_values(true)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse a"))
            .help("Value of a in the attractor, RE,IM"),
        Arg::with_name(CONST_B)
            .long(CONST_B)
            .takes_value(true)
            .allow_hyphen_values(true)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse b"))
            .help("Value of b in the attractor, RE,IM"),
        Arg::with_name(CONST_C)
            .long(CONST_C)
            .takes_value(true)
            .allow_hyphen_values(true)
            .validator(|s| validate_pair::<f64>(&s, ',', "Could not parse c"))
            .help("Value of c in the attractor, RE,IM"),
        Arg::with_name(SIZE)
            .long(SIZE)
            .short("s")
            .takes_value(true)
            .default_value("1000x1000")
            .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
            .help("Size of output image"),
        Arg::with_name(RANGE)
            .long(RANGE)
            .short("r")
            .takes_value(true)
            .allow_hyphen_values(true)
            .default_value("-2,2,-2,2")
            .validator(|s| validate_bounds(&s))
            .help("Region of the complex plane, RE_MIN,RE_MAX,IM_MIN,IM_MAX"),
        Arg::with_name(ITERATIONS)
            .long(ITERATIONS)
            .short("i")
            .takes_value(true)
            .default_value("256")
            .validator(|s| {
                validate_range(
                    &s,
                    1u32,
                    1_000_000,
                    "Could not parse iteration count",
                    "Iteration count must be between 1 and 1000000",
                )
            })
            .help("Iteration budget per point"),
        Arg::with_name(MAGNITUDE)
            .long(MAGNITUDE)
            .short("m")
            .takes_value(true)
            .default_value("2")
            .validator(|s| {
                validate_range(
                    &s,
                    std::f64::MIN_POSITIVE,
                    std::f64::MAX,
                    "Could not parse divergence magnitude",
                    "Divergence magnitude must be positive",
                )
            })
            .help("Magnitude past which a point has escaped"),
        Arg::with_name(PALETTE)
            .long(PALETTE)
            .short("p")
            .takes_value(true)
            .default_value(DEFAULT_PALETTE)
            .validator(|s| {
                Palette::lookup(&s).map(|_| ()).map_err(|e| {
                    format!("{}; known palettes: {}", e, palette::names().join(", "))
                })
            })
            .help("Colour palette; append _r to reverse"),
        Arg::with_name(MAP)
            .long(MAP)
            .takes_value(true)
            .multiple(true)
            .number_of_values(1)
            .validator(|s| {
                s.parse::<Transform>()
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            })
            .help("Count transform applied before colouring: root, rev, cut N, mod N, add N, shift N"),
        Arg::with_name(DARKER)
            .long(DARKER)
            .help("Colour with the darker of the palette and its reverse"),
        Arg::with_name(MANDELBROT)
            .long(MANDELBROT)
            .help("Iterate from zero with the point as the parameter"),
        Arg::with_name(THREADS)
            .long(THREADS)
            .short("t")
            .takes_value(true)
            .default_value("1")
            .validator(move |s| {
                validate_range(
                    &s,
                    1,
                    max_threads,
                    "Could not parse thread count",
                    &format!("Thread count must be between 1 and {}", max_threads),
                )
            })
            .help("Number of threads to use in solver"),
    ]
}

fn args<'a>() -> ArgMatches<'a> {
    App::new("julia")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Escape-time Julia and Mandelbrot renderer")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("still")
                .about("Render a single PNG")
                .args(&render_args())
                .arg(
                    Arg::with_name(HISTOGRAM)
                        .long(HISTOGRAM)
                        .help("Log how many pixels hold each escape count"),
                ),
        )
        .subcommand(
            SubCommand::with_name("animate")
                .about("Render a looping GIF")
                .args(&render_args())
                .arg(
                    Arg::with_name(SWEEP)
                        .long(SWEEP)
                        .short("w")
                        .takes_value(true)
                        .possible_values(&["circle", "budget", "zoom", "shift"])
                        .default_value("circle")
                        .help("What changes from frame to frame"),
                )
                .arg(
                    Arg::with_name(FRAMES)
                        .long(FRAMES)
                        .short("f")
                        .takes_value(true)
                        .default_value("60")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1usize,
                                10_000,
                                "Could not parse frame count",
                                "Frame count must be between 1 and 10000",
                            )
                        })
                        .help("Number of frames"),
                )
                .arg(
                    Arg::with_name(DURATION)
                        .long(DURATION)
                        .short("d")
                        .takes_value(true)
                        .default_value("50")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1u32,
                                60_000,
                                "Could not parse frame duration",
                                "Frame duration must be between 1 and 60000 ms",
                            )
                        })
                        .help("Display time of each frame in milliseconds"),
                )
                .arg(
                    Arg::with_name(START_EXP)
                        .long(START_EXP)
                        .takes_value(true)
                        .default_value("4")
                        .validator(|s| {
                            validate_range(&s, 0.0, 20.0, "Could not parse exponent", "Exponent must be between 0 and 20")
                        })
                        .help("Budget sweep starts at 2^start-exp"),
                )
                .arg(
                    Arg::with_name(END_EXP)
                        .long(END_EXP)
                        .takes_value(true)
                        .default_value("11")
                        .validator(|s| {
                            validate_range(&s, 0.0, 20.0, "Could not parse exponent", "Exponent must be between 0 and 20")
                        })
                        .help("Budget sweep stops short of 2^end-exp"),
                )
                .arg(
                    Arg::with_name(LINEAR)
                        .long(LINEAR)
                        .help("Space the budget sweep linearly instead of in log2"),
                )
                .arg(
                    Arg::with_name(ZOOM_TO)
                        .long(ZOOM_TO)
                        .takes_value(true)
                        .allow_hyphen_values(true)
                        .default_value("-0.0002,0.0002,-0.0002,0.0002")
                        .validator(|s| validate_bounds(&s))
                        .help("Final region of a zoom sweep"),
                )
                .arg(
                    Arg::with_name(SHIFT_STEP)
                        .long(SHIFT_STEP)
                        .takes_value(true)
                        .default_value("1")
                        .validator(|s| {
                            validate_range(
                                &s,
                                1u32,
                                u32::max_value(),
                                "Could not parse colour shift step",
                                "Colour shift step must be positive",
                            )
                        })
                        .help("Counts the colours move by between frames of a shift sweep"),
                ),
        )
        .get_matches()
}

fn value<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str, Error> {
    matches
        .value_of(name)
        .ok_or_else(|| err_msg(format!("missing value for --{}", name)))
}

fn parsed<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T, Error> {
    T::from_str(value(matches, name)?)
        .map_err(|_| err_msg(format!("could not parse --{}", name)))
}

fn complex_arg(matches: &ArgMatches, name: &str) -> Result<Complex<f64>, Error> {
    match matches.value_of(name) {
        None => Ok(Complex::new(0.0, 0.0)),
        Some(s) => parse_complex(s).ok_or_else(|| err_msg(format!("could not parse --{}", name))),
    }
}

fn render_params(matches: &ArgMatches) -> Result<RenderParams, Error> {
    let (width, height) = parse_pair::<usize>(value(matches, SIZE)?, 'x')
        .ok_or_else(|| err_msg("Error parsing image dimensions"))?;
    let bounds =
        parse_bounds(value(matches, RANGE)?).ok_or_else(|| err_msg("Error parsing range"))?;
    let transforms = match matches.values_of(MAP) {
        Some(values) => values
            .map(Transform::from_str)
            .collect::<Result<Vec<Transform>, _>>()?,
        None => vec![],
    };
    let params = RenderParams {
        iteration_budget: parsed(matches, ITERATIONS)?,
        divergence_threshold: parsed(matches, MAGNITUDE)?,
        bounds,
        resolution: Resolution::new(width, height)?,
        palette: value(matches, PALETTE)?.to_string(),
        darker: matches.is_present(DARKER),
        mode: if matches.is_present(MANDELBROT) {
            Mode::Mandelbrot
        } else {
            Mode::Julia
        },
        transforms,
        threads: parsed(matches, THREADS)?,
    };
    params.validate()?;
    Ok(params)
}

fn attractor(matches: &ArgMatches) -> Result<Attractor, Error> {
    let constants = Constants {
        a: complex_arg(matches, CONST_A)?,
        b: complex_arg(matches, CONST_B)?,
        c: complex_arg(matches, CONST_C)?,
    };
    Ok(Attractor::with_constants(value(matches, ATTRACTOR)?, constants)?)
}

fn still(matches: &ArgMatches) -> Result<(), Error> {
    let params = render_params(matches)?;
    let attractor = attractor(matches)?;
    let parameter = complex_arg(matches, CONST)?;
    let grid = params.grid()?;

    let start = Instant::now();
    let field = render_field(&params, &grid, &attractor, parameter)?;
    info!("calculated escape times in {:.2?}", start.elapsed());

    if matches.is_present(HISTOGRAM) {
        let histogram = field.histogram();
        info!(
            "{} distinct escape counts, deepest {}",
            histogram.len(),
            field.max()
        );
        for (count, cells) in &histogram {
            info!("{}: {}", count, cells);
        }
    }

    let image = colorize(&params, &field)?;
    let path = match matches.value_of(OUTPUT) {
        Some(path) => path.to_string(),
        None => file_name(&attractor, &params, parameter, "png"),
    };
    save_png(&image, &path, &png_metadata(&attractor, &params, parameter))?;
    println!("Picture rendered, you can find it in {}", path);
    Ok(())
}

fn animate(matches: &ArgMatches) -> Result<(), Error> {
    let params = render_params(matches)?;
    let attractor = attractor(matches)?;
    let parameter = complex_arg(matches, CONST)?;
    let grid = params.grid()?;
    let frames: usize = parsed(matches, FRAMES)?;
    let duration: u32 = parsed(matches, DURATION)?;

    let sweep = match value(matches, SWEEP)? {
        "circle" => Sweep::Parameter(circle_sweep_around(parameter, frames)),
        "budget" => {
            if matches.is_present(LINEAR) {
                Sweep::Budget(linear_budget_sweep(16, 2048, frames))
            } else {
                Sweep::Budget(log2_budget_sweep(
                    parsed(matches, START_EXP)?,
                    parsed(matches, END_EXP)?,
                    frames,
                ))
            }
        }
        "zoom" => {
            let target = parse_bounds(value(matches, ZOOM_TO)?)
                .ok_or_else(|| err_msg("Error parsing zoom target"))?;
            Sweep::Zoom(zoom_sweep(params.bounds, target, frames))
        }
        "shift" => Sweep::ColorShift(color_shift_sweep(parsed(matches, SHIFT_STEP)?, frames)),
        other => return Err(err_msg(format!("unknown sweep {}", other))),
    };

    let start = Instant::now();
    let sequence = build_animation(&grid, &attractor, &sweep, &params, parameter, duration)?;
    info!("rendered {} frame(s) in {:.2?}", sequence.len(), start.elapsed());

    let path = match matches.value_of(OUTPUT) {
        Some(path) => path.to_string(),
        None => file_name(&attractor, &params, parameter, "gif"),
    };
    save_gif(&sequence, &path)?;
    println!("Animation rendered, you can find it in {}", path);
    Ok(())
}

fn run() -> Result<(), Error> {
    let matches = args();
    match matches.subcommand() {
        ("still", Some(sub)) => still(sub),
        ("animate", Some(sub)) => animate(sub),
        _ => Err(err_msg("no subcommand given")),
    }
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
