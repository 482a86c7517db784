// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Writing renders to disk: PNG stills carrying their render settings
//! as text chunks, looping GIF animations, and the file names derived
//! from the render settings.

use crate::animation::FrameSequence;
use crate::attractor::Attractor;
use crate::config::RenderParams;
use crate::error::Result;
use crate::escape::Mode;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, DynamicImage, Frame, RgbImage};
use num::Complex;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Characters that some file system refuses, plus whitespace.
const FORBIDDEN: &[char] = &['~', '\\', '/', ':', '"', '*', '?', '<', '>', '|', ' '];

/// The colouring steps as one label: palette, the darker flag, then
/// each transform, joined by `_`.
fn mapping_label(params: &RenderParams) -> String {
    let mut maps = vec![params.palette.clone()];
    if params.darker {
        maps.push("darker".to_string());
    }
    maps.extend(params.transforms.iter().map(|t| t.to_string()));
    maps.join("_")
}

/// The text chunks written into every still: the attractor with its
/// parameter and constants, resolution, range, budget, threshold and
/// colouring.
pub fn png_metadata(
    attractor: &Attractor,
    params: &RenderParams,
    parameter: Complex<f64>,
) -> Vec<(String, String)> {
    let constants = attractor.constants();
    let b = &params.bounds;
    // Keywords and the imaginary-first RANGE order match the stills
    // already in circulation, so existing readers keep working.
    vec![
        (
            "ATRACTOR".to_string(),
            format!(
                "{}, const={}, a={}, b={}, c={}",
                attractor.source(),
                parameter,
                constants.a,
                constants.b,
                constants.c
            ),
        ),
        (
            "RESOLUTION".to_string(),
            format!("{}x{}", params.resolution.width, params.resolution.height),
        ),
        (
            "RANGE".to_string(),
            format!("{} {} {} {}", b.im_min, b.im_max, b.re_min, b.re_max),
        ),
        (
            "MAX_ITERATIONS".to_string(),
            params.iteration_budget.to_string(),
        ),
        (
            "MAX_MAGNITUDE".to_string(),
            params.divergence_threshold.to_string(),
        ),
        ("MAPPING".to_string(), mapping_label(params)),
    ]
}

/// Writes a still as an 8-bit RGB PNG with `metadata` stored as
/// uncompressed text chunks.
pub fn save_png<P: AsRef<Path>>(
    image: &RgbImage,
    path: P,
    metadata: &[(String, String)],
) -> Result<()> {
    let output = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder = png::Encoder::new(output, image.width(), image.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    for (keyword, text) in metadata {
        encoder.add_text_chunk(keyword.clone(), text.clone())?;
    }
    let mut writer = encoder.write_header()?;
    writer.write_image_data(image.as_raw())?;
    writer.finish()?;
    info!("wrote {}", path.as_ref().display());
    Ok(())
}

/// Writes every frame as a GIF that loops forever.
pub fn save_gif<P: AsRef<Path>>(frames: &FrameSequence, path: P) -> Result<()> {
    let output = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder = GifEncoder::new(output);
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(frames.frame_duration(), 1);
    encoder.encode_frames(frames.frames().iter().map(|image| {
        let rgba = DynamicImage::ImageRgb8(image.clone()).to_rgba8();
        Frame::from_parts(rgba, 0, 0, delay)
    }))?;
    info!(
        "wrote {} frame(s) to {}",
        frames.len(),
        path.as_ref().display()
    );
    Ok(())
}

/// A file name that records every setting of the render, with
/// characters unsafe in file names replaced by `_`.  Constants `a`,
/// `b` and `c` appear only when they are not zero.
pub fn file_name(
    attractor: &Attractor,
    params: &RenderParams,
    parameter: Complex<f64>,
    extension: &str,
) -> String {
    let prefix = match params.mode {
        Mode::Julia => "julia",
        Mode::Mandelbrot => "mandelbrot",
    };
    let zero = Complex::new(0.0, 0.0);
    let constants = attractor.constants();
    let extra: String = [("a", constants.a), ("b", constants.b), ("c", constants.c)]
        .iter()
        .filter(|&&(_, value)| value != zero)
        .map(|&(name, value)| format!("_{}={}", name, value))
        .collect();
    let b = &params.bounds;
    let name = format!(
        "{}_{}_c={}{}_res_{}x{}_ran_{}_{}_{}_{}_iter_{}_mag_{}_map_{}.{}",
        prefix,
        attractor.source(),
        parameter,
        extra,
        params.resolution.width,
        params.resolution.height,
        b.re_min,
        b.re_max,
        b.im_min,
        b.im_max,
        params.iteration_budget,
        params.divergence_threshold,
        mapping_label(params),
        extension
    );
    name.chars()
        .map(|ch| if FORBIDDEN.contains(&ch) { '_' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{build_animation, circle_sweep, Sweep};
    use crate::expr::Constants;
    use crate::mapping::Transform;
    use crate::planes::{build_grid, Resolution};
    use image::Rgb;

    #[test]
    fn file_name_is_deterministic_and_safe() {
        let attractor = Attractor::parse("z^2 + const").unwrap();
        let params = RenderParams {
            resolution: Resolution {
                width: 640,
                height: 480,
            },
            transforms: vec![Transform::Root],
            ..RenderParams::default()
        };
        let p = Complex::new(-0.8, 0.156);
        let name = file_name(&attractor, &params, p, "png");
        assert_eq!(name, file_name(&attractor, &params, p, "png"));
        assert_eq!(
            name,
            "julia_z^2_+_const_c=-0.8+0.156i_res_640x480_ran_-2_2_-2_2_iter_256_mag_2_map_twilight_shifted_root.png"
        );
        assert!(!name.contains(' '));
        assert!(!name.contains('/'));
    }

    #[test]
    fn file_name_replaces_slashes() {
        let attractor = Attractor::parse("z/2 + const").unwrap();
        let name = file_name(&attractor, &RenderParams::default(), Complex::new(0.0, 0.0), "gif");
        assert!(name.starts_with("julia_z_2_+_const"));
        assert!(name.ends_with(".gif"));
    }

    #[test]
    fn constants_tell_file_names_apart() {
        let with_a = |a: f64| {
            Attractor::with_constants(
                "a*z^2 + const",
                Constants {
                    a: Complex::new(a, 0.0),
                    ..Constants::default()
                },
            )
            .unwrap()
        };
        let params = RenderParams::default();
        let p = Complex::new(0.0, 0.0);
        let one = file_name(&with_a(1.0), &params, p, "png");
        let three = file_name(&with_a(3.0), &params, p, "png");
        assert_ne!(one, three);
        assert!(one.starts_with("julia_a_z^2_+_const_c=0+0i_a=1+0i_res_"));
        assert!(!one.contains("_b="));
        assert!(!file_name(&Attractor::quadratic(), &params, p, "png").contains("_a="));
    }

    #[test]
    fn darker_colouring_is_named() {
        let params = RenderParams {
            darker: true,
            transforms: vec![Transform::Modulo(7)],
            ..RenderParams::default()
        };
        let name = file_name(&Attractor::quadratic(), &params, Complex::new(0.0, 0.0), "png");
        assert!(name.ends_with("_map_twilight_shifted_darker_mod_7.png"));
    }

    #[test]
    fn png_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        let image = RgbImage::from_pixel(5, 3, Rgb([10, 20, 30]));
        save_png(&image, &path, &[]).unwrap();
        let back = image::open(&path).unwrap().to_rgb8();
        assert_eq!(back, image);
    }

    #[test]
    fn png_carries_the_render_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("still.png");
        let attractor = Attractor::with_constants(
            "b*z^2 + const",
            Constants {
                b: Complex::new(0.5, 0.0),
                ..Constants::default()
            },
        )
        .unwrap();
        let params = RenderParams {
            resolution: Resolution {
                width: 4,
                height: 2,
            },
            iteration_budget: 64,
            transforms: vec![Transform::Reverse],
            ..RenderParams::default()
        };
        let metadata = png_metadata(&attractor, &params, Complex::new(-0.8, 0.156));
        save_png(&RgbImage::new(4, 2), &path, &metadata).unwrap();

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        let text: Vec<(String, String)> = reader
            .info()
            .uncompressed_latin1_text
            .iter()
            .map(|chunk| (chunk.keyword.clone(), chunk.text.clone()))
            .collect();
        assert_eq!(text, metadata);
        let expected = vec![
            ("ATRACTOR", "b*z^2 + const, const=-0.8+0.156i, a=0+0i, b=0.5+0i, c=0+0i"),
            ("RESOLUTION", "4x2"),
            ("RANGE", "-2 2 -2 2"),
            ("MAX_ITERATIONS", "64"),
            ("MAX_MAGNITUDE", "2"),
            ("MAPPING", "twilight_shifted_rev"),
        ];
        for ((keyword, text), (want_keyword, want_text)) in text.iter().zip(&expected) {
            assert_eq!(keyword, want_keyword);
            assert_eq!(text, want_text);
        }
    }

    #[test]
    fn gif_holds_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sweep.gif");
        let grid = build_grid(-1.5, 1.5, -1.0, 1.0, 12, 8).unwrap();
        let params = RenderParams {
            iteration_budget: 32,
            ..RenderParams::default()
        };
        let frames = build_animation(
            &grid,
            &Attractor::quadratic(),
            &Sweep::Parameter(circle_sweep(0.7885, 3)),
            &params,
            Complex::new(0.0, 0.0),
            40,
        )
        .unwrap();
        save_gif(&frames, &path).unwrap();

        use image::codecs::gif::GifDecoder;
        use image::AnimationDecoder;
        let decoder = GifDecoder::new(File::open(&path).unwrap()).unwrap();
        let decoded = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].delay().numer_denom_ms(), (40, 1));
    }
}
