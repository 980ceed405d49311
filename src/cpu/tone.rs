use image::RgbaImage;
use rayon::prelude::*;

use crate::color::{rgb_to_hsl, hsl_to_rgb, scale_saturation, to_byte, to_unit, MID_GREY};
use crate::stages::{DetailMode, DetailPass, ToneParams};

/// Working RGB plane for neighbourhood passes; alpha stays in the byte image.
pub(crate) struct RgbPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<[f32; 3]>,
}

impl RgbPlane {
    pub fn from_image(image: &RgbaImage) -> Self {
        let data = image
            .as_raw()
            .par_chunks(4)
            .map(|px| [to_unit(px[0]), to_unit(px[1]), to_unit(px[2])])
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    /// Quantizes back into a copy of `alpha_from` (whose alpha is kept).
    pub fn into_image(self, alpha_from: &RgbaImage) -> RgbaImage {
        let mut out = alpha_from.clone();
        out.as_mut()
            .par_chunks_mut(4)
            .zip(self.data.par_iter())
            .for_each(|(px, c)| {
                px[0] = to_byte(c[0]);
                px[1] = to_byte(c[1]);
                px[2] = to_byte(c[2]);
            });
        out
    }

    fn gaussian(&self, sigma_pass: &DetailPass) -> Vec<[f32; 3]> {
        let kernel = sigma_pass.kernel();
        let radius = (kernel.len() / 2) as isize;
        let (w, h) = (self.width, self.height);

        let mut horizontal = vec![[0.0f32; 3]; self.data.len()];
        horizontal
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                let src = &self.data[y * w..(y + 1) * w];
                for (x, out) in row.iter_mut().enumerate() {
                    let mut acc = [0.0f32; 3];
                    for (k, weight) in kernel.iter().enumerate() {
                        let sx = (x as isize + k as isize - radius).clamp(0, w as isize - 1) as usize;
                        for c in 0..3 {
                            acc[c] += src[sx][c] * weight;
                        }
                    }
                    *out = acc;
                }
            });

        let mut blurred = vec![[0.0f32; 3]; self.data.len()];
        blurred
            .par_chunks_mut(w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, out) in row.iter_mut().enumerate() {
                    let mut acc = [0.0f32; 3];
                    for (k, weight) in kernel.iter().enumerate() {
                        let sy = (y as isize + k as isize - radius).clamp(0, h as isize - 1) as usize;
                        let src = horizontal[sy * w + x];
                        for c in 0..3 {
                            acc[c] += src[c] * weight;
                        }
                    }
                    *out = acc;
                }
            });
        blurred
    }

    /// Blur or unsharp mask in place, clamped.
    pub fn apply_detail(&mut self, pass: &DetailPass) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        let blurred = self.gaussian(pass);
        match pass.mode {
            DetailMode::Blur => {
                self.data = blurred;
            }
            DetailMode::Unsharp {
                amount,
                gain,
                offset,
            } => {
                self.data
                    .par_iter_mut()
                    .zip(blurred.par_iter())
                    .for_each(|(c, b)| {
                        for i in 0..3 {
                            let sharpened = (c[i] + amount * (c[i] - b[i])).clamp(0.0, 1.0);
                            c[i] = (sharpened * gain + offset).clamp(0.0, 1.0);
                        }
                    });
            }
        }
    }
}

#[inline]
fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

/// Per-pixel part of the basic tone stage (exposure through blacks).
pub(crate) fn tone_pixel(mut c: [f32; 3], p: &ToneParams) -> [f32; 3] {
    let exposure = 1.0 + p.exposure;
    c = c.map(|v| clamp01(v * exposure));

    let temperature = p.temperature / 100.0;
    c[0] = clamp01(c[0] * (1.0 + 0.15 * temperature));
    c[2] = clamp01(c[2] * (1.0 - 0.15 * temperature));
    c[1] = clamp01(c[1] * (1.0 - 0.1 * p.tint / 150.0));

    let contrast = p.contrast;
    c = c.map(|v| clamp01(v * contrast + MID_GREY * (1.0 - contrast)));

    if p.saturation != 1.0 {
        c = scale_saturation(c, p.saturation);
    }
    if p.vibrance != 0.0 {
        c = scale_saturation(c, 1.0 + p.vibrance / 200.0);
    }

    if p.shadows != 0.0 {
        let mut hsl = rgb_to_hsl(c[0], c[1], c[2]);
        hsl.l = clamp01(hsl.l + p.shadows / 100.0 * 0.3);
        c = hsl_to_rgb(hsl).map(clamp01);
    }
    if p.highlights < 0.0 {
        let gamma = 1.0 + (p.highlights / 100.0).abs() * 0.02;
        c = c.map(|v| clamp01(v.powf(gamma)));
    }

    let whites = p.whites / 100.0;
    if whites > 0.0 {
        c = c.map(|v| clamp01(v * (1.0 + 0.15 * whites) + 10.0 * whites / 255.0));
    } else if whites < 0.0 {
        let gamma = (1.0 + whites.abs() * 0.5).clamp(1.0, 3.0);
        c = c.map(|v| clamp01(v.powf(gamma)));
    }

    if p.blacks != 0.0 {
        let offset = p.blacks / 100.0 * 20.0 / 255.0;
        c = c.map(|v| clamp01(v + offset));
    }
    c
}

pub(crate) fn dehaze_pixel(c: [f32; 3], dehaze: f32) -> [f32; 3] {
    let d = dehaze / 100.0;
    if d <= 0.0 {
        return c;
    }
    let contrasted = c.map(|v| clamp01(v * (1.0 + 0.5 * d) - 20.0 * d / 255.0));
    scale_saturation(contrasted, 1.0 + 0.3 * d)
}

pub fn apply_basic_tone(image: &RgbaImage, params: &ToneParams) -> RgbaImage {
    let mut plane = RgbPlane::from_image(image);
    plane
        .data
        .par_iter_mut()
        .for_each(|c| *c = tone_pixel(*c, params));

    for pass in params.detail_passes() {
        plane.apply_detail(&pass);
    }

    if params.dehaze > 0.0 {
        let dehaze = params.dehaze;
        plane
            .data
            .par_iter_mut()
            .for_each(|c| *c = dehaze_pixel(*c, dehaze));
    }
    plane.into_image(image)
}

pub fn apply_sharpen(image: &RgbaImage, pass: &DetailPass) -> RgbaImage {
    let mut plane = RgbPlane::from_image(image);
    plane.apply_detail(pass);
    plane.into_image(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn neutral() -> ToneParams {
        ToneParams::NEUTRAL
    }

    #[test]
    fn neutral_params_leave_pixels_alone() {
        let c = [0.2, 0.5, 0.9];
        assert_eq!(tone_pixel(c, &neutral()), c);
    }

    #[test]
    fn exposure_scales_and_clamps() {
        let mut p = neutral();
        p.exposure = 1.0;
        let out = tone_pixel([0.2, 0.4, 0.7], &p);
        assert_abs_diff_eq!(out[0], 0.4, epsilon = 1e-6);
        assert_abs_diff_eq!(out[1], 0.8, epsilon = 1e-6);
        assert_eq!(out[2], 1.0);
    }

    #[test]
    fn zero_contrast_collapses_to_mid_grey() {
        let mut p = neutral();
        p.contrast = 0.0;
        let out = tone_pixel([0.1, 0.6, 0.95], &p);
        for v in out {
            assert_abs_diff_eq!(v, MID_GREY, epsilon = 1e-6);
        }
    }

    #[test]
    fn warm_temperature_raises_red_and_lowers_blue() {
        let mut p = neutral();
        p.temperature = 50.0;
        let out = tone_pixel([0.5, 0.5, 0.5], &p);
        assert!(out[0] > 0.5);
        assert_eq!(out[1], 0.5);
        assert!(out[2] < 0.5);
    }

    #[test]
    fn negative_whites_darken_with_bounded_gamma() {
        let mut p = neutral();
        p.whites = -1000.0;
        let out = tone_pixel([0.5, 0.5, 0.5], &p);
        assert_abs_diff_eq!(out[0], 0.125, epsilon = 1e-5);
    }

    #[test]
    fn blacks_shift_black_point() {
        let mut p = neutral();
        p.blacks = 50.0;
        let out = tone_pixel([0.0, 0.0, 0.0], &p);
        assert_abs_diff_eq!(out[0], 10.0 / 255.0, epsilon = 1e-6);
    }

    #[test]
    fn tint_scales_green_only() {
        let mut p = neutral();
        p.tint = 150.0;
        let out = tone_pixel([0.5, 0.5, 0.5], &p);
        assert_eq!(out[0], 0.5);
        assert_abs_diff_eq!(out[1], 0.45, epsilon = 1e-6);
        assert_eq!(out[2], 0.5);
    }

    #[test]
    fn vibrance_scales_saturation() {
        let mut p = neutral();
        p.vibrance = 100.0;
        let out = tone_pixel([0.6, 0.4, 0.4], &p);
        assert_abs_diff_eq!(out[0], 0.65, epsilon = 1e-5);
        assert_abs_diff_eq!(out[1], 0.35, epsilon = 1e-5);
        assert_abs_diff_eq!(out[2], 0.35, epsilon = 1e-5);
    }

    #[test]
    fn shadows_offset_lightness() {
        let mut p = neutral();
        p.shadows = 100.0;
        let out = tone_pixel([0.2, 0.2, 0.2], &p);
        for v in out {
            assert_abs_diff_eq!(v, 0.5, epsilon = 1e-5);
        }
        p.shadows = -100.0;
        assert_eq!(tone_pixel([0.2, 0.2, 0.2], &p), [0.0; 3]);
    }

    #[test]
    fn negative_highlights_apply_gentle_gamma() {
        let mut p = neutral();
        p.highlights = -100.0;
        let out = tone_pixel([0.5, 0.5, 0.5], &p);
        assert_abs_diff_eq!(out[0], 0.493116, epsilon = 1e-5);

        p.highlights = 100.0;
        assert_eq!(tone_pixel([0.5, 0.5, 0.5], &p), [0.5; 3]);
    }

    #[test]
    fn positive_whites_stretch_and_lift() {
        let mut p = neutral();
        p.whites = 100.0;
        let out = tone_pixel([0.5, 0.5, 0.5], &p);
        assert_abs_diff_eq!(out[0], 0.575 + 10.0 / 255.0, epsilon = 1e-5);
        assert_eq!(tone_pixel([0.95, 0.95, 0.95], &p), [1.0; 3]);
    }

    #[test]
    fn dehaze_adds_contrast_and_saturation() {
        let grey = dehaze_pixel([0.5, 0.5, 0.5], 100.0);
        for v in grey {
            assert_abs_diff_eq!(v, 0.75 - 20.0 / 255.0, epsilon = 1e-5);
        }

        let c = [0.6, 0.4, 0.4];
        let contrasted = c.map(|v| v * 1.5 - 20.0 / 255.0);
        let out = dehaze_pixel(c, 100.0);
        let before = rgb_to_hsl(contrasted[0], contrasted[1], contrasted[2]);
        let after = rgb_to_hsl(out[0], out[1], out[2]);
        assert_abs_diff_eq!(after.l, before.l, epsilon = 1e-5);
        assert!(after.s > before.s);

        assert_eq!(dehaze_pixel(c, 0.0), c);
    }

    fn step_edge() -> RgbaImage {
        RgbaImage::from_fn(16, 4, |x, _| {
            if x < 8 {
                image::Rgba([80, 80, 80, 255])
            } else {
                image::Rgba([160, 160, 160, 255])
            }
        })
    }

    #[test]
    fn positive_texture_sharpens_edges() {
        let mut p = neutral();
        p.texture = 60.0;
        let out = apply_basic_tone(&step_edge(), &p);
        assert!(out.get_pixel(7, 2)[0] < 80);
        assert!(out.get_pixel(8, 2)[0] > 160);
        assert_eq!(out.get_pixel(0, 2)[0], 80);
        assert_eq!(out.get_pixel(15, 2)[0], 160);
    }

    #[test]
    fn negative_texture_softens_edges() {
        let mut p = neutral();
        p.texture = -100.0;
        let out = apply_basic_tone(&step_edge(), &p);
        assert!(out.get_pixel(7, 2)[0] > 80);
        assert!(out.get_pixel(8, 2)[0] < 160);
        assert_eq!(out.get_pixel(0, 2)[0], 80);
    }

    #[test]
    fn blur_of_flat_image_is_flat() {
        let img = RgbaImage::from_pixel(9, 7, image::Rgba([90, 120, 30, 200]));
        let out = apply_sharpen(&img, &DetailPass::blur(2.0));
        assert_eq!(out, img);
    }

    #[test]
    fn unsharp_increases_edge_contrast() {
        let img = RgbaImage::from_fn(16, 4, |x, _| {
            if x < 8 {
                image::Rgba([80, 80, 80, 255])
            } else {
                image::Rgba([160, 160, 160, 255])
            }
        });
        let out = apply_sharpen(&img, &DetailPass::unsharp(1.0, 1.0, 1.0, 0.0));
        assert!(out.get_pixel(7, 1)[0] < 80);
        assert!(out.get_pixel(8, 1)[0] > 160);
        assert_eq!(out.get_pixel(0, 1)[0], 80);
        assert_eq!(out.get_pixel(7, 1)[3], 255);
    }
}
