use image::RgbaImage;
use rayon::prelude::*;

use crate::color::{hsl_to_rgb, luma601, mix, overlay, rgb_to_hsl, screen, to_byte, to_unit, MID_GREY};
use crate::lut::CurveLuts;
use crate::noise::NoiseField;
use crate::stages::{BandShift, GrainParams, SplitToneParams, VignetteParams};

pub fn apply_curves(image: &RgbaImage, luts: &CurveLuts) -> RgbaImage {
    let mut out = image.clone();
    out.as_mut().par_chunks_mut(4).for_each(|px| luts.apply(px));
    out
}

/// Band membership is checked against the hue as already shifted by earlier
/// matching bands. Achromatic pixels carry hue 0 and so fall in the red band.
pub fn apply_hsl(image: &RgbaImage, bands: &[BandShift]) -> RgbaImage {
    let mut out = image.clone();
    out.as_mut().par_chunks_mut(4).for_each(|px| {
        let mut hsl = rgb_to_hsl(to_unit(px[0]), to_unit(px[1]), to_unit(px[2]));
        let mut matched = false;
        for band in bands {
            if !band.band.contains(hsl.h) {
                continue;
            }
            matched = true;
            hsl.h = (hsl.h + band.hue_shift).rem_euclid(360.0);
            hsl.s = (hsl.s * band.sat_factor).clamp(0.0, 1.0);
            hsl.l = (hsl.l + band.lum_delta).clamp(0.0, 1.0);
        }
        if matched {
            let rgb = hsl_to_rgb(hsl);
            px[0] = to_byte(rgb[0]);
            px[1] = to_byte(rgb[1]);
            px[2] = to_byte(rgb[2]);
        }
    });
    out
}

pub fn apply_split_tone(image: &RgbaImage, params: &SplitToneParams) -> RgbaImage {
    let threshold = params.threshold;
    let mut out = image.clone();
    out.as_mut().par_chunks_mut(4).for_each(|px| {
        let c = [to_unit(px[0]), to_unit(px[1]), to_unit(px[2])];
        let lum = luma601(c[0], c[1], c[2]);
        let (color, strength) = if lum < threshold {
            let f = (threshold - lum) / threshold;
            (params.shadow_color, params.shadow_strength * f)
        } else {
            let f = (lum - threshold) / (1.0 - threshold);
            (params.highlight_color, params.highlight_strength * f)
        };
        for i in 0..3 {
            let shift = (color[i] / 255.0 - MID_GREY) * strength;
            px[i] = to_byte(c[i] + shift);
        }
    });
    out
}

pub fn apply_grain(image: &RgbaImage, params: &GrainParams) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let field = NoiseField::generate(params, w, h);
    let opacity = params.opacity();

    let mut out = image.clone();
    out.as_mut()
        .par_chunks_mut(w as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_mut(4).enumerate() {
                let n = to_unit(field.sample(x as u32, y as u32, w, h));
                for c in px.iter_mut().take(3) {
                    let base = to_unit(*c);
                    *c = to_byte(mix(base, overlay(base, n), opacity));
                }
            }
        });
    out
}

pub fn apply_vignette(image: &RgbaImage, params: &VignetteParams) -> RgbaImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return image.clone();
    }
    let darken = params.amount < 0.0;
    let boost = params.highlight_boost;

    let mut out = image.clone();
    out.as_mut()
        .par_chunks_mut(w as usize * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_mut(4).enumerate() {
                let t = params.ramp(x as u32, y as u32, w, h);
                let (alpha, mask) = params.mask(t);
                for c in px.iter_mut().take(3) {
                    let base = to_unit(*c);
                    let blended = if darken { base * mask } else { screen(base, mask) };
                    let v = mix(base, blended, alpha).clamp(0.0, 1.0);
                    *c = to_byte(v * boost);
                }
            }
        });
    out
}

/// Per-channel interpolation of all four channels on the byte scale.
pub fn blend(original: &RgbaImage, processed: &RgbaImage, strength: f32) -> RgbaImage {
    let mut out = processed.clone();
    out.as_mut()
        .par_iter_mut()
        .zip(original.as_raw().par_iter())
        .for_each(|(p, &o)| {
            let v = o as f32 * (1.0 - strength) + *p as f32 * strength;
            *p = v.round().clamp(0.0, 255.0) as u8;
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColorBand, Grain, Vignette};
    use crate::stages::GrainParams;

    fn solid(r: u8, g: u8, b: u8) -> RgbaImage {
        RgbaImage::from_pixel(8, 6, image::Rgba([r, g, b, 255]))
    }

    #[test]
    fn blue_band_ignores_pure_red() {
        let img = solid(255, 0, 0);
        let bands = [BandShift {
            band: ColorBand::Blue,
            hue_shift: 90.0,
            sat_factor: 0.0,
            lum_delta: 0.3,
        }];
        assert_eq!(apply_hsl(&img, &bands), img);
    }

    #[test]
    fn red_band_shift_moves_hue() {
        let img = solid(255, 0, 0);
        let bands = [BandShift {
            band: ColorBand::Red,
            hue_shift: 120.0,
            sat_factor: 1.0,
            lum_delta: 0.0,
        }];
        let out = apply_hsl(&img, &bands);
        assert_eq!(out.get_pixel(0, 0).0, [0, 255, 0, 255]);
    }

    #[test]
    fn bands_see_the_running_hue() {
        let img = solid(255, 0, 0);
        let bands = [
            BandShift {
                band: ColorBand::Red,
                hue_shift: 240.0,
                sat_factor: 1.0,
                lum_delta: 0.0,
            },
            BandShift {
                band: ColorBand::Blue,
                hue_shift: 0.0,
                sat_factor: 0.0,
                lum_delta: 0.0,
            },
        ];
        let px = apply_hsl(&img, &bands).get_pixel(0, 0).0;
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn grey_pixels_fall_in_the_red_band() {
        let img = solid(100, 100, 100);
        let red = BandShift::from(&crate::models::HslAdjustment {
            color_band: ColorBand::Red,
            hue_shift: None,
            sat_scale: None,
            lum_offset: Some(40.0),
        });
        assert_eq!(apply_hsl(&img, &[red]).get_pixel(0, 0).0, [151, 151, 151, 255]);

        let green = BandShift { band: ColorBand::Green, ..red };
        assert_eq!(apply_hsl(&img, &[green]), img);
    }

    #[test]
    fn split_tone_tints_shadows_only_below_threshold() {
        let params = SplitToneParams::from(&crate::models::SplitToning {
            shadow_hue: 240.0,
            shadow_sat: 100.0,
            highlight_hue: 0.0,
            highlight_sat: 0.0,
            balance: 0.0,
        });
        let dark = apply_split_tone(&solid(40, 40, 40), &params);
        let px = dark.get_pixel(0, 0);
        assert!(px[2] > 40 && px[0] < 40);
        let bright = solid(220, 220, 220);
        assert_eq!(apply_split_tone(&bright, &params), bright);
    }

    #[test]
    fn split_tone_tints_highlights_above_threshold() {
        let params = SplitToneParams::from(&crate::models::SplitToning {
            shadow_hue: 240.0,
            shadow_sat: 100.0,
            highlight_hue: 0.0,
            highlight_sat: 100.0,
            balance: 0.0,
        });
        // L = 0.902, f = (L - 0.5) / 0.5, tint (255, 0, 0).
        let out = apply_split_tone(&solid(230, 230, 230), &params);
        assert_eq!(out.get_pixel(0, 0).0, [255, 199, 199, 255]);
    }

    #[test]
    fn grain_is_deterministic_per_seed() {
        let img = solid(100, 150, 200);
        let params = GrainParams::new(&Grain::with_amount(60.0), 11);
        let a = apply_grain(&img, &params);
        assert_eq!(a, apply_grain(&img, &params));
        assert_ne!(a, img);
        assert!(a.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn dark_vignette_darkens_corners_not_centre() {
        let img = RgbaImage::from_pixel(41, 41, image::Rgba([200, 200, 200, 255]));
        let params = VignetteParams::from(&Vignette::with_amount(-80.0));
        let out = apply_vignette(&img, &params);
        assert_eq!(out.get_pixel(20, 20)[0], 200);
        assert!(out.get_pixel(0, 0)[0] < 200);
    }

    #[test]
    fn light_vignette_brightens_corners() {
        let img = RgbaImage::from_pixel(41, 41, image::Rgba([60, 60, 60, 255]));
        let params = VignetteParams::from(&Vignette::with_amount(80.0));
        let out = apply_vignette(&img, &params);
        assert_eq!(out.get_pixel(20, 20)[0], 60);
        assert!(out.get_pixel(40, 40)[0] > 60);
    }

    #[test]
    fn blend_endpoints() {
        let a = solid(10, 20, 30);
        let b = solid(200, 100, 0);
        assert_eq!(blend(&a, &b, 0.0), a);
        assert_eq!(blend(&a, &b, 1.0), b);
        assert_eq!(blend(&a, &b, 0.5).get_pixel(0, 0).0, [105, 60, 15, 255]);
    }
}
