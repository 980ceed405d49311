//! Shared per-pixel colour maths. The WGSL kernels in `shaders/common.wgsl`
//! mirror these functions one for one.

/// Byte-scale mid grey on the normalized scale.
pub const MID_GREY: f32 = 128.0 / 255.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    /// Degrees, `[0, 360)`.
    pub h: f32,
    pub s: f32,
    pub l: f32,
}

pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> Hsl {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;
    if max == min {
        return Hsl { h: 0.0, s: 0.0, l };
    }
    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    Hsl {
        h: h * 60.0,
        s,
        l,
    }
}

fn hue_to_channel(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

pub fn hsl_to_rgb(hsl: Hsl) -> [f32; 3] {
    let Hsl { h, s, l } = hsl;
    if s == 0.0 {
        return [l, l, l];
    }
    let h = h / 360.0;
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    ]
}

/// Tint colour for split toning: HSL with percent saturation at 50 % lightness,
/// rounded to bytes.
pub fn tint_color(hue: f32, sat_percent: f32) -> [f32; 3] {
    let rgb = hsl_to_rgb(Hsl {
        h: hue.rem_euclid(360.0),
        s: (sat_percent / 100.0).clamp(0.0, 1.0),
        l: 0.5,
    });
    rgb.map(|c| (c * 255.0).round())
}

/// Rec.601 luma on whatever scale the inputs use.
#[inline]
pub fn luma601(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Rescale HSL saturation of a normalized RGB triple.
pub fn scale_saturation(c: [f32; 3], factor: f32) -> [f32; 3] {
    let mut hsl = rgb_to_hsl(c[0], c[1], c[2]);
    hsl.s = (hsl.s * factor).clamp(0.0, 1.0);
    hsl_to_rgb(hsl)
}

#[inline]
pub fn overlay(base: f32, blend: f32) -> f32 {
    if base < 0.5 {
        2.0 * base * blend
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - blend)
    }
}

#[inline]
pub fn screen(base: f32, blend: f32) -> f32 {
    1.0 - (1.0 - base) * (1.0 - blend)
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

#[inline]
pub fn to_unit(v: u8) -> f32 {
    v as f32 / 255.0
}

#[inline]
pub fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
