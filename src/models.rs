use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Declarative description of a look, handed to the engine already parsed.
///
/// Absence of a field (or of a whole sub-structure) is the only way to say
/// "leave this alone"; the engine never fills in guesses for malformed input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub adjustments: Adjustments,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curves: Option<Curves>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hsl: Vec<HslAdjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_toning: Option<SplitToning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpening: Option<Sharpening>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grain: Option<Grain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vignette: Option<Vignette>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Adjustments {
    pub exposure: Option<f32>,
    pub temperature: Option<f32>,
    pub tint: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub vibrance: Option<f32>,
    pub shadows: Option<f32>,
    pub highlights: Option<f32>,
    pub whites: Option<f32>,
    pub blacks: Option<f32>,
    pub clarity: Option<f32>,
    pub texture: Option<f32>,
    pub dehaze: Option<f32>,
}

impl Adjustments {
    fn named_fields(&self) -> [(&'static str, Option<f32>); 13] {
        [
            ("exposure", self.exposure),
            ("temperature", self.temperature),
            ("tint", self.tint),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("vibrance", self.vibrance),
            ("shadows", self.shadows),
            ("highlights", self.highlights),
            ("whites", self.whites),
            ("blacks", self.blacks),
            ("clarity", self.clarity),
            ("texture", self.texture),
            ("dehaze", self.dehaze),
        ]
    }
}

/// A tone-curve control point, `[x, y]` on the byte scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint(pub f32, pub f32);

impl CurvePoint {
    pub fn x(&self) -> f32 {
        self.0
    }

    pub fn y(&self) -> f32 {
        self.1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Curves {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rgb: Option<Vec<CurvePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<Vec<CurvePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub g: Option<Vec<CurvePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b: Option<Vec<CurvePoint>>,
}

impl Curves {
    pub fn channels(&self) -> [(&'static str, Option<&[CurvePoint]>); 4] {
        [
            ("rgb", self.rgb.as_deref()),
            ("r", self.r.as_deref()),
            ("g", self.g.as_deref()),
            ("b", self.b.as_deref()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorBand {
    Red,
    Orange,
    Yellow,
    Green,
    #[serde(alias = "cyan")]
    Aqua,
    Blue,
    Purple,
    Magenta,
}

impl ColorBand {
    pub const ALL: [ColorBand; 8] = [
        ColorBand::Red,
        ColorBand::Orange,
        ColorBand::Yellow,
        ColorBand::Green,
        ColorBand::Aqua,
        ColorBand::Blue,
        ColorBand::Purple,
        ColorBand::Magenta,
    ];

    /// Inclusive hue interval in degrees. Red is stored as its upper half;
    /// `contains` adds the wrap-around `[0, 30]` part.
    pub fn hue_range(self) -> (f32, f32) {
        match self {
            ColorBand::Red => (330.0, 360.0),
            ColorBand::Orange => (30.0, 60.0),
            ColorBand::Yellow => (60.0, 90.0),
            ColorBand::Green => (90.0, 150.0),
            ColorBand::Aqua => (150.0, 210.0),
            ColorBand::Blue => (210.0, 270.0),
            ColorBand::Purple => (270.0, 300.0),
            ColorBand::Magenta => (300.0, 330.0),
        }
    }

    pub fn contains(self, hue: f32) -> bool {
        let (lo, hi) = self.hue_range();
        let inside = hue >= lo && hue <= hi;
        match self {
            ColorBand::Red => inside || (0.0..=30.0).contains(&hue),
            _ => inside,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HslAdjustment {
    #[serde(alias = "color")]
    pub color_band: ColorBand,
    #[serde(default, alias = "hue", skip_serializing_if = "Option::is_none")]
    pub hue_shift: Option<f32>,
    #[serde(default, alias = "sat", skip_serializing_if = "Option::is_none")]
    pub sat_scale: Option<f32>,
    #[serde(default, alias = "lum", skip_serializing_if = "Option::is_none")]
    pub lum_offset: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SplitToning {
    pub shadow_hue: f32,
    #[serde(alias = "shadowSaturation")]
    pub shadow_sat: f32,
    pub highlight_hue: f32,
    #[serde(alias = "highlightSaturation")]
    pub highlight_sat: f32,
    /// -100 (favour highlights) ..= 100 (favour shadows).
    pub balance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Sharpening {
    pub amount: f32,
    pub radius: f32,
}

impl Default for Sharpening {
    fn default() -> Self {
        Self {
            amount: 0.0,
            radius: 1.0,
        }
    }
}

/// Film grain. A bare number in a profile means `{amount, size: 25, roughness: 50}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "GrainRepr")]
pub struct Grain {
    pub amount: f32,
    pub size: f32,
    pub roughness: f32,
}

impl Grain {
    pub const DEFAULT_SIZE: f32 = 25.0;
    pub const DEFAULT_ROUGHNESS: f32 = 50.0;

    pub fn with_amount(amount: f32) -> Self {
        Self {
            amount,
            size: Self::DEFAULT_SIZE,
            roughness: Self::DEFAULT_ROUGHNESS,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GrainRepr {
    Amount(f32),
    Full {
        #[serde(default)]
        amount: f32,
        #[serde(default = "default_grain_size")]
        size: f32,
        #[serde(default = "default_grain_roughness")]
        roughness: f32,
    },
}

fn default_grain_size() -> f32 {
    Grain::DEFAULT_SIZE
}

fn default_grain_roughness() -> f32 {
    Grain::DEFAULT_ROUGHNESS
}

impl From<GrainRepr> for Grain {
    fn from(repr: GrainRepr) -> Self {
        match repr {
            GrainRepr::Amount(amount) => Grain::with_amount(amount),
            GrainRepr::Full {
                amount,
                size,
                roughness,
            } => Grain {
                amount,
                size,
                roughness,
            },
        }
    }
}

/// Radial vignette. A bare number in a profile means "amount with defaults".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "VignetteRepr")]
pub struct Vignette {
    pub amount: f32,
    pub midpoint: f32,
    pub roundness: f32,
    pub feather: f32,
    pub highlights: f32,
}

impl Vignette {
    pub const DEFAULT_MIDPOINT: f32 = 50.0;
    pub const DEFAULT_FEATHER: f32 = 50.0;

    pub fn with_amount(amount: f32) -> Self {
        Self {
            amount,
            midpoint: Self::DEFAULT_MIDPOINT,
            roundness: 0.0,
            feather: Self::DEFAULT_FEATHER,
            highlights: 0.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VignetteRepr {
    Amount(f32),
    Full {
        #[serde(default)]
        amount: f32,
        #[serde(default = "default_vignette_midpoint")]
        midpoint: f32,
        #[serde(default)]
        roundness: f32,
        #[serde(default = "default_vignette_feather")]
        feather: f32,
        #[serde(default)]
        highlights: f32,
    },
}

fn default_vignette_midpoint() -> f32 {
    Vignette::DEFAULT_MIDPOINT
}

fn default_vignette_feather() -> f32 {
    Vignette::DEFAULT_FEATHER
}

impl From<VignetteRepr> for Vignette {
    fn from(repr: VignetteRepr) -> Self {
        match repr {
            VignetteRepr::Amount(amount) => Vignette::with_amount(amount),
            VignetteRepr::Full {
                amount,
                midpoint,
                roundness,
                feather,
                highlights,
            } => Vignette {
                amount,
                midpoint,
                roundness,
                feather,
                highlights,
            },
        }
    }
}

fn ensure_finite(field: &str, value: f32) -> PipelineResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PipelineError::profile(format!("{field} is not a finite number")))
    }
}

fn ensure_range(field: &str, value: f32, lo: f32, hi: f32) -> PipelineResult<()> {
    ensure_finite(field, value)?;
    if value < lo || value > hi {
        return Err(PipelineError::profile(format!(
            "{field} = {value} is outside [{lo}, {hi}]"
        )));
    }
    Ok(())
}

impl ProfileConfig {
    /// Rejects values the stages cannot represent. Runs before any work.
    pub fn validate(&self) -> PipelineResult<()> {
        for (name, value) in self.adjustments.named_fields() {
            if let Some(v) = value {
                ensure_finite(&format!("adjustments.{name}"), v)?;
            }
        }

        if let Some(curves) = &self.curves {
            for (channel, points) in curves.channels() {
                let Some(points) = points else { continue };
                if points.len() < 2 {
                    return Err(PipelineError::profile(format!(
                        "curves.{channel} needs at least two points, got {}",
                        points.len()
                    )));
                }
                for p in points {
                    ensure_range(&format!("curves.{channel}.x"), p.x(), 0.0, 255.0)?;
                    ensure_range(&format!("curves.{channel}.y"), p.y(), 0.0, 255.0)?;
                }
            }
        }

        for (idx, band) in self.hsl.iter().enumerate() {
            let fields = [
                ("hueShift", band.hue_shift),
                ("satScale", band.sat_scale),
                ("lumOffset", band.lum_offset),
            ];
            for (name, value) in fields {
                if let Some(v) = value {
                    ensure_finite(&format!("hsl[{idx}].{name}"), v)?;
                }
            }
        }

        if let Some(st) = &self.split_toning {
            ensure_finite("splitToning.shadowHue", st.shadow_hue)?;
            ensure_finite("splitToning.shadowSat", st.shadow_sat)?;
            ensure_finite("splitToning.highlightHue", st.highlight_hue)?;
            ensure_finite("splitToning.highlightSat", st.highlight_sat)?;
            ensure_finite("splitToning.balance", st.balance)?;
        }

        if let Some(sh) = &self.sharpening {
            ensure_range("sharpening.amount", sh.amount, 0.0, f32::MAX)?;
            ensure_finite("sharpening.radius", sh.radius)?;
            if sh.radius <= 0.0 {
                return Err(PipelineError::profile("sharpening.radius must be positive"));
            }
        }

        if let Some(grain) = &self.grain {
            ensure_finite("grain.amount", grain.amount)?;
            ensure_range("grain.size", grain.size, 0.0, 100.0)?;
            ensure_range("grain.roughness", grain.roughness, 0.0, 100.0)?;
        }

        if let Some(v) = &self.vignette {
            ensure_finite("vignette.amount", v.amount)?;
            ensure_finite("vignette.midpoint", v.midpoint)?;
            ensure_finite("vignette.roundness", v.roundness)?;
            ensure_range("vignette.feather", v.feather, 0.0, f32::MAX)?;
            ensure_finite("vignette.highlights", v.highlights)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_the_empty_profile() {
        let profile: ProfileConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(profile, ProfileConfig::default());
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn scalar_grain_and_vignette_use_defaults() {
        let profile: ProfileConfig =
            serde_json::from_str(r#"{"grain": 30, "vignette": -20}"#).unwrap();
        assert_eq!(profile.grain, Some(Grain::with_amount(30.0)));
        let v = profile.vignette.unwrap();
        assert_eq!(v.amount, -20.0);
        assert_eq!(v.midpoint, 50.0);
        assert_eq!(v.feather, 50.0);
        assert_eq!(v.roundness, 0.0);
    }

    #[test]
    fn partial_grain_object_fills_missing_fields() {
        let profile: ProfileConfig =
            serde_json::from_str(r#"{"grain": {"amount": 10, "roughness": 80}}"#).unwrap();
        let grain = profile.grain.unwrap();
        assert_eq!(grain.size, 25.0);
        assert_eq!(grain.roughness, 80.0);
    }

    #[test]
    fn preset_aliases_are_accepted() {
        let json = r#"{
            "hsl": [{"color": "blue", "hue": -10, "sat": 20, "lum": 5}],
            "splitToning": {"shadowHue": 200, "shadowSaturation": 30, "highlightHue": 40, "highlightSaturation": 15, "balance": 10}
        }"#;
        let profile: ProfileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(profile.hsl[0].color_band, ColorBand::Blue);
        assert_eq!(profile.hsl[0].hue_shift, Some(-10.0));
        assert_eq!(profile.hsl[0].lum_offset, Some(5.0));
        let st = profile.split_toning.unwrap();
        assert_eq!(st.shadow_sat, 30.0);
        assert_eq!(st.highlight_sat, 15.0);
    }

    #[test]
    fn curve_points_parse_from_pairs() {
        let profile: ProfileConfig =
            serde_json::from_str(r#"{"curves": {"rgb": [[255, 240], [0, 10]]}}"#).unwrap();
        let rgb = profile.curves.unwrap().rgb.unwrap();
        assert_eq!(rgb[0], CurvePoint(255.0, 240.0));
    }

    #[test]
    fn single_point_curve_is_rejected() {
        let profile: ProfileConfig =
            serde_json::from_str(r#"{"curves": {"g": [[0, 0]]}}"#).unwrap();
        let err = profile.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidProfile(msg) if msg.contains("curves.g")));
    }

    #[test]
    fn out_of_range_curve_point_is_rejected() {
        let profile: ProfileConfig =
            serde_json::from_str(r#"{"curves": {"rgb": [[0, 0], [300, 255]]}}"#).unwrap();
        assert!(profile.validate().is_err());
    }

    #[test]
    fn non_finite_adjustment_is_rejected() {
        let mut profile = ProfileConfig::default();
        profile.adjustments.exposure = Some(f32::NAN);
        assert!(matches!(
            profile.validate(),
            Err(PipelineError::InvalidProfile(_))
        ));
    }

    #[test]
    fn grain_size_outside_scale_is_rejected() {
        let mut profile = ProfileConfig::default();
        profile.grain = Some(Grain {
            amount: 20.0,
            size: -50.0,
            roughness: 50.0,
        });
        assert!(profile.validate().is_err());
    }

    #[test]
    fn red_band_wraps_around_zero() {
        assert!(ColorBand::Red.contains(0.0));
        assert!(ColorBand::Red.contains(15.0));
        assert!(ColorBand::Red.contains(345.0));
        assert!(!ColorBand::Red.contains(180.0));
        assert!(ColorBand::Blue.contains(240.0));
        assert!(!ColorBand::Blue.contains(0.0));
    }
}
