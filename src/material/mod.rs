//! Materials: BSDF selection plus the channel samplers that feed the shader.
//!
//! The material representation is decided once, when the material is built,
//! as a closed union of the three mutually exclusive channel layouts:
//! a combined positional MLP (`kd`+`ks`+`normal` in one lookup), a pure
//! radiance field, or classic 2D textures. The pixel shader matches on the
//! variant instead of re-inspecting keys per call.

mod sampler;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

pub use sampler::{BitmapTexture, ConstantField, FieldSampler, RadianceSampler, Texture2d};

/// Closed set of BSDF evaluation paths.
///
/// The `*Optix` variants are Monte-Carlo integrated against an importance
/// sampled environment; `Pbr`/`Diffuse` use the analytic environment light;
/// the rest are pass-through or debug visualization paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bsdf {
    PbrOptix,
    DiffuseOptix,
    WhiteOptix,
    Pbr,
    Diffuse,
    Radiance,
    Normal,
    Tangent,
    Corr,
    Kd,
    Ks,
}

impl Bsdf {
    /// Configuration-file spelling of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Bsdf::PbrOptix => "pbr-optix",
            Bsdf::DiffuseOptix => "diffuse-optix",
            Bsdf::WhiteOptix => "white-optix",
            Bsdf::Pbr => "pbr",
            Bsdf::Diffuse => "diffuse",
            Bsdf::Radiance => "radiance",
            Bsdf::Normal => "normal",
            Bsdf::Tangent => "tangent",
            Bsdf::Corr => "corr",
            Bsdf::Kd => "kd",
            Bsdf::Ks => "ks",
        }
    }

    /// Whether this path runs the Monte-Carlo environment integrator.
    pub fn is_monte_carlo(&self) -> bool {
        matches!(self, Bsdf::PbrOptix | Bsdf::DiffuseOptix | Bsdf::WhiteOptix)
    }
}

impl fmt::Display for Bsdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bsdf {
    type Err = RenderError;

    /// Parse a configuration tag. Unknown strings are a fatal configuration
    /// error, surfaced at the parse boundary instead of mid-render.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pbr-optix" => Ok(Bsdf::PbrOptix),
            "diffuse-optix" => Ok(Bsdf::DiffuseOptix),
            "white-optix" => Ok(Bsdf::WhiteOptix),
            "pbr" => Ok(Bsdf::Pbr),
            "diffuse" => Ok(Bsdf::Diffuse),
            "radiance" => Ok(Bsdf::Radiance),
            "normal" => Ok(Bsdf::Normal),
            "tangent" => Ok(Bsdf::Tangent),
            "corr" => Ok(Bsdf::Corr),
            "kd" => Ok(Bsdf::Kd),
            "ks" => Ok(Bsdf::Ks),
            other => Err(RenderError::UnknownBsdf(other.to_string())),
        }
    }
}

/// The three mutually exclusive material channel layouts.
pub enum MaterialChannels {
    /// One positional lookup yielding kd + ks + perturbed normal
    /// (9 or 10 channels). Used for MLP materials where lookups are
    /// expensive enough to amortize.
    CombinedMlp(Box<dyn FieldSampler>),

    /// View-dependent radiance field; albedo is the shaded color.
    Radiance(Box<dyn RadianceSampler>),

    /// Classic 2D textures sampled at interpolated texcoords.
    Textures {
        kd: Box<dyn Texture2d>,
        ks: Box<dyn Texture2d>,
        normal: Option<Box<dyn Texture2d>>,
    },
}

impl fmt::Debug for MaterialChannels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaterialChannels::CombinedMlp(_) => f.write_str("CombinedMlp"),
            MaterialChannels::Radiance(_) => f.write_str("Radiance"),
            MaterialChannels::Textures { normal, .. } => f
                .debug_struct("Textures")
                .field("normal", &normal.is_some())
                .finish(),
        }
    }
}

/// A material: channel layout, default BSDF, and flags.
#[derive(Debug)]
pub struct Material {
    pub channels: MaterialChannels,
    /// Default BSDF path; a per-render override may replace it.
    pub bsdf: Option<Bsdf>,
    /// Discard any perturbed normal the channels produce.
    pub no_perturbed_nrm: bool,
}

impl Material {
    pub fn new(channels: MaterialChannels, bsdf: Option<Bsdf>) -> Self {
        Self {
            channels,
            bsdf,
            no_perturbed_nrm: false,
        }
    }

    /// Resolve the BSDF to use for a render, given an optional override.
    /// Missing on both sides is a fatal configuration error.
    pub fn resolve_bsdf(&self, bsdf_override: Option<Bsdf>) -> Result<Bsdf, RenderError> {
        bsdf_override.or(self.bsdf).ok_or(RenderError::MissingBsdf)
    }
}
