//! JSON bodies exchanged between the page (or the CLI) and the server.

use serde::{Deserialize, Serialize};

use crate::discretize::{Segment, StepResolution};

/// One `(function, domain)` row, exactly as typed by the user
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionRow {
    #[serde(default)]
    pub function: String,

    #[serde(default)]
    pub domain: String,
}

impl FunctionRow {
    pub fn new(function: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            domain: domain.into(),
        }
    }

    /// Both fields are filled in
    pub fn is_complete(&self) -> bool {
        !self.function.trim().is_empty() && !self.domain.trim().is_empty()
    }

    pub fn trimmed(&self) -> Self {
        Self::new(self.function.trim(), self.domain.trim())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Axis::X),
            "Y" | "y" => Ok(Axis::Y),
            "Z" | "z" => Ok(Axis::Z),
            other => Err(format!("Unknown axis '{}', expected X, Y or Z", other)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PlotRequest {
    #[serde(default)]
    pub functions: Vec<FunctionRow>,
}

/// Step angle and microsteps may be absent or `null` (the page sends `NaN`
/// as `null`), the server falls back to its defaults then
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResolutionFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_angle: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub microsteps: Option<u32>,
}

impl ResolutionFields {
    pub fn resolve(&self, defaults: StepResolution) -> StepResolution {
        StepResolution {
            step_angle: self.step_angle.unwrap_or(defaults.step_angle),
            microsteps: self.microsteps.unwrap_or(defaults.microsteps),
        }
    }
}

impl From<StepResolution> for ResolutionFields {
    fn from(r: StepResolution) -> Self {
        Self {
            step_angle: Some(r.step_angle),
            microsteps: Some(r.microsteps),
        }
    }
}

/// Body of both `/profile` and `/discretize`
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ResolvedFunctionsRequest {
    #[serde(default)]
    pub functions: Vec<FunctionRow>,

    #[serde(flatten)]
    pub resolution: ResolutionFields,
}

pub type ProfileRequest = ResolvedFunctionsRequest;
pub type DiscretizeRequest = ResolvedFunctionsRequest;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DiscretizeAllRequest {
    #[serde(rename = "X", default)]
    pub x: Vec<FunctionRow>,

    #[serde(rename = "Y", default)]
    pub y: Vec<FunctionRow>,

    #[serde(rename = "Z", default)]
    pub z: Vec<FunctionRow>,

    #[serde(flatten)]
    pub resolution: ResolutionFields,
}

impl DiscretizeAllRequest {
    pub fn rows(&self, axis: Axis) -> &[FunctionRow] {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ImageResponse {
    /// base64 encoded PNG
    pub img: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiscretizeResponse {
    pub segments: Vec<Segment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AxisSummary {
    pub axis: Axis,
    pub file: String,
    pub dt_us: u32,
    pub samples: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DiscretizeAllResponse {
    pub success: bool,
    pub axes: Vec<AxisSummary>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorResponse {
    pub error: String,
}
