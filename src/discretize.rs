use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::piecewise::{linspace, Piece, Piecewise, NO_VALID_SEGMENTS};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepResolution {
    /// Full step angle, degrees
    pub step_angle: f64,
    pub microsteps: u32,
}

impl Default for StepResolution {
    fn default() -> Self {
        Self {
            step_angle: 1.8,
            microsteps: 16,
        }
    }
}

impl StepResolution {
    pub fn validate(self) -> Result<Self> {
        if !self.step_angle.is_finite() || self.step_angle <= 0.0 {
            return Err(Error::validation(format!(
                "Invalid step resolution: step angle must be positive, got {}",
                self.step_angle
            )));
        }
        if self.microsteps == 0 {
            return Err(Error::validation(
                "Invalid step resolution: microsteps must be at least 1",
            ));
        }
        Ok(self)
    }

    /// Smallest commandable angle, degrees
    pub fn theta_res(&self) -> f64 {
        self.step_angle / self.microsteps as f64
    }

    pub fn steps_per_rev(&self) -> u32 {
        (360.0 / self.step_angle).round() as u32
    }

    /// Angle actually reached by the motor when commanded `angle`
    pub fn quantize(&self, angle: f64) -> f64 {
        let res = self.theta_res();
        (angle / res).round() * res
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiscretizeLimits {
    /// Samples used to estimate the maximum angular velocity
    pub initial_samples: usize,
    pub max_samples: usize,
}

impl Default for DiscretizeLimits {
    fn default() -> Self {
        Self {
            initial_samples: 1000,
            max_samples: 2_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    pub domain: String,
    /// Sample period, seconds
    pub dt: f64,
    pub angles: Vec<f64>,
}

impl Segment {
    /// `(time, angle)` pairs, times spread evenly over `domain`
    pub fn points<'a>(&'a self, piece: &Piece) -> impl Iterator<Item = (f64, f64)> + 'a {
        piece
            .domain
            .linspace(self.angles.len())
            .zip(self.angles.iter().copied())
    }
}

fn not_finite(piece: &Piece) -> Error {
    Error::validation(format!(
        "Function on row {} is not finite over {}",
        piece.row, piece.domain_text
    ))
}

fn sample(piece: &Piece, n: usize) -> Result<Vec<f64>> {
    piece
        .domain
        .linspace(n)
        .map(|t| {
            let v = piece.eval(t);
            if v.is_finite() {
                Ok(v)
            } else {
                Err(not_finite(piece))
            }
        })
        .collect()
}

/// Largest `|dθ/dt|` between neighbouring samples
fn max_velocity(piece: &Piece, initial_samples: usize) -> Result<f64> {
    let n = initial_samples.max(2);
    let times = piece.domain.linspace(n).collect::<Vec<_>>();
    let angles = sample(piece, n)?;

    Ok(times
        .iter()
        .tuple_windows()
        .zip(angles.iter().tuple_windows())
        .map(|((t0, t1), (a0, a1))| ((a1 - a0) / (t1 - t0)).abs())
        .fold(0.0, f64::max))
}

/// Sample one piece so that consecutive samples are at most one microstep apart
/// (judged by the steepest slope over the piece).
pub fn discretize_piece(
    piece: &Piece,
    resolution: StepResolution,
    limits: DiscretizeLimits,
) -> Result<Segment> {
    let theta_res = resolution.theta_res();
    let vmax = max_velocity(piece, limits.initial_samples)?;
    let len = piece.domain.len();

    let dt = if vmax > 0.0 { theta_res / vmax } else { len };
    let n = (len / dt).ceil() + 1.0;
    if n > limits.max_samples as f64 {
        return Err(Error::validation(format!(
            "Segment on row {} needs {} samples, limit is {}",
            piece.row, n, limits.max_samples
        )));
    }

    let angles = sample(piece, n as usize)?;
    Ok(Segment {
        domain: piece.domain_text.clone(),
        dt,
        angles,
    })
}

pub fn discretize(
    piecewise: &Piecewise,
    resolution: StepResolution,
    limits: DiscretizeLimits,
) -> Result<Vec<Segment>> {
    let resolution = resolution.validate()?;
    piecewise
        .pieces()
        .iter()
        .map(|piece| discretize_piece(piece, resolution, limits))
        .collect()
}

/// Motor profile: discretized samples rounded to the microstep grid
pub fn profile_points(
    piecewise: &Piecewise,
    resolution: StepResolution,
    limits: DiscretizeLimits,
) -> Result<Vec<(f64, f64)>> {
    let segments = discretize(piecewise, resolution, limits)?;
    Ok(piecewise
        .pieces()
        .iter()
        .zip(segments.iter())
        .flat_map(|(piece, segment)| {
            segment
                .points(piece)
                .map(|(t, a)| (t, resolution.quantize(a)))
                .collect::<Vec<_>>()
        })
        .collect())
}

/// Uniformly sampled whole-axis trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSamples {
    pub dt_us: u32,
    pub start: f64,
    pub angles: Vec<f64>,
}

/// Resample a piecewise function on one fixed period, the finest one
/// required by any of its segments.
pub fn resample_axis(
    piecewise: &Piecewise,
    segments: &[Segment],
    limits: DiscretizeLimits,
) -> Result<AxisSamples> {
    let min_dt = segments
        .iter()
        .map(|s| s.dt)
        .fold(f64::INFINITY, f64::min);
    if !min_dt.is_finite() {
        return Err(Error::validation(NO_VALID_SEGMENTS));
    }

    // tolerate rounding noise of the velocity estimate before flooring
    let dt_us = (min_dt * 1e6 * (1.0 + 1e-9))
        .floor()
        .clamp(1.0, u32::MAX as f64) as u32;
    let dt = dt_us as f64 / 1e6;
    let span = piecewise.span();

    let n = (span.len() / dt).floor() + 1.0;
    if n > limits.max_samples as f64 {
        return Err(Error::validation(format!(
            "Trajectory needs {} samples at {} us, limit is {}",
            n, dt_us, limits.max_samples
        )));
    }

    let angles = (0..n as usize)
        .map(|k| piecewise.eval(span.start + k as f64 * dt))
        .collect::<Vec<_>>();

    if angles.iter().any(|a| !a.is_finite()) {
        return Err(Error::validation(format!(
            "Function is not finite over {}",
            span
        )));
    }

    Ok(AxisSamples {
        dt_us,
        start: span.start,
        angles,
    })
}

/// Pick `n` evenly spaced values from `values`, keeping both ends
pub fn decimate(values: &[(f64, f64)], n: usize) -> Vec<(f64, f64)> {
    if values.len() <= n || n < 2 {
        return values.to_vec();
    }
    linspace(0.0, (values.len() - 1) as f64, n)
        .map(|i| values[i.round() as usize])
        .dedup_by(|a, b| a.0 == b.0)
        .collect()
}
