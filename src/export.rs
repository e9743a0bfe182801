use std::path::PathBuf;

use crate::api::{Axis, AxisSummary, FunctionRow};
use crate::discretize::{self, DiscretizeLimits, StepResolution};
use crate::error::{Error, Result};
use crate::manifest;
use crate::piecewise::{Piecewise, NO_FUNCTIONS, NO_VALID_SEGMENTS};
use crate::traj_file::Trajectory;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub device_prefix: String,
    pub angle_scale: u32,
    pub limits: DiscretizeLimits,
}

fn prepare_axis(
    axis: Axis,
    rows: &[FunctionRow],
    resolution: StepResolution,
    options: &ExportOptions,
) -> Result<Trajectory> {
    let prefix = format!("Axis {}: ", axis);
    if rows.is_empty() {
        return Err(Error::validation(format!("{prefix}{NO_FUNCTIONS}")));
    }

    let piecewise = Piecewise::from_rows(rows, NO_VALID_SEGMENTS).map_err(|e| e.context(&prefix))?;
    let segments = discretize::discretize(&piecewise, resolution, options.limits)
        .map_err(|e| e.context(&prefix))?;
    let samples = discretize::resample_axis(&piecewise, &segments, options.limits)
        .map_err(|e| e.context(&prefix))?;

    let trajectory = Trajectory::new(samples.dt_us, options.angle_scale, samples.angles);
    // check the fixed point range now, nothing is written unless all axes pass
    trajectory
        .encode()
        .map_err(|e| Error::validation(format!("{prefix}{e}")))?;
    Ok(trajectory)
}

/// Discretize all three axes, then write one trajectory file per axis and
/// update `commands.json`. Nothing is written if any axis fails.
pub fn discretize_all(
    rows: [&[FunctionRow]; 3],
    resolution: StepResolution,
    options: &ExportOptions,
) -> Result<Vec<AxisSummary>> {
    let resolution = resolution.validate()?;

    let trajectories = Axis::ALL
        .iter()
        .map(|axis| prepare_axis(*axis, rows[axis.index()], resolution, options))
        .collect::<Result<Vec<_>>>()?;

    std::fs::create_dir_all(&options.output_dir)?;
    let existing = manifest::load(&options.output_dir)?;

    let mut summary = vec![];
    for (axis, trajectory) in Axis::ALL.iter().zip(trajectories.iter()) {
        let file = options.output_dir.join(manifest::trajectory_file_name(*axis));
        trajectory.save(&file)?;
        tracing::info!(
            "Axis {}: {} samples at {} us written to {:?}",
            axis,
            trajectory.samples.len(),
            trajectory.header.sample_dt_us,
            file
        );

        summary.push(AxisSummary {
            axis: *axis,
            file: file.to_string_lossy().to_string(),
            dt_us: trajectory.header.sample_dt_us,
            samples: trajectory.header.total_samples,
        });
    }

    let dt_us = [summary[0].dt_us, summary[1].dt_us, summary[2].dt_us];
    let manifest = manifest::update(
        existing,
        resolution,
        &dt_us,
        &options.device_prefix,
    );
    manifest::save(&options.output_dir, &manifest)?;

    Ok(summary)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_file::TrajFileError;

    fn options(dir: &std::path::Path) -> ExportOptions {
        ExportOptions {
            output_dir: dir.to_path_buf(),
            device_prefix: "/gimbal".to_owned(),
            angle_scale: 1_000_000,
            limits: DiscretizeLimits::default(),
        }
    }

    fn message(e: Error) -> String {
        match e {
            Error::Validation(m) => m,
            other => panic!("not a validation error: {:?}", other),
        }
    }

    #[test]
    fn test_writes_all_axes() {
        let dir = tempfile::tempdir().unwrap();
        let x = vec![FunctionRow::new("15*x", "0,2"), FunctionRow::new("30", "2,3")];
        let y = vec![FunctionRow::new("10*sin(2*pi*x/6)", "0,6")];
        let z = vec![FunctionRow::new("0", "0,1")];

        let summary = discretize_all(
            [&x, &y, &z],
            StepResolution::default(),
            &options(dir.path()),
        )
        .unwrap();

        assert_eq!(summary.len(), 3);
        assert_eq!(summary[0].axis, Axis::X);
        // 0.1125 deg at 15 deg/s
        assert_eq!(summary[0].dt_us, 7500);
        // constant axis: one period covers the domain
        assert_eq!(summary[2].dt_us, 1_000_000);
        assert_eq!(summary[2].samples, 2);

        let traj_x = Trajectory::load(dir.path().join("trajectory_X.traj"), 0).unwrap();
        assert_eq!(traj_x.header.total_samples, summary[0].samples);
        assert_eq!(traj_x.samples[0], 0.0);
        assert!((traj_x.samples.last().unwrap() - 30.0).abs() < 1e-6);

        let manifest = manifest::load(dir.path()).unwrap().unwrap();
        assert_eq!(manifest["ui"]["trajectory_files"][2], "/gimbal/trajectory_Z.traj");
        // the constant Z axis plays one sample per second
        assert_eq!(manifest["logging"]["rate_hz"], 1);
    }

    #[test]
    fn test_nothing_written_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let good = vec![FunctionRow::new("x", "0,1")];
        let bad = vec![FunctionRow::new("x", "1,0")];

        let err = discretize_all([&good, &bad, &good], StepResolution::default(), &options(&out))
            .unwrap_err();
        assert_eq!(message(err), "Axis Y: Invalid domain on row 1. Use start,end");
        assert!(!out.exists());
    }

    #[test]
    fn test_malformed_manifest_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let manifest_path = dir.path().join(manifest::FILE_NAME);
        std::fs::write(&manifest_path, "{ \"pins\": { \"sd_card_cs\": 10 ").unwrap();

        let good = vec![FunctionRow::new("x", "0,1")];
        let err = discretize_all([&good, &good, &good], StepResolution::default(), &options(dir.path()))
            .unwrap_err();
        assert!(matches!(err, Error::Manifest { .. }));
        assert!(!err.is_validation());

        assert_eq!(
            std::fs::read_to_string(&manifest_path).unwrap(),
            "{ \"pins\": { \"sd_card_cs\": 10 "
        );
        assert!(!dir.path().join("trajectory_X.traj").exists());
    }

    #[test]
    fn test_empty_axis() {
        let dir = tempfile::tempdir().unwrap();
        let good = vec![FunctionRow::new("x", "0,1")];
        let err = discretize_all([&good, &good, &[]], StepResolution::default(), &options(dir.path()))
            .unwrap_err();
        assert_eq!(message(err), "Axis Z: No functions provided");

        let blank = vec![FunctionRow::new("", "")];
        let err = discretize_all([&blank, &good, &good], StepResolution::default(), &options(dir.path()))
            .unwrap_err();
        assert_eq!(message(err), "Axis X: No valid segments to discretize");
    }

    #[test]
    fn test_out_of_range_angle_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let good = vec![FunctionRow::new("x", "0,1")];
        let huge = vec![FunctionRow::new("5000", "0,1")];
        let err = discretize_all([&good, &good, &huge], StepResolution::default(), &options(dir.path()))
            .unwrap_err();
        assert!(message(err).starts_with("Axis Z: "));
        assert!(matches!(
            Trajectory::load(dir.path().join("trajectory_X.traj"), 0),
            Err(TrajFileError::Io(_))
        ));
    }
}
