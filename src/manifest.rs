//! `commands.json` read by the firmware at boot.
//!
//! Only the keys derived from the trajectories are written. Anything else
//! already present in the file (pins, encoders, safety) is preserved.

use std::path::Path;

use serde_json::{json, Map, Value};

use crate::api::Axis;
use crate::discretize::StepResolution;
use crate::error::{Error, Result};

pub const FILE_NAME: &str = "commands.json";
pub const SCHEMA_VERSION: u64 = 1;
/// Firmware default logging rate
pub const MAX_LOG_RATE_HZ: u32 = 200;

pub fn trajectory_file_name(axis: Axis) -> String {
    format!("trajectory_{}.traj", axis)
}

/// Path of the trajectory as seen by the device
pub fn device_path(prefix: &str, axis: Axis) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), trajectory_file_name(axis))
}

/// Logging must not run faster than the fastest axis plays its samples
pub fn log_rate_hz(dt_us: &[u32]) -> u32 {
    dt_us
        .iter()
        .map(|dt| (1e6 / *dt.max(&1) as f64).floor() as u32)
        .fold(MAX_LOG_RATE_HZ, u32::min)
        .max(1)
}

fn object<'a>(parent: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let entry = parent
        .entry(key.to_owned())
        .or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("replaced with an object above"),
    }
}

/// Merge the trajectory settings into `existing` (or an empty manifest)
pub fn update(
    existing: Option<Value>,
    resolution: StepResolution,
    dt_us: &[u32; 3],
    device_prefix: &str,
) -> Value {
    let mut root = match existing {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    root.insert("schema_version".to_owned(), json!(SCHEMA_VERSION));

    {
        let stepper = object(&mut root, "stepper");
        let axes = stepper
            .entry("axes".to_owned())
            .or_insert_with(|| Value::Array(vec![]));
        if !axes.is_array() {
            *axes = Value::Array(vec![]);
        }
        if let Value::Array(axes) = axes {
            axes.resize_with(3, || Value::Object(Map::new()));
            for axis in axes.iter_mut() {
                if !axis.is_object() {
                    *axis = Value::Object(Map::new());
                }
                if let Value::Object(axis) = axis {
                    axis.insert("steps_per_rev".to_owned(), json!(resolution.steps_per_rev()));
                    axis.insert("microstep".to_owned(), json!(resolution.microsteps));
                }
            }
        }
    }

    object(&mut root, "logging").insert("rate_hz".to_owned(), json!(log_rate_hz(dt_us)));

    object(&mut root, "ui").insert(
        "trajectory_files".to_owned(),
        Value::Array(
            Axis::ALL
                .iter()
                .map(|a| Value::String(device_path(device_prefix, *a)))
                .collect(),
        ),
    );

    Value::Object(root)
}

/// Read the manifest in `dir`. `None` if there is none yet. A file that
/// cannot be read or is not a JSON object is an error, it may hold settings
/// that must survive.
pub fn load(dir: &Path) -> Result<Option<Value>> {
    let path = dir.join(FILE_NAME);
    let unusable = |reason: String| Error::Manifest {
        path: path.display().to_string(),
        reason,
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(unusable(e.to_string())),
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(v @ Value::Object(_)) => Ok(Some(v)),
        Ok(_) => Err(unusable("not a JSON object".to_owned())),
        Err(e) => Err(unusable(format!("malformed JSON: {e}"))),
    }
}

pub fn save(dir: &Path, manifest: &Value) -> Result<()> {
    let data = serde_json::to_vec_pretty(manifest)?;
    crate::traj_file::write_atomic(&dir.join(FILE_NAME), &data)?;
    Ok(())
}
