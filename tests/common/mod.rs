//! Shared fixtures for the integration tests

#![allow(dead_code)]

use aegis_risk::ml::{BoostingParams, TrainingOptions, TrainingProcedure, TrainingReport};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HEADER: &[&str] = &[
    "lat",
    "lon",
    "elevation_meters",
    "dist_to_coast_km",
    "dist_to_major_river_km",
    "avg_annual_rainfall_mm",
    "seismic_zone",
    "state",
    "district",
    "primary_hazard_type",
    "risk_level",
];

const STATES: &[(&str, &[&str])] = &[
    ("Kerala", &["Ernakulam", "Idukki", "Wayanad"]),
    ("Tamil Nadu", &["Chennai", "Madurai", "Nilgiris"]),
    ("Odisha", &["Puri", "Cuttack", "Koraput"]),
    ("Rajasthan", &["Jaipur", "Jodhpur", "Bikaner"]),
];

/// One synthetic district row; the label follows elevation and coast distance
pub fn district_row(i: usize) -> Vec<String> {
    let (state, districts) = STATES[i % STATES.len()];
    let district = districts[(i / STATES.len()) % districts.len()];
    let band = i % 3;

    let elevation = [620.0, 180.0, 6.0][band] + (i % 11) as f64 * 3.5;
    let coast = [410.0, 85.0, 3.0][band] + (i % 7) as f64;
    let river = 2.0 + (i % 13) as f64 * 1.5;
    let rainfall = [650.0, 1400.0, 2600.0][band] + (i % 5) as f64 * 20.0;
    let seismic = 2 + (i % 4);
    let hazard = ["Drought", "Landslide", "Flood"][band];
    let level = ["Low", "Medium", "High"][band];

    // Every seventh row loses its rainfall reading
    let rainfall = if i % 7 == 3 {
        String::new()
    } else {
        format!("{:.1}", rainfall)
    };

    vec![
        format!("{:.4}", 8.0 + (i % 29) as f64 * 0.7),
        format!("{:.4}", 70.0 + (i % 23) as f64 * 0.9),
        format!("{:.1}", elevation),
        format!("{:.1}", coast),
        format!("{:.1}", river),
        rainfall,
        seismic.to_string(),
        state.to_string(),
        district.to_string(),
        hazard.to_string(),
        level.to_string(),
    ]
}

/// Write `n_rows` synthetic rows, keeping only the columns in `columns`
pub fn write_csv_with_columns(path: &Path, n_rows: usize, columns: &[&str]) {
    let keep: Vec<usize> = columns
        .iter()
        .filter_map(|c| HEADER.iter().position(|h| h == c))
        .collect();

    let mut file = std::fs::File::create(path).unwrap();
    let header: Vec<&str> = keep.iter().map(|&i| HEADER[i]).collect();
    writeln!(file, "{}", header.join(",")).unwrap();

    for i in 0..n_rows {
        let row = district_row(i);
        let cells: Vec<&str> = keep.iter().map(|&c| row[c].as_str()).collect();
        writeln!(file, "{}", cells.join(",")).unwrap();
    }
}

pub fn write_training_csv(dir: &Path, n_rows: usize) -> PathBuf {
    let path = dir.join("districts.csv");
    write_csv_with_columns(&path, n_rows, HEADER);
    path
}

/// Small ensemble so tests stay fast
pub fn fast_params() -> BoostingParams {
    BoostingParams {
        n_estimators: 15,
        max_depth: 3,
        ..Default::default()
    }
}

/// Train on fresh synthetic data and return the artifact path
pub fn train_artifact(dir: &Path) -> (PathBuf, TrainingReport) {
    let data = write_training_csv(dir, 90);
    let artifact = dir.join("artifacts").join("model.bin");
    let options = TrainingOptions::new(data, &artifact).with_params(fast_params());

    let report = TrainingProcedure::new(options).run().unwrap();
    (artifact, report)
}
