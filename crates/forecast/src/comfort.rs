//! Comfort scoring.
//!
//! Thermal comfort follows the office bands of ASHRAE 55 (optimum 21–24 °C,
//! humidity 30–60 %), air quality follows WELL (CO2) and UBA (VOC) classes.
//! The breakpoints below are part of the public contract of the score.

/// Score used when the VOC sensor reports nothing.
pub const NEUTRAL_VOC_SCORE: f64 = 0.5;

const THERMAL_WEIGHT: f64 = 0.6;
const AIR_WEIGHT: f64 = 0.4;
const CO2_WEIGHT: f64 = 0.75;
const VOC_WEIGHT: f64 = 0.25;

const CO2_CAP_PPM: f64 = 1200.0;
const CO2_CAP: f64 = 0.45;
const TEMP_CAP_LOW: f64 = 17.0;
const TEMP_CAP_HIGH: f64 = 29.0;
const TEMP_CAP: f64 = 0.50;
const VOC_CAP_INDEX: f64 = 250.0;
const VOC_CAP: f64 = 0.40;

/// Piecewise temperature curve before the humidity penalty.
pub fn temperature_curve(temp_c: f64) -> f64 {
    if (21.0..=24.0).contains(&temp_c) {
        1.0
    } else if (20.0..21.0).contains(&temp_c) {
        0.8 + (temp_c - 20.0) * 0.2
    } else if temp_c > 24.0 && temp_c <= 26.0 {
        1.0 - (temp_c - 24.0) * 0.15
    } else if !(18.0..=30.0).contains(&temp_c) {
        0.0
    } else if temp_c < 20.0 {
        0.5 + (temp_c - 18.0) * 0.15
    } else {
        0.7 - (temp_c - 26.0) * 0.175
    }
}

pub fn humidity_penalty(rh_percent: f64) -> f64 {
    if rh_percent < 30.0 {
        (30.0 - rh_percent) * 0.005
    } else if rh_percent > 60.0 {
        (rh_percent - 60.0) * 0.01
    } else {
        0.0
    }
}

/// Thermal sub-score in [0, 1]; 0 when either input is missing.
pub fn thermal_score(temp_c: Option<f64>, rh_percent: Option<f64>) -> f64 {
    match (temp_c, rh_percent) {
        (Some(t), Some(rh)) => (temperature_curve(t) - humidity_penalty(rh)).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

pub fn co2_score(co2_ppm: Option<f64>) -> f64 {
    let Some(c) = co2_ppm else {
        return 0.0;
    };
    if c <= 800.0 {
        1.0
    } else if c <= 1000.0 {
        1.0 - (c - 800.0) * 0.001
    } else if c <= 1500.0 {
        0.8 - (c - 1000.0) * 0.0006
    } else {
        (0.5 - (c - 1500.0) * 0.0005).max(0.0)
    }
}

pub fn voc_score(voc_index: Option<f64>) -> f64 {
    let Some(v) = voc_index else {
        return NEUTRAL_VOC_SCORE;
    };
    if v <= 50.0 {
        1.0
    } else if v <= 100.0 {
        1.0 - (v - 50.0) * 0.004
    } else if v <= 200.0 {
        0.8 - (v - 100.0) * 0.004
    } else {
        (0.4 - (v - 200.0) * 0.002).max(0.0)
    }
}

pub fn air_quality_score(co2_ppm: Option<f64>, voc_index: Option<f64>) -> f64 {
    CO2_WEIGHT * co2_score(co2_ppm) + VOC_WEIGHT * voc_score(voc_index)
}

fn weighted(
    temp_c: Option<f64>,
    rh_percent: Option<f64>,
    co2_ppm: Option<f64>,
    voc_index: Option<f64>,
) -> f64 {
    THERMAL_WEIGHT * thermal_score(temp_c, rh_percent)
        + AIR_WEIGHT * air_quality_score(co2_ppm, voc_index)
}

/// Overall comfort in [0, 1], rounded to two decimals.
pub fn score(
    temp_c: Option<f64>,
    rh_percent: Option<f64>,
    co2_ppm: Option<f64>,
    voc_index: Option<f64>,
) -> f64 {
    round2(weighted(temp_c, rh_percent, co2_ppm, voc_index).clamp(0.0, 1.0))
}

/// Like [`score`], with hard caps for conditions a room should never be
/// rated comfortable in, whatever the average says. Used for live samples.
pub fn live_score(
    temp_c: Option<f64>,
    rh_percent: Option<f64>,
    co2_ppm: Option<f64>,
    voc_index: Option<f64>,
) -> f64 {
    let mut value = weighted(temp_c, rh_percent, co2_ppm, voc_index);

    if co2_ppm.is_some_and(|c| c > CO2_CAP_PPM) {
        value = value.min(CO2_CAP);
    }
    if temp_c.is_some_and(|t| !(TEMP_CAP_LOW..=TEMP_CAP_HIGH).contains(&t)) {
        value = value.min(TEMP_CAP);
    }
    if voc_index.is_some_and(|v| v > VOC_CAP_INDEX) {
        value = value.min(VOC_CAP);
    }

    round2(value.clamp(0.0, 1.0))
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
