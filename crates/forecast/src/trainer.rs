use crate::comfort;
use crate::features::{Target, TrainingTable};
use crate::forest::{ForestError, ForestParams, RandomForest};

/// Physical conditions predicted for one hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conditions {
    pub temp_c: f64,
    pub co2_ppm: f64,
    pub voc_index: f64,
    pub rh_percent: f64,
}

impl Conditions {
    pub fn comfort_score(&self) -> f64 {
        comfort::score(
            Some(self.temp_c),
            Some(self.rh_percent),
            Some(self.co2_ppm),
            Some(self.voc_index),
        )
    }
}

/// One regressor per physical variable over (hour, weekday, occupants), and
/// an occupancy regressor over (hour, weekday) for hours nobody booked.
#[derive(Debug, Clone)]
pub struct ForecastModel {
    temp_c: RandomForest,
    co2_ppm: RandomForest,
    voc_index: RandomForest,
    rh_percent: RandomForest,
    occupancy: RandomForest,
}

impl ForecastModel {
    pub fn train(table: &TrainingTable, params: &ForestParams) -> Result<Self, ForestError> {
        let conditional = table.features(true);
        let calendar = table.features(false);
        let fit = |x: &ndarray::Array2<f64>, target: Target| {
            RandomForest::fit(x.view(), table.target(target).view(), params)
        };

        Ok(Self {
            temp_c: fit(&conditional, Target::TempC)?,
            co2_ppm: fit(&conditional, Target::Co2Ppm)?,
            voc_index: fit(&conditional, Target::VocIndex)?,
            rh_percent: fit(&conditional, Target::RhPercent)?,
            occupancy: fit(&calendar, Target::Occupancy)?,
        })
    }

    /// Expected occupant count, never negative.
    pub fn predict_occupancy(&self, hour: u32, day_of_week: u32) -> f64 {
        self.occupancy
            .predict(&[f64::from(hour), f64::from(day_of_week)])
            .max(0.0)
    }

    pub fn predict_conditions(&self, hour: u32, day_of_week: u32, occupants: f64) -> Conditions {
        let sample = [f64::from(hour), f64::from(day_of_week), occupants];
        Conditions {
            temp_c: self.temp_c.predict(&sample),
            co2_ppm: self.co2_ppm.predict(&sample),
            voc_index: self.voc_index.predict(&sample),
            rh_percent: self.rh_percent.predict(&sample),
        }
    }
}
