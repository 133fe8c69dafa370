use serde::{Deserialize, Serialize};

use crate::reading::Reading;

/// Initial `max_temp`; means "no reading yet".
pub const MAX_TEMP_UNSET: f64 = -999.0;
/// Initial `min_temp`; means "no reading yet".
pub const MIN_TEMP_UNSET: f64 = 999.0;
pub const MAX_HUM_INIT: f64 = 0.0;
pub const MIN_HUM_INIT: f64 = 100.0;

/// Min/max/average/count over recorded readings.
///
/// Extremes and `total_readings` cover every reading since the last clear. The averages
/// only cover the readings currently held in the history buffer, so they drift as old
/// readings are evicted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningStats {
    pub max_temp: f64,
    pub min_temp: f64,
    pub max_hum: f64,
    pub min_hum: f64,
    pub avg_temp: f64,
    pub avg_hum: f64,
    pub total_readings: u64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            max_temp: MAX_TEMP_UNSET,
            min_temp: MIN_TEMP_UNSET,
            max_hum: MAX_HUM_INIT,
            min_hum: MIN_HUM_INIT,
            avg_temp: 0.0,
            avg_hum: 0.0,
            total_readings: 0,
        }
    }
}

impl RunningStats {
    /// Folds one new reading into the extremes and the counter.
    pub fn observe(&mut self, reading: &Reading) {
        self.max_temp = self.max_temp.max(reading.temperature);
        self.min_temp = self.min_temp.min(reading.temperature);
        self.max_hum = self.max_hum.max(reading.humidity);
        self.min_hum = self.min_hum.min(reading.humidity);
        self.total_readings += 1;
    }

    /// Recomputes both averages from the readings in `window`.
    pub fn average_over<'a, I>(&mut self, window: I)
    where
        I: IntoIterator<Item = &'a Reading>,
    {
        let (mut temp, mut hum, mut count) = (0.0, 0.0, 0usize);
        for reading in window {
            temp += reading.temperature;
            hum += reading.humidity;
            count += 1;
        }
        if count == 0 {
            self.avg_temp = 0.0;
            self.avg_hum = 0.0;
        } else {
            self.avg_temp = temp / count as f64;
            self.avg_hum = hum / count as f64;
        }
    }

    pub fn has_data(&self) -> bool {
        self.total_readings > 0
    }

    /// `(min, max)` temperature, or `None` while the sentinels are still in place.
    pub fn temperature_range(&self) -> Option<(f64, f64)> {
        self.has_data().then_some((self.min_temp, self.max_temp))
    }

    pub fn humidity_range(&self) -> Option<(f64, f64)> {
        self.has_data().then_some((self.min_hum, self.max_hum))
    }
}
