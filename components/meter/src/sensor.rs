use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use crate::client::{HistData, LiveData};

/// Handle to the fetcher serving one period partition. Every sensor of that
/// partition holds a clone, so they all observe the same snapshot and the
/// same throttle window.
#[derive(Clone)]
pub enum DataSource {
    Live(Arc<Mutex<LiveData>>),
    Hist(Arc<Mutex<HistData>>),
}

impl DataSource {
    async fn update(&self) {
        match self {
            DataSource::Live(live) => live.lock().await.update().await,
            DataSource::Hist(hist) => hist.lock().await.update().await,
        }
    }

    async fn latest_value(&self, reading: &str) -> Option<f64> {
        match self {
            DataSource::Live(live) => live.lock().await.latest_value(reading),
            DataSource::Hist(hist) => hist.lock().await.latest_value(reading),
        }
    }
}

/// One reading of the meter, published as a sensor.
pub struct MeterSensor {
    id: String,
    reading: &'static str,
    source: DataSource,
    state: Option<f64>,
}

impl MeterSensor {
    pub fn new(id: String, reading: &'static str, source: DataSource) -> Self {
        MeterSensor {
            id,
            reading,
            source,
            state: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> Option<f64> {
        self.state
    }

    /// Refreshes the shared data source (a no-op inside its throttle window)
    /// and takes over its latest value. When the source has no data the last
    /// displayed value is kept rather than cleared.
    pub async fn tick(&mut self) -> Option<f64> {
        self.source.update().await;
        self.apply(self.source.latest_value(self.reading).await)
    }

    fn apply(&mut self, new_data: Option<f64>) -> Option<f64> {
        if let Some(value) = new_data {
            self.state = Some(value);
            debug!("Updated sensor {}: new state = {}", self.reading, value);
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MIN_TIME_BETWEEN_LIVE_UPDATES;

    fn sensor() -> MeterSensor {
        let source = DataSource::Live(Arc::new(Mutex::new(LiveData::new(
            reqwest::Client::new(),
            "http://localhost",
            MIN_TIME_BETWEEN_LIVE_UPDATES,
        ))));
        MeterSensor::new("meterkast_power_delivered".into(), "power_delivered", source)
    }

    #[test]
    fn starts_without_a_state() {
        assert_eq!(sensor().state(), None);
    }

    #[test]
    fn takes_over_fresh_values() {
        let mut sensor = sensor();
        assert_eq!(sensor.apply(Some(3.264)), Some(3.264));
        assert_eq!(sensor.apply(Some(3.24)), Some(3.24));
    }

    #[test]
    fn keeps_the_last_value_when_a_poll_fails() {
        let mut sensor = sensor();
        sensor.apply(Some(3.264));
        // the data source lost its snapshot, the display must not regress
        assert_eq!(sensor.apply(None), Some(3.264));
        assert_eq!(sensor.state(), Some(3.264));
    }
}
