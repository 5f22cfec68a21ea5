pub mod client;
pub mod readings;
pub mod sensor;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use duration_str::deserialize_option_duration;
use log::{debug, info};
use serde::Deserialize;
use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;
use tokio::time;

use dsmrhome_core::home_assistant::sensors::HaSensor;
use dsmrhome_core::internal::sensors::{InternalComponent, InternalSensor};
use dsmrhome_core::utils::format_id;
use dsmrhome_core::{ChangedMessage, DsmrHome, Module, PublishedMessage};

use client::{
    http_client, parse_host, HistData, LiveData, MIN_TIME_BETWEEN_LIVE_UPDATES,
    MIN_TIME_BETWEEN_LONG_UPDATES,
};
use readings::{readings_for, Period, ReadingDef};
use sensor::{DataSource, MeterSensor};

pub use client::probe_device;

#[derive(Clone, Deserialize, Debug)]
pub struct MeterConfig {
    pub host: String,

    #[serde(default)]
    pub history_hours: bool,

    #[serde(default)]
    pub history_days: bool,

    #[serde(default)]
    pub history_months: bool,

    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub live_interval: Option<Duration>,

    #[serde(default, deserialize_with = "deserialize_option_duration")]
    pub history_interval: Option<Duration>,
}

impl MeterConfig {
    /// Live readings are always polled, history periods are opt-in.
    fn periods(&self) -> Vec<Period> {
        let mut periods = vec![Period::Actual];
        if self.history_hours {
            periods.push(Period::Hours);
        }
        if self.history_days {
            periods.push(Period::Days);
        }
        if self.history_months {
            periods.push(Period::Months);
        }
        periods
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct CoreConfig {
    pub dsmrhome: DsmrHome,
    pub meter: MeterConfig,
}

pub struct Default {
    config: MeterConfig,
    base_url: String,
    components: Vec<InternalComponent>,
    sensors: Vec<(String, &'static ReadingDef)>,
}

impl Default {
    pub fn new(config_string: &String) -> Self {
        let config = serde_yaml::from_str::<CoreConfig>(config_string).unwrap();
        let base_name = config.dsmrhome.name.clone();
        let base_url = parse_host(&config.meter.host);

        let mut components: Vec<InternalComponent> = Vec::new();
        let mut sensors: Vec<(String, &'static ReadingDef)> = Vec::new();
        for period in config.meter.periods() {
            for def in readings_for(period) {
                let id = format_id(&base_name, &None, &def.name.to_string());
                components.push(InternalComponent::Sensor(InternalSensor {
                    ha: HaSensor {
                        name: def.name.to_string(),
                        platform: "meter".to_string(),
                        icon: Some(def.icon.to_string()),
                        state_class: Some(def.state_class().to_string()),
                        device_class: def.device_class().map(str::to_string),
                        unit_of_measurement: Some(def.unit.to_string()),
                        id: id.clone(),
                    },
                }));
                sensors.push((id, def));
            }
        }

        Default {
            config: config.meter,
            base_url,
            components,
            sensors,
        }
    }
}

impl Module for Default {
    fn validate(&mut self) -> Result<(), String> {
        if self.config.host.trim().is_empty() {
            return Err("meter.host must be configured".to_string());
        }
        Ok(())
    }

    fn init(&mut self) -> Result<Vec<InternalComponent>, String> {
        Ok(self.components.clone())
    }

    fn run(
        &self,
        sender: Sender<ChangedMessage>,
        _receiver: Receiver<PublishedMessage>,
    ) -> Pin<Box<dyn Future<Output = Result<(), Box<dyn std::error::Error>>> + Send + 'static>>
    {
        let config = self.config.clone();
        let base_url = self.base_url.clone();
        let sensors = self.sensors.clone();
        Box::pin(async move {
            let client = http_client()?;
            let live_interval = config.live_interval.unwrap_or(MIN_TIME_BETWEEN_LIVE_UPDATES);
            let history_interval = config
                .history_interval
                .unwrap_or(MIN_TIME_BETWEEN_LONG_UPDATES);

            // One fetcher per enabled period, shared by all of its sensors.
            let mut sources: HashMap<Period, DataSource> = HashMap::new();
            for period in config.periods() {
                let source = match period {
                    Period::Actual => DataSource::Live(Arc::new(Mutex::new(LiveData::new(
                        client.clone(),
                        &base_url,
                        live_interval,
                    )))),
                    _ => DataSource::Hist(Arc::new(Mutex::new(HistData::new(
                        client.clone(),
                        &base_url,
                        period,
                        history_interval,
                    )))),
                };
                sources.insert(period, source);
            }
            info!(
                "Polling {} with {} sensors over {} endpoints",
                base_url,
                sensors.len(),
                sources.len()
            );

            for (id, def) in sensors {
                let Some(source) = sources.get(&def.period) else {
                    debug!("Sensor {} has no enabled data source", id);
                    continue;
                };
                let mut sensor = MeterSensor::new(id, def.key, source.clone());
                let throttle_interval = match def.period {
                    Period::Actual => live_interval,
                    _ => history_interval,
                };
                // Tick faster than the throttle window so a tick landing just
                // inside the window does not push the next fetch a full
                // window into the future.
                let cadence = (throttle_interval / 2).max(Duration::from_secs(1));
                let tx = sender.clone();
                tokio::spawn(async move {
                    let mut interval = time::interval(cadence);
                    loop {
                        interval.tick().await;
                        if let Some(value) = sensor.tick().await {
                            _ = tx.send(ChangedMessage::SensorValueChange {
                                key: sensor.id().to_string(),
                                value,
                            });
                        }
                    }
                });
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = "
dsmrhome:
  name: meterkast
meter:
  host: 192.168.1.12
  history_hours: true
  history_days: true
";

    #[test]
    fn parses_the_meter_section() {
        let config = serde_yaml::from_str::<CoreConfig>(CONFIG).unwrap();
        assert_eq!(config.meter.host, "192.168.1.12");
        assert!(config.meter.history_hours);
        assert!(config.meter.history_days);
        assert!(!config.meter.history_months);
        assert_eq!(
            config.meter.periods(),
            vec![Period::Actual, Period::Hours, Period::Days]
        );
    }

    #[test]
    fn intervals_accept_duration_strings() {
        let config = serde_yaml::from_str::<CoreConfig>(
            "
dsmrhome:
  name: meterkast
meter:
  host: meter.local
  live_interval: 30s
  history_interval: 2h
",
        )
        .unwrap();
        assert_eq!(config.meter.live_interval, Some(Duration::from_secs(30)));
        assert_eq!(
            config.meter.history_interval,
            Some(Duration::from_secs(2 * 60 * 60))
        );
    }

    #[test]
    fn announces_only_sensors_of_enabled_periods() {
        let mut module = Default::new(&CONFIG.to_string());
        let components = module.init().unwrap();
        let expected: usize = [Period::Actual, Period::Hours, Period::Days]
            .into_iter()
            .map(|period| readings_for(period).count())
            .sum();
        assert_eq!(components.len(), expected);
        // months were not enabled
        for InternalComponent::Sensor(sensor) in &components {
            assert!(!sensor.ha.name.contains("months"));
        }
    }

    #[test]
    fn sensors_are_attached_to_their_own_period_partition() {
        let module = Default::new(&CONFIG.to_string());
        for (_, def) in &module.sensors {
            assert!(module.config.periods().contains(&def.period));
        }
    }

    #[test]
    fn validate_rejects_an_empty_host() {
        let mut module = Default::new(
            &"
dsmrhome:
  name: meterkast
meter:
  host: \"\"
"
            .to_string(),
        );
        assert!(module.validate().is_err());
    }
}
