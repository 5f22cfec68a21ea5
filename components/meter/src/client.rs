//! REST client for the DSMR logger.
//!
//! The device exposes one endpoint with the actual meter readings and three
//! with hourly/daily/monthly history. Both fetchers own their own throttle
//! and their own snapshot; sensors only ever query the snapshot.

use std::collections::HashMap;
use std::time::Duration;

use dsmrhome_core::throttle::Throttle;
use log::{debug, error};
use serde_json::Value;
use thiserror::Error;

use crate::readings::Period;

pub const API_V1_ACTUAL: &str = "/api/v1/sm/actual";
pub const API_V1_HIST_HOURS: &str = "/api/v1/hist/hours";
pub const API_V1_HIST_DAYS: &str = "/api/v1/hist/days";
pub const API_V1_HIST_MONTHS: &str = "/api/v1/hist/months";
pub const API_V1_DEV_INFO: &str = "/api/v1/dev/info";

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const MIN_TIME_BETWEEN_LIVE_UPDATES: Duration = Duration::from_secs(60);
pub const MIN_TIME_BETWEEN_LONG_UPDATES: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout connecting to the DSMR meter")]
    Timeout,
    #[error("error retrieving DSMR data: {0}")]
    Transport(reqwest::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Transport(err)
        }
    }
}

pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()
}

/// Normalizes a user supplied host into the `http://<host>` base url all
/// endpoint paths are appended to.
pub fn parse_host(host: &str) -> String {
    let netloc = host.split("://").last().unwrap_or(host);
    let netloc = netloc.split('/').next().unwrap_or(netloc);
    format!("http://{}", netloc)
}

/// Checks whether a DSMR logger answers on the configured host at all.
/// Any response counts, only transport failures and timeouts do not.
pub async fn probe_device(host: &str) -> bool {
    let Ok(client) = http_client() else {
        return false;
    };
    let url = format!("{}{}", parse_host(host), API_V1_DEV_INFO);
    client.get(&url).send().await.is_ok()
}

async fn fetch_json(client: &reqwest::Client, api: &str) -> Result<Value, FetchError> {
    let response = client.get(api).send().await?;
    let json = response.json::<Value>().await?;
    Ok(json)
}

/// The actual (live) meter readings.
pub struct LiveData {
    client: reqwest::Client,
    api: String,
    throttle: Throttle,
    data: Option<HashMap<String, Value>>,
}

impl LiveData {
    pub fn new(client: reqwest::Client, base_url: &str, interval: Duration) -> Self {
        LiveData {
            client,
            api: format!("{}{}", base_url, API_V1_ACTUAL),
            throttle: Throttle::new(interval),
            data: None,
        }
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    /// Requests the live measurements, at most once per throttle window.
    /// Never fails towards the caller; a failed request or an unexpected
    /// payload clears the snapshot.
    pub async fn update(&mut self) {
        if !self.throttle.check() {
            return;
        }
        match fetch_json(&self.client, &self.api).await {
            Ok(json) => self.parse_live_data(&json),
            Err(err) => {
                error!("{}", err);
                self.data = None;
            }
        }
    }

    /// Reshapes the `actual` array into a map keyed by the reading name,
    /// with `name` popped out of each record.
    fn parse_live_data(&mut self, json: &Value) {
        self.data = parse_live(json);
    }

    /// The `value` field of the named record. A record without a value
    /// counts as 0, an unknown name (or no snapshot at all) as no data.
    pub fn latest_value(&self, reading: &str) -> Option<f64> {
        let record = self.data.as_ref()?.get(reading)?;
        Some(record.get("value").and_then(Value::as_f64).unwrap_or(0.0))
    }
}

fn parse_live(json: &Value) -> Option<HashMap<String, Value>> {
    let Some(actual) = json.get("actual").and_then(Value::as_array) else {
        debug!("Failed to read the JSON message using key actual");
        return None;
    };
    let mut formatted = HashMap::new();
    for received in actual {
        let mut record = received.as_object()?.clone();
        let name = record.remove("name")?.as_str()?.to_string();
        formatted.insert(name, Value::Object(record));
    }
    Some(formatted)
}

/// The historical statistics for one period (hours, days or months).
pub struct HistData {
    client: reqwest::Client,
    api: String,
    period: Period,
    throttle: Throttle,
    data: Option<HashMap<String, f64>>,
}

impl HistData {
    pub fn new(client: reqwest::Client, base_url: &str, period: Period, interval: Duration) -> Self {
        let path = match period {
            Period::Hours => API_V1_HIST_HOURS,
            Period::Days => API_V1_HIST_DAYS,
            Period::Months => API_V1_HIST_MONTHS,
            Period::Actual => unreachable!("live readings are served by LiveData"),
        };
        HistData {
            client,
            api: format!("{}{}", base_url, path),
            period,
            throttle: Throttle::new(interval),
            data: None,
        }
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    /// Requests the historical statistics, at most once per throttle window.
    pub async fn update(&mut self) {
        if !self.throttle.check() {
            return;
        }
        match fetch_json(&self.client, &self.api).await {
            Ok(json) => self.parse_historical_data(&json),
            Err(err) => {
                error!("{}", err);
                self.data = None;
            }
        }
    }

    fn parse_historical_data(&mut self, json: &Value) {
        self.data = parse_historical(json, self.period);
    }

    pub fn latest_value(&self, reading: &str) -> Option<f64> {
        self.data.as_ref()?.get(reading).copied()
    }
}

/// Derives period usage from the cumulative counters of consecutive records.
///
/// The device reports running totals, newest record first. Usage for the two
/// most recent periods is the difference between a record and its successor,
/// so at least three records are required. Anything missing fails the whole
/// parse; no partial snapshot is ever kept.
fn parse_historical(json: &Value, period: Period) -> Option<HashMap<String, f64>> {
    let Some(records) = json.get(period.as_str()).and_then(Value::as_array) else {
        debug!("Failed to read the JSON message using key {}", period.as_str());
        return None;
    };
    let mut formatted = HashMap::new();
    for i in 0..2 {
        let cur = records.get(i)?;
        let prev = records.get(i + 1)?;

        let cur_del = field(cur, "edt1")? + field(cur, "edt2")?;
        let prev_del = field(prev, "edt1")? + field(prev, "edt2")?;
        formatted.insert(
            format!("energy_{}_delivered_{}", period.as_str(), i),
            cur_del - prev_del,
        );

        let cur_ret = field(cur, "ert1")? + field(cur, "ert2")?;
        let prev_ret = field(prev, "ert1")? + field(prev, "ert2")?;
        formatted.insert(
            format!("energy_{}_returned_{}", period.as_str(), i),
            cur_ret - prev_ret,
        );

        let cur_gas = field(cur, "gdt")?;
        let prev_gas = field(prev, "gdt")?;
        formatted.insert(
            format!("gas_{}_delivered_{}", period.as_str(), i),
            cur_gas - prev_gas,
        );
    }
    Some(formatted)
}

fn field(record: &Value, key: &str) -> Option<f64> {
    record.get(key)?.as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live_fixture() -> Value {
        json!({
            "actual": [
                {"name": "timestamp", "value": "201207113025W"},
                {"name": "energy_delivered_tariff1", "value": 10497.653, "unit": "kWh"},
                {"name": "energy_delivered_tariff2", "value": 11101.499, "unit": "kWh"},
                {"name": "energy_returned_tariff1", "value": 1078.85, "unit": "kWh"},
                {"name": "energy_returned_tariff2", "value": 2320.433, "unit": "kWh"},
                {"name": "power_delivered", "value": 3.264, "unit": "kW"},
                {"name": "power_returned", "value": 0.0, "unit": "kW"},
                {"name": "voltage_l1", "value": 227.3, "unit": "V"},
                {"name": "current_l1", "value": 14, "unit": "A"},
                {"name": "power_delivered_l1", "value": 3.24, "unit": "kW"},
                {"name": "power_returned_l1", "value": 0.0, "unit": "kW"},
                {"name": "gas_delivered", "value": 4394.229, "unit": "m3"},
            ]
        })
    }

    fn hours_fixture() -> Value {
        json!({
            "hours": [
                {"recnr": 0, "recid": "20120711", "slot": 44,
                 "edt1": 10497.653, "edt2": 11102.047,
                 "ert1": 1078.85, "ert2": 2320.433, "gdt": 4394.55},
                {"recnr": 1, "recid": "20120710", "slot": 43,
                 "edt1": 10497.653, "edt2": 11101.311,
                 "ert1": 1078.85, "ert2": 2320.432, "gdt": 4394.23},
                {"recnr": 2, "recid": "20120709", "slot": 42,
                 "edt1": 10497.653, "edt2": 11100.86,
                 "ert1": 1078.85, "ert2": 2320.432, "gdt": 4394.212},
            ]
        })
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn live_parse_pops_the_name_out_of_every_record() {
        let parsed = parse_live(&live_fixture()).unwrap();
        assert_eq!(parsed.len(), 12);
        let record = &parsed["energy_delivered_tariff1"];
        assert_eq!(record.get("name"), None);
        assert_eq!(record["value"], json!(10497.653));
        assert_eq!(record["unit"], json!("kWh"));
    }

    #[test]
    fn live_parse_without_actual_key_yields_no_data() {
        assert!(parse_live(&json!({"nope": []})).is_none());
    }

    #[test]
    fn live_value_defaults_to_zero_when_the_record_has_none() {
        let mut live = LiveData::new(
            reqwest::Client::new(),
            "http://localhost",
            MIN_TIME_BETWEEN_LIVE_UPDATES,
        );
        live.parse_live_data(&json!({"actual": [{"name": "power_delivered"}]}));
        assert_eq!(live.latest_value("power_delivered"), Some(0.0));
        // but an unknown reading is no data, not zero
        assert_eq!(live.latest_value("voltage_l1"), None);
    }

    #[test]
    fn live_parse_failure_clears_a_previous_snapshot() {
        let mut live = LiveData::new(
            reqwest::Client::new(),
            "http://localhost",
            MIN_TIME_BETWEEN_LIVE_UPDATES,
        );
        live.parse_live_data(&live_fixture());
        assert!(live.latest_value("voltage_l1").is_some());
        live.parse_live_data(&json!({"nope": []}));
        assert_eq!(live.latest_value("voltage_l1"), None);
    }

    #[test]
    fn historical_deltas_for_the_two_most_recent_hours() {
        let parsed = parse_historical(&hours_fixture(), Period::Hours).unwrap();
        assert_eq!(parsed.len(), 6);
        assert_close(parsed["energy_hours_delivered_0"], 0.736);
        assert_close(parsed["energy_hours_returned_0"], 0.001);
        assert_close(parsed["gas_hours_delivered_0"], 0.32);
        assert_close(parsed["energy_hours_delivered_1"], 0.451);
        assert_close(parsed["energy_hours_returned_1"], 0.0);
        assert_close(parsed["gas_hours_delivered_1"], 0.018);
    }

    #[test]
    fn historical_parse_ignores_records_beyond_the_third() {
        let mut json = hours_fixture();
        json["hours"].as_array_mut().unwrap().push(json!({
            "recnr": 3, "recid": "20120708", "slot": 41,
            "edt1": 10497.653, "edt2": 11100.0,
            "ert1": 1078.85, "ert2": 2320.432, "gdt": 4394.0
        }));
        let parsed = parse_historical(&json, Period::Hours).unwrap();
        // still only indices 0 and 1
        assert_eq!(parsed.len(), 6);
        assert!(!parsed.contains_key("energy_hours_delivered_2"));
    }

    #[test]
    fn historical_parse_with_too_few_records_yields_no_data() {
        let mut json = hours_fixture();
        json["hours"].as_array_mut().unwrap().truncate(2);
        assert!(parse_historical(&json, Period::Hours).is_none());
    }

    #[test]
    fn historical_parse_with_a_missing_counter_yields_no_data() {
        let mut json = hours_fixture();
        json["hours"][1].as_object_mut().unwrap().remove("gdt");
        assert!(parse_historical(&json, Period::Hours).is_none());
    }

    #[test]
    fn historical_parse_under_the_wrong_period_key_yields_no_data() {
        assert!(parse_historical(&hours_fixture(), Period::Days).is_none());
    }

    #[test]
    fn historical_failure_clears_a_previous_snapshot() {
        let mut hist = HistData::new(
            reqwest::Client::new(),
            "http://localhost",
            Period::Hours,
            MIN_TIME_BETWEEN_LONG_UPDATES,
        );
        hist.parse_historical_data(&hours_fixture());
        assert!(hist.latest_value("energy_hours_delivered_0").is_some());
        hist.parse_historical_data(&json!({"hours": []}));
        assert_eq!(hist.latest_value("energy_hours_delivered_0"), None);
    }

    #[test]
    fn host_is_normalized_to_a_base_url() {
        assert_eq!(parse_host("192.168.1.12"), "http://192.168.1.12");
        assert_eq!(parse_host("http://192.168.1.12"), "http://192.168.1.12");
        assert_eq!(parse_host("https://meter.local/"), "http://meter.local");
        assert_eq!(parse_host("meter.local:8080/api"), "http://meter.local:8080");
    }

    #[test]
    fn endpoint_urls() {
        let live = LiveData::new(
            reqwest::Client::new(),
            "http://meter.local",
            MIN_TIME_BETWEEN_LIVE_UPDATES,
        );
        assert_eq!(live.api(), "http://meter.local/api/v1/sm/actual");
        let hist = HistData::new(
            reqwest::Client::new(),
            "http://meter.local",
            Period::Months,
            MIN_TIME_BETWEEN_LONG_UPDATES,
        );
        assert_eq!(hist.api(), "http://meter.local/api/v1/hist/months");
    }
}
