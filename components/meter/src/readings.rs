//! Static table of every reading the DSMR logger exposes.
//!
//! The key is the name the device itself uses in its API responses (for the
//! live readings) or the key synthesized by the historical fetchers. Each
//! reading belongs to exactly one period, which decides which data source
//! serves it.

pub const ENERGY_KILO_WATT_HOUR: &str = "kWh";
pub const POWER_KILO_WATT: &str = "kW";
pub const VOLT: &str = "V";
pub const ELECTRICAL_CURRENT_AMPERE: &str = "A";
pub const VOLUME_CUBIC_METERS: &str = "m³";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Period {
    Actual,
    Hours,
    Days,
    Months,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Actual => "actual",
            Period::Hours => "hours",
            Period::Days => "days",
            Period::Months => "months",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Utility {
    Energy,
    Gas,
}

#[derive(Clone, Copy, Debug)]
pub struct ReadingDef {
    pub key: &'static str,
    pub name: &'static str,
    pub unit: &'static str,
    pub icon: &'static str,
    pub utility: Utility,
    pub period: Period,
}

impl ReadingDef {
    pub fn device_class(&self) -> Option<&'static str> {
        match self.unit {
            ENERGY_KILO_WATT_HOUR => Some("energy"),
            POWER_KILO_WATT => Some("power"),
            VOLT => Some("voltage"),
            ELECTRICAL_CURRENT_AMPERE => Some("current"),
            VOLUME_CUBIC_METERS => Some("gas"),
            _ => None,
        }
    }

    /// Live counter readings only ever grow; everything else is a plain
    /// measurement (the historical values are per-period deltas).
    pub fn state_class(&self) -> &'static str {
        match (self.period, self.unit) {
            (Period::Actual, ENERGY_KILO_WATT_HOUR | VOLUME_CUBIC_METERS) => "total_increasing",
            _ => "measurement",
        }
    }
}

macro_rules! reading {
    ($key:literal, $name:literal, $unit:ident, $icon:literal, $utility:ident, $period:ident) => {
        ReadingDef {
            key: $key,
            name: $name,
            unit: $unit,
            icon: $icon,
            utility: Utility::$utility,
            period: Period::$period,
        }
    };
}

pub const READINGS: &[ReadingDef] = &[
    reading!("energy_delivered_tariff1", "Energy delivered tariff 1", ENERGY_KILO_WATT_HOUR, "mdi:flash", Energy, Actual),
    reading!("energy_delivered_tariff2", "Energy delivered tariff 2", ENERGY_KILO_WATT_HOUR, "mdi:flash", Energy, Actual),
    reading!("energy_returned_tariff1", "Energy returned tariff 1", ENERGY_KILO_WATT_HOUR, "mdi:flash", Energy, Actual),
    reading!("energy_returned_tariff2", "Energy returned tariff 2", ENERGY_KILO_WATT_HOUR, "mdi:flash", Energy, Actual),
    reading!("power_delivered", "Power delivered", POWER_KILO_WATT, "mdi:flash", Energy, Actual),
    reading!("power_returned", "Power returned", POWER_KILO_WATT, "mdi:flash", Energy, Actual),
    reading!("voltage_l1", "Voltage L1", VOLT, "mdi:flash", Energy, Actual),
    reading!("current_l1", "Current L1", ELECTRICAL_CURRENT_AMPERE, "mdi:flash", Energy, Actual),
    reading!("power_delivered_l1", "Power delivered L1", POWER_KILO_WATT, "mdi:flash", Energy, Actual),
    reading!("power_returned_l1", "Power returned L1", POWER_KILO_WATT, "mdi:flash", Energy, Actual),
    reading!("gas_delivered", "Gas delivered", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Actual),
    reading!("energy_hours_delivered_0", "Energy hours delivered 0", POWER_KILO_WATT, "mdi:flash", Energy, Hours),
    reading!("energy_hours_delivered_1", "Energy hours delivered 1", POWER_KILO_WATT, "mdi:flash", Energy, Hours),
    reading!("energy_hours_returned_0", "Energy hours returned 0", POWER_KILO_WATT, "mdi:flash", Energy, Hours),
    reading!("energy_hours_returned_1", "Energy hours returned 1", POWER_KILO_WATT, "mdi:flash", Energy, Hours),
    reading!("gas_hours_delivered_0", "Gas hours delivered 0", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Hours),
    reading!("gas_hours_delivered_1", "Gas hours delivered 1", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Hours),
    reading!("energy_days_delivered_0", "Energy days delivered 0", POWER_KILO_WATT, "mdi:flash", Energy, Days),
    reading!("energy_days_delivered_1", "Energy days delivered 1", POWER_KILO_WATT, "mdi:flash", Energy, Days),
    reading!("energy_days_returned_0", "Energy days returned 0", POWER_KILO_WATT, "mdi:flash", Energy, Days),
    reading!("energy_days_returned_1", "Energy days returned 1", POWER_KILO_WATT, "mdi:flash", Energy, Days),
    reading!("gas_days_delivered_0", "Gas days delivered 0", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Days),
    reading!("gas_days_delivered_1", "Gas days delivered 1", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Days),
    reading!("energy_months_delivered_0", "Energy months delivered 0", POWER_KILO_WATT, "mdi:flash", Energy, Months),
    reading!("energy_months_delivered_1", "Energy months delivered 1", POWER_KILO_WATT, "mdi:flash", Energy, Months),
    reading!("energy_months_returned_0", "Energy months returned 0", POWER_KILO_WATT, "mdi:flash", Energy, Months),
    reading!("energy_months_returned_1", "Energy months returned 1", POWER_KILO_WATT, "mdi:flash", Energy, Months),
    reading!("gas_months_delivered_0", "Gas months delivered 0", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Months),
    reading!("gas_months_delivered_1", "Gas months delivered 1", VOLUME_CUBIC_METERS, "mdi:gas", Gas, Months),
];

pub fn reading(key: &str) -> Option<&'static ReadingDef> {
    READINGS.iter().find(|def| def.key == key)
}

pub fn readings_for(period: Period) -> impl Iterator<Item = &'static ReadingDef> {
    READINGS.iter().filter(move |def| def.period == period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        for (i, def) in READINGS.iter().enumerate() {
            assert!(
                READINGS.iter().skip(i + 1).all(|other| other.key != def.key),
                "duplicate reading key {}",
                def.key
            );
        }
    }

    #[test]
    fn every_reading_has_exactly_one_period() {
        // Each key belongs to one period partition, so a sensor is only ever
        // attached to the data source matching that period.
        for def in READINGS {
            let matches = [Period::Actual, Period::Hours, Period::Days, Period::Months]
                .into_iter()
                .filter(|period| readings_for(*period).any(|d| d.key == def.key))
                .count();
            assert_eq!(matches, 1, "reading {} not cleanly partitioned", def.key);
        }
    }

    #[test]
    fn historical_keys_follow_the_synthesized_scheme() {
        for period in [Period::Hours, Period::Days, Period::Months] {
            for i in 0..2 {
                let delivered = format!("energy_{}_delivered_{}", period.as_str(), i);
                let returned = format!("energy_{}_returned_{}", period.as_str(), i);
                let gas = format!("gas_{}_delivered_{}", period.as_str(), i);
                assert!(reading(&delivered).is_some());
                assert!(reading(&returned).is_some());
                assert!(reading(&gas).is_some());
            }
        }
    }

    #[test]
    fn gas_readings_are_tagged_as_gas() {
        for def in READINGS.iter().filter(|def| def.key.starts_with("gas")) {
            assert_eq!(def.utility, Utility::Gas);
            assert_eq!(def.unit, VOLUME_CUBIC_METERS);
        }
    }
}
