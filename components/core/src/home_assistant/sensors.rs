use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, Debug)]
#[serde(untagged)]
pub enum Component {
    Sensor(HaSensor),
}

// https://developers.home-assistant.io/docs/core/entity/sensor/
// Icons: https://pictogrammers.com/library/mdi/
#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct HaSensor {
    pub name: String,
    pub platform: String,
    pub icon: Option<String>,
    pub state_class: Option<String>,
    pub device_class: Option<String>,
    pub unit_of_measurement: Option<String>,
    pub id: String,
}
