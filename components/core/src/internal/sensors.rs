use crate::home_assistant::sensors::HaSensor;

#[derive(Clone, Debug)]
pub enum InternalComponent {
    Sensor(InternalSensor),
}

#[derive(Clone, Debug)]
pub struct InternalSensor {
    pub ha: HaSensor,
}
