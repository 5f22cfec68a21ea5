use dsmrhome_core::DsmrHome;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub enum LogLevel {
    #[serde(alias = "error", alias = "ERROR")]
    Error,
    #[serde(alias = "warn", alias = "WARN")]
    Warn,
    #[serde(alias = "info", alias = "INFO")]
    Info,
    #[serde(alias = "debug", alias = "DEBUG")]
    Debug,
    #[serde(alias = "trace", alias = "TRACE")]
    Trace,
}

#[derive(Clone, Deserialize, Debug)]
pub struct Logger {
    pub level: LogLevel,
    pub directory: Option<String>,
}

impl Logger {
    pub fn get_flexi_logger_spec(&self) -> String {
        match self.level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct CoreConfig {
    pub dsmrhome: DsmrHome,
    pub logger: Option<Logger>,
}
