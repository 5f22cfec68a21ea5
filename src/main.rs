use flexi_logger::writers::FileLogWriter;
use flexi_logger::{detailed_format, Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};

use dsmrhome::CoreConfig;
use dsmrhome_core::home_assistant::sensors::Component;
use dsmrhome_core::internal::sensors::InternalComponent;
use dsmrhome_core::{ChangedMessage, Module, PublishedMessage};

use clap::{Arg, Command};
use log::{debug, info};
use std::fs;
use std::path::Path;
use tokio::runtime::Runtime;
use tokio::signal;
use tokio::sync::broadcast::{self, Receiver, Sender};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
const CARGO_PKG_HOMEPAGE: &str = env!("CARGO_PKG_HOMEPAGE");

fn cli() -> Command {
    Command::new("dsmrhome")
        .about(format!(
            "dsmrhome - {}\n\n{}\n{}",
            VERSION, DESCRIPTION, CARGO_PKG_HOMEPAGE
        ))
        .version(VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .args([Arg::new("configuration_file")
            .short('c')
            .long("configuration")
            .help("Configuration file to use.")
            .default_value("config.yaml")])
        .subcommand(
            Command::new("validate")
                .about("Validates the configuration file and probes the configured DSMR logger."),
        )
        .subcommand(Command::new("run").about("Run dsmrhome."))
}

fn read_base_config(path: &String) -> Result<String, String> {
    let config_file_path = fs::canonicalize(path)
        .map_err(|err| format!("Failed to find the configuration file '{}': {}", path, err))?;
    fs::read_to_string(&config_file_path)
        .map_err(|err| format!("Failed to read the configuration file '{}': {}", path, err))
}

fn main() {
    let matches = cli().get_matches();
    let config_file = matches.get_one::<String>("configuration_file").unwrap();

    match matches.subcommand() {
        Some(("validate", _)) => match validate(config_file) {
            Ok(()) => println!("Configuration is valid."),
            Err(err) => {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        },
        Some(("run", _)) => {
            if let Err(err) = run(config_file) {
                eprintln!("{}", err);
                std::process::exit(1);
            }
        }
        _ => {
            println!("No subcommand was used");
        }
    }
    std::process::exit(0);
}

fn get_all_modules(yaml: &str) -> Vec<Box<dyn Module>> {
    // Match all top level keys in the YAML file
    let modules_to_load = yaml
        .lines()
        .filter_map(|line| {
            if line.starts_with(' ') || line.is_empty() || line.starts_with('#') {
                None
            } else {
                line.split(':').next().map(|key| key.trim().to_string())
            }
        })
        .collect::<Vec<String>>();
    debug!("Modules to load: {:?}", modules_to_load);

    let mut modules: Vec<Box<dyn Module>> = Vec::new();
    if modules_to_load.contains(&"meter".to_string()) {
        modules.push(Box::new(dsmrhome_meter::Default::new(&yaml.to_string())));
    }
    modules
}

fn validate(config_path: &String) -> Result<(), String> {
    let config_string = read_base_config(config_path)?;
    serde_yaml::from_str::<CoreConfig>(&config_string)
        .map_err(|err| format!("Invalid configuration: {}", err))?;

    let mut modules = get_all_modules(&config_string);
    if modules.is_empty() {
        return Err("No modules are configured".to_string());
    }
    for module in modules.iter_mut() {
        module.validate()?;
    }

    // The configuration parses, now check whether something answers on the
    // configured host.
    let meter_config = serde_yaml::from_str::<dsmrhome_meter::CoreConfig>(&config_string)
        .map_err(|err| format!("Invalid meter configuration: {}", err))?;
    let rt = Runtime::new().map_err(|err| err.to_string())?;
    if !rt.block_on(dsmrhome_meter::probe_device(&meter_config.meter.host)) {
        return Err(format!(
            "No DSMR logger answered on '{}'",
            meter_config.meter.host
        ));
    }
    Ok(())
}

async fn initialize_modules(
    modules: &mut Vec<Box<dyn Module>>,
) -> Result<Vec<InternalComponent>, String> {
    let mut all_components: Vec<InternalComponent> = Vec::new();
    for module in modules.iter_mut() {
        let mut components = module.init()?;
        all_components.append(&mut components);
    }
    Ok(all_components)
}

async fn run_modules(
    modules: Vec<Box<dyn Module>>,
    sender: Sender<ChangedMessage>,
    receiver: Receiver<PublishedMessage>,
) {
    for module in modules {
        let tx = sender.clone();
        let rx = receiver.resubscribe();
        tokio::spawn(async move {
            if let Err(err) = module.run(tx, rx).await {
                log::error!("Module failed: {}", err);
            }
        });
    }
}

fn run(config_path: &String) -> Result<(), Box<dyn std::error::Error>> {
    println!("dsmrhome - {}", VERSION);

    #[cfg(not(debug_assertions))]
    use directories::BaseDirs;
    #[cfg(not(debug_assertions))]
    let base_dirs = BaseDirs::new().expect("Failed to get base directories");
    #[cfg(not(debug_assertions))]
    let log_directory = base_dirs.data_local_dir();

    #[cfg(debug_assertions)]
    let log_directory = Path::new("./");

    #[cfg(not(debug_assertions))]
    let log_level = "info";

    #[cfg(debug_assertions)]
    let log_level = "debug";

    let mut logger = Logger::try_with_env_or_str(log_level)?
        .format_for_files(detailed_format)
        .log_to_file(FileSpec::default().directory(log_directory))
        .append()
        .rotate(
            Criterion::AgeOrSize(Age::Day, 10 * 1024 * 1024),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(7),
        )
        .duplicate_to_stdout(Duplicate::Debug)
        .start()?;

    let config_string = read_base_config(config_path)?;
    let config = serde_yaml::from_str::<CoreConfig>(&config_string)?;
    if let Some(logger_config) = config.logger.clone() {
        logger.reset_flw(&FileLogWriter::builder(FileSpec::default().directory(
            logger_config
                .directory
                .clone()
                .unwrap_or(log_directory.to_string_lossy().to_string()),
        )))?;
        logger.parse_and_push_temp_spec(logger_config.get_flexi_logger_spec())?;
    };

    let rt = Runtime::new()?;
    rt.block_on(async {
        let mut modules = get_all_modules(&config_string);
        info!("Loaded {} modules", modules.len());

        let components = initialize_modules(&mut modules)
            .await
            .expect("Failed to initialize modules");

        let (internal_tx, modules_rx) = broadcast::channel::<PublishedMessage>(16);
        let (modules_tx, mut internal_rx) = broadcast::channel::<ChangedMessage>(16);

        let internal_tx_clone = internal_tx.clone();
        tokio::spawn(async move {
            while let Ok(cmd) = internal_rx.recv().await {
                debug!("Received command: {:?}", cmd);
                match cmd {
                    ChangedMessage::SensorValueChange { key, value } => {
                        info!("Sensor {} = {}", key, value);
                        _ = internal_tx_clone
                            .send(PublishedMessage::SensorValueChanged { key, value });
                    }
                }
            }
        });

        run_modules(modules, modules_tx.clone(), modules_rx).await;

        _ = internal_tx.send(PublishedMessage::Components {
            components: components
                .iter()
                .map(|c| match c {
                    InternalComponent::Sensor(sensor) => Component::Sensor(sensor.ha.clone()),
                })
                .collect(),
        });

        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    });
    info!("Shutdown complete");
    Ok(())
}
