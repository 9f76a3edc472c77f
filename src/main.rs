//! enviroplus-exporter binary: samples the board, serves `/metrics` and runs
//! the enabled uploaders.

use clap::{ArgAction, Parser, Subcommand};
use enviroplus_exporter::config::{nonzero, parse_bool};
use enviroplus_exporter::metrics::{prometheus, spawn_sampling};
use enviroplus_exporter::publishers::luftdaten::{self, Luftdaten};
use enviroplus_exporter::publishers::waqi::{spawn_external_aqi, Waqi};
use enviroplus_exporter::publishers::{http_client, spawn_publisher, InfluxDb, Notehub, Safecast};
use enviroplus_exporter::{
    start_web_server, AppState, EnviroCollector, EnviroSnapshot, ExporterConfig, SamplingOptions,
    SensorSet, WebConfig, DEFAULT_INTERVAL, DEFAULT_PORT,
};
use std::path::Path;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "enviroplus-exporter")]
#[command(about = "Prometheus exporter for the Pimoroni Enviro+ board")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Specify alternate bind address
    #[arg(short, long = "bind", value_name = "ADDRESS", default_value = "0.0.0.0")]
    bind: String,

    /// Specify alternate port
    #[arg(short, long, value_name = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Device is an Enviro (not Enviro+) so don't fetch data from the particulate sensor
    #[arg(short, long, value_name = "ENVIRO", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    enviro: bool,

    /// The temperature compensation value to get better temperature results
    /// when the Enviro+ pHAT is too close to the Raspberry Pi board
    #[arg(short, long = "temp", value_name = "TEMPERATURE", allow_negative_numbers = true)]
    temp: Option<f64>,

    /// The humidity compensation value to get better humidity results
    /// when the Enviro+ pHAT is too close to the Raspberry Pi board
    #[arg(short = 'u', long = "humid", value_name = "HUMIDITY", allow_negative_numbers = true)]
    humid: Option<f64>,

    /// Turns on more verbose logging, showing sensor output and post responses
    #[arg(short, long, value_name = "DEBUG", env = "DEBUG", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    debug: bool,

    /// Post sensor data to InfluxDB
    #[arg(short, long, value_name = "INFLUXDB", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    influxdb: bool,

    /// Post sensor data to Luftdaten
    #[arg(short, long, value_name = "LUFTDATEN", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    luftdaten: bool,

    /// Post sensor data to Safecast.org
    #[arg(short, long, value_name = "SAFECAST", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    safecast: bool,

    /// Post sensor data to Notehub.io via Notecard
    #[arg(short, long, value_name = "NOTECARD", action = ArgAction::Set, value_parser = parse_bool, default_value = "false")]
    notecard: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the exporter (default)
    Serve,

    /// Take a single sample, print it as JSON and exit
    Snapshot,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(cli.debug)?;

    match cli.command {
        Some(Commands::Snapshot) => snapshot_command(&cli).await,
        Some(Commands::Serve) | None => serve_command(&cli).await,
    }
}

/// INFO, or DEBUG with `--debug`; `RUST_LOG` directives refine it.
fn log_filter(debug: bool) -> EnvFilter {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

fn init_logging(debug: bool) -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(debug))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn sampling_options(cli: &Cli) -> SamplingOptions {
    SamplingOptions {
        temperature_offset: nonzero(cli.temp),
        humidity_offset: nonzero(cli.humid),
        enviro: cli.enviro,
        debug: cli.debug,
    }
}

async fn open_collector(cli: &Cli) -> Result<EnviroCollector, Box<dyn std::error::Error>> {
    let enviro = cli.enviro;
    let sensors = tokio::task::spawn_blocking(move || SensorSet::open(enviro)).await?;
    Ok(EnviroCollector::new(sensors, sampling_options(cli)))
}

async fn serve_command(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("enviroplus-exporter {} starting", env!("CARGO_PKG_VERSION"));

    let config = ExporterConfig::from_env()?;
    let handle = prometheus::install_recorder()?;

    if let Some(offset) = nonzero(cli.temp) {
        info!("Using temperature compensation, reducing value by {} degrees Celsius", offset);
    }
    if let Some(offset) = nonzero(cli.humid) {
        info!("Using humidity compensation, increasing value by {} percent", offset);
    }

    let collector = open_collector(cli).await?;
    let (aqi_tx, aqi_rx) = watch::channel(None);
    let (snapshot_tx, snapshot_rx) = watch::channel(EnviroSnapshot::default());
    spawn_sampling(collector, DEFAULT_INTERVAL, aqi_rx, snapshot_tx);

    let client = http_client()?;

    if let Some(waqi) = config.waqi.clone() {
        info!(
            "Fetching external AQI for {}, {} from WAQI",
            waqi.latitude, waqi.longitude
        );
        spawn_external_aqi(Waqi::new(client.clone(), waqi), aqi_tx);
    }

    if cli.influxdb {
        let period = config.influxdb.period;
        info!(
            "Sensor data will be posted to InfluxDB every {} seconds",
            period.as_secs()
        );
        let influxdb = InfluxDb::new(client.clone(), config.influxdb.clone());
        spawn_publisher(influxdb, period, snapshot_rx.clone());
    }

    if cli.luftdaten {
        let serial = luftdaten::read_serial_number(Path::new(luftdaten::CPUINFO))?;
        let period = config.luftdaten.period;
        let luftdaten = Luftdaten::new(client.clone(), &serial);
        info!(
            "Sensor data will be posted to Luftdaten every {} seconds for the UID {}",
            period.as_secs(),
            luftdaten.sensor_uid()
        );
        spawn_publisher(luftdaten, period, snapshot_rx.clone());
    }

    if cli.safecast {
        let period = config.safecast.period;
        let safecast = Safecast::new(client.clone(), config.safecast.clone());
        info!(
            "Sensor data will be posted to Safecast every {} seconds via {}",
            period.as_secs(),
            safecast.api_url()
        );
        spawn_publisher(safecast, period, snapshot_rx.clone());
    }

    if cli.notecard {
        let period = config.notecard.period;
        info!(
            "Sensor data will be sent to Notehub via Notecard on {} every {} seconds",
            config.notecard.port.display(),
            period.as_secs()
        );
        spawn_publisher(Notehub::new(&config.notecard), period, snapshot_rx.clone());
    }

    let web_config = WebConfig::new(&cli.bind, cli.port);
    let state = AppState::new(handle, snapshot_rx, &web_config);
    info!("Listening on http://{}", web_config.bind_address());
    start_web_server(web_config, state).await?;

    Ok(())
}

async fn snapshot_command(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut collector = open_collector(cli).await?;
    let snapshot = tokio::task::spawn_blocking(move || collector.sample(None)).await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["enviroplus-exporter"]).unwrap();
        assert_eq!(cli.bind, "0.0.0.0");
        assert_eq!(cli.port, DEFAULT_PORT);
        assert!(!cli.enviro);
        assert!(!cli.influxdb);
        assert!(!cli.luftdaten);
        assert!(!cli.safecast);
        assert!(!cli.notecard);
        assert!(cli.temp.is_none());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "enviroplus-exporter",
            "--bind=127.0.0.1",
            "--port=9100",
            "-e",
            "yes",
            "--temp=-1.5",
            "-u",
            "3",
            "--influxdb=T",
            "-s",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.bind, "127.0.0.1");
        assert_eq!(cli.port, 9100);
        assert!(cli.enviro);
        assert_eq!(cli.temp, Some(-1.5));
        assert_eq!(cli.humid, Some(3.0));
        assert!(cli.influxdb);
        assert!(!cli.safecast);
    }

    #[test]
    fn test_invalid_boolean_is_rejected() {
        let err = Cli::try_parse_from(["enviroplus-exporter", "--luftdaten=maybe"])
            .err()
            .unwrap();
        assert!(err.to_string().contains("maybe is not a valid boolean value"));
    }

    #[test]
    fn test_zero_compensation_is_ignored() {
        let cli = Cli::try_parse_from(["enviroplus-exporter", "--temp=0", "--humid=2"]).unwrap();
        let options = sampling_options(&cli);
        assert_eq!(options.temperature_offset, None);
        assert_eq!(options.humidity_offset, Some(2.0));
    }

    #[test]
    fn test_log_filter_defaults() {
        std::env::remove_var("RUST_LOG");
        assert_eq!(log_filter(false).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(log_filter(true).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_debug_logging_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        init_logging(true).unwrap();

        assert!(tracing::enabled!(Level::DEBUG));
        assert!(tracing::enabled!(Level::INFO));
        assert!(tracing::enabled!(Level::WARN));
        assert!(!tracing::enabled!(Level::TRACE));
    }

    #[test]
    fn test_snapshot_subcommand() {
        let cli = Cli::try_parse_from(["enviroplus-exporter", "--enviro=true", "snapshot"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Snapshot)));
        assert!(cli.enviro);
    }
}
