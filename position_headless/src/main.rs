// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use clap::{CommandFactory, Parser};
use common::position::GeoCoordinate;
use gnss::{
    ProviderFactory,
    gpsd_source::{GpsdConfig, GpsdProvider},
    replay_source::ReplayProvider,
};
use module_core::{Event, EventKind, Module, ModuleCtx};
use position_source::{PositionSource, ui::UiEngine};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short = 'd', long)]
    gpsd: bool,
    #[arg(short = 'a', long, default_value = "127.0.0.1:2947")]
    gpsd_address: String,
    #[arg(short = 't', long)]
    update_timeout_ms: Option<u64>,
    #[arg(short, long)]
    replay: bool,
    #[arg(short = 'f', long)]
    replay_file: Option<String>,
    #[arg(short = 'i', long, default_value_t = 1000)]
    replay_interval_ms: u64,
}

/// Logs every change of the position source until a quit event arrives.
struct CoordinateLogger {
    ctx: ModuleCtx,
}

impl CoordinateLogger {
    fn new(ctx: ModuleCtx) -> Self {
        CoordinateLogger { ctx }
    }
}

#[async_trait::async_trait]
impl Module for CoordinateLogger {
    async fn run(&mut self) -> Result<(), ()> {
        let mut run = true;
        while run {
            match self.ctx.receiver.recv().await {
                Ok(event) => match event.kind {
                    EventKind::QuitEvent => run = false,
                    EventKind::EnabledChangedEvent(enabled) => {
                        info!("Position source enabled: {enabled}");
                    }
                    EventKind::CoordinateChangedEvent(coordinate) => {
                        info!(
                            "Coordinate lat: {}, long: {}, alt: {:?}",
                            coordinate.latitude, coordinate.longitude, coordinate.altitude
                        );
                    }
                },
                Err(e) => {
                    error!("Failed to receive event in module CoordinateLogger. Error: {e}");
                }
            }
        }
        Ok(())
    }
}

fn parse_field(record: &csv::StringRecord, index: usize) -> Result<Option<f64>, ()> {
    match record.get(index).map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => f64::from_str(value).map(Some).map_err(|e| {
            error!("Invalid number {value} in replay file. Error: {e}");
        }),
    }
}

fn read_coordinates_from_file(file_path: &str) -> Result<Vec<GeoCoordinate>, ()> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(file_path)
        .map_err(|e| {
            error!("Failed to open replay file {file_path}. Error: {e}");
        })?;
    let mut coordinates = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(|e| {
            error!("Failed to read replay file {file_path}. Error: {e}");
        })?;
        let (Some(longitude), Some(latitude)) = (parse_field(&record, 0)?, parse_field(&record, 1)?)
        else {
            error!("Replay record {:?} misses longitude or latitude", record);
            return Err(());
        };
        let altitude = parse_field(&record, 2)?;
        coordinates.push(GeoCoordinate::new(latitude, longitude, altitude));
    }
    debug!("length of coordinates: {}", coordinates.len());
    Ok(coordinates)
}

fn create_provider_factory(cli: &Cli) -> Result<ProviderFactory, ()> {
    if cli.gpsd {
        let config = GpsdConfig {
            address: cli.gpsd_address.clone(),
            update_timeout: cli.update_timeout_ms.map(Duration::from_millis),
        };
        Ok(GpsdProvider::factory(config))
    } else if cli.replay {
        let Some(replay_file) = &cli.replay_file else {
            error!("Failed to create replay provider. Error: replay_file not set");
            let _ = Cli::command().print_help();
            return Err(());
        };
        let coordinates = read_coordinates_from_file(replay_file)?;
        Ok(ReplayProvider::factory(
            coordinates,
            Duration::from_millis(cli.replay_interval_ms),
        ))
    } else {
        error!("No position provider specified. Use --gpsd or --replay");
        let _ = Cli::command().print_help();
        Err(())
    }
}

#[tokio::main]
async fn main() -> Result<(), ()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let factory = create_provider_factory(&cli)?;
    PositionSource::install_default_factory(factory).map_err(|e| {
        error!("Failed to install position provider. Error: {e}");
    })?;

    let mut engine = UiEngine::new();
    PositionSource::register(&mut engine, "org.positioning").map_err(|e| {
        error!("Failed to register position source. Error: {e}");
    })?;
    let source = engine
        .singleton::<PositionSource>("org.positioning", position_source::UI_TYPE_NAME)
        .ok_or_else(|| error!("Position source singleton not resolvable"))?;

    let mut logger = CoordinateLogger::new(source.event_bus().context());
    let quit_sender = source.event_bus().context().sender;
    ctrlc::set_handler(move || {
        let _ = quit_sender.send(Event {
            kind: EventKind::QuitEvent,
        });
    })
    .map_err(|e| error!("Failed to install Ctrl-C handler. Error: {e}"))?;

    info!("Starting position source...");
    source.set_enabled(true);
    let result = logger.run().await;
    source.set_enabled(false);
    if let Some(provider) = source.position_info_source() {
        info!(
            "Stopped provider {} last error: {:?}",
            provider.source_name(),
            provider.error()
        );
    }
    result
}
