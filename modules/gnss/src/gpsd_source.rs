// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{PositionEvents, PositionProvider, ProviderFactory, Reporter};
use chrono::{DateTime, Utc};
use common::{
    error::PositioningError,
    position::{GeoCoordinate, PositionInfo},
};
use futures::StreamExt;
use gpsd_proto::{Mode, Tpv};
use serde::Deserialize;
use std::{
    io::{self, Error, ErrorKind},
    net::SocketAddr,
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    io::AsyncWriteExt,
    net::TcpStream,
    time::{Instant, timeout_at},
};
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, error, info, warn};

/// Connection settings of the [`GpsdProvider`].
#[derive(Clone, Debug, PartialEq)]
pub struct GpsdConfig {
    /// Address of the gpsd daemon, e.g. `127.0.0.1:2947`.
    pub address: String,
    /// Reports [`PositioningError::UpdateTimeout`] when no valid fix arrived
    /// within this duration. `None` disables the check.
    pub update_timeout: Option<Duration>,
}

impl Default for GpsdConfig {
    fn default() -> Self {
        GpsdConfig {
            address: "127.0.0.1:2947".to_string(),
            update_timeout: None,
        }
    }
}

/// Class tag every gpsd report carries.
#[derive(Debug, Deserialize)]
struct ReportClass {
    class: String,
}

/// Error report of gpsd, e.g. for an unrecognized request.
#[derive(Debug, Deserialize)]
struct ErrorReport {
    message: String,
}

/// Converts a TPV report into a fix. Reports without a fix become an invalid fix.
fn convert_tpv(tpv: &Tpv) -> PositionInfo {
    let altitude = match tpv.mode {
        Mode::NoFix => return PositionInfo::invalid(),
        Mode::Fix2d => None,
        Mode::Fix3d => tpv.alt_hae.or(tpv.alt).map(f64::from),
    };
    let (Some(lat), Some(lon)) = (tpv.lat, tpv.lon) else {
        return PositionInfo::invalid();
    };
    let Some(ref time) = tpv.time else {
        return PositionInfo::invalid();
    };
    let Ok(timestamp) = DateTime::<Utc>::from_str(time) else {
        return PositionInfo::invalid();
    };
    PositionInfo::new(GeoCoordinate::new(lat, lon, altitude), timestamp)
}

fn classify_io_error(error: &Error) -> PositioningError {
    match error.kind() {
        ErrorKind::ConnectionRefused | ErrorKind::PermissionDenied => PositioningError::Access,
        ErrorKind::UnexpectedEof
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe => PositioningError::Closed,
        _ => PositioningError::UnknownSource,
    }
}

fn process_line(line: &str, reporter: &Reporter) -> bool {
    let Ok(report) = serde_json::from_str::<ReportClass>(line) else {
        debug!("Ignoring unparsable gpsd line {line}");
        return false;
    };
    match report.class.as_str() {
        "TPV" => match serde_json::from_str::<Tpv>(line) {
            Ok(tpv) => {
                let info = convert_tpv(&tpv);
                let valid = info.is_valid();
                reporter.position(info);
                valid
            }
            Err(e) => {
                debug!("Ignoring malformed TPV report. Error: {e}");
                false
            }
        },
        "ERROR" => {
            if let Ok(error) = serde_json::from_str::<ErrorReport>(line) {
                warn!("gpsd reported an error: {}", error.message);
            }
            reporter.error(PositioningError::UnknownSource);
            false
        }
        _ => false,
    }
}

async fn gpsd_reader(address: SocketAddr, update_timeout: Option<Duration>, reporter: Arc<Reporter>) {
    let mut stream = match TcpStream::connect(address).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to connect to gpsd at {address}. Error: {e}");
            reporter.error(classify_io_error(&e));
            return;
        }
    };
    if let Err(e) = stream
        .write_all(gpsd_proto::ENABLE_WATCH_CMD.as_bytes())
        .await
    {
        error!("Failed to enable gpsd watch mode. Error: {e}");
        reporter.error(classify_io_error(&e));
        return;
    }
    info!("Connected to gpsd at {address}");

    let mut framed = Framed::new(stream, LinesCodec::new());
    let mut deadline = update_timeout.map(|t| Instant::now() + t);
    loop {
        let next = match deadline {
            Some(at) => match timeout_at(at, framed.next()).await {
                Ok(next) => next,
                Err(_) => {
                    reporter.error(PositioningError::UpdateTimeout);
                    deadline = update_timeout.map(|t| Instant::now() + t);
                    continue;
                }
            },
            None => framed.next().await,
        };
        match next {
            Some(Ok(ref line)) => {
                if process_line(line, &reporter) {
                    deadline = update_timeout.map(|t| Instant::now() + t);
                }
            }
            Some(Err(LinesCodecError::Io(e))) => {
                error!("gpsd receive error {e:?}");
                reporter.error(classify_io_error(&e));
                break;
            }
            Some(Err(e)) => {
                error!("gpsd receive error {e:?}");
                reporter.error(PositioningError::UnknownSource);
            }
            None => {
                info!("gpsd closed the connection");
                reporter.error(PositioningError::Closed);
                break;
            }
        }
    }
}

/// GPSD daemon based position provider.
///
/// The connection is established when updates are started and dropped when
/// they are stopped. Position reports and errors are delivered from a task
/// on the tokio runtime the provider was created in.
pub struct GpsdProvider {
    address: SocketAddr,
    update_timeout: Option<Duration>,
    runtime: tokio::runtime::Handle,
    reporter: Arc<Reporter>,
    reader: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GpsdProvider {
    /// Creates a new provider. Must be called within a tokio runtime.
    pub fn new(config: &GpsdConfig, sink: Arc<dyn PositionEvents>) -> Result<Self, Error> {
        let address: SocketAddr = match config.address.parse() {
            Ok(addr) => addr,
            Err(e) => return Err(io::Error::new(ErrorKind::InvalidInput, e)),
        };
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            io::Error::other(format!("gpsd provider requires a tokio runtime. Error: {e}"))
        })?;
        Ok(GpsdProvider {
            address,
            update_timeout: config.update_timeout,
            runtime,
            reporter: Arc::new(Reporter::new(sink)),
            reader: Mutex::new(None),
        })
    }

    /// Returns a factory creating [`GpsdProvider`]s with the given config.
    pub fn factory(config: GpsdConfig) -> ProviderFactory {
        Box::new(move |sink| {
            let provider: Arc<dyn PositionProvider> = Arc::new(GpsdProvider::new(&config, sink)?);
            Ok(provider)
        })
    }
}

impl PositionProvider for GpsdProvider {
    fn source_name(&self) -> &str {
        "gpsd"
    }

    fn start_updates(&self) {
        let mut reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        if reader.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        debug!("Starting gpsd updates from {}", self.address);
        let address = self.address;
        let update_timeout = self.update_timeout;
        let reporter = self.reporter.clone();
        *reader = Some(
            self.runtime
                .spawn(async move { gpsd_reader(address, update_timeout, reporter).await }),
        );
    }

    fn stop_updates(&self) {
        if let Some(handle) = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            debug!("Stopping gpsd updates from {}", self.address);
            handle.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    fn error(&self) -> Option<PositioningError> {
        self.reporter.last_error()
    }

    fn last_known_position(&self) -> Option<PositionInfo> {
        self.reporter.last_position()
    }
}

impl Drop for GpsdProvider {
    fn drop(&mut self) {
        self.stop_updates();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_tpv(line: &str) -> PositionInfo {
        convert_tpv(&serde_json::from_str::<Tpv>(line).unwrap())
    }

    #[test]
    fn tpv_with_3d_fix_carries_altitude() {
        let info = parse_tpv(
            r#"{"class":"TPV","mode":3,"time":"2025-05-01T10:15:00.000Z","lat":52.025833,"lon":11.279166,"altHAE":88.5,"alt":80.0}"#,
        );
        assert!(info.is_valid());
        assert_eq!(
            info.coordinate(),
            GeoCoordinate::new(52.025833, 11.279166, Some(88.5))
        );
    }

    #[test]
    fn tpv_with_3d_fix_falls_back_to_alt() {
        let info = parse_tpv(
            r#"{"class":"TPV","mode":3,"time":"2025-05-01T10:15:00.000Z","lat":52.0,"lon":11.0,"alt":80.5}"#,
        );
        assert_eq!(info.coordinate().altitude, Some(80.5));
    }

    #[test]
    fn tpv_with_2d_fix_has_no_altitude() {
        let info = parse_tpv(
            r#"{"class":"TPV","mode":2,"time":"2025-05-01T10:15:00.000Z","lat":52.0,"lon":11.0,"alt":80.0}"#,
        );
        assert!(info.is_valid());
        assert_eq!(info.coordinate().altitude, None);
    }

    #[test]
    fn tpv_without_fix_is_invalid() {
        let info = parse_tpv(r#"{"class":"TPV","mode":1,"time":"2025-05-01T10:15:00.000Z"}"#);
        assert!(!info.is_valid());
    }

    #[test]
    fn other_reports_are_ignored() {
        let (sink, mut rx) = crate::test_helper::channel_sink();
        let reporter = Reporter::new(sink);
        assert!(!process_line(
            r#"{"class":"VERSION","release":"3.25","rev":"3.25"}"#,
            &reporter
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn error_report_is_an_unknown_source_error() {
        let (sink, _rx) = crate::test_helper::channel_sink();
        let reporter = Reporter::new(sink);
        assert!(!process_line(
            r#"{"class":"ERROR","message":"Unrecognized request"}"#,
            &reporter
        ));
        assert_eq!(reporter.last_error(), Some(PositioningError::UnknownSource));
    }

    #[test]
    fn refused_connection_is_an_access_error() {
        let error = Error::from(ErrorKind::ConnectionRefused);
        assert_eq!(classify_io_error(&error), PositioningError::Access);
        let error = Error::from(ErrorKind::ConnectionReset);
        assert_eq!(classify_io_error(&error), PositioningError::Closed);
    }

    #[test]
    fn creation_without_runtime_fails() {
        let (sink, _rx) = crate::test_helper::channel_sink();
        assert!(GpsdProvider::new(&GpsdConfig::default(), sink).is_err());
    }
}
