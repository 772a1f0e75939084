//! Startup sequence: camera, then network, then hand-off.
//!
//! A camera that fails to initialize aborts startup before any radio work.
//! The network wait has no timeout, so [`BringUp::run`] returns only once the
//! station has an address (or a failure is signalled).

use crate::camera::{
    ActiveCamera, CameraConfigurator, CameraDriver, CameraError, MemoryCapability,
};
use crate::config::{AppConfig, WifiConfig};
use crate::network::{
    Connection, EventSource, NetworkError, Orchestrator, StationDriver, StationLink,
};
use log::info;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Errors that end startup.
#[derive(Debug, thiserror::Error)]
pub enum BringUpError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("failed to connect to SSID {ssid}")]
    ConnectionFailed { ssid: String },
}

/// Everything the server needs after startup.
pub struct Ready<H, D, Sub> {
    pub camera: ActiveCamera<H>,
    pub address: Ipv4Addr,
    /// Keeps the station reconnecting while alive.
    pub link: StationLink<D, Sub>,
}

/// The startup sequence for one board, format and network.
#[derive(Debug, Clone)]
pub struct BringUp {
    configurator: CameraConfigurator,
    wifi: WifiConfig,
}

impl BringUp {
    pub fn new(configurator: CameraConfigurator, wifi: WifiConfig) -> Self {
        Self { configurator, wifi }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            CameraConfigurator::new(config.board, config.pixel_format),
            config.wifi.clone(),
        )
    }

    /// Bring the camera up, then connect and wait for an address.
    pub fn run<C, D, S>(
        &self,
        camera: &mut C,
        capability: MemoryCapability,
        station: Arc<D>,
        events: &S,
    ) -> Result<Ready<C::Handle, D, S::Subscription>, BringUpError>
    where
        C: CameraDriver,
        D: StationDriver + 'static,
        S: EventSource,
    {
        let camera = self.configurator.bring_up(camera, capability)?;
        info!("Camera initialized: {}", camera.summary().sensor);

        let (connection, link) = Orchestrator::new(station).bring_up(events, &self.wifi)?;
        match connection {
            Connection::Connected(address) => Ok(Ready {
                camera,
                address,
                link,
            }),
            Connection::Failed => Err(BringUpError::ConnectionFailed {
                ssid: self.wifi.ssid.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Board, FrameSize, PixelFormat, SensorId};
    use crate::network::{ConnectionState, EventBus};
    use crate::sim::{SimulatedCamera, SimulatedStation};

    const ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

    fn bring_up(format: PixelFormat) -> BringUp {
        BringUp::new(
            CameraConfigurator::new(Board::XiaoEsp32S3, format),
            WifiConfig::new("TestNetwork", "password123").unwrap(),
        )
    }

    #[test]
    fn test_first_attempt_success() {
        let bus = EventBus::default();
        let station = Arc::new(SimulatedStation::new(bus.clone(), 0, ADDR));
        let mut camera = SimulatedCamera::new(SensorId::OV2640);

        let ready = bring_up(PixelFormat::Jpeg)
            .run(&mut camera, MemoryCapability::PRESENT, station.clone(), &bus)
            .unwrap();

        assert_eq!(ready.address, ADDR);
        assert_eq!(ready.link.state(), ConnectionState::Connected);
        assert_eq!(ready.link.connect_attempts(), 1);
        assert_eq!(ready.camera.allocated_tier(), FrameSize::LARGEST);
        assert_eq!(ready.camera.active_tier(), FrameSize::STREAM_START_TIER);
    }

    #[test]
    fn test_success_after_retries() {
        let bus = EventBus::default();
        let station = Arc::new(SimulatedStation::new(bus.clone(), 3, ADDR));
        let mut camera = SimulatedCamera::new(SensorId::OV3660);

        let ready = bring_up(PixelFormat::Jpeg)
            .run(&mut camera, MemoryCapability::ABSENT, station.clone(), &bus)
            .unwrap();

        assert_eq!(ready.address, ADDR);
        assert_eq!(ready.link.connect_attempts(), 4);
        assert_eq!(station.connect_calls(), 4);
        assert!(ready.camera.summary().calibrated);
        assert_eq!(ready.camera.allocated_tier(), FrameSize::Svga);
    }

    #[test]
    fn test_failed_calibration_still_connects() {
        let bus = EventBus::default();
        let station = Arc::new(SimulatedStation::new(bus.clone(), 0, ADDR));
        let mut camera = SimulatedCamera::new(SensorId::OV3660).failing_control("vflip");

        let ready = bring_up(PixelFormat::Jpeg)
            .run(&mut camera, MemoryCapability::PRESENT, station.clone(), &bus)
            .unwrap();

        assert_eq!(ready.address, ADDR);
        assert!(!ready.camera.summary().calibrated);
        assert_eq!(station.connect_calls(), 1);
    }

    #[test]
    fn test_camera_failure_skips_network() {
        let bus = EventBus::default();
        let station = Arc::new(SimulatedStation::new(bus.clone(), 0, ADDR));
        let mut camera = SimulatedCamera::new(SensorId::OV2640).failing_init(0x20001);

        let result = bring_up(PixelFormat::Jpeg).run(
            &mut camera,
            MemoryCapability::PRESENT,
            station.clone(),
            &bus,
        );

        assert!(matches!(
            result,
            Err(BringUpError::Camera(CameraError::Init(0x20001)))
        ));
        assert!(station.calls().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_raw_format_bring_up() {
        let bus = EventBus::default();
        let station = Arc::new(SimulatedStation::new(bus.clone(), 0, ADDR));
        let mut camera = SimulatedCamera::new(SensorId::OV2640);

        let ready = bring_up(PixelFormat::Rgb565)
            .run(&mut camera, MemoryCapability::PRESENT, station, &bus)
            .unwrap();

        let summary = ready.camera.summary();
        assert_eq!(summary.active_tier, FrameSize::R240x240);
        assert_eq!(summary.fb_count, 2);
    }

    #[test]
    fn test_from_config() {
        let config = AppConfig::parse("Home", "password123", "wpa2", "jpeg", 80).unwrap();
        let bring_up = BringUp::from_config(&config);
        assert_eq!(bring_up.wifi.ssid, "Home");
    }
}
