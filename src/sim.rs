//! Simulated camera and station drivers.
//!
//! Host-side stand-ins for the esp32-camera driver and the Wi-Fi station.
//! They record every call so tests can check ordering, and the station
//! answers connect attempts by posting events on an [`EventBus`] the way the
//! real driver posts to the system event loop. The `host-sim` binary runs the
//! whole bring-up on top of them.

use crate::camera::{
    CameraDriver, CameraError, CaptureConfig, Calibration, Frame, FrameSize, FrameSource,
    PixelFormat, SensorControl, SensorId,
};
use crate::config::WifiConfig;
use crate::network::{EventBus, NetworkError, StationDriver, SystemEvent};
use log::debug;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Post-init call seen by a [`SimulatedSensor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraCall {
    Calibrate(Calibration),
    SetFrameSize(FrameSize),
    Capture,
}

/// Camera driver that "finds" a sensor with a fixed product id.
#[derive(Debug)]
pub struct SimulatedCamera {
    sensor: SensorId,
    init_error: Option<i32>,
    failing_control: Option<&'static str>,
    init_attempts: u32,
    last_config: Option<CaptureConfig>,
    calls: Arc<Mutex<Vec<CameraCall>>>,
}

impl SimulatedCamera {
    pub fn new(sensor: SensorId) -> Self {
        Self {
            sensor,
            init_error: None,
            failing_control: None,
            init_attempts: 0,
            last_config: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make `initialize` fail with the given driver status.
    pub fn failing_init(mut self, status: i32) -> Self {
        self.init_error = Some(status);
        self
    }

    /// Make every post-init adjustment on the handle fail, reporting `control`.
    pub fn failing_control(mut self, control: &'static str) -> Self {
        self.failing_control = Some(control);
        self
    }

    /// Calls made on the sensor handle so far. Shared with the handle.
    pub fn calls(&self) -> Vec<CameraCall> {
        lock(&self.calls).clone()
    }

    pub fn init_attempts(&self) -> u32 {
        self.init_attempts
    }

    /// Configuration passed to the last `initialize`.
    pub fn last_config(&self) -> Option<CaptureConfig> {
        self.last_config.clone()
    }
}

impl CameraDriver for SimulatedCamera {
    type Handle = SimulatedSensor;

    fn initialize(&mut self, config: &CaptureConfig) -> Result<SimulatedSensor, CameraError> {
        self.init_attempts += 1;
        self.last_config = Some(config.clone());
        if let Some(status) = self.init_error {
            return Err(CameraError::Init(status));
        }
        debug!("Simulated camera up: {:?}", config);
        Ok(SimulatedSensor {
            id: self.sensor,
            format: config.pixel_format,
            frame_size: config.frame_size,
            sequence: 0,
            failing_control: self.failing_control,
            calls: self.calls.clone(),
        })
    }
}

/// Handle returned by [`SimulatedCamera`]. Produces synthetic frames.
#[derive(Debug)]
pub struct SimulatedSensor {
    id: SensorId,
    format: PixelFormat,
    frame_size: FrameSize,
    sequence: u32,
    failing_control: Option<&'static str>,
    calls: Arc<Mutex<Vec<CameraCall>>>,
}

impl SimulatedSensor {
    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    fn check_control(&self) -> Result<(), CameraError> {
        match self.failing_control {
            Some(control) => Err(CameraError::Control { control, status: -1 }),
            None => Ok(()),
        }
    }
}

impl SensorControl for SimulatedSensor {
    fn sensor_id(&self) -> SensorId {
        self.id
    }

    fn apply_calibration(&mut self, calibration: &Calibration) -> Result<(), CameraError> {
        lock(&self.calls).push(CameraCall::Calibrate(*calibration));
        self.check_control()
    }

    fn set_frame_size(&mut self, size: FrameSize) -> Result<(), CameraError> {
        lock(&self.calls).push(CameraCall::SetFrameSize(size));
        self.check_control()?;
        self.frame_size = size;
        Ok(())
    }
}

impl FrameSource for SimulatedSensor {
    fn capture(&mut self) -> Result<Frame, CameraError> {
        lock(&self.calls).push(CameraCall::Capture);
        self.sequence = self.sequence.wrapping_add(1);

        let (width, height) = self.frame_size.dimensions();
        let data = match self.format {
            // SOI, sequence number as payload, EOI
            PixelFormat::Jpeg => {
                let mut data = vec![0xFF, 0xD8];
                data.extend_from_slice(&self.sequence.to_be_bytes());
                data.extend_from_slice(&[0xFF, 0xD9]);
                data
            }
            PixelFormat::Grayscale => {
                vec![self.sequence as u8; usize::from(width) * usize::from(height)]
            }
            PixelFormat::Rgb565 | PixelFormat::Yuv422 => {
                vec![self.sequence as u8; usize::from(width) * usize::from(height) * 2]
            }
        };

        Ok(Frame {
            width,
            height,
            data,
        })
    }
}

/// Driver call seen by a [`SimulatedStation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationCall {
    SetStationMode,
    /// Carries the SSID only.
    SetCredentials(String),
    Start,
    Connect,
}

/// Wi-Fi station that reaches its access point after a number of failures.
#[derive(Debug)]
pub struct SimulatedStation {
    bus: Option<EventBus>,
    failures_before_success: u32,
    address: Ipv4Addr,
    reject_connect: bool,
    attempt_delay: Duration,
    attempts: AtomicU32,
    calls: Mutex<Vec<StationCall>>,
}

impl SimulatedStation {
    /// A station that posts its outcomes on `bus`.
    ///
    /// The first `failures_before_success` connect attempts end in
    /// `StaDisconnected`; the next one associates and gets `address`.
    pub fn new(bus: EventBus, failures_before_success: u32, address: Ipv4Addr) -> Self {
        Self {
            bus: Some(bus),
            ..Self::silent_with(failures_before_success, address)
        }
    }

    /// A station that records calls but never posts anything.
    pub fn silent() -> Self {
        Self::silent_with(0, Ipv4Addr::UNSPECIFIED)
    }

    fn silent_with(failures_before_success: u32, address: Ipv4Addr) -> Self {
        Self {
            bus: None,
            failures_before_success,
            address,
            reject_connect: false,
            attempt_delay: Duration::ZERO,
            attempts: AtomicU32::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every `connect()` return an error.
    pub fn rejecting_connect(mut self) -> Self {
        self.reject_connect = true;
        self
    }

    /// Time each connect attempt takes before its outcome is posted.
    pub fn with_attempt_delay(mut self, delay: Duration) -> Self {
        self.attempt_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<StationCall> {
        lock(&self.calls).clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, call: StationCall) {
        lock(&self.calls).push(call);
    }

    fn post(&self, event: SystemEvent) {
        if let Some(bus) = &self.bus {
            bus.post(event);
        }
    }
}

impl StationDriver for SimulatedStation {
    fn set_station_mode(&self) -> Result<(), NetworkError> {
        self.record(StationCall::SetStationMode);
        Ok(())
    }

    fn set_credentials(&self, config: &WifiConfig) -> Result<(), NetworkError> {
        config.validate()?;
        self.record(StationCall::SetCredentials(config.ssid.clone()));
        Ok(())
    }

    fn start(&self) -> Result<(), NetworkError> {
        self.record(StationCall::Start);
        self.post(SystemEvent::StaStarted);
        Ok(())
    }

    fn connect(&self) -> Result<(), NetworkError> {
        self.record(StationCall::Connect);
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject_connect {
            return Err(NetworkError::Driver("connect rejected".into()));
        }

        if !self.attempt_delay.is_zero() {
            thread::sleep(self.attempt_delay);
        }
        if attempt < self.failures_before_success {
            debug!("Simulated attempt {} failed", attempt + 1);
            self.post(SystemEvent::StaDisconnected);
        } else {
            self.post(SystemEvent::StaConnected);
            self.post(SystemEvent::StaGotIp(self.address));
        }
        Ok(())
    }
}
