//! Host bring-up against simulated drivers.
//!
//! Runs the same startup sequence as the firmware, with a simulated camera
//! and a station that fails a few attempts before it gets an address, then
//! serves frames on localhost.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin host-sim
//! cargo run --bin host-sim -- --format rgb565 --no-psram --failures 5 --port 8080
//! curl http://127.0.0.1:8080/status
//! ```

use anyhow::Context;
use esp32_cam_node::camera::{Board, CameraConfigurator, MemoryCapability, PixelFormat, SensorId};
use esp32_cam_node::network::EventBus;
use esp32_cam_node::sim::{SimulatedCamera, SimulatedStation};
use esp32_cam_node::{BringUp, FrameServer, FrameService, WifiConfig};
use log::info;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const SIMULATED_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 2);

struct Options {
    format: PixelFormat,
    capability: MemoryCapability,
    sensor: SensorId,
    failures: u32,
    port: u16,
}

fn parse_args() -> anyhow::Result<Options> {
    let mut options = Options {
        format: PixelFormat::Jpeg,
        capability: MemoryCapability::PRESENT,
        sensor: SensorId::OV2640,
        failures: 2,
        port: DEFAULT_PORT,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--format" => {
                let value = args.next().context("--format needs a value")?;
                options.format = value.parse().map_err(anyhow::Error::msg)?;
            }
            "--no-psram" => options.capability = MemoryCapability::ABSENT,
            "--ov3660" => options.sensor = SensorId::OV3660,
            "--failures" => {
                let value = args.next().context("--failures needs a value")?;
                options.failures = value.parse().context("--failures expects a number")?;
            }
            "--port" => {
                let value = args.next().context("--port needs a value")?;
                options.port = value.parse().context("--port expects a number")?;
            }
            other => anyhow::bail!("unknown argument: {}", other),
        }
    }

    Ok(options)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let options = parse_args()?;

    let bus = EventBus::default();
    let station = Arc::new(
        SimulatedStation::new(bus.clone(), options.failures, SIMULATED_ADDRESS)
            .with_attempt_delay(Duration::from_millis(200)),
    );
    let mut camera = SimulatedCamera::new(options.sensor);

    let bring_up = BringUp::new(
        CameraConfigurator::new(Board::default(), options.format),
        WifiConfig::new("SimulatedAP", "simulated-password")?,
    );
    let ready = bring_up.run(&mut camera, options.capability, station, &bus)?;

    let service =
        FrameService::new(ready.camera, ready.address).with_station(Box::new(ready.link.monitor()));
    let _server = FrameServer::start(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)), options.port, service)?;

    info!(
        "Camera Ready! Use 'http://127.0.0.1:{}' to connect (simulated address {})",
        options.port, ready.address
    );

    let _link = ready.link;
    loop {
        std::thread::sleep(Duration::from_millis(500));
    }
}
