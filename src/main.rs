//! ESP32 camera node firmware binary.

#[cfg(feature = "esp32")]
fn platform_init() {
    // Link ESP-IDF patches (must be first!)
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
}

#[cfg(feature = "esp32")]
fn run() -> anyhow::Result<()> {
    use esp32_cam_node::camera::{detect_memory_capability, EspCamera};
    use esp32_cam_node::network::{EspStation, SystemEventSource};
    use esp32_cam_node::{AppConfig, BringUp, FrameServer, FrameService};
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use std::sync::Arc;
    use std::time::Duration;

    let config = AppConfig::load()?;
    info!(
        "Board {}, {} capture, SSID {}",
        config.board.name(),
        config.pixel_format,
        config.wifi.ssid
    );

    let capability = detect_memory_capability();

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let station = Arc::new(EspStation::new(peripherals.modem, sysloop.clone(), Some(nvs))?);
    let events = SystemEventSource::new(sysloop);

    let ready = BringUp::from_config(&config).run(
        &mut EspCamera::new(),
        capability,
        station,
        &events,
    )?;

    let service =
        FrameService::new(ready.camera, ready.address).with_station(Box::new(ready.link.monitor()));
    let _server = FrameServer::start(None, config.server_port, service)?;

    info!("Camera Ready! Use 'http://{}' to connect", ready.address);

    // The link keeps reconnecting while it is alive
    let _link = ready.link;
    loop {
        std::thread::sleep(Duration::from_millis(500));
    }
}

#[cfg(feature = "esp32")]
fn main() -> anyhow::Result<()> {
    platform_init();

    run().inspect_err(|e| log::error!("Startup failed: {:#}", e))
}

#[cfg(not(feature = "esp32"))]
fn main() {
    println!("This binary requires the 'esp32' feature.");
    println!("Use 'cargo run --bin host-sim' to run the bring-up against simulated drivers.");
}
