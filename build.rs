fn main() {
    // cfg.toml is read at compile time by toml-cfg
    println!("cargo:rerun-if-changed=cfg.toml");

    // Chip cfgs (esp32, esp32s3) come from the ESP-IDF build below
    println!("cargo:rustc-check-cfg=cfg(esp32)");
    println!("cargo:rustc-check-cfg=cfg(esp32s3)");

    // Only run ESP-IDF build system when targeting ESP32 (Xtensa architecture)
    // Build scripts run on the host, so we check the TARGET env var
    if let Ok(target) = std::env::var("TARGET") {
        if target.contains("xtensa") {
            embuild::espidf::sysenv::output();
        }
    }
}
