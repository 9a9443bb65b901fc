//! Compile-time configuration: Wi-Fi credentials, pins and server tunables.
//!
//! Credentials can be overridden at build time, e.g.
//! `WISP_WIFI_SSID=MyNet WISP_WIFI_PASSWORD=secret cargo build --release`.

const fn env_or(value: Option<&'static str>, default: &'static str) -> &'static str {
    match value {
        Some(v) => v,
        None => default,
    }
}

/// Station credentials (the network the board joins).
pub const STA_SSID: &str = env_or(option_env!("WISP_WIFI_SSID"), "K.K");
pub const STA_PASSWORD: &str = env_or(option_env!("WISP_WIFI_PASSWORD"), "101213456");

/// Access point hosted by the board itself (WPA2).
pub const AP_SSID: &str = env_or(option_env!("WISP_AP_SSID"), "wisp-ap");
pub const AP_PASSWORD: &str = env_or(option_env!("WISP_AP_PASSWORD"), "12345678");

/// Gateway address of the access point network (/24).
pub const AP_GATEWAY: core::net::Ipv4Addr = core::net::Ipv4Addr::new(192, 168, 2, 1);

pub const HTTP_PORT: u16 = 80;

/// One request head (and any body) must fit in a single buffer of this size.
pub const REQUEST_BUFFER_SIZE: usize = 1024;

/// Bounds slow or silent clients so one connection cannot stall the server.
pub const SOCKET_TIMEOUT_SECS: u64 = 10;

/// Station join wait: 10 attempts, one second apart, then continue AP-only.
pub const STA_JOIN_ATTEMPTS: u32 = 10;

/// DHT11 cannot be sampled faster than once per second; reads arriving
/// sooner than this are served from the last good reading.
pub const SENSOR_MIN_INTERVAL_MS: u64 = 1_000;

// Pin assignments (ESP32-S3 devkit):
//   GPIO4  - DHT11 data
//   GPIO48 - WS2812 RGB LED (RMT)
//   GPIO8  - I2C0 SDA (SSD1306)
//   GPIO9  - I2C0 SCL (SSD1306)
