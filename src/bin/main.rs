#![no_std]
#![no_main]

use core::panic::PanicInfo;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_backtrace as _;
use esp_hal::{delay::Delay, timer::timg::TimerGroup};

use wisp::{
    display::init_ssd1306,
    hardware::{self, Ssd1306Hardware},
    model::Rgb,
    net, server,
    traits::RgbLed,
};

const HEART_BEAT_INTERVAL_MS: u64 = 5_000;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    esp_println::println!("[PANIC] {:?}", info);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
        esp_println::println!("[PANIC] continue...");
    }
}

esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn run_heartbeat() {
    loop {
        esp_println::println!("[HEARTBEAT] System is alive");
        Timer::after(Duration::from_millis(HEART_BEAT_INTERVAL_MS)).await;
    }
}

#[esp_rtos::main]
async fn main(spawner: Spawner) {
    esp_println::logger::init_logger_from_env();
    let peripherals = esp_hal::init(esp_hal::Config::default());

    esp_println::println!("=== wisp ===");

    // Wi-Fi needs heap
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize RTOS timer for embassy
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Spawn the background heartbeat task
    if let Err(e) = spawner.spawn(run_heartbeat()) {
        esp_println::println!("[ERROR] Failed to spawn task: {:?}", e);
    }

    // NeoPixel on GPIO48, off until the first command arrives
    let mut led = match hardware::new_neopixel(peripherals.RMT, peripherals.GPIO48) {
        Ok(led) => led,
        Err(e) => {
            esp_println::println!("[ERROR] NeoPixel init failed: {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };
    if let Err(e) = led.set_pixel(0, Rgb::OFF).and_then(|()| led.commit()) {
        esp_println::println!("[ERROR] NeoPixel write failed: {}", e);
    }

    // DHT11 on GPIO4
    let mut sensor = hardware::Dht11Hardware::new(peripherals.GPIO4);

    // SSD1306 on I2C0 (SDA=GPIO8, SCL=GPIO9)
    let oled_hw = Ssd1306Hardware::new(peripherals.I2C0, peripherals.GPIO8, peripherals.GPIO9);
    let mut display = match init_ssd1306(oled_hw) {
        Ok(display) => display,
        Err(e) => {
            esp_println::println!("[ERROR] OLED init failed: {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    // Bring up Wi-Fi: station + access point
    let (sta_stack, ap_stack) = match net::init(&spawner, peripherals.WIFI) {
        Ok(stacks) => stacks,
        Err(e) => {
            esp_println::println!("[ERROR] Wi-Fi init failed: {}", e);
            loop {
                Timer::after(Duration::from_secs(1)).await;
            }
        }
    };

    // A failed join is logged; the AP keeps the board reachable
    net::wait_for_station(sta_stack).await;

    server::serve_forever(sta_stack, ap_stack, &mut led, &mut sensor, &mut display).await
}
