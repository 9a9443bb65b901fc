use esp_hal::gpio::AnyPin;
use esp_hal::rmt::{PulseCode, Rmt, TxChannel, TxChannelConfig, TxChannelCreator};
use esp_hal::{
    delay::Delay,
    gpio::{Flex, Level, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    peripherals::{I2C0, RMT},
    time::{Instant, Rate},
};

use crate::config::SENSOR_MIN_INTERVAL_MS;
use crate::model::Rgb;
use crate::traits::{HumiditySensor, RgbLed};

/// DHT11 single-wire humidity/temperature sensor.
///
/// The protocol is bit-banged: host pulls the line low for >= 18 ms, releases
/// it, then the sensor answers with an 80 us low / 80 us high preamble
/// followed by 40 data bits. Each bit starts with ~50 us low; the length of
/// the following high phase encodes the value (~27 us = 0, ~70 us = 1).
pub struct Dht11Hardware<'a> {
    pin: Flex<'a>,
    delay: Delay,
    last_reading: Option<(Instant, (f32, f32))>,
}

impl<'a> Dht11Hardware<'a> {
    pub fn new<P>(data_gpio: P) -> Self
    where
        P: Into<AnyPin<'a>>,
    {
        let mut pin = Flex::new(data_gpio.into());

        // Idle state is high (external or internal pull-up)
        pin.set_as_input(Pull::Up);

        Self {
            pin,
            delay: Delay::new(),
            last_reading: None,
        }
    }

    /// Busy-wait until the line reaches `level`, returning the elapsed
    /// microseconds. The DHT11 never stretches a phase past ~100 us, so a
    /// small timeout is enough to detect a missing or wedged sensor.
    fn wait_for_level(&mut self, level: Level, timeout_us: u64) -> Result<u64, &'static str> {
        let start = Instant::now();
        loop {
            let matched = match level {
                Level::High => self.pin.is_high(),
                Level::Low => !self.pin.is_high(),
            };
            let elapsed = start.elapsed().as_micros();
            if matched {
                return Ok(elapsed);
            }
            if elapsed > timeout_us {
                return Err("DHT11 timing out waiting for sensor");
            }
        }
    }

    fn sample(&mut self) -> Result<(f32, f32), &'static str> {
        // Start signal: hold the line low for at least 18 ms, then release
        self.pin.set_as_output();
        self.pin.set_low();
        self.delay.delay_millis(20);
        self.pin.set_high();
        self.delay.delay_micros(30);
        self.pin.set_as_input(Pull::Up);

        // Response preamble: ~80 us low, ~80 us high
        self.wait_for_level(Level::Low, 100)?;
        self.wait_for_level(Level::High, 120)?;
        self.wait_for_level(Level::Low, 120)?;

        // 40 data bits. The read is timing sensitive, so keep interrupts out
        // of the measurement window.
        let mut data = [0u8; 5];
        critical_section::with(|_| -> Result<(), &'static str> {
            for bit in 0..40 {
                self.wait_for_level(Level::High, 80)?;
                let high_us = self.wait_for_level(Level::Low, 120)?;
                if high_us > 45 {
                    data[bit / 8] |= 1 << (7 - (bit % 8));
                }
            }
            Ok(())
        })?;

        let checksum = data[0]
            .wrapping_add(data[1])
            .wrapping_add(data[2])
            .wrapping_add(data[3]);
        if checksum != data[4] {
            return Err("DHT11 checksum mismatch");
        }

        // DHT11 reports integral humidity/temperature with a decimal byte
        // that is zero on most units
        let humidity = data[0] as f32 + data[1] as f32 / 10.0;
        let temperature = data[2] as f32 + data[3] as f32 / 10.0;

        Ok((temperature, humidity))
    }
}

impl HumiditySensor for Dht11Hardware<'_> {
    fn read(&mut self) -> Result<(f32, f32), &'static str> {
        // The DHT11 needs >= 1 s between samples; serve from the last good
        // reading when polled faster than that.
        if let Some((at, reading)) = self.last_reading {
            if at.elapsed().as_millis() < SENSOR_MIN_INTERVAL_MS {
                return Ok(reading);
            }
        }

        let reading = self.sample()?;
        self.last_reading = Some((Instant::now(), reading));
        Ok(reading)
    }
}

const RMT_CLOCK_MHZ: u32 = 80;

// WS2812 bit timings in 12.5 ns ticks at an 80 MHz RMT clock:
// a zero is 0.40 us high / 0.85 us low, a one is 0.80 us high / 0.45 us low.
const T0H_TICKS: u16 = 32;
const T0L_TICKS: u16 = 68;
const T1H_TICKS: u16 = 64;
const T1L_TICKS: u16 = 36;

pub const NEOPIXEL_COUNT: usize = 1;

// 24 bits per pixel plus the end marker that latches the strip
const PULSE_BUFFER_LEN: usize = NEOPIXEL_COUNT * 24 + 1;

/// WS2812 (NeoPixel) driver over an RMT transmit channel.
///
/// Colors are staged into a pixel buffer by `set_pixel` and only shifted out
/// on `commit`, matching the strip's stage-then-latch wire behaviour.
pub struct NeoPixelHardware<Tx: TxChannel> {
    channel: Option<Tx>,
    pixels: [Rgb; NEOPIXEL_COUNT],
}

pub fn new_neopixel<'a, P>(
    rmt_periph: RMT<'a>,
    data_gpio: P,
) -> Result<NeoPixelHardware<impl TxChannel + 'a>, &'static str>
where
    P: Into<AnyPin<'a>>,
{
    let rmt = Rmt::new(rmt_periph, Rate::from_mhz(RMT_CLOCK_MHZ))
        .map_err(|_| "Failed to initialize RMT")?;

    let channel = rmt
        .channel0
        .configure_tx(
            data_gpio.into(),
            TxChannelConfig::default().with_clk_divider(1),
        )
        .map_err(|_| "Failed to configure RMT channel")?;

    Ok(NeoPixelHardware {
        channel: Some(channel),
        pixels: [Rgb::OFF; NEOPIXEL_COUNT],
    })
}

impl<Tx: TxChannel> NeoPixelHardware<Tx> {
    fn encode(&self) -> [u32; PULSE_BUFFER_LEN] {
        let mut pulses = [PulseCode::empty(); PULSE_BUFFER_LEN];
        let mut idx = 0;

        for pixel in self.pixels.iter() {
            // WS2812 wants GRB, most significant bit first
            let grb = ((pixel.g as u32) << 16) | ((pixel.r as u32) << 8) | pixel.b as u32;
            for bit in (0..24).rev() {
                pulses[idx] = if (grb >> bit) & 1 == 1 {
                    PulseCode::new(Level::High, T1H_TICKS, Level::Low, T1L_TICKS)
                } else {
                    PulseCode::new(Level::High, T0H_TICKS, Level::Low, T0L_TICKS)
                };
                idx += 1;
            }
        }

        // Trailing empty code terminates the transmission; the strip latches
        // after the line stays low
        pulses
    }

    fn transmit(&mut self, pulses: &[u32; PULSE_BUFFER_LEN]) -> Result<(), &'static str> {
        let channel = self
            .channel
            .take()
            .ok_or("RMT channel lost after failed transmit")?;

        let transaction = match channel.transmit(pulses) {
            Ok(t) => t,
            Err(_) => return Err("RMT transmit failed to start"),
        };

        match transaction.wait() {
            Ok(channel) => {
                self.channel = Some(channel);
                Ok(())
            }
            Err((_, channel)) => {
                self.channel = Some(channel);
                Err("RMT transmit failed")
            }
        }
    }
}

impl<Tx: TxChannel> RgbLed for NeoPixelHardware<Tx> {
    fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<(), &'static str> {
        let slot = self
            .pixels
            .get_mut(index)
            .ok_or("pixel index out of range")?;
        *slot = color;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), &'static str> {
        let pulses = self.encode();
        self.transmit(&pulses)
    }
}

pub struct Ssd1306Hardware<'a> {
    pub i2c: I2c<'a, esp_hal::Blocking>,
    pub delay: Delay,
}

impl<'a> Ssd1306Hardware<'a> {
    pub fn new<SDA, SCL>(i2c_periph: I2C0<'a>, sda: SDA, scl: SCL) -> Self
    where
        SDA: Into<AnyPin<'a>>,
        SCL: Into<AnyPin<'a>>,
    {
        let i2c = I2c::new(
            i2c_periph,
            I2cConfig::default().with_frequency(Rate::from_khz(400)),
        )
        .unwrap()
        .with_sda(sda.into())
        .with_scl(scl.into());

        let delay = Delay::new();

        Self { i2c, delay }
    }
}
