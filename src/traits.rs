//! Hardware abstraction traits

use crate::model::Rgb;

/// Trait for addressable RGB LEDs (stage then flush, like NeoPixel strips)
pub trait RgbLed {
    /// Stage a color for one pixel without writing it out
    fn set_pixel(&mut self, index: usize, color: Rgb) -> Result<(), &'static str>;

    /// Write all staged colors to the strip
    fn commit(&mut self) -> Result<(), &'static str>;
}

/// Trait for combined humidity/temperature sensors
pub trait HumiditySensor {
    /// Read (temperature in Celsius, relative humidity in percent)
    fn read(&mut self) -> Result<(f32, f32), &'static str>;
}

/// Trait for text display devices
pub trait TextDisplay {
    /// Clear the display buffer
    fn clear(&mut self) -> Result<(), &'static str>;

    /// Draw text at specified position
    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), &'static str>;

    /// Update/flush the display (show the buffer)
    fn update(&mut self) -> Result<(), &'static str>;
}
