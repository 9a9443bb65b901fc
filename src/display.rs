use embedded_graphics::{
    mono_font::{MonoTextStyle, MonoTextStyleBuilder, ascii::FONT_6X10},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text, TextStyleBuilder},
};
use esp_hal::i2c::master::I2c;
use ssd1306::{I2CDisplayInterface, Ssd1306, mode::BufferedGraphicsMode, prelude::*};

use crate::hardware::Ssd1306Hardware;
use crate::traits::TextDisplay;

type Driver<'a> = Ssd1306<
    I2CInterface<I2c<'a, esp_hal::Blocking>>,
    DisplaySize128x64,
    BufferedGraphicsMode<DisplaySize128x64>,
>;

/// SSD1306 128x64 OLED in buffered graphics mode.
pub struct Ssd1306Display<'a> {
    driver: Driver<'a>,
    text_style: MonoTextStyle<'static, BinaryColor>,
}

/// Initialize the OLED and return it ready for text drawing
pub fn init_ssd1306(hw: Ssd1306Hardware<'_>) -> Result<Ssd1306Display<'_>, &'static str> {
    esp_println::println!("[OLED] Initializing SSD1306 128x64 at 0x3C");

    let interface = I2CDisplayInterface::new(hw.i2c);
    let mut driver = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();

    driver.init().map_err(|_| "Failed to initialize SSD1306")?;

    let text_style = MonoTextStyleBuilder::new()
        .font(&FONT_6X10)
        .text_color(BinaryColor::On)
        .build();

    let mut display = Ssd1306Display { driver, text_style };

    display.clear()?;
    display.update()?;

    esp_println::println!("[OLED] Display ready");
    Ok(display)
}

impl TextDisplay for Ssd1306Display<'_> {
    fn clear(&mut self) -> Result<(), &'static str> {
        self.driver
            .clear(BinaryColor::Off)
            .map_err(|_| "Failed to clear display")
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) -> Result<(), &'static str> {
        let baseline_style = TextStyleBuilder::new().baseline(Baseline::Top).build();

        // Text is rendered verbatim; anything wider than 128 px runs off
        // the panel
        Text::with_text_style(text, Point::new(x, y), self.text_style, baseline_style)
            .draw(&mut self.driver)
            .map_err(|_| "Failed to draw text")?;

        Ok(())
    }

    fn update(&mut self) -> Result<(), &'static str> {
        self.driver.flush().map_err(|_| "Failed to update display")
    }
}
