//! Status LED driver: maps the plant condition to a colour.
//!
//! Two schemes, selected by hardware revision:
//!
//! - **Discrete** (resistive boards): one preset per condition.
//! - **Gradient** (capacitive boards): outside the error and temperature
//!   states, the soil-moisture average maps to a humidity percentage which
//!   runs through a five-stop warm-to-cool ramp (dry orange → wet blue).
//!
//! Brightness scaling and the preset table match the WS2812 behaviour of
//! the deployed boards.

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::plant::PlantCondition;

/// Capacitance mapped to 0 % humidity (bone dry).
pub const CAPACITANCE_DRY_PF: f32 = 0.1;

/// Capacitance mapped to 100 % humidity (saturated).
pub const CAPACITANCE_WET_PF: f32 = 16.0;

/// Default LED brightness percent.
const DEFAULT_BRIGHTNESS: u8 = 2;

/// Driven port to the RGB LED hardware.
pub trait RgbLed {
    fn set_rgb(&mut self, r: u8, g: u8, b: u8);
}

/// Host LED recording every colour for assertions.
#[derive(Default)]
pub struct SimLed {
    pub current: (u8, u8, u8),
    pub history: Vec<(u8, u8, u8)>,
}

impl SimLed {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RgbLed for SimLed {
    fn set_rgb(&mut self, r: u8, g: u8, b: u8) {
        self.current = (r, g, b);
        self.history.push((r, g, b));
    }
}

// ---------------------------------------------------------------------------
// Presets and ramp
// ---------------------------------------------------------------------------

/// Discrete colour presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourPreset {
    Off,
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Purple,
    White,
}

impl ColourPreset {
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Off => (0, 0, 0),
            Self::Red => (255, 0, 0),
            Self::Green => (0, 255, 0),
            Self::Blue => (0, 0, 255),
            Self::Yellow => (255, 255, 0),
            Self::Orange => (255, 100, 0),
            Self::Purple => (128, 0, 128),
            Self::White => (255, 255, 255),
        }
    }
}

/// Colour for a humidity percentage on the warm-to-cool ramp:
/// orange (0 %) → yellow (25 %) → green (50 %) → cyan (75 %) → blue (100 %).
pub fn gradient_rgb(humidity_percent: u8) -> (u8, u8, u8) {
    let pct = humidity_percent.min(100);

    if pct <= 25 {
        let t = pct as f32 / 25.0;
        (255, (80.0 + (200.0 - 80.0) * t) as u8, 0)
    } else if pct <= 50 {
        let t = (pct - 25) as f32 / 25.0;
        ((255.0 * (1.0 - t)) as u8, (200.0 + 55.0 * t) as u8, 0)
    } else if pct <= 75 {
        let t = (pct - 50) as f32 / 25.0;
        (0, (255.0 - 55.0 * t) as u8, (255.0 * t) as u8)
    } else {
        let t = (pct - 75) as f32 / 25.0;
        (0, (200.0 * (1.0 - t) + 50.0 * t) as u8, 255)
    }
}

// ---------------------------------------------------------------------------
// Indicator
// ---------------------------------------------------------------------------

/// Colour mapping scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColourScheme {
    Discrete,
    /// Linear moisture→humidity mapping between the two references.
    Gradient {
        dry_reference: f32,
        wet_reference: f32,
    },
}

impl ColourScheme {
    /// The gradient scheme with the capacitive sensor's references.
    pub const fn capacitive_gradient() -> Self {
        Self::Gradient {
            dry_reference: CAPACITANCE_DRY_PF,
            wet_reference: CAPACITANCE_WET_PF,
        }
    }
}

/// Owns the LED and the active scheme.
pub struct Indicator<L: RgbLed> {
    led: L,
    scheme: ColourScheme,
    brightness_percent: u8,
}

impl<L: RgbLed> Indicator<L> {
    pub fn new(led: L, scheme: ColourScheme) -> Self {
        Self {
            led,
            scheme,
            brightness_percent: DEFAULT_BRIGHTNESS,
        }
    }

    /// Set LED brightness (1-100 %).
    pub fn set_brightness(&mut self, percent: u8) -> Result<()> {
        if !(1..=100).contains(&percent) {
            return Err(Error::InvalidArgument("brightness must be 1-100"));
        }
        self.brightness_percent = percent;
        Ok(())
    }

    /// Display the classification. `soil_moisture` feeds the gradient and is
    /// ignored by the discrete scheme.
    pub fn show(&mut self, condition: PlantCondition, soil_moisture: f32) {
        // Temperature limits and errors always use discrete colours.
        let rgb = match (condition, self.scheme) {
            (PlantCondition::TempTooHigh, _) => {
                warn!("temperature above limit");
                ColourPreset::Red.rgb()
            }
            (PlantCondition::TempTooLow, _) => {
                warn!("temperature below limit");
                ColourPreset::Blue.rgb()
            }
            (PlantCondition::Error, _) => {
                warn!("error condition");
                ColourPreset::Purple.rgb()
            }
            (
                _,
                ColourScheme::Gradient {
                    dry_reference,
                    wet_reference,
                },
            ) => {
                let pct = moisture_to_humidity_percent(soil_moisture, dry_reference, wet_reference);
                debug!("moisture {soil_moisture:.2} -> humidity {pct}%");
                gradient_rgb(pct)
            }
            (PlantCondition::NeedsWatering, ColourScheme::Discrete) => {
                info!("watering advisory");
                ColourPreset::Yellow.rgb()
            }
            (PlantCondition::SoilDry, ColourScheme::Discrete) => ColourPreset::Orange.rgb(),
            (PlantCondition::SoilWet, ColourScheme::Discrete) => ColourPreset::Green.rgb(),
            (PlantCondition::WateringCompleted, ColourScheme::Discrete) => ColourPreset::White.rgb(),
        };
        self.apply(rgb);
    }

    /// Boot-time LED check: cycle every preset once.
    pub fn startup_cycle(&mut self, delay: &mut dyn crate::sensors::Delay, hold_ms: u32) {
        for preset in [
            ColourPreset::Red,
            ColourPreset::Green,
            ColourPreset::Blue,
            ColourPreset::Yellow,
            ColourPreset::Orange,
            ColourPreset::Purple,
            ColourPreset::White,
        ] {
            self.apply(preset.rgb());
            delay.delay_ms(hold_ms);
        }
        self.off();
    }

    pub fn off(&mut self) {
        self.apply((0, 0, 0));
    }

    fn apply(&mut self, (r, g, b): (u8, u8, u8)) {
        let scale = |v: u8| ((v as u16 * self.brightness_percent as u16) / 100) as u8;
        self.led.set_rgb(scale(r), scale(g), scale(b));
    }

    pub fn led(&self) -> &L {
        &self.led
    }
}

/// Map a raw moisture value linearly onto 0-100 % humidity between the dry
/// and wet references, clamped at both ends.
pub fn moisture_to_humidity_percent(value: f32, dry_reference: f32, wet_reference: f32) -> u8 {
    if (wet_reference - dry_reference).abs() < f32::EPSILON {
        return 0;
    }
    let t = (value - dry_reference) / (wet_reference - dry_reference);
    (t.clamp(0.0, 1.0) * 100.0) as u8
}
