//! Constants for the Vantage integration

/// Integration domain
pub const DOMAIN: &str = "vantage";

/// Manufacturer reported for built-in Vantage objects
pub const MANUFACTURER: &str = "Vantage";

/// Fired when a keypad button goes down
pub const EVENT_BUTTON_PRESSED: &str = "vantage_button_pressed";

/// Fired when a keypad button comes back up
pub const EVENT_BUTTON_RELEASED: &str = "vantage_button_released";

pub const CONF_HOST: &str = "host";
pub const CONF_USERNAME: &str = "username";
pub const CONF_PASSWORD: &str = "password";
pub const CONF_SSL: &str = "ssl";

/// Vantage levels run 1..=100; brightness runs 1..=255
pub const LEVEL_RANGE: (f64, f64) = (1.0, 100.0);

/// Entity platforms the integration provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    BinarySensor,
    Light,
    Number,
    Switch,
}

impl Platform {
    /// Entity domain of the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::BinarySensor => "binary_sensor",
            Platform::Light => "light",
            Platform::Number => "number",
            Platform::Switch => "switch",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const PLATFORMS: [Platform; 4] = [
    Platform::BinarySensor,
    Platform::Light,
    Platform::Number,
    Platform::Switch,
];
