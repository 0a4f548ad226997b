use std::collections::BTreeMap;

use crate::canvas::Rgb;

pub const PORT_HTTP: u16 = 80;
pub const PORT_HTTPS: u16 = 443;

pub const HTTP_COLOR: Rgb = Rgb::new(0.07, 0.44, 0.87);
pub const HTTPS_COLOR: Rgb = Rgb::new(0.25, 0.79, 0.40);
pub const DEFAULT_COLOR: Rgb = Rgb::new(0.67, 0.67, 0.67);

/// Port display policy, built once at start-up and handed to the report.
///
/// Both lookups are total over the 16-bit port space: unmapped ports get
/// the default color and alias to themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct PortPalette {
    colors: BTreeMap<u16, Rgb>,
    aliases: BTreeMap<u16, u16>,
    default_color: Rgb,
}

impl PortPalette {
    pub fn new(default_color: Rgb) -> Self {
        PortPalette {
            colors: BTreeMap::new(),
            aliases: BTreeMap::new(),
            default_color,
        }
    }

    pub fn with_color(mut self, port: u16, color: Rgb) -> Self {
        self.colors.insert(port, color);
        self
    }

    pub fn with_alias(mut self, port: u16, alias: u16) -> Self {
        if port == alias {
            self.aliases.remove(&port);
        } else {
            self.aliases.insert(port, alias);
        }
        self
    }

    pub fn color(&self, port: u16) -> Rgb {
        self.colors.get(&port).copied().unwrap_or(self.default_color)
    }

    pub fn default_color(&self) -> Rgb {
        self.default_color
    }

    pub fn alias(&self, port: u16) -> u16 {
        self.aliases.get(&port).copied().unwrap_or(port)
    }

    /// Ports with a dedicated color, in ascending order.
    pub fn colored_ports(&self) -> impl Iterator<Item = (u16, Rgb)> + '_ {
        self.colors.iter().map(|(port, color)| (*port, *color))
    }
}

impl Default for PortPalette {
    fn default() -> Self {
        PortPalette::new(DEFAULT_COLOR)
            .with_color(PORT_HTTP, HTTP_COLOR)
            .with_color(PORT_HTTPS, HTTPS_COLOR)
    }
}
