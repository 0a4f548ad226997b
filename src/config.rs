use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::canvas::Bounds;
use crate::error::{ReportError, Result};

pub const DEFAULT_FILENAME: &str = "report.svg";
pub const DEBUG_ENV: &str = "DEBUG";

/// Page geometry and sizing constants for one report page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub page_width: f64,
    pub page_height: f64,
    pub page_margin_factor: f64,
    pub line_space_factor: f64,
    pub header_font_size: f64,
    pub top_list_font_size: f64,
    pub packet_histogram_height: f64,
    pub address_histogram_height: f64,
    pub port_histogram_height: f64,
    pub histogram_pad_factor_y: f64,
    pub pair_width_divisor: f64,
    pub top_n_text: usize,
    pub top_n_bars: usize,
    pub time_bins: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            page_width: 611.0,
            page_height: 792.0,
            page_margin_factor: 0.05,
            line_space_factor: 0.25,
            header_font_size: 8.0,
            top_list_font_size: 8.0,
            packet_histogram_height: 100.0,
            address_histogram_height: 125.0,
            port_histogram_height: 100.0,
            histogram_pad_factor_y: 1.0,
            pair_width_divisor: 2.5,
            top_n_text: 3,
            top_n_bars: 10,
            time_bins: 60,
        }
    }
}

impl LayoutConfig {
    pub fn page(&self) -> Bounds {
        Bounds::new(0.0, 0.0, self.page_width, self.page_height)
    }

    /// Page inset by `width * margin` on all four sides.
    pub fn content_bounds(&self) -> Bounds {
        let page = self.page();
        page.inset(page.width * self.page_margin_factor)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;
        let config: LayoutConfig =
            serde_json::from_str(&raw).map_err(|e| ReportError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_width <= 0.0 || self.page_height <= 0.0 {
            return Err(ReportError::Config("page dimensions must be positive".into()));
        }
        if !(0.0..0.5).contains(&self.page_margin_factor) {
            return Err(ReportError::Config("page margin factor must be in [0, 0.5)".into()));
        }
        if self.histogram_pad_factor_y < 1.0 {
            return Err(ReportError::Config("histogram pad factor must be at least 1.0".into()));
        }
        if self.pair_width_divisor < 2.0 {
            return Err(ReportError::Config("pair width divisor below 2.0 makes paired charts overlap".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub source_identifier: String,
    pub filename: String,
    pub debug_charts: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            source_identifier: String::new(),
            filename: DEFAULT_FILENAME.to_string(),
            debug_charts: false,
        }
    }
}

impl ReportConfig {
    pub fn new(source_identifier: impl Into<String>) -> Self {
        ReportConfig {
            source_identifier: source_identifier.into(),
            ..Default::default()
        }
    }

    /// Turns on the diagnostic charts when `DEBUG` is set to anything.
    pub fn with_env(mut self) -> Self {
        if env::var_os(DEBUG_ENV).is_some() {
            self.debug_charts = true;
        }
        self
    }
}

/// `from=to` port alias as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortAlias {
    pub from: u16,
    pub to: u16,
}

impl FromStr for PortAlias {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = s
            .split_once('=')
            .ok_or_else(|| ReportError::Config(format!("port alias '{}' is not of the form from=to", s)))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<u16>()
                .map_err(|e| ReportError::Config(format!("bad port '{}' in alias '{}': {}", v, s, e)))
        };
        Ok(PortAlias {
            from: parse(from)?,
            to: parse(to)?,
        })
    }
}
