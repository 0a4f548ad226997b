//! One-page traffic report.
//!
//! Packet records from a capture are folded into running aggregates and
//! ranked stores, which a single top-to-bottom layout pass then renders as
//! a fixed-size page: a text header, a time histogram and paired
//! address/port rankings with their top entries spelled out.

pub mod canvas;
pub mod capture;
pub mod charts;
pub mod config;
pub mod error;
pub mod format;
pub mod layout;
pub mod models;
pub mod palette;
pub mod report;
pub mod stats;
pub mod store;

pub use error::{ReportError, Result};
pub use models::domain::{PacketRecord, Timestamp};
pub use report::OnePageReport;
