//! Helium network telemetry exporter.
//!
//! Periodically collects network statistics, account balances, a
//! reference price and the recent activity of a set of monitored
//! hotspots, and writes the result as tagged points to InfluxDB.

pub mod collector;
pub mod config;
pub mod helium;
pub mod job;
pub mod point;
pub mod price;
pub mod sink;
