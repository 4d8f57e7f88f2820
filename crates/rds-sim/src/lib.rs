//! RDS Tuner Simulation Library
//!
//! This crate provides a simulation layer for running and testing the RDS
//! tuner server without radio hardware. It includes:
//!
//! - **VirtualTuner**: a shared in-memory tuner implementing `TunerControl`
//! - **GroupEncoder**: produces protocol-accurate raw blocks for type 0A
//!   groups (PI code and programme service name)
//! - **SimulatedSource**: a `TunerSource` that feeds each session a live
//!   block stream for whatever station the virtual tuner is on
//!
//! # Example
//!
//! ```rust
//! use rds_sim::{VirtualTuner, VirtualTunerConfig};
//! use rds_tuner::{Direction, TunerControl};
//!
//! let tuner = VirtualTuner::from_config(VirtualTunerConfig::default());
//! tuner.seek(Direction::Up).unwrap();
//!
//! let station = tuner.current_station().unwrap();
//! println!("Tuned to {} ({})", station.ps, station.frequency);
//! ```

pub mod encoder;
pub mod source;
pub mod tuner;

pub use encoder::{blocks_to_bytes, GroupEncoder};
pub use source::{SimulatedSource, DEFAULT_GROUP_INTERVAL};
pub use tuner::{VirtualStation, VirtualTuner, VirtualTunerConfig};
