#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chain;
pub mod config;
pub mod data_service;
pub mod driver;
#[cfg(feature = "std")]
pub mod dump;
pub mod error;
pub mod flux;
pub mod generation;
pub mod kza;
pub mod math;
pub mod matrix;
pub mod mixture;
pub mod pulse_history;
#[cfg(feature = "std")]
pub mod rate_cache;
pub mod rates;
pub mod result;
pub mod schedule;

pub use config::{Config, Mode};
pub use data_service::DataService;
pub use driver::RootDriver;
pub use error::Error;
pub use flux::FluxSource;
pub use kza::{FissionType, FluxId, Kza, PathId};
pub use matrix::Matrix;
pub use mixture::{ComponentRef, MixtureSource};
pub use result::ResultList;
pub use schedule::{CalcSchedule, NodeId, TopSchedule, TopScheduleResult};
