//! # ida-htf: Incremental Dynamic Analysis Engine
//!
//! Runs nonlinear time-history analyses of a structure at increasing
//! ground-motion intensities until collapse is bracketed, then condenses
//! many records into quantile response-vs-intensity curves.
//!
//! ## Components
//!
//! - [`intensity`]: PGA, spectral acceleration and period-averaged spectral
//!   acceleration of a raw acceleration series
//! - [`schedule`]: the Hunt-Trace-Fill state machine choosing each record's
//!   next intensity
//! - [`curve`]: monotone per-record interpolants and cross-record quantiles
//! - [`ida`]: record-parallel driver tying the three together
//!
//! The structural model is external and plugs in through
//! [`oracle::StructuralOracle`].
//!
//! ## Example
//!
//! ```rust
//! use ida_htf::config::IdaConfig;
//! use ida_htf::ida::IdaRunner;
//! use ida_htf::oracle::{OracleOutcome, OracleRequest};
//! use ida_htf::record::GroundMotion;
//! use ida_htf::run::{DirectionalResponse, ResponseBundle};
//!
//! // Toy oracle: drift grows linearly with intensity, collapse at 10%.
//! let oracle = |request: &OracleRequest<'_>| -> ida_htf::Result<OracleOutcome> {
//!     let drift = 0.2 * request.intensity;
//!     let bundle = ResponseBundle::single(DirectionalResponse {
//!         story_drifts: vec![drift],
//!         ..DirectionalResponse::default()
//!     });
//!     Ok(if drift >= request.settings.collapse_drift_ratio {
//!         OracleOutcome::Collapsed(bundle)
//!     } else {
//!         OracleOutcome::Survived(bundle)
//!     })
//! };
//!
//! let records = vec![
//!     GroundMotion::single(1, vec![0.0, 0.3, -0.2, 0.1], 0.01)?,
//!     GroundMotion::single(2, vec![0.0, -0.4, 0.25, 0.0], 0.01)?,
//! ];
//! let report = IdaRunner::new(IdaConfig::default())?.run(&records, &oracle);
//! assert_eq!(report.schedules.len(), 2);
//! assert!(report.failures.is_empty());
//! # Ok::<(), ida_htf::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod curve;
pub mod error;
pub mod ida;
pub mod intensity;
pub mod oracle;
pub mod record;
pub mod run;
pub mod schedule;
pub mod storage;

pub use error::{Error, Result};
