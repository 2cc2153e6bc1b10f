//! charge_priority — picks the vehicle that most urgently needs charging.
//!
//! A client submits a batch of vehicle telemetry; the batch is normalized
//! ([`collector`]), scored by an external oracle ([`oracle`]) and reduced
//! to one winning vehicle id ([`dispatcher`]).
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/predict` | Submit a batch, get the winning vehicle id |
//! | GET | `/health` | Liveness probe |

pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod oracle;
pub mod routes;
pub mod types;

pub use config::DispatchConfig;
pub use dispatcher::{Dispatcher, RetryPolicy};
pub use error::{DispatchError, DispatchResult, ErrorKind};
pub use oracle::{HttpOracle, ScoringOracle};
pub use routes::router;
pub use types::{Batch, OracleFeatures, PredictResponse, PriorityVerdict, RawVehicleRecord, VehicleId, VehicleTelemetry};
