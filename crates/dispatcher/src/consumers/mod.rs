//! Consumer implementations
//!
//! `LogConsumer` and `MockConsumer` run inline; the file, Amplitude, Matomo
//! and Postgres transports run behind a `QueuedConsumer`.

mod amplitude;
mod file;
mod log;
mod matomo;
mod mock;
mod params;
mod postgres;
mod queued;

pub use self::amplitude::{AmplitudeConfig, AmplitudeEvent, AmplitudeTransport};
pub use self::file::{FileTransport, FileTransportConfig};
pub use self::log::LogConsumer;
pub use self::matomo::{prepare_dimensions, MatomoConfig, MatomoTransport};
pub use self::mock::{MockCall, MockConsumer};
pub use self::postgres::{PostgresConfig, PostgresTransport};
pub use self::queued::QueuedConsumer;
