pub mod driver;
pub mod freeze;
pub mod job;
pub mod preflight;
pub mod session;
pub mod snapshot;
pub mod transaction;
