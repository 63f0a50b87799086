//! Data models shared by the protocol client and the automation loop.

pub mod parameters;

pub use parameters::MarkParameters;
