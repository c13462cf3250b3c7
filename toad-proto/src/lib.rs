//! Shared definitions for the TOAD board contract: raw chain records,
//! the view model, contract call descriptors and the assistant snapshot.

pub mod call;
pub mod contract;
pub mod model;
pub mod object;
pub mod snapshot;
