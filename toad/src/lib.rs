//! `toad`: kanban client adapter for an on-chain board contract.

pub mod assistant;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod mapper;
pub mod overlay;
pub mod store;
pub mod sync;
pub mod views;
