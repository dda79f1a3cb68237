//! Sales Intel: contact resolution and funnel classification engine.

pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod pipeline;
pub mod resolve;
pub mod score;
pub mod signals;
pub mod sources;
