//! Builds exposure → click → sales flow diagrams from per-channel traffic
//! tables of several storefronts.

pub mod aggregate;
pub mod diagram;
pub mod error;
pub mod highlight;
pub mod ingest;
pub mod layout;
pub mod models;
pub mod normalize;
pub mod registry;
pub mod report;
pub mod style;
