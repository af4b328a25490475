// Core modules: session lifecycle, call marshaling, typed queries, and error modeling.
pub mod bridge;
pub mod error;
pub mod func;
pub mod marshal;
pub mod query;
