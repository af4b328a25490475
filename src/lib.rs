//! Purpose: Mesh query library backed by an embedded Lua mesh library.
//! Exports: `api` (typed session surface), `abi` (C ABI), `core`, `logging`.
//! Role: Library behind the `meshlib` CLI and the C/Fortran-facing shared library.
//! Invariants: All interpreter access goes through `core::bridge::Session`.
//! Invariants: Core modules prefer explicit session handles over hidden state.
pub mod abi;
pub mod api;
pub mod core;
mod lib_paths;
pub mod logging;
