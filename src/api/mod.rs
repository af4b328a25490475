//! Purpose: Define the stable public Rust API boundary for meshlib.
//! Exports: Session, typed query results, argument tags, and errors.
//! Role: Public, additive-only surface used by the CLI and Rust callers.
//! Invariants: This module is the only public path to session primitives.
//! Invariants: Method names and result shapes follow the script-side `mesh` contract.

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::bridge::{Phase, Session};
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::func::{ArgSource, FuncOutcome, TextArgs, collect_args, format_tags};
pub use crate::core::marshal::{Arg, ArgTag, Decode, Method, Request, Response};
pub use crate::core::query::{
    DomainKind, MESH_NOPART, MeshSetup, NodeCoords, Phys, Tet10, TwinPair,
};
pub use crate::lib_paths::{
    BOOTSTRAP_DIR, BOOTSTRAP_FILE, LIBRARY_PATH_ENV, bootstrap_script_path, default_library_path,
};
