//! CLI command implementations.
//!
//! | Module    | Responsibility                                       |
//! |-----------|------------------------------------------------------|
//! | `archive` | Enumerate, clone, report; owns the Ctrl-C handler    |

pub mod archive;

pub use archive::cmd_archive;
