//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `serve`    | `Serve`          |
//! | `relocate` | `Relocate`       |
//! | `check`    | `Check`          |

pub mod check;
pub mod relocate;
pub mod serve;

pub use check::cmd_check;
pub use relocate::cmd_relocate;
pub use serve::cmd_serve;
