//! CLI commands implementation

pub mod browse;
pub mod check;
pub mod init;
pub mod status;
pub mod sync;

pub use browse::*;
pub use check::*;
pub use init::*;
pub use status::*;
pub use sync::*;
