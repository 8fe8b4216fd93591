mod detail;
mod format;
mod layout;
mod types;

pub use detail::*;
pub use format::*;
pub use layout::*;
pub use types::*;
