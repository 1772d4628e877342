mod apiset;
mod gvk;
mod util;

pub use apiset::*;
pub use gvk::*;
pub use util::*;
