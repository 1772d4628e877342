mod fake;

pub use fake::*;
