//! Safe SQL builder: identifiers are checked and quoted, values travel as parameters.

mod builder;
pub use builder::*;
