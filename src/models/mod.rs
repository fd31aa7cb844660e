pub mod audit;
pub mod enums;
pub mod extraction;
pub mod identity;
pub mod source;

pub use audit::*;
pub use enums::*;
pub use extraction::*;
pub use identity::*;
pub use source::*;
