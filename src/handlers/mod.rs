pub mod health;
pub mod compile;
pub mod diagnostics;

pub use health::*;
pub use compile::*;
pub use diagnostics::*;
