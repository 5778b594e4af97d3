pub mod collaborator;
pub mod tool;

pub use collaborator::*;
pub use tool::*;
