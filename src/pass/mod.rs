pub mod graph_pass;
pub mod validate;

pub use graph_pass::{GraphPass, GraphPassManager};
pub use validate::ValidatePass;
