pub mod runtime_error;
pub mod svm;

pub use runtime_error::RuntimeError;
pub use svm::{Status, Svm, VmConfig};
