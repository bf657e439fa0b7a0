pub mod check_error;
pub mod checker;

pub use check_error::{CheckError, CheckErrors};
pub use checker::{Checker, check};
