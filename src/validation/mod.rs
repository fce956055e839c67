//! Pre-deployment checks for generated tools.

pub mod runner;
pub mod syntax;
pub mod validator;

pub use runner::{ProcessTestRunner, TestRunner};
pub use validator::{ToolValidator, ValidationReport, ValidationResult};
