pub mod pricing;
pub mod session;
pub mod task;
