mod codes;
pub mod in_app;
pub mod mechanism;
pub mod module_lookup;
pub mod native;
mod symbolicate;

pub use symbolicate::SymbolicationActor;
