pub mod caches;
pub mod event;
pub mod interface;
mod metrics;
pub mod provider;
pub mod render;
pub mod symbolication;

pub use render::Renderer;
pub use symbolication::SymbolicationActor;
