//! Repository wiring.
//!
//! The factory resolves one backend at startup; the container carries it to
//! application services.

mod container;
mod factory;

pub use container::DependencyContainer;
pub use factory::RepositoryFactory;
