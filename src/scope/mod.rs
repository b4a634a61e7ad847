pub mod resolver;

pub use resolver::ScopeResolver;
