pub mod executor;
pub mod scanner;

pub use executor::AuditExecutor;
pub use scanner::ComprehensiveScanner;
