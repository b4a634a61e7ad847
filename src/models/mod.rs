pub mod account;
pub mod finding;
pub mod request;
pub mod scan_result;

pub use account::*;
pub use finding::*;
pub use request::*;
pub use scan_result::*;
