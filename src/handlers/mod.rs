// Handler modules
pub mod encode;
pub mod serve;
pub mod validate;

// Re-export all handler functions
pub use encode::handle_encode;
pub use serve::handle_serve;
pub use validate::{format_report, handle_validate};
