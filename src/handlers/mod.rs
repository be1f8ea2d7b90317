// Handler modules
pub mod images;
pub mod inject;
pub mod restore;
pub mod scan;

// Re-export all handler functions
pub use images::handle_check_images;
pub use inject::{InjectOptions, handle_inject};
pub use restore::handle_restore;
pub use scan::handle_scan;
