pub mod commands;
pub mod handlers;

// Re-export commonly used items for convenience
pub use commands::command_argument_builder;
pub use handlers::{DB_FILE_NAME, DEFAULT_DB_DIR, dispatch, open_existing, resolve_db_path};
