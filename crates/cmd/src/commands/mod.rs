pub mod check;
pub mod ingest;
pub mod serve;

pub use check::check_command;
pub use ingest::ingest_command;
pub use serve::serve_command;
