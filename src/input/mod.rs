pub mod file_tailer;

pub use file_tailer::{decode_line, parse_line, FileTailer, StartPosition};

// Async version
pub use file_tailer::AsyncFileTailer;
