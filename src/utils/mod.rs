pub mod error_helpers;
pub mod progress;

pub use self::error_helpers::ParseErrorMapper;
pub use self::progress::progress_bar;
