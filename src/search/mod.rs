pub mod fallback;
pub mod hybrid;
pub mod keyword;
pub mod primary;
pub mod vector;
