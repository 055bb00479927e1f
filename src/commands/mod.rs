pub mod colors;
pub mod common;
pub mod forget;
pub mod replay;
