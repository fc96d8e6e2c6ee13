pub mod create;
pub mod dto;
pub mod get;
pub mod list;

pub use create::create;
pub use get::get;
pub use list::list;
