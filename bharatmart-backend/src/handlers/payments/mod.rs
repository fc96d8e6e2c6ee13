pub mod create;
pub mod get;
pub mod list;

pub use create::create;
pub use get::get;
pub use list::list;
