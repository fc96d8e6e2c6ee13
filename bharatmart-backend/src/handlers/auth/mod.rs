pub mod login;
pub mod logout;
pub mod me;
pub mod refresh;
pub mod signup;
pub mod utils;

pub mod dto;

pub use login::login;
pub use logout::logout;
pub use me::me;
pub use refresh::refresh;
pub use signup::signup;
