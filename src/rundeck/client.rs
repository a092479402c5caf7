mod core;
mod login;

pub use self::core::{ClientSettings, RundeckClient};
