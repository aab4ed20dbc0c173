pub mod fill_thread;
mod play_impl;
pub mod progress;

pub use play_impl::cmd_play;
