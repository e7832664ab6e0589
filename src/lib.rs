#![forbid(unsafe_code)]

//! TikSave: resolves TikTok share links into direct media URLs through a
//! third-party provider and relays the media so browsers can save it.

pub mod config;
pub mod logging;
pub mod page;
pub mod relay;
pub mod resolver;
pub mod upstream;
pub mod validate;
pub mod video;
