//! baresip driver - scripted SIP calls through the baresip console.

pub mod audio;
pub mod baresip;
pub mod config;
pub mod display;
pub mod session;
