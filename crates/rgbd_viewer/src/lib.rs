//! Layered RGBD panorama player.
//!
//! A scene is a live color/depth/alpha video plus extrapolated and inpainted
//! stills. Three layers draw them back to front on one inverted sphere whose
//! vertices are pushed out by the decoded depth, so the panorama shows parallax
//! as the head moves.

pub mod app;
pub mod assets;
pub mod camera;
pub mod compositor;
pub mod config;
pub mod layer;
pub mod media;
pub mod playback;
pub mod player;
pub mod renderer;
pub mod soft;
pub mod ui;
