pub mod depth_layers;
