pub mod demo;

pub use demo::{run_demo, DemoOptions, HandshakeChoice, Neighbourhood, PolicyChoice};
