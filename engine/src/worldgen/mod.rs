mod noise_world_generator;
pub mod test_world_generators;
mod world_generator;

pub use noise_world_generator::NoiseWorldGenerator;
pub use world_generator::{FnGenerator, WorldGenerator, generate_with_overlay};
