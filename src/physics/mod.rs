pub mod fresnel;
pub mod link_budget;
pub mod profile;
pub mod refraction;

pub use profile::{LinkProfile, ProfileEngine};
