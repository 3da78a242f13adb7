pub mod catalog;
pub mod error;
pub mod exam;
pub mod lesson;
pub mod model;
pub mod progression;
pub mod sampler;
pub mod scoring;
pub mod time;

pub use error::ConfigError;
pub use time::Clock;
