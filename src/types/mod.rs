mod buffer;
mod decimal;
mod definitions;
mod format;
mod misc;
mod sampler;
mod subresource;
mod texture;

pub use buffer::*;
pub use decimal::*;
pub use definitions::*;
pub use format::*;
pub use misc::*;
pub use sampler::*;
pub use subresource::*;
pub use texture::*;
