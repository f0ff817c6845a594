//! Graphics backend abstraction for benchmark workloads.
//!
//! The engines in this crate resolve resource states, descriptor tables and
//! pipeline state up front, then hand fully resolved command streams to a
//! [`NativeBackend`]. The default backend records the stream without a
//! device, which is what the tests run against; the `vulkan` feature maps
//! the portable barrier and state types onto `ash`.

// crate-specific lint exceptions:
#![allow(clippy::missing_errors_doc)]
//#![warn(missing_docs)]

pub mod backends;
pub mod error;
pub mod reflection;
pub mod types;

mod barrier;
pub use barrier::*;

mod bind_heap;
pub use bind_heap::*;

mod command_context;
pub use command_context::*;

mod deferred_drop;
pub use deferred_drop::*;

mod device_context;
pub use device_context::*;

mod job;
pub use job::*;

mod queue;
pub use queue::*;

mod renderer;
pub use renderer::*;

mod root_signature;
pub use root_signature::*;

mod upload;
pub use upload::*;

pub mod prelude {
    pub use crate::types::*;
    pub use crate::*;
    pub use crate::{
        Buffer, CommandContext, CommandQueue, DeviceContext, GfxResult, Job, Renderer, Sampler,
        Texture,
    };
}

pub use backends::*;
pub use error::*;
pub use reflection::*;
pub use types::*;

//
// Constants
//

/// The maximum number of simultaneously attached render targets
pub const MAX_RENDER_TARGET_ATTACHMENTS: usize = 8;
// Vulkan guarantees up to 16
pub const MAX_VERTEX_INPUT_BINDINGS: usize = 16;
/// Longest sampler table that still packs into one 64-bit dedup key
pub const MAX_SAMPLER_TABLE_SIZE: usize = 14;
/// Distinct sampler definitions a device hands out persistent slots for
pub const MAX_STATIC_SAMPLERS: usize = 16;
