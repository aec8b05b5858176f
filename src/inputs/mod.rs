//! Interactive input handling
//!
//! A suite declares inputs; before the engine is spawned every one of
//! them is normalized, resolved to a literal stdin submission, and
//! remembered for retest.

mod cache;
mod normalize;
mod resolver;

pub use cache::{InputCache, MemoryInputCache};
pub use normalize::{
    normalize_step_inputs, normalize_suite_inputs, InputOption, InputType, NormalizedInputConfig,
};
pub use resolver::{InputPrompter, InputResolver, NoPrompter, ResolvedInputs};
