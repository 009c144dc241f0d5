//! File processing pipeline.
//!
//! Every `file_shared` event flows through:
//! 1. `FileSource::file_info()`: platform metadata
//! 2. `GuardChain::evaluate()`: loop and size vetoes, no I/O
//! 3. `FileSource::download()`: raw bytes
//! 4. `Dispatcher`: first matching processor from the `ProcessorRegistry`
//! 5. `Delivery`: one message or one upload back to the channel

pub mod dispatcher;
pub mod guards;
pub mod orchestrator;
pub mod registry;
pub mod types;

pub use dispatcher::{Dispatched, Dispatcher};
pub use guards::{Guard, GuardChain, GuardContext};
pub use orchestrator::FileEventHandler;
pub use registry::{FileProcessor, ProcessorEntry, ProcessorRegistry};
pub use types::*;
