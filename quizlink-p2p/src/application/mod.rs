mod runtime;

pub use runtime::{RuntimeHandle, SessionRuntime, UiTrigger};
