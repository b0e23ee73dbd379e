//! Tracing subscriber setup shared by the nodewatch binaries.

mod subscriber;

pub use subscriber::{LogFormat, init_tracing, init_tracing_with};
