pub mod perf;
pub mod sync;
