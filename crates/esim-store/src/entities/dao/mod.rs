pub mod runtime_stat;
pub mod spice_file;
pub mod task;

pub use runtime_stat::RuntimeStatRecord;
pub use spice_file::SpiceFileRecord;
pub use task::TaskRecord;
