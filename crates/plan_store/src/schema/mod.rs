pub mod patches;
pub mod tables;

pub use patches::registry;
pub use tables::all_tables;
