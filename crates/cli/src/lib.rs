pub mod process;
pub mod state;
