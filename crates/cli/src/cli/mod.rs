pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Create, Delete, Generate, Get, Grant, Id, Import, Init, List, Transfer, Version};
