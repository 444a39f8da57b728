pub mod persistence;
pub mod region_file;
pub mod region_store;
