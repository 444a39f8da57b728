pub mod config_manager;
pub mod streamer_config;
