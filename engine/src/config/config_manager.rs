use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::Duration,
};

use anyhow::Context;
use debounce::EventDebouncer;
use log::{error, warn};
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

pub struct ConfigManager<T> {
    path: PathBuf,
    current: Arc<RwLock<T>>,
    debouncer: debounce::EventDebouncer<UpdateConfigEvent>,
}

const CONFIG_DEBOUNCE_DURATION_MS: u64 = 200;

pub trait Config:
    Sized + Default + Clone + Send + Sync + Serialize + for<'a> Deserialize<'a> + 'static
{
    fn get_path() -> &'static str;

    fn is_valid(&self) -> bool {
        true
    }

    fn create_manager() -> anyhow::Result<ConfigManager<Self>> {
        Self::create_manager_at(PathBuf::from(Self::get_path()))
    }

    fn create_manager_at(path: PathBuf) -> anyhow::Result<ConfigManager<Self>> {
        let mut manager = ConfigManager::new(path);
        manager
            .load_if_exists()
            .with_context(|| format!("Failed to load config from {:?}", manager.path()))?;
        Ok(manager)
    }
}

#[derive(Clone, Copy, PartialEq)]
struct UpdateConfigEvent;

fn write_config<T: Config>(path: &Path, config: &T) -> anyhow::Result<()> {
    let serialized = ron::ser::to_string_pretty(config, PrettyConfig::default())?;
    let mut writer =
        File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    writer.write_all(serialized.as_bytes())?;
    Ok(())
}

impl<T> ConfigManager<T>
where
    T: Config,
{
    pub fn new(path: PathBuf) -> Self {
        let current = Arc::new(RwLock::new(T::default()));
        let current_clone = current.clone();
        let path_clone = path.clone();

        let write_debounced = move |_event: UpdateConfigEvent| {
            let config = current_clone.read().unwrap();

            if !config.is_valid() {
                warn!("Attempted to write invalid config to {:?}", &path_clone);
                return;
            }

            if let Err(err) = write_config(&path_clone, &*config) {
                error!("Failed to write config to {:?}: {:?}", &path_clone, err);
            }
        };

        Self {
            path,
            current,
            debouncer: EventDebouncer::new(
                Duration::from_millis(CONFIG_DEBOUNCE_DURATION_MS),
                write_debounced,
            ),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> Arc<RwLock<T>> {
        self.current.clone()
    }

    /// A copy of the current values
    pub fn snapshot(&self) -> T {
        self.current.read().unwrap().clone()
    }

    pub fn load_if_exists(&mut self) -> anyhow::Result<()> {
        if self.path.exists() {
            let config_data = std::fs::read_to_string(&self.path)?;

            if config_data.is_empty() {
                return Ok(());
            }

            let config: T = ron::from_str(&config_data)
                .with_context(|| format!("Failed to parse config from {:?}", &self.path))?;

            if !config.is_valid() {
                warn!("Ignoring invalid config in {:?}, using defaults", &self.path);
                return Ok(());
            }

            self.current.write().unwrap().clone_from(&config);
        }
        Ok(())
    }

    pub fn update_and_save<F>(&self, update_fn: F)
    where
        F: FnOnce(&mut T),
    {
        {
            let mut config = self.current.write().unwrap();
            update_fn(&mut *config);
        }
        self.debouncer.put(UpdateConfigEvent);
    }

    /// Writes the current values immediately, bypassing the debouncer
    pub fn save_now(&self) -> anyhow::Result<()> {
        let config = self.current.read().unwrap();
        if !config.is_valid() {
            anyhow::bail!("Refusing to write invalid config to {:?}", &self.path);
        }
        write_config(&self.path, &*config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::streamer_config::{StreamerConfig, WorkerMode};

    fn temp_config_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cubic-config-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("voxel_world.ron")
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_config_path("missing");
        let _ = std::fs::remove_file(&path);
        let manager = StreamerConfig::create_manager_at(path).unwrap();
        assert_eq!(manager.snapshot(), StreamerConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_config_path("reload");
        let manager = StreamerConfig::create_manager_at(path.clone()).unwrap();
        manager.update_and_save(|config| {
            config.view_distance = 11;
            config.worker_mode = WorkerMode::Pool(2);
        });
        manager.save_now().unwrap();

        let reloaded = StreamerConfig::create_manager_at(path).unwrap();
        assert_eq!(reloaded.snapshot().view_distance, 11);
        assert_eq!(reloaded.snapshot().worker_mode, WorkerMode::Pool(2));
    }

    #[test]
    fn test_invalid_file_keeps_defaults() {
        let path = temp_config_path("invalid");
        std::fs::write(&path, "(vertical_view_distance: 0)").unwrap();
        let manager = StreamerConfig::create_manager_at(path).unwrap();
        assert_eq!(manager.snapshot(), StreamerConfig::default());
    }
}
