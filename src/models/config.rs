use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use super::formats::{is_input_format, is_output_format};

/// 用户偏好设置：转换器路径和上次选择的格式
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Preferences {
    // pandoc 可执行文件路径
    pub converter_path: String,
    // 输入格式，空字符串表示未选择
    pub input_format: String,
    // 输出格式，空字符串表示未选择
    pub output_format: String,
}

impl Preferences {
    /// 丢弃不再受支持的格式，转换器路径原样保留
    fn retain_supported(mut self) -> Self {
        if !is_input_format(&self.input_format) {
            self.input_format.clear();
        }
        if !is_output_format(&self.output_format) {
            self.output_format.clear();
        }
        self
    }
}

/// 配置文件的结构：一个名为 "Settings" 的节
#[derive(Serialize, Deserialize, Default)]
struct SettingsFile {
    #[serde(rename = "Settings", default)]
    settings: Preferences,
}

/// 负责读写设置文件
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// 默认位置: <本地数据目录>/PandocFrontend/settings.json
    pub fn default_location() -> Self {
        Self::new(get_config_dir().join("settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 从本地文件加载设置
    ///
    /// 文件不存在、无法读取或格式错误时都返回默认设置，只记录日志。
    pub fn load(&self) -> Preferences {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("no settings file at {}, using defaults", self.path.display());
                return Preferences::default();
            }
            Err(e) => {
                log::warn!("failed to read settings {}: {}", self.path.display(), e);
                return Preferences::default();
            }
        };

        match serde_json::from_str::<SettingsFile>(&content) {
            Ok(file) => file.settings.retain_supported(),
            Err(e) => {
                log::warn!("ignoring malformed settings {}: {}", self.path.display(), e);
                Preferences::default()
            }
        }
    }

    /// 将设置保存到本地文件，覆盖已有内容
    pub fn save(&self, prefs: &Preferences) -> io::Result<()> {
        // 确保目录存在
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = SettingsFile { settings: prefs.clone() };
        let json = serde_json::to_string_pretty(&file)?;

        fs::write(&self.path, json)
    }
}

/// 获取配置目录路径
fn get_config_dir() -> PathBuf {
    if let Some(local_dir) = dirs::data_local_dir() {
        local_dir.join("PandocFrontend")
    } else {
        // 如果无法获取系统本地数据目录，使用临时目录
        std::env::temp_dir().join("PandocFrontend")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Preferences {
        Preferences {
            converter_path: "/usr/bin/pandoc".to_string(),
            input_format: "docx".to_string(),
            output_format: "markdown".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        assert_eq!(store.load(), Preferences::default());
    }

    #[test]
    fn unreadable_file_loads_defaults() {
        let dir = tempdir().unwrap();
        // 目录无法作为文件读取
        assert_eq!(SettingsStore::new(dir.path()).load(), Preferences::default());
    }

    #[test]
    fn save_into_directory_path_fails_without_panicking() {
        let dir = tempdir().unwrap();
        assert!(SettingsStore::new(dir.path()).save(&sample()).is_err());
    }

    #[test]
    fn malformed_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "[Settings]\nthis is not json").unwrap();
        assert_eq!(SettingsStore::new(&path).load(), Preferences::default());
    }

    #[test]
    fn save_then_load_restores_preferences() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.json"));
        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn saving_loaded_preferences_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store.save(&sample()).unwrap();
        let first = fs::read_to_string(store.path()).unwrap();

        store.save(&store.load()).unwrap();
        let second = fs::read_to_string(store.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unsupported_formats_are_dropped_silently() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store
            .save(&Preferences {
                converter_path: "pandoc".to_string(),
                input_format: "rst".to_string(),
                // csv 只能作为输入
                output_format: "csv".to_string(),
            })
            .unwrap();

        let loaded = store.load();
        assert_eq!(loaded.converter_path, "pandoc");
        assert_eq!(loaded.input_format, "");
        assert_eq!(loaded.output_format, "");
    }

    #[test]
    fn file_has_single_settings_section() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));
        store.save(&sample()).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let section = value.get("Settings").unwrap();
        assert_eq!(section["converter_path"], "/usr/bin/pandoc");
        assert_eq!(section["input_format"], "docx");
        assert_eq!(section["output_format"], "markdown");
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "Settings": { "input_format": "latex" } }"#).unwrap();

        let loaded = SettingsStore::new(&path).load();
        assert_eq!(loaded.converter_path, "");
        assert_eq!(loaded.input_format, "latex");
        assert_eq!(loaded.output_format, "");
    }
}
