use crate::error::{RTreeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 完整配置文件：树参数 + 日志
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexConfig {
    /// R-tree 构造参数
    #[serde(default)]
    pub tree: RTreeConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// R-tree 构造参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RTreeConfig {
    /// 每页最大条目数 M
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// 每页最小条目数 m，缺省为 ceil(M/2)
    ///
    /// 树快照也会用 bincode 写出这个结构，所以不能跳过 None 字段
    #[serde(default)]
    pub min_entries: Option<usize>,

    /// 坐标维度 D
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// 点相等判断的相对容差
    #[serde(default = "default_rtol")]
    pub rtol: f64,

    /// 点相等判断的绝对容差
    #[serde(default = "default_atol")]
    pub atol: f64,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别：trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 日志输出：stdout, file
    #[serde(default = "default_log_output")]
    pub output: String,

    /// 日志文件路径（当 output = file 时）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

// ============================================================================
// 默认值函数
// ============================================================================

fn default_max_entries() -> usize {
    10
}

fn default_dimensions() -> usize {
    2
}

fn default_rtol() -> f64 {
    1e-5
}

fn default_atol() -> f64 {
    1e-8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

// ============================================================================
// 实现
// ============================================================================

impl Default for RTreeConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            min_entries: None,
            dimensions: default_dimensions(),
            rtol: default_rtol(),
            atol: default_atol(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
            log_file: None,
        }
    }
}

impl RTreeConfig {
    /// 使用给定的 M 和维度创建配置，其余参数取默认值
    pub fn new(max_entries: usize, dimensions: usize) -> Self {
        Self {
            max_entries,
            dimensions,
            ..Self::default()
        }
    }

    pub fn with_min_entries(mut self, min_entries: usize) -> Self {
        self.min_entries = Some(min_entries);
        self
    }

    pub fn with_tolerance(mut self, rtol: f64, atol: f64) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    /// 实际生效的最小条目数 m
    pub fn min_fill(&self) -> usize {
        self.min_entries
            .unwrap_or_else(|| self.max_entries.div_ceil(2))
    }

    /// 验证配置
    ///
    /// - M 至少为 2
    /// - 维度至少为 1
    /// - 1 <= m <= (M + 1) / 2，保证 M + 1 个条目分裂后两页都能达到 m
    /// - 容差为有限非负数
    pub fn validate(&self) -> Result<()> {
        if self.max_entries < 2 {
            return Err(RTreeError::InvalidConfig(format!(
                "max_entries must be at least 2, got {}",
                self.max_entries
            )));
        }

        if self.dimensions == 0 {
            return Err(RTreeError::InvalidConfig(
                "dimensions must be at least 1".to_string(),
            ));
        }

        let min_fill = self.min_fill();
        let max_fill = self.max_entries.div_ceil(2);
        if min_fill == 0 || min_fill > max_fill {
            return Err(RTreeError::InvalidConfig(format!(
                "min_entries must be within 1..={} for max_entries {}, got {}",
                max_fill, self.max_entries, min_fill
            )));
        }

        for (name, value) in [("rtol", self.rtol), ("atol", self.atol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(RTreeError::InvalidConfig(format!(
                    "{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

impl LoggingConfig {
    /// 验证日志配置
    pub fn validate(&self) -> Result<()> {
        match self.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(RTreeError::InvalidConfig(format!(
                    "Invalid log level: '{}'. Must be one of: trace, debug, info, warn, error",
                    self.level
                )))
            }
        }

        match self.output.as_str() {
            "stdout" => Ok(()),
            "file" if self.log_file.is_some() => Ok(()),
            "file" => Err(RTreeError::InvalidConfig(
                "Log output is 'file' but log_file path is not specified".to_string(),
            )),
            other => Err(RTreeError::InvalidConfig(format!(
                "Invalid log output: '{}'. Must be one of: stdout, file",
                other
            ))),
        }
    }
}

impl IndexConfig {
    /// 从文件加载配置
    ///
    /// 配置加载顺序（优先级从低到高）：
    /// 1. 默认配置（内嵌的 default.toml）
    /// 2. 用户配置文件（可选，TOML 格式）
    /// 3. 环境变量（RTREE__ 前缀，使用双下划线分隔嵌套，例如 `RTREE__TREE__MAX_ENTRIES`）
    ///
    /// ```no_run
    /// use point_rtree::config::IndexConfig;
    ///
    /// let config = IndexConfig::from_file("rtree.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::new(&path, config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix("RTREE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let loaded: IndexConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            RTreeError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path.as_ref(), toml_string).map_err(|e| {
            RTreeError::InvalidConfig(format!(
                "Failed to write config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.tree.validate()?;
        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.tree.max_entries, 10);
        assert_eq!(config.tree.dimensions, 2);
        assert_eq!(config.tree.min_fill(), 5);
        assert_eq!(config.tree.rtol, 1e-5);
        assert_eq!(config.tree.atol, 1e-8);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_min_fill_rounds_up() {
        assert_eq!(RTreeConfig::new(2, 2).min_fill(), 1);
        assert_eq!(RTreeConfig::new(5, 2).min_fill(), 3);
        assert_eq!(RTreeConfig::new(5, 2).with_min_entries(2).min_fill(), 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(RTreeConfig::new(4, 3).validate().is_ok());
        assert!(RTreeConfig::new(1, 2).validate().is_err());
        assert!(RTreeConfig::new(4, 0).validate().is_err());
        assert!(RTreeConfig::new(4, 2).with_min_entries(0).validate().is_err());
        assert!(RTreeConfig::new(4, 2).with_min_entries(3).validate().is_err());
        assert!(RTreeConfig::new(5, 2).with_min_entries(3).validate().is_ok());
        assert!(RTreeConfig::new(4, 2)
            .with_tolerance(-1.0, 0.0)
            .validate()
            .is_err());
        assert!(RTreeConfig::new(4, 2)
            .with_tolerance(0.0, f64::NAN)
            .validate()
            .is_err());

        let mut logging = LoggingConfig::default();
        logging.level = "loud".to_string();
        assert!(logging.validate().is_err());
        logging.level = "debug".to_string();
        logging.output = "file".to_string();
        assert!(logging.validate().is_err());
        logging.log_file = Some(PathBuf::from("rtree.log"));
        assert!(logging.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rtree.toml");

        let mut config = IndexConfig::default();
        config.tree = RTreeConfig::new(8, 3)
            .with_min_entries(3)
            .with_tolerance(1e-6, 1e-9);
        config.logging.level = "debug".to_string();

        config.save_to_file(&path).unwrap();
        let loaded = IndexConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded = IndexConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.tree, RTreeConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[tree]\nmax_entries = 4\n").unwrap();

        let loaded = IndexConfig::from_file(&path).unwrap();
        assert_eq!(loaded.tree.max_entries, 4);
        assert_eq!(loaded.tree.dimensions, 2);
        assert_eq!(loaded.tree.min_fill(), 2);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[tree]\nmax_entries = 1\n").unwrap();

        assert!(matches!(
            IndexConfig::from_file(&path),
            Err(RTreeError::InvalidConfig(_))
        ));
    }
}
