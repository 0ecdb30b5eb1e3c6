use crate::rtree::RTree;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// 持久化错误类型
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Binary serialization error: {0}")]
    Binary(#[from] bincode::Error),
    /// 文件能解析，但其中的树结构不满足不变量
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),
}

/// 序列化格式枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializationFormat {
    /// JSON格式 - 可读性好，方便调试
    Json,
    /// 二进制格式 - 性能好，体积小
    Binary,
}

impl SerializationFormat {
    /// 根据文件扩展名自动判断格式，`.json` 以外一律按二进制处理
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some("json") => SerializationFormat::Json,
            _ => SerializationFormat::Binary,
        }
    }
}

/// R-tree持久化功能实现
impl<T> RTree<T> {
    /// 导出整棵树（页表、配置、点及负载）到文件
    ///
    /// 根据文件扩展名自动选择序列化格式：
    /// - .json -> JSON格式（调试友好）
    /// - .bin/.rtree/其他 -> 二进制格式（高性能）
    ///
    /// # 示例
    /// ```no_run
    /// use point_rtree::RTree;
    ///
    /// let mut rtree = RTree::new(4, 2).unwrap();
    /// rtree.insert(&[0.5, 0.5], "a".to_string()).unwrap();
    ///
    /// rtree.dump_to_file("points.json").unwrap();
    /// rtree.dump_to_file("points.bin").unwrap();
    /// ```
    pub fn dump_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), PersistenceError>
    where
        T: Serialize,
    {
        let format = SerializationFormat::from_extension(&path);
        self.dump_to_file_with_format(path, format)
    }

    /// 使用指定格式导出到文件
    ///
    /// 先写临时文件再重命名，写入中途失败不会破坏已有的文件。
    pub fn dump_to_file_with_format<P: AsRef<Path>>(
        &self,
        path: P,
        format: SerializationFormat,
    ) -> Result<(), PersistenceError>
    where
        T: Serialize,
    {
        let path = path.as_ref();
        let temp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().unwrap_or_default().to_string_lossy()
        ));

        let data = match format {
            SerializationFormat::Json => serde_json::to_vec_pretty(self)?,
            SerializationFormat::Binary => bincode::serialize(self)?,
        };

        fs::write(&temp_path, &data)?;
        fs::rename(&temp_path, path)?;

        info!(
            "dumped {} points to {} ({:?}, {} bytes)",
            self.len(),
            path.display(),
            format,
            data.len()
        );
        Ok(())
    }

    /// 从文件加载R-tree，格式由扩展名决定
    ///
    /// # 示例
    /// ```
    /// use point_rtree::RTree;
    /// use tempfile::TempDir;
    ///
    /// let dir = TempDir::new().unwrap();
    /// let path = dir.path().join("points.bin");
    ///
    /// let mut rtree = RTree::new(4, 2).unwrap();
    /// rtree.insert(&[0.5, 0.5], 1u32).unwrap();
    /// rtree.dump_to_file(&path).unwrap();
    ///
    /// let loaded: RTree<u32> = RTree::load_from_file(&path).unwrap();
    /// assert_eq!(rtree.len(), loaded.len());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<RTree<T>, PersistenceError>
    where
        T: DeserializeOwned,
    {
        let format = SerializationFormat::from_extension(&path);
        Self::load_from_file_with_format(path, format)
    }

    /// 使用指定格式从文件加载R-tree
    ///
    /// 加载后执行完整的结构校验，校验失败返回 `InvalidFormat`。
    pub fn load_from_file_with_format<P: AsRef<Path>>(
        path: P,
        format: SerializationFormat,
    ) -> Result<RTree<T>, PersistenceError>
    where
        T: DeserializeOwned,
    {
        let path = path.as_ref();
        let data = fs::read(path)?;

        let rtree: RTree<T> = match format {
            SerializationFormat::Json => serde_json::from_slice(&data)?,
            SerializationFormat::Binary => bincode::deserialize(&data)?,
        };
        rtree.verify().map_err(PersistenceError::InvalidFormat)?;

        info!(
            "loaded {} points from {} ({:?})",
            rtree.len(),
            path.display(),
            format
        );
        Ok(rtree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_tree() -> RTree<String> {
        let mut rtree = RTree::new(4, 2).unwrap();
        for i in 0..100 {
            let x = (i % 10) as f64;
            let y = (i / 10) as f64;
            rtree.insert(&[x, y], i.to_string()).unwrap();
        }
        rtree
    }

    fn names(rtree: &RTree<String>, origin: &[f64], radius: f64) -> Vec<String> {
        let mut found: Vec<String> = rtree
            .search(origin, radius)
            .unwrap()
            .payloads()
            .cloned()
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_persistence_json() {
        let temp_dir = TempDir::new().unwrap();
        let json_path = temp_dir.path().join("test.json");

        let original = sample_tree();
        original.dump_to_file(&json_path).unwrap();

        let content = fs::read_to_string(&json_path).unwrap();
        assert!(content.contains("pages"));
        assert!(content.contains("max_entries"));
        assert!(!temp_dir.path().join("test.json.tmp").exists());

        let loaded: RTree<String> = RTree::load_from_file(&json_path).unwrap();
        assert_eq!(loaded.len(), original.len());
        assert_eq!(loaded.height(), original.height());
        assert_eq!(loaded.config(), original.config());
        assert_eq!(
            names(&loaded, &[4.0, 4.0], 2.0),
            names(&original, &[4.0, 4.0], 2.0)
        );
    }

    #[test]
    fn test_persistence_binary() {
        let temp_dir = TempDir::new().unwrap();
        let bin_path = temp_dir.path().join("test.bin");

        let mut original = sample_tree();
        // 删除会在页表中留下空闲槽位，快照也要能还原
        for i in 0..30 {
            original.delete(&[(i % 10) as f64, (i / 10) as f64]).unwrap();
        }
        original.dump_to_file(&bin_path).unwrap();

        let mut loaded: RTree<String> = RTree::load_from_file(&bin_path).unwrap();
        assert_eq!(loaded.len(), 70);
        assert_eq!(loaded.stats(), original.stats());
        assert_eq!(
            names(&loaded, &[5.0, 5.0], 3.0),
            names(&original, &[5.0, 5.0], 3.0)
        );

        // 加载后的树可以继续修改
        loaded.insert(&[0.0, 0.0], "again".to_string()).unwrap();
        loaded.delete(&[9.0, 9.0]).unwrap();
        loaded.verify().unwrap();
    }

    #[test]
    fn test_empty_tree_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let empty: RTree<String> = RTree::new(4, 3).unwrap();

        for name in ["empty.json", "empty.bin"] {
            let path = temp_dir.path().join(name);
            empty.dump_to_file(&path).unwrap();
            let loaded: RTree<String> = RTree::load_from_file(&path).unwrap();
            assert!(loaded.is_empty());
            assert_eq!(loaded.dims(), 3);
        }
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshot.data");

        let original = sample_tree();
        original
            .dump_to_file_with_format(&path, SerializationFormat::Json)
            .unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with('{'));

        let loaded: RTree<String> =
            RTree::load_from_file_with_format(&path, SerializationFormat::Json).unwrap();
        assert_eq!(loaded.len(), 100);
        assert!(matches!(
            RTree::<String>::load_from_file(&path),
            Err(PersistenceError::Binary(_))
        ));
    }

    #[test]
    fn test_load_rejects_corrupted_tree() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");

        let mut rtree = sample_tree();
        rtree.size = 3;
        rtree.dump_to_file(&path).unwrap();

        assert!(matches!(
            RTree::<String>::load_from_file(&path),
            Err(PersistenceError::InvalidFormat(_))
        ));
    }

    /// 把快照中的空闲槽位列表改写后重新加载
    fn load_with_free_list(rtree: &RTree<String>, free: serde_json::Value) -> PersistenceError {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tampered.json");

        let mut snapshot = serde_json::to_value(rtree).unwrap();
        snapshot["free"] = free;
        fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

        match RTree::<String>::load_from_file(&path) {
            Ok(_) => panic!("tampered snapshot was accepted"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_load_rejects_inconsistent_free_list() {
        let mut rtree = RTree::new(4, 2).unwrap();
        for i in 0..20 {
            rtree.insert(&[i as f64, (i * 3 % 7) as f64], i.to_string()).unwrap();
        }
        let root = rtree.root_id().index();
        assert!(matches!(
            load_with_free_list(&rtree, serde_json::json!([root])),
            PersistenceError::InvalidFormat(msg) if msg.contains("live")
        ));

        // 全部删除后页表中留下空槽位
        for i in 0..20 {
            rtree.delete(&[i as f64, (i * 3 % 7) as f64]).unwrap();
        }
        let snapshot = serde_json::to_value(&rtree).unwrap();
        let free = snapshot["free"].as_array().unwrap().clone();
        assert!(!free.is_empty());

        let mut doubled = free.clone();
        doubled.push(free[0].clone());
        assert!(matches!(
            load_with_free_list(&rtree, serde_json::Value::Array(doubled)),
            PersistenceError::InvalidFormat(msg) if msg.contains("twice")
        ));
        assert!(matches!(
            load_with_free_list(&rtree, serde_json::json!([])),
            PersistenceError::InvalidFormat(_)
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            RTree::<String>::load_from_file(temp_dir.path().join("absent.bin")),
            Err(PersistenceError::Io(_))
        ));
    }

    #[test]
    fn test_format_auto_detection() {
        assert_eq!(
            SerializationFormat::from_extension("data.json"),
            SerializationFormat::Json
        );
        assert_eq!(
            SerializationFormat::from_extension("data.bin"),
            SerializationFormat::Binary
        );
        assert_eq!(
            SerializationFormat::from_extension("data.rtree"),
            SerializationFormat::Binary
        );
        assert_eq!(
            SerializationFormat::from_extension("data"),
            SerializationFormat::Binary
        );
    }
}
