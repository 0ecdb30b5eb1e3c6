//! # 点 R-tree 空间索引
//!
//! 基于 Antonin Guttman 的论文 "R-trees: A Dynamic Index Structure for Spatial Searching"
//! 的 N 维点索引，所有页保存在树自己的页表中。
//!
//! ## 主要特性
//!
//! - 任意维度的点，附带任意类型的负载
//! - 最小扩大量下降、二次分裂、分裂逐层上传与根页增长
//! - 半径搜索（同时返回访问过的页边界框）与矩形搜索
//! - 带容差的删除，下溢页摘除后重新插入，根页只剩一个子页时降低树高
//! - 结构校验、JSON 导出与快照持久化
//!
//! ## 使用示例
//!
//! ```rust
//! use point_rtree::RTree;
//!
//! let mut rtree = RTree::new(4, 2).unwrap();
//! for (i, p) in [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [3.0, 3.0]].iter().enumerate() {
//!     rtree.insert(p, i).unwrap();
//! }
//!
//! let result = rtree.search(&[1.0, 1.0], 0.1).unwrap();
//! assert_eq!(result.payloads().collect::<Vec<_>>(), vec![&1]);
//!
//! let removed = rtree.delete(&[2.0, 2.0]).unwrap();
//! assert_eq!(removed.payload, 2);
//! assert_eq!(rtree.len(), 3);
//! ```
//!
//! ### 从配置文件创建
//! ```no_run
//! use point_rtree::{IndexConfig, RTree};
//!
//! let config = IndexConfig::from_file("rtree.toml").unwrap();
//! let rtree: RTree<String> = RTree::with_config(config.tree).unwrap();
//! ```

pub mod algorithms;
pub mod bounding_box;
pub mod config;
pub mod error;
pub mod page;
pub mod rtree;

// 重新导出主要的公共接口
pub use bounding_box::BoundingBox;
pub use config::{IndexConfig, LoggingConfig, RTreeConfig};
pub use error::{RTreeError, Result};
pub use page::{ChildEntry, ChildRef, Entries, Entry, Page, PageId, PointEntry};
pub use rtree::RTree;

pub use algorithms::debug::TreeStats;
pub use algorithms::persistence::{PersistenceError, SerializationFormat};
pub use algorithms::search::SearchResult;
