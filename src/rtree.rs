use crate::bounding_box::BoundingBox;
use crate::config::RTreeConfig;
use crate::error::{RTreeError, Result};
use crate::page::{ChildEntry, Entries, Page, PageId, PointEntry};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// 用于JSON序列化的简化树结构
#[derive(Debug, Serialize)]
pub struct TreeVisualization<'a, T> {
    /// 根页（空树为 None）
    pub root: Option<PageVisualization<'a, T>>,
    /// 树的配置参数
    pub config: &'a RTreeConfig,
    pub size: usize,
}

/// 用于JSON序列化的页结构
#[derive(Debug, Serialize)]
pub struct PageVisualization<'a, T> {
    pub bounding_box: &'a BoundingBox,
    pub level: usize,
    /// 点条目（仅叶子页）
    pub points: Vec<&'a PointEntry<T>>,
    /// 子页（仅索引页）
    pub children: Vec<PageVisualization<'a, T>>,
}

/// R-tree主结构
///
/// 所有页都存放在页表 `pages` 中，由 `PageId` 寻址；树独占页表，
/// 页之间只通过句柄互相引用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RTree<T> {
    /// 页表，被释放的槽位为 None，等待复用
    pages: Vec<Option<Page<T>>>,
    /// 可复用的空闲槽位
    free: Vec<PageId>,
    /// 根页
    pub(crate) root: PageId,
    config: RTreeConfig,
    /// 点的总数
    pub(crate) size: usize,
}

impl<T> RTree<T> {
    /// 创建新的R-tree，`max_entries` 为 M，`dimensions` 为坐标维度
    pub fn new(max_entries: usize, dimensions: usize) -> Result<Self> {
        Self::with_config(RTreeConfig::new(max_entries, dimensions))
    }

    /// 使用完整配置创建R-tree
    pub fn with_config(config: RTreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(RTree {
            pages: vec![Some(Page::new_leaf(config.dimensions))],
            free: Vec::new(),
            root: PageId(0),
            config,
            size: 0,
        })
    }

    pub fn config(&self) -> &RTreeConfig {
        &self.config
    }

    /// 获取最大条目数 M
    pub fn max_entries(&self) -> usize {
        self.config.max_entries
    }

    /// 获取最小条目数 m
    pub fn min_entries(&self) -> usize {
        self.config.min_fill()
    }

    pub fn dims(&self) -> usize {
        self.config.dimensions
    }

    /// 获取点的总数
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// 树的高度，只有一个叶子根页时为 1
    pub fn height(&self) -> usize {
        self.root().level() + 1
    }

    pub fn root_id(&self) -> PageId {
        self.root
    }

    pub fn root(&self) -> &Page<T> {
        &self[self.root]
    }

    /// 获取根页的边界框，空树为 None
    pub fn root_bbox(&self) -> Option<&BoundingBox> {
        self.root().bounding_box()
    }

    /// 按句柄获取页，句柄已失效时返回 None
    pub fn page(&self, id: PageId) -> Option<&Page<T>> {
        self.pages.get(id.0).and_then(|slot| slot.as_ref())
    }

    /// 按深度优先顺序遍历所有点
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            stack: vec![self.root],
            current: Default::default(),
        }
    }

    /// 统计页表中存活的页数
    pub(crate) fn live_pages(&self) -> usize {
        self.pages.iter().filter(|slot| slot.is_some()).count()
    }

    /// 把新页登记到页表中
    pub(crate) fn alloc(&mut self, page: Page<T>) -> PageId {
        match self.free.pop() {
            Some(id) => {
                self.pages[id.0] = Some(page);
                id
            }
            None => {
                self.pages.push(Some(page));
                PageId(self.pages.len() - 1)
            }
        }
    }

    /// 从页表中移除一页，槽位留给后续复用
    pub(crate) fn release(&mut self, id: PageId) -> Option<Page<T>> {
        let page = self.pages.get_mut(id.0)?.take()?;
        self.free.push(id);
        Some(page)
    }

    /// 校验空闲槽位列表
    ///
    /// 每个空闲句柄都必须在页表范围内、指向空槽位且只出现一次，
    /// 每个空槽位也都必须登记在列表中，否则 `alloc` 会覆盖存活的页。
    pub(crate) fn check_free_list(&self) -> std::result::Result<(), String> {
        let mut listed = vec![false; self.pages.len()];
        for &id in &self.free {
            match self.pages.get(id.0) {
                None => return Err(format!("free list holds out-of-range {}", id)),
                Some(Some(_)) => return Err(format!("free list holds live {}", id)),
                Some(None) if listed[id.0] => {
                    return Err(format!("free list holds {} twice", id))
                }
                Some(None) => listed[id.0] = true,
            }
        }

        match self
            .pages
            .iter()
            .zip(&listed)
            .position(|(slot, &listed)| slot.is_none() && !listed)
        {
            Some(index) => Err(format!(
                "{} is empty but not in the free list",
                PageId(index)
            )),
            None => Ok(()),
        }
    }

    /// 生成指向某页的索引条目，空页没有边界框，返回 `EmptyPage`
    pub(crate) fn child_entry(&self, id: PageId) -> Result<ChildEntry> {
        let bbox = self[id]
            .bounding_box()
            .cloned()
            .ok_or(RTreeError::EmptyPage)?;
        Ok(ChildEntry { bbox, page: id })
    }

    /// 导出树结构为JSON格式
    ///
    /// 返回包含完整树结构的JSON字符串，供外部可视化使用
    pub fn export_to_json(&self) -> std::result::Result<String, serde_json::Error>
    where
        T: Serialize,
    {
        let visualization = TreeVisualization {
            root: self.create_page_visualization(self.root),
            config: &self.config,
            size: self.size,
        };
        serde_json::to_string_pretty(&visualization)
    }

    /// 递归创建页的可视化结构
    fn create_page_visualization(&self, id: PageId) -> Option<PageVisualization<'_, T>> {
        let page = &self[id];
        let bounding_box = page.bounding_box()?;
        let (points, children) = match page.entries() {
            Entries::Leaf(points) => (points.iter().collect(), Vec::new()),
            Entries::Internal(children) => (
                Vec::new(),
                children
                    .iter()
                    .filter_map(|c| self.create_page_visualization(c.page))
                    .collect(),
            ),
        };
        Some(PageVisualization {
            bounding_box,
            level: page.level(),
            points,
            children,
        })
    }
}

impl<T> Index<PageId> for RTree<T> {
    type Output = Page<T>;

    /// 句柄由树自身维护，失效句柄说明树结构已损坏
    fn index(&self, id: PageId) -> &Page<T> {
        match self.pages.get(id.0) {
            Some(Some(page)) => page,
            _ => panic!("dangling {}", id),
        }
    }
}

impl<T> IndexMut<PageId> for RTree<T> {
    fn index_mut(&mut self, id: PageId) -> &mut Page<T> {
        match self.pages.get_mut(id.0) {
            Some(Some(page)) => page,
            _ => panic!("dangling {}", id),
        }
    }
}

impl<T: fmt::Debug> fmt::Display for RTree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RTree({}, {})", self.size, self.root())
    }
}

/// 深度优先的点迭代器
pub struct Iter<'a, T> {
    tree: &'a RTree<T>,
    stack: Vec<PageId>,
    current: std::slice::Iter<'a, PointEntry<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a PointEntry<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(point) = self.current.next() {
                return Some(point);
            }
            let id = self.stack.pop()?;
            let tree = self.tree;
            match tree[id].entries() {
                Entries::Leaf(points) => self.current = points.iter(),
                // 逆序压栈，保证按条目顺序访问
                Entries::Internal(children) => {
                    self.stack.extend(children.iter().rev().map(|c| c.page))
                }
            }
        }
    }
}

impl<'a, T> IntoIterator for &'a RTree<T> {
    type Item = &'a PointEntry<T>;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
