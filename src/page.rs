use crate::bounding_box::BoundingBox;
use crate::error::{RTreeError, Result};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 页在树的页表（arena）中的句柄
///
/// 父页只保存子页的句柄，分裂、换根都只是句柄的重新赋值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display(fmt = "page#{}", _0)]
pub struct PageId(pub(crate) usize);

impl PageId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 叶子条目：用户插入的点及其负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointEntry<T> {
    pub coords: Vec<f64>,
    pub payload: T,
}

/// 索引条目：子页句柄及子页边界框的副本
///
/// 不变量：`bbox` 始终等于子页自身的 `bounding_box`，由树在每次修改后同步。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub bbox: BoundingBox,
    pub page: PageId,
}

/// 传给 `Page::add` 的条目
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    Point(PointEntry<T>),
    Child(ChildEntry),
}

impl<T> Entry<T> {
    /// 条目的几何范围，点条目退化为点边界框
    pub fn bounding_box(&self) -> BoundingBox {
        match self {
            Entry::Point(p) => BoundingBox::from_point(&p.coords),
            Entry::Child(c) => c.bbox.clone(),
        }
    }

    pub fn dims(&self) -> usize {
        match self {
            Entry::Point(p) => p.coords.len(),
            Entry::Child(c) => c.bbox.dims(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Entry::Point(_) => "point",
            Entry::Child(_) => "child",
        }
    }
}

/// 页的条目列表
///
/// 叶子页只能保存点，索引页只能保存子页，页的种类在创建后不会改变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entries<T> {
    Leaf(Vec<PointEntry<T>>),
    Internal(Vec<ChildEntry>),
}

impl<T> Entries<T> {
    pub fn len(&self) -> usize {
        match self {
            Entries::Leaf(points) => points.len(),
            Entries::Internal(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 第 `index` 个条目的几何范围
    pub(crate) fn bounding_box_at(&self, index: usize) -> BoundingBox {
        match self {
            Entries::Leaf(points) => BoundingBox::from_point(&points[index].coords),
            Entries::Internal(children) => children[index].bbox.clone(),
        }
    }
}

/// `least_enlargement` 选中的子页
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRef {
    /// 子页在父页条目列表中的位置
    pub slot: usize,
    pub page: PageId,
}

/// R-tree 的页（节点）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// 叶子层为 0，往上逐层加一
    pub(crate) level: usize,
    pub(crate) dims: usize,
    /// 所有条目的紧致并集，空页为 `None`
    pub(crate) bbox: Option<BoundingBox>,
    pub(crate) entries: Entries<T>,
}

impl<T> Page<T> {
    /// 创建新的叶子页
    pub fn new_leaf(dims: usize) -> Self {
        Page {
            level: 0,
            dims,
            bbox: None,
            entries: Entries::Leaf(Vec::new()),
        }
    }

    /// 创建新的索引页，`level` 必须大于 0
    pub fn new_index(dims: usize, level: usize) -> Self {
        debug_assert!(level > 0, "index pages live above the leaf level");
        Page {
            level,
            dims,
            bbox: None,
            entries: Entries::Internal(Vec::new()),
        }
    }

    /// 创建与当前页同种类、同层级的空页
    pub(crate) fn empty_sibling(&self) -> Self {
        match self.entries {
            Entries::Leaf(_) => Page::new_leaf(self.dims),
            Entries::Internal(_) => Page::new_index(self.dims, self.level),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.entries, Entries::Leaf(_))
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bbox.as_ref()
    }

    pub fn entries(&self) -> &Entries<T> {
        &self.entries
    }

    /// 叶子页中的点，索引页返回空切片
    pub fn points(&self) -> &[PointEntry<T>] {
        match &self.entries {
            Entries::Leaf(points) => points,
            Entries::Internal(_) => &[],
        }
    }

    /// 索引页中的子页，叶子页返回空切片
    pub fn children(&self) -> &[ChildEntry] {
        match &self.entries {
            Entries::Leaf(_) => &[],
            Entries::Internal(children) => children,
        }
    }

    /// 添加条目并用一次 fit 操作更新边界框
    ///
    /// 条目类型必须与页的种类匹配，否则返回 `TypeMismatch`。
    pub fn add(&mut self, entry: Entry<T>) -> Result<()> {
        if entry.dims() != self.dims {
            return Err(RTreeError::DimensionMismatch {
                expected: self.dims,
                found: entry.dims(),
            });
        }

        match (&mut self.entries, entry) {
            (Entries::Leaf(points), Entry::Point(point)) => {
                match &mut self.bbox {
                    Some(bbox) => bbox.fit_point(&point.coords)?,
                    None => self.bbox = Some(BoundingBox::from_point(&point.coords)),
                }
                points.push(point);
            }
            (Entries::Internal(children), Entry::Child(child)) => {
                match &mut self.bbox {
                    Some(bbox) => bbox.fit_box(&child.bbox)?,
                    None => self.bbox = Some(child.bbox.clone()),
                }
                children.push(child);
            }
            (entries, entry) => {
                return Err(RTreeError::TypeMismatch {
                    expected: match entries {
                        Entries::Leaf(_) => "leaf",
                        Entries::Internal(_) => "index",
                    },
                    found: entry.kind(),
                });
            }
        }
        Ok(())
    }

    /// 选择放入 `point` 时面积扩大最小的子页
    ///
    /// 如果某个子页已经包含该点，直接返回第一个这样的子页。
    /// 扩大量相同时选择扩大后面积较小的，仍相同则取靠前的。
    pub fn least_enlargement(&self, point: &[f64]) -> Result<ChildRef> {
        if point.len() != self.dims {
            return Err(RTreeError::DimensionMismatch {
                expected: self.dims,
                found: point.len(),
            });
        }
        self.choose_subtree(&BoundingBox::from_point(point))
    }

    /// `least_enlargement` 的边界框版本，重新插入整棵子树时使用
    pub(crate) fn choose_subtree(&self, target: &BoundingBox) -> Result<ChildRef> {
        let children = match &self.entries {
            Entries::Internal(children) if !children.is_empty() => children,
            _ => return Err(RTreeError::EmptyPage),
        };

        if let Some(slot) = children.iter().position(|c| c.bbox.contains(target)) {
            return Ok(ChildRef {
                slot,
                page: children[slot].page,
            });
        }

        let mut best_slot = 0;
        let mut min_enlargement = f64::INFINITY;
        let mut min_area = f64::INFINITY;
        for (slot, child) in children.iter().enumerate() {
            let area = child.bbox.test_box_enlargement(target);
            let enlargement = area - child.bbox.area();
            if enlargement < min_enlargement || (enlargement == min_enlargement && area < min_area)
            {
                min_enlargement = enlargement;
                min_area = area;
                best_slot = slot;
            }
        }

        Ok(ChildRef {
            slot: best_slot,
            page: children[best_slot].page,
        })
    }

    /// 同步子页边界框的副本，并重新计算本页边界框
    pub(crate) fn update_child_box(&mut self, slot: usize, bbox: BoundingBox) {
        if let Entries::Internal(children) = &mut self.entries {
            children[slot].bbox = bbox;
        }
        self.recompute_bounds();
    }

    /// 从叶子页中移除一个点
    pub(crate) fn remove_point(&mut self, index: usize) -> Option<PointEntry<T>> {
        let removed = match &mut self.entries {
            Entries::Leaf(points) if index < points.len() => points.remove(index),
            _ => return None,
        };
        self.recompute_bounds();
        Some(removed)
    }

    /// 从索引页中摘除一个子页
    pub(crate) fn remove_child(&mut self, slot: usize) -> Option<ChildEntry> {
        let removed = match &mut self.entries {
            Entries::Internal(children) if slot < children.len() => children.remove(slot),
            _ => return None,
        };
        self.recompute_bounds();
        Some(removed)
    }

    /// 取出全部条目，页变为同种类的空页
    pub(crate) fn take_entries(&mut self) -> Entries<T> {
        let empty = match self.entries {
            Entries::Leaf(_) => Entries::Leaf(Vec::new()),
            Entries::Internal(_) => Entries::Internal(Vec::new()),
        };
        self.bbox = None;
        std::mem::replace(&mut self.entries, empty)
    }

    /// 按当前条目重新计算边界框
    pub(crate) fn recompute_bounds(&mut self) {
        self.bbox = match &self.entries {
            Entries::Leaf(points) => {
                let mut iter = points.iter();
                iter.next().map(|first| {
                    let mut bbox = BoundingBox::from_point(&first.coords);
                    for p in iter {
                        // 页内条目的维度在 add 时已经校验过
                        let _ = bbox.fit_point(&p.coords);
                    }
                    bbox
                })
            }
            Entries::Internal(children) => {
                let mut iter = children.iter();
                iter.next().map(|first| {
                    let mut bbox = first.bbox.clone();
                    for c in iter {
                        let _ = bbox.fit_box(&c.bbox);
                    }
                    bbox
                })
            }
        };
    }
}

impl<T: fmt::Debug> fmt::Display for Page<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_leaf() { "leaf" } else { "index" };
        write!(f, "Page({}, level={}, ", kind, self.level)?;
        match &self.entries {
            Entries::Leaf(points) => {
                let items: Vec<String> = points
                    .iter()
                    .map(|p| format!("({:?}, {:?})", p.coords, p.payload))
                    .collect();
                write!(f, "[{}]", items.join(", "))?;
            }
            Entries::Internal(children) => {
                let items: Vec<String> = children
                    .iter()
                    .map(|c| format!("{} {}", c.page, c.bbox))
                    .collect();
                write!(f, "[{}]", items.join(", "))?;
            }
        }
        write!(f, ")")
    }
}
