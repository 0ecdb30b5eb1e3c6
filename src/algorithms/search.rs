use crate::bounding_box::BoundingBox;
use crate::error::{check_point, RTreeError, Result};
use crate::page::{Entries, PageId, PointEntry};
use crate::rtree::RTree;
use serde::Serialize;

/// 搜索结果
///
/// `visited` 按访问顺序记录搜索经过的每一页的边界框，无论该页是否产出了结果，
/// 供外部可视化使用。
#[derive(Debug, Serialize)]
pub struct SearchResult<'a, T> {
    pub points: Vec<&'a PointEntry<T>>,
    pub visited: Vec<&'a BoundingBox>,
}

impl<T> Default for SearchResult<'_, T> {
    fn default() -> Self {
        SearchResult {
            points: Vec::new(),
            visited: Vec::new(),
        }
    }
}

impl<'a, T> SearchResult<'a, T> {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 命中点的负载
    pub fn payloads(&self) -> impl Iterator<Item = &'a T> + '_ {
        self.points.iter().map(|&p| &p.payload)
    }
}

/// 搜索操作相关算法
impl<T> RTree<T> {
    /// 半径搜索：返回与 `origin` 欧氏距离不超过 `radius` 的所有点
    ///
    /// 查询框取 `[origin - radius, origin + radius]`，只下降到与之相交的子页；
    /// 查询框是球的外接立方体，所以叶子上还要逐点精确比较距离。
    /// `radius` 为负数或 NaN 时返回 `InvalidRadius`，无穷大表示全部返回。
    pub fn search(&self, origin: &[f64], radius: f64) -> Result<SearchResult<'_, T>> {
        check_point(origin, self.dims())?;
        if radius.is_nan() || radius < 0.0 {
            return Err(RTreeError::InvalidRadius(radius));
        }

        let query = BoundingBox::around(origin, radius);
        let mut result = SearchResult::default();
        let within = |p: &[f64]| euclidean(p, origin) <= radius;
        self.search_recursive(self.root, &query, &within, &mut result);
        Ok(result)
    }

    /// 矩形搜索：返回落在 `query` 内（含边界）的所有点
    pub fn search_box(&self, query: &BoundingBox) -> Result<SearchResult<'_, T>> {
        if query.dims() != self.dims() {
            return Err(RTreeError::DimensionMismatch {
                expected: self.dims(),
                found: query.dims(),
            });
        }

        let mut result = SearchResult::default();
        let inside = |p: &[f64]| query.contains_point(p);
        self.search_recursive(self.root, query, &inside, &mut result);
        Ok(result)
    }

    /// 递归搜索
    ///
    /// 进入的每一页都记录到 `visited`；空页没有边界框，直接返回。
    fn search_recursive<'a, F>(
        &'a self,
        page_id: PageId,
        query: &BoundingBox,
        matches: &F,
        result: &mut SearchResult<'a, T>,
    ) where
        F: Fn(&[f64]) -> bool,
    {
        let page = &self[page_id];
        let Some(bbox) = page.bounding_box() else {
            return;
        };
        result.visited.push(bbox);

        match page.entries() {
            Entries::Leaf(points) => {
                result
                    .points
                    .extend(points.iter().filter(|p| matches(p.coords.as_slice())));
            }
            Entries::Internal(children) => {
                for child in children.iter().filter(|c| c.bbox.intersects(query)) {
                    self.search_recursive(child.page, query, matches, result);
                }
            }
        }
    }

    /// 按容差查找一个点，返回深度优先顺序中第一个匹配的条目
    pub fn lookup(&self, point: &[f64]) -> Result<&PointEntry<T>> {
        check_point(point, self.dims())?;
        self.find_leaf(point)
            .map(|found| &self[found.leaf].points()[found.index])
            .ok_or(RTreeError::NotFound)
    }

    /// 树中是否存在与 `point` 在容差范围内相等的点
    pub fn contains(&self, point: &[f64]) -> Result<bool> {
        check_point(point, self.dims())?;
        Ok(self.find_leaf(point).is_some())
    }

    /// 容差相等：每个坐标轴都满足 `|stored - query| <= atol + rtol * |query|`
    pub(crate) fn is_close(&self, stored: &[f64], query: &[f64]) -> bool {
        let (rtol, atol) = (self.config().rtol, self.config().atol);
        stored
            .iter()
            .zip(query)
            .all(|(s, q)| (s - q).abs() <= atol + rtol * q.abs())
    }
}

/// 欧氏距离，逐轴用 hypot 累加，坐标很大时平方和也不会溢出
fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).fold(0.0, |acc: f64, (x, y)| acc.hypot(x - y))
}
