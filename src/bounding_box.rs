use crate::error::{RTreeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 轴对齐的超矩形 - R-tree 中每个页的最小边界框
///
/// 维度在创建时确定，所有比较操作都假定双方维度一致。
/// 不变量：对每个轴 `i`，`lower[i] <= upper[i]`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoundingBox {
    /// 创建新的边界框
    ///
    /// 上下界维度不一致或某个轴上 `lower > upper` 时返回 `InvalidBounds`
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.len() != upper.len() || lower.is_empty() {
            return Err(RTreeError::InvalidBounds);
        }
        if lower
            .iter()
            .zip(&upper)
            .any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi)
        {
            return Err(RTreeError::InvalidBounds);
        }
        Ok(BoundingBox { lower, upper })
    }

    /// 创建一个退化为点的边界框
    pub fn from_point(point: &[f64]) -> Self {
        BoundingBox {
            lower: point.to_vec(),
            upper: point.to_vec(),
        }
    }

    /// 以 `origin` 为中心、边长为 `2 * radius` 的超立方体
    ///
    /// 半径搜索用它做剪枝，它是欧氏球的保守外包。
    pub fn around(origin: &[f64], radius: f64) -> Self {
        BoundingBox {
            lower: origin.iter().map(|v| v - radius).collect(),
            upper: origin.iter().map(|v| v + radius).collect(),
        }
    }

    pub fn dims(&self) -> usize {
        self.lower.len()
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// 扩大边界框以包含给定的点
    pub fn fit_point(&mut self, point: &[f64]) -> Result<()> {
        self.check_dims(point.len())?;
        for (i, v) in point.iter().enumerate() {
            self.lower[i] = self.lower[i].min(*v);
            self.upper[i] = self.upper[i].max(*v);
        }
        Ok(())
    }

    /// 扩大边界框以完整包含另一个边界框
    pub fn fit_box(&mut self, other: &BoundingBox) -> Result<()> {
        self.check_dims(other.dims())?;
        for i in 0..self.lower.len() {
            self.lower[i] = self.lower[i].min(other.lower[i]);
            self.upper[i] = self.upper[i].max(other.upper[i]);
        }
        Ok(())
    }

    /// 计算两个边界框的并集
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            lower: self
                .lower
                .iter()
                .zip(&other.lower)
                .map(|(a, b)| a.min(*b))
                .collect(),
            upper: self
                .upper
                .iter()
                .zip(&other.upper)
                .map(|(a, b)| a.max(*b))
                .collect(),
        }
    }

    /// 判断两个边界框是否相交（闭区间语义，边界接触也算相交）
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        (0..self.dims().min(other.dims()))
            .all(|i| self.lower[i] <= other.upper[i] && other.lower[i] <= self.upper[i])
    }

    /// 判断当前边界框是否包含另一个边界框
    pub fn contains(&self, other: &BoundingBox) -> bool {
        (0..self.dims().min(other.dims()))
            .all(|i| self.lower[i] <= other.lower[i] && other.upper[i] <= self.upper[i])
    }

    /// 判断当前边界框是否包含一个点
    pub fn contains_point(&self, point: &[f64]) -> bool {
        self.axes(point).all(|(lo, hi, v)| lo <= v && v <= hi)
    }

    /// 带容差的包含判断，每个轴的容差为 `atol + rtol * |point[i]|`
    pub fn contains_point_within(&self, point: &[f64], rtol: f64, atol: f64) -> bool {
        self.axes(point).all(|(lo, hi, v)| {
            let tol = atol + rtol * v.abs();
            lo - tol <= v && v <= hi + tol
        })
    }

    /// 计算超体积（各轴边长之积）
    pub fn area(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| hi - lo)
            .product()
    }

    /// 各轴边长之和，退化的边界框面积为 0 时用它区分大小
    pub fn margin(&self) -> f64 {
        self.lower.iter().zip(&self.upper).map(|(lo, hi)| hi - lo).sum()
    }

    /// 计算包含给定点之后的面积，不修改自身
    pub fn test_point_enlargement(&self, point: &[f64]) -> f64 {
        self.axes(point).map(|(lo, hi, v)| hi.max(v) - lo.min(v)).product()
    }

    /// 计算包含另一个边界框之后的面积，不修改自身
    pub fn test_box_enlargement(&self, other: &BoundingBox) -> f64 {
        (0..self.dims().min(other.dims()))
            .map(|i| self.upper[i].max(other.upper[i]) - self.lower[i].min(other.lower[i]))
            .product()
    }

    /// 扩大到包含另一个边界框所需的面积增量
    pub fn enlargement(&self, other: &BoundingBox) -> f64 {
        self.test_box_enlargement(other) - self.area()
    }

    /// 按轴配对 (下界, 上界, 坐标)，维度不一致时只比较共有的轴
    fn axes<'a>(&'a self, point: &'a [f64]) -> impl Iterator<Item = (f64, f64, f64)> + 'a {
        self.lower
            .iter()
            .zip(&self.upper)
            .zip(point)
            .map(|((lo, hi), v)| (*lo, *hi, *v))
    }

    fn check_dims(&self, found: usize) -> Result<()> {
        if found != self.dims() {
            return Err(RTreeError::DimensionMismatch {
                expected: self.dims(),
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundingBox({:?}, {:?})", self.lower, self.upper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(lower: &[f64], upper: &[f64]) -> BoundingBox {
        BoundingBox::new(lower.to_vec(), upper.to_vec()).unwrap()
    }

    #[test]
    fn test_bounding_box_creation() {
        let b = bbox(&[0.0, 0.0], &[10.0, 5.0]);
        assert_eq!(b.lower(), &[0.0, 0.0]);
        assert_eq!(b.upper(), &[10.0, 5.0]);
        assert_eq!(b.dims(), 2);

        assert!(matches!(
            BoundingBox::new(vec![1.0, 0.0], vec![0.0, 1.0]),
            Err(RTreeError::InvalidBounds)
        ));
        assert!(matches!(
            BoundingBox::new(vec![0.0], vec![1.0, 1.0]),
            Err(RTreeError::InvalidBounds)
        ));
    }

    #[test]
    fn test_fit_point_and_box() {
        let mut b = BoundingBox::from_point(&[1.0, 1.0]);
        b.fit_point(&[3.0, -1.0]).unwrap();
        assert_eq!(b, bbox(&[1.0, -1.0], &[3.0, 1.0]));

        b.fit_box(&bbox(&[0.0, 0.0], &[2.0, 4.0])).unwrap();
        assert_eq!(b, bbox(&[0.0, -1.0], &[3.0, 4.0]));

        assert!(matches!(
            b.fit_point(&[1.0, 2.0, 3.0]),
            Err(RTreeError::DimensionMismatch { expected: 2, found: 3 })
        ));
        // 失败的 fit 不修改边界框
        assert_eq!(b, bbox(&[0.0, -1.0], &[3.0, 4.0]));
    }

    #[test]
    fn test_area_and_enlargement() {
        let b = bbox(&[0.0, 0.0], &[5.0, 5.0]);
        assert_eq!(b.area(), 25.0);
        assert_eq!(b.test_point_enlargement(&[8.0, 8.0]), 64.0);
        assert_eq!(b.test_point_enlargement(&[1.0, 1.0]), 25.0);
        assert_eq!(b.test_box_enlargement(&bbox(&[3.0, 3.0], &[8.0, 8.0])), 64.0);
        assert_eq!(b.enlargement(&bbox(&[3.0, 3.0], &[8.0, 8.0])), 39.0);
        // test_* 不修改自身
        assert_eq!(b.area(), 25.0);
    }

    #[test]
    fn test_intersects_closed_interval() {
        let a = bbox(&[0.0, 0.0], &[5.0, 5.0]);
        let touching = bbox(&[5.0, 5.0], &[8.0, 8.0]);
        let overlapping = bbox(&[3.0, 3.0], &[8.0, 8.0]);
        let far = bbox(&[10.0, 10.0], &[15.0, 15.0]);
        let one_axis = bbox(&[1.0, 6.0], &[2.0, 7.0]);

        assert!(a.intersects(&touching));
        assert!(a.intersects(&overlapping));
        assert!(!a.intersects(&far));
        assert!(!a.intersects(&one_axis));
        assert!(touching.intersects(&a));
    }

    #[test]
    fn test_contains() {
        let outer = bbox(&[0.0, 0.0], &[10.0, 10.0]);
        assert!(outer.contains(&bbox(&[2.0, 2.0], &[8.0, 8.0])));
        assert!(!outer.contains(&bbox(&[5.0, 5.0], &[15.0, 15.0])));
        assert!(outer.contains_point(&[10.0, 0.0]));
        assert!(!outer.contains_point(&[10.5, 0.0]));
    }

    #[test]
    fn test_contains_point_within_tolerance() {
        let b = bbox(&[0.0, 0.0], &[1.0, 1.0]);
        assert!(!b.contains_point(&[1.000_000_001, 0.5]));
        assert!(b.contains_point_within(&[1.000_000_001, 0.5], 1e-5, 1e-8));
        assert!(!b.contains_point_within(&[1.1, 0.5], 1e-5, 1e-8));
    }

    #[test]
    fn test_point_queries_tolerate_rank_mismatch() {
        let b = bbox(&[0.0, 0.0], &[1.0, 1.0]);
        let longer = [0.5, 0.5, 7.0];

        assert!(b.contains_point(&longer));
        assert!(b.contains_point_within(&longer, 1e-5, 1e-8));
        assert_eq!(b.test_point_enlargement(&longer), 1.0);
        assert!(b.contains_point(&[0.5]));
    }

    #[test]
    fn test_around_and_union() {
        let q = BoundingBox::around(&[1.0, 2.0, 3.0], 0.5);
        assert_eq!(q, bbox(&[0.5, 1.5, 2.5], &[1.5, 2.5, 3.5]));

        let u = bbox(&[0.0, 0.0], &[1.0, 1.0]).union(&bbox(&[2.0, -1.0], &[3.0, 0.0]));
        assert_eq!(u, bbox(&[0.0, -1.0], &[3.0, 1.0]));
        assert_eq!(u.margin(), 5.0);
    }

    #[test]
    fn test_display() {
        let b = bbox(&[0.0, 1.0], &[2.0, 3.0]);
        assert_eq!(b.to_string(), "BoundingBox([0.0, 1.0], [2.0, 3.0])");
    }
}
