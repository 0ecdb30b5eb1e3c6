use crate::bounding_box::BoundingBox;
use crate::error::{RTreeError, Result};
use crate::page::{Entries, Page};

/// 节点分裂算法 - 二次分裂(Quadratic Split)
impl<T> Page<T> {
    /// 将当前页分裂为两页
    ///
    /// 当前页原地保留第一组条目，返回的新页（同种类、同层级）持有第二组。
    ///
    /// 1. 选种子：在所有条目对中选出合并边界框面积最大的一对
    /// 2. 其余条目按原顺序逐个分配给扩大量较小的一组；扩大量相同则给条目较少的一组，
    ///    仍相同则给第一组
    /// 3. 如果某一组必须拿走剩下的全部条目才能达到 `min_fill`，就全部分给它
    ///
    /// 条目少于 2 个时返回 `InsufficientEntries`。
    pub fn split(&mut self, min_fill: usize) -> Result<Page<T>> {
        let total = self.len();
        if total < 2 {
            return Err(RTreeError::InsufficientEntries { found: total });
        }
        let min_fill = min_fill.min(total / 2);

        let boxes: Vec<BoundingBox> = (0..total)
            .map(|i| self.entries.bounding_box_at(i))
            .collect();
        let (seed_a, seed_b) = pick_seeds(&boxes);

        let mut to_sibling = vec![false; total];
        to_sibling[seed_b] = true;
        let mut group_a = boxes[seed_a].clone();
        let mut group_b = boxes[seed_b].clone();
        let mut count_a = 1;
        let mut count_b = 1;

        let remaining: Vec<usize> = (0..total)
            .filter(|&i| i != seed_a && i != seed_b)
            .collect();
        for (k, &i) in remaining.iter().enumerate() {
            let left = remaining.len() - k;
            let into_b = if count_a + left <= min_fill {
                false
            } else if count_b + left <= min_fill {
                true
            } else {
                let cost_a = group_a.enlargement(&boxes[i]);
                let cost_b = group_b.enlargement(&boxes[i]);
                if cost_a != cost_b {
                    cost_b < cost_a
                } else {
                    count_b < count_a
                }
            };

            if into_b {
                group_b = group_b.union(&boxes[i]);
                count_b += 1;
            } else {
                group_a = group_a.union(&boxes[i]);
                count_a += 1;
            }
            to_sibling[i] = into_b;
        }

        let mut sibling = self.empty_sibling();
        match self.take_entries() {
            Entries::Leaf(points) => {
                let (keep, moved) = partition(points, &to_sibling);
                self.entries = Entries::Leaf(keep);
                sibling.entries = Entries::Leaf(moved);
            }
            Entries::Internal(children) => {
                let (keep, moved) = partition(children, &to_sibling);
                self.entries = Entries::Internal(keep);
                sibling.entries = Entries::Internal(moved);
            }
        }
        self.recompute_bounds();
        sibling.recompute_bounds();

        Ok(sibling)
    }
}

/// PickSeeds - 选择合并后边界框面积最大的一对条目
///
/// 面积相同（例如共线的点）时选边长和更大的一对，仍相同则取最先遇到的。
pub(crate) fn pick_seeds(boxes: &[BoundingBox]) -> (usize, usize) {
    let mut best_pair = (0, 1);
    let mut max_area = f64::NEG_INFINITY;
    let mut max_margin = f64::NEG_INFINITY;

    for i in 0..boxes.len() {
        for j in (i + 1)..boxes.len() {
            let combined = boxes[i].union(&boxes[j]);
            let area = combined.area();
            let margin = combined.margin();
            if area > max_area || (area == max_area && margin > max_margin) {
                max_area = area;
                max_margin = margin;
                best_pair = (i, j);
            }
        }
    }

    best_pair
}

/// 按标记把条目拆成两组，组内保持原有顺序
fn partition<E>(items: Vec<E>, to_sibling: &[bool]) -> (Vec<E>, Vec<E>) {
    let mut keep = Vec::new();
    let mut moved = Vec::new();
    for (item, &into_b) in items.into_iter().zip(to_sibling) {
        if into_b {
            moved.push(item);
        } else {
            keep.push(item);
        }
    }
    (keep, moved)
}
