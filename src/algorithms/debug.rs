use crate::bounding_box::BoundingBox;
use crate::page::{Entries, PageId};
use crate::rtree::RTree;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// 树的结构统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeStats {
    /// 点的总数
    pub size: usize,
    pub height: usize,
    /// 从根可达的页数
    pub pages: usize,
    pub leaf_pages: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} points, height {}, {} pages ({} leaves)",
            self.size, self.height, self.pages, self.leaf_pages
        )
    }
}

/// 校验过程中的累计状态
#[derive(Default)]
struct VerifyState {
    visited: HashSet<PageId>,
    points: usize,
}

/// R-tree调试功能实现
impl<T> RTree<T> {
    /// 校验整棵树的结构不变量
    ///
    /// 检查内容：
    /// - 层级从根逐层减一，叶子页层级为 0，所有叶子深度相同
    /// - 每页的边界框恰好等于其条目的并集，索引条目缓存的边界框与子页一致
    /// - 非根页条目数在 [m, M] 之间；根页不超过 M，索引根至少有两个子页
    /// - 点数与 `len()` 一致，页表中没有不可达的页
    /// - 空闲槽位列表恰好覆盖页表中的空槽位，没有重复
    ///
    /// 返回第一个被破坏的不变量的描述。
    pub fn verify(&self) -> Result<(), String> {
        self.config().validate().map_err(|e| e.to_string())?;
        self.check_free_list()?;

        let root_level = self
            .page(self.root)
            .ok_or_else(|| format!("root {} is dangling", self.root))?
            .level();
        let mut state = VerifyState::default();
        self.verify_page(self.root, root_level, true, &mut state)?;

        if state.points != self.len() {
            return Err(format!(
                "size is {} but {} points are reachable",
                self.len(),
                state.points
            ));
        }
        if state.visited.len() != self.live_pages() {
            return Err(format!(
                "{} pages are allocated but only {} are reachable",
                self.live_pages(),
                state.visited.len()
            ));
        }
        Ok(())
    }

    /// 递归校验一页，返回按条目重新计算出的边界框
    fn verify_page(
        &self,
        id: PageId,
        level: usize,
        is_root: bool,
        state: &mut VerifyState,
    ) -> Result<Option<BoundingBox>, String> {
        let page = self.page(id).ok_or_else(|| format!("{} is dangling", id))?;
        if !state.visited.insert(id) {
            return Err(format!("{} is reachable more than once", id));
        }
        if page.level() != level {
            return Err(format!(
                "{} has level {}, expected {}",
                id,
                page.level(),
                level
            ));
        }
        if page.is_leaf() != (level == 0) {
            return Err(format!("{} at level {} has the wrong kind", id, level));
        }
        if page.dims() != self.dims() {
            return Err(format!("{} has {} dimensions", id, page.dims()));
        }

        let len = page.len();
        if len > self.max_entries() {
            return Err(format!("{} overflows with {} entries", id, len));
        }
        if !is_root && len < self.min_entries() {
            return Err(format!("{} underflows with {} entries", id, len));
        }
        if is_root && !page.is_leaf() && len < 2 {
            return Err(format!("index root {} has only {} child", id, len));
        }

        let mut union: Option<BoundingBox> = None;
        let mut fit = |bbox: BoundingBox| {
            union = Some(match union.take() {
                Some(acc) => acc.union(&bbox),
                None => bbox,
            });
        };

        match page.entries() {
            Entries::Leaf(points) => {
                for p in points {
                    if p.coords.len() != self.dims() {
                        return Err(format!("{} holds a point of wrong dimension", id));
                    }
                    fit(BoundingBox::from_point(&p.coords));
                }
                state.points += points.len();
            }
            Entries::Internal(children) => {
                for child in children {
                    let actual = self.verify_page(child.page, level - 1, false, state)?;
                    if actual.as_ref() != Some(&child.bbox) {
                        return Err(format!(
                            "{} caches a stale box for {}: {} vs {:?}",
                            id, child.page, child.bbox, actual
                        ));
                    }
                    fit(child.bbox.clone());
                }
            }
        }

        if page.bounding_box() != union.as_ref() {
            return Err(format!(
                "{} box {:?} is not the tight union {:?}",
                id,
                page.bounding_box(),
                union
            ));
        }
        Ok(union)
    }

    /// 统计从根可达的页
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats {
            size: self.len(),
            height: self.height(),
            pages: 0,
            leaf_pages: 0,
        };

        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let page = &self[id];
            stats.pages += 1;
            if page.is_leaf() {
                stats.leaf_pages += 1;
            }
            stack.extend(page.children().iter().map(|c| c.page));
        }
        stats
    }

    /// 通过 tracing 输出完整的树结构，用于调试
    pub fn print_tree_structure_debug(&self)
    where
        T: fmt::Debug,
    {
        fn print_page<T: fmt::Debug>(rtree: &RTree<T>, id: PageId, depth: usize) {
            let indent = "  ".repeat(depth);
            let page = &rtree[id];
            match page.bounding_box() {
                Some(bbox) => debug!(
                    "{}{} (level={}, {} entries, {})",
                    indent,
                    id,
                    page.level(),
                    page.len(),
                    bbox
                ),
                None => debug!("{}{} (level={}, empty)", indent, id, page.level()),
            }

            match page.entries() {
                Entries::Leaf(points) => {
                    for (i, p) in points.iter().enumerate() {
                        debug!("{}  [{}] {:?} -> {:?}", indent, i, p.coords, p.payload);
                    }
                }
                Entries::Internal(children) => {
                    for child in children {
                        print_page(rtree, child.page, depth + 1);
                    }
                }
            }
        }

        debug!("=== R-tree Structure Debug ({}) ===", self.stats());
        print_page(self, self.root, 0);
        debug!("=== End Debug ===");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ChildEntry, Entry, Page, PointEntry};

    fn sample_tree() -> RTree<u32> {
        let mut rtree = RTree::new(3, 2).unwrap();
        for i in 0..25u32 {
            let x = (i % 5) as f64;
            let y = (i / 5) as f64;
            rtree.insert(&[x, y], i).unwrap();
        }
        rtree
    }

    #[test]
    fn test_verify_accepts_valid_trees() {
        let empty: RTree<u32> = RTree::new(4, 2).unwrap();
        assert!(empty.verify().is_ok());
        assert!(sample_tree().verify().is_ok());
    }

    #[test]
    fn test_stats() {
        let empty: RTree<u32> = RTree::new(4, 2).unwrap();
        assert_eq!(
            empty.stats(),
            TreeStats {
                size: 0,
                height: 1,
                pages: 1,
                leaf_pages: 1
            }
        );

        let rtree = sample_tree();
        let stats = rtree.stats();
        assert_eq!(stats.size, 25);
        assert_eq!(stats.height, rtree.height());
        assert!(stats.leaf_pages >= 25 / 3);
        assert!(stats.pages > stats.leaf_pages);
        assert!(stats.to_string().starts_with("25 points"));
    }

    #[test]
    fn test_verify_detects_stale_child_box() {
        let mut rtree = sample_tree();
        let root = rtree.root_id();
        let first = rtree[root].children()[0].page;
        let wrong = BoundingBox::new(vec![-1.0, -1.0], vec![0.0, 0.0]).unwrap();
        if let Entries::Internal(children) = &mut rtree[root].entries {
            children[0].bbox = wrong;
        }

        let err = rtree.verify().unwrap_err();
        assert!(err.contains("stale"), "{}", err);
        assert!(err.contains(&first.to_string()), "{}", err);
    }

    #[test]
    fn test_verify_detects_wrong_size() {
        let mut rtree = sample_tree();
        rtree.size += 1;
        assert!(rtree.verify().unwrap_err().contains("size"));
    }

    #[test]
    fn test_verify_detects_underflow_and_leaks() {
        let mut rtree: RTree<u32> = RTree::new(4, 2).unwrap();
        let mut leaf = Page::new_leaf(2);
        leaf.add(Entry::Point(PointEntry {
            coords: vec![1.0, 1.0],
            payload: 7,
        }))
        .unwrap();
        let bbox = leaf.bounding_box().cloned().unwrap();
        let a = rtree.alloc(leaf.clone());
        let b = rtree.alloc(leaf);

        let mut root = Page::new_index(2, 1);
        for page in [a, b] {
            root.add(Entry::Child(ChildEntry {
                bbox: bbox.clone(),
                page,
            }))
            .unwrap();
        }
        let old_root = rtree.root_id();
        rtree.root = rtree.alloc(root);
        rtree.size = 2;

        // 两个叶子都只有一个点，低于 m = 2
        assert!(rtree.verify().unwrap_err().contains("underflows"));

        rtree.size = 0;
        rtree.root = old_root;
        assert!(rtree.verify().unwrap_err().contains("reachable"));
    }

    #[test]
    fn test_print_tree_structure_debug_walks_every_page() {
        // 没有安装 subscriber 时只是遍历，不应 panic
        sample_tree().print_tree_structure_debug();
        RTree::<u32>::new(4, 2).unwrap().print_tree_structure_debug();
    }
}
