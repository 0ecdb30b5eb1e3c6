use crate::error::{check_point, RTreeError, Result};
use crate::page::{Entries, Entry, PageId, PointEntry};
use crate::rtree::RTree;
use tracing::debug;

/// 从根到目标点的路径
#[derive(Debug)]
pub(crate) struct LeafPath {
    /// 沿途经过的 (父页, 子页槽位)，从根开始
    pub(crate) path: Vec<(PageId, usize)>,
    pub(crate) leaf: PageId,
    /// 目标点在叶子页中的位置
    pub(crate) index: usize,
}

/// 下溢页被摘除后留下的条目，需要挂回到第 `level` 层
struct Orphans<T> {
    level: usize,
    entries: Entries<T>,
}

/// R-tree删除算法实现
impl<T> RTree<T> {
    /// 删除一个与 `point` 在容差范围内相等的点，返回被删除的条目
    ///
    /// 有多个匹配时删除深度优先顺序中的第一个。
    /// 叶子删除后条目数少于 m 时，整页从父页摘除，剩余条目重新插入；
    /// 这个检查沿路径一直向上。最后如果根是只有一个子页的索引页，树降低一层。
    /// 找不到匹配的点时返回 `NotFound`，树保持不变。
    pub fn delete(&mut self, point: &[f64]) -> Result<PointEntry<T>> {
        check_point(point, self.dims())?;

        // D1: 找到包含目标点的叶子
        let found = self.find_leaf(point).ok_or(RTreeError::NotFound)?;

        // D2: 从叶子中删除
        let removed = self[found.leaf]
            .remove_point(found.index)
            .ok_or(RTreeError::NotFound)?;
        self.size -= 1;

        // D3: 向上处理下溢并同步边界框
        let orphans = self.condense_tree(&found.path, found.leaf)?;
        self.reinsert_orphans(orphans)?;

        // D4: 缩短树
        self.shorten_tree();

        Ok(removed)
    }

    /// 查找与 `point` 容差相等的第一个点
    ///
    /// 只下降到（放宽容差后）包含该点的子页中，不修改树。
    pub(crate) fn find_leaf(&self, point: &[f64]) -> Option<LeafPath> {
        let mut path = Vec::new();
        self.find_leaf_recursive(self.root, point, &mut path)
            .map(|(leaf, index)| LeafPath { path, leaf, index })
    }

    fn find_leaf_recursive(
        &self,
        page_id: PageId,
        point: &[f64],
        path: &mut Vec<(PageId, usize)>,
    ) -> Option<(PageId, usize)> {
        match self[page_id].entries() {
            Entries::Leaf(points) => points
                .iter()
                .position(|p| self.is_close(&p.coords, point))
                .map(|index| (page_id, index)),
            Entries::Internal(children) => {
                let (rtol, atol) = (self.config().rtol, self.config().atol);
                for (slot, child) in children.iter().enumerate() {
                    if !child.bbox.contains_point_within(point, rtol, atol) {
                        continue;
                    }
                    path.push((page_id, slot));
                    if let Some(found) = self.find_leaf_recursive(child.page, point, path) {
                        return Some(found);
                    }
                    path.pop();
                }
                None
            }
        }
    }

    /// CondenseTree - 从叶子沿路径向上，摘除条目数不足 m 的页
    ///
    /// 没有下溢的页只同步它在父页中的边界框副本。
    /// 返回的孤儿条目按从下到上的顺序排列。
    fn condense_tree(
        &mut self,
        path: &[(PageId, usize)],
        leaf: PageId,
    ) -> Result<Vec<Orphans<T>>> {
        let min_fill = self.min_entries();
        let mut orphans = Vec::new();
        let mut current = leaf;

        for &(parent, slot) in path.iter().rev() {
            if self[current].len() < min_fill {
                self[parent].remove_child(slot);
                if let Some(mut page) = self.release(current) {
                    debug!(
                        "{} underflowed at level {} with {} entries, detached from {}",
                        current,
                        page.level(),
                        page.len(),
                        parent
                    );
                    orphans.push(Orphans {
                        level: page.level(),
                        entries: page.take_entries(),
                    });
                }
            } else {
                let child = self.child_entry(current)?;
                self[parent].update_child_box(slot, child.bbox);
            }
            current = parent;
        }

        Ok(orphans)
    }

    /// 重新插入孤儿条目，层级高的先插入
    ///
    /// 点回到叶子层，子页挂回到它原来所在的层级，保证所有叶子深度一致。
    fn reinsert_orphans(&mut self, orphans: Vec<Orphans<T>>) -> Result<()> {
        for orphan in orphans.into_iter().rev() {
            debug!(
                "reinserting {} orphaned entries at level {}",
                orphan.entries.len(),
                orphan.level
            );
            match orphan.entries {
                Entries::Leaf(points) => {
                    for point in points {
                        self.insert_entry(Entry::Point(point), 0)?;
                    }
                }
                Entries::Internal(children) => {
                    for child in children {
                        self.insert_entry(Entry::Child(child), orphan.level)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// 根是只有一个子页的索引页时，让子页成为新根
    fn shorten_tree(&mut self) {
        while !self.root().is_leaf() && self.root().len() == 1 {
            let child = self.root().children()[0].page;
            let old_root = self.root;
            self.release(old_root);
            self.root = child;
            debug!(
                "root shrank from {} to {}, height {}",
                old_root,
                child,
                self.height()
            );
        }
    }
}
