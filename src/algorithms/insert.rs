use crate::error::{check_point, Result};
use crate::page::{ChildEntry, Entry, Page, PageId, PointEntry};
use crate::rtree::RTree;
use tracing::{debug, trace};

/// 插入操作相关算法
impl<T> RTree<T> {
    /// 插入一个点及其负载
    ///
    /// 从根开始逐层选择扩大最小的子页下降到叶子，插入后沿原路返回，
    /// 溢出的页就地分裂并把新兄弟页挂到父页上；根页溢出时长出新根。
    /// 坐标维度不符或含有非有限值时返回错误，树保持不变。
    pub fn insert(&mut self, point: &[f64], payload: T) -> Result<()> {
        check_point(point, self.dims())?;

        let entry = Entry::Point(PointEntry {
            coords: point.to_vec(),
            payload,
        });
        self.insert_entry(entry, 0)?;
        self.size += 1;
        Ok(())
    }

    /// 把条目插入到第 `level` 层的页中
    ///
    /// 点条目插入叶子层（0），删除时被摘下的子页按原层级重新挂回。
    pub(crate) fn insert_entry(&mut self, entry: Entry<T>, level: usize) -> Result<()> {
        let root = self.root;
        if let Some(sibling) = self.insert_recursive(root, entry, level)? {
            self.grow_root(sibling)?;
        }
        Ok(())
    }

    /// 递归插入，返回本页分裂出的兄弟页（如果有）
    fn insert_recursive(
        &mut self,
        page_id: PageId,
        entry: Entry<T>,
        level: usize,
    ) -> Result<Option<ChildEntry>> {
        if self[page_id].level() == level {
            self[page_id].add(entry)?;
        } else {
            let chosen = self[page_id].choose_subtree(&entry.bounding_box())?;
            trace!("descend {} -> {} (slot {})", page_id, chosen.page, chosen.slot);

            let split = self.insert_recursive(chosen.page, entry, level)?;

            // 子页只可能变大或因分裂而缩小，两种情况都需要同步副本
            let child = self.child_entry(chosen.page)?;
            let page = &mut self[page_id];
            page.update_child_box(chosen.slot, child.bbox);
            if let Some(sibling) = split {
                page.add(Entry::Child(sibling))?;
            }
        }

        self.split_if_overflowing(page_id)
    }

    /// 页的条目数超过 M 时分裂，新兄弟页登记到页表中
    fn split_if_overflowing(&mut self, page_id: PageId) -> Result<Option<ChildEntry>> {
        if self[page_id].len() <= self.max_entries() {
            return Ok(None);
        }

        let min_fill = self.min_entries();
        let sibling = self[page_id].split(min_fill)?;
        let sibling_id = self.alloc(sibling);
        debug!(
            "split {} at level {}: {} + {} entries",
            page_id,
            self[page_id].level(),
            self[page_id].len(),
            self[sibling_id].len()
        );

        self.child_entry(sibling_id).map(Some)
    }

    /// 根页分裂后创建新根，这是树长高的唯一途径
    fn grow_root(&mut self, sibling: ChildEntry) -> Result<()> {
        let old_root = self.child_entry(self.root)?;
        let level = self[self.root].level() + 1;

        let mut new_root = Page::new_index(self.dims(), level);
        new_root.add(Entry::Child(old_root))?;
        new_root.add(Entry::Child(sibling))?;
        self.root = self.alloc(new_root);

        debug!("root grew to {}, height {}", self.root, level + 1);
        Ok(())
    }
}
