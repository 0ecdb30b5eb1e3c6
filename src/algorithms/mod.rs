// 算法模块声明文件
// 每个子模块为 RTree / Page 补充一组 impl

pub mod debug;
pub mod delete;
pub mod insert;
pub mod persistence;
pub mod search;
pub mod split;
