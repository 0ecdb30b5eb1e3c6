/// R-tree 错误类型
///
/// 所有错误都是同步返回给直接调用者的，树内部不做任何重试。
/// 除 `NotFound` 之外，其余错误基本都意味着调用方的输入或用法有问题。
#[derive(Debug, thiserror::Error)]
pub enum RTreeError {
    /// 坐标或边界框的维度与树的维度不一致
    #[error("dimension mismatch: expected {expected} dimensions, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// 叶子页与索引页的条目类型混用
    #[error("type mismatch: {expected} page cannot hold a {found} entry")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// 在空页上执行了需要至少一个条目的操作
    #[error("operation requires a non-empty index page")]
    EmptyPage,

    /// 分裂至少需要两个条目
    #[error("split requires at least 2 entries, page has {found}")]
    InsufficientEntries { found: usize },

    /// 删除或查找的点不存在（在容差范围内）
    #[error("point not found")]
    NotFound,

    /// 坐标中包含 NaN 或无穷大
    #[error("coordinate on axis {axis} is not finite")]
    NonFiniteCoordinate { axis: usize },

    /// 搜索半径为负数或 NaN
    #[error("invalid search radius: {0}")]
    InvalidRadius(f64),

    /// 边界框下界大于上界，或上下界维度不一致
    #[error("invalid bounding box bounds")]
    InvalidBounds,

    /// 构造参数不合法
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// 配置文件加载失败
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, RTreeError>;

/// 校验坐标的维度和取值
///
/// 所有公共入口在修改树之前都先调用这个函数，保证失败的操作不会留下部分修改。
pub(crate) fn check_point(point: &[f64], dims: usize) -> Result<()> {
    if point.len() != dims {
        return Err(RTreeError::DimensionMismatch {
            expected: dims,
            found: point.len(),
        });
    }
    match point.iter().position(|v| !v.is_finite()) {
        Some(axis) => Err(RTreeError::NonFiniteCoordinate { axis }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_point() {
        assert!(check_point(&[1.0, 2.0], 2).is_ok());
        assert!(matches!(
            check_point(&[1.0, 2.0, 3.0], 2),
            Err(RTreeError::DimensionMismatch { expected: 2, found: 3 })
        ));
        assert!(matches!(
            check_point(&[1.0, f64::NAN], 2),
            Err(RTreeError::NonFiniteCoordinate { axis: 1 })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = RTreeError::DimensionMismatch {
            expected: 2,
            found: 3,
        };
        assert_eq!(
            err.to_string(),
            "dimension mismatch: expected 2 dimensions, found 3"
        );
        assert_eq!(RTreeError::NotFound.to_string(), "point not found");
    }
}
