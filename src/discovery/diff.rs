//! 地址集合比较

use crate::discovery::instance::ResolvedAddress;

/// 比较两个有序地址列表是否相同
///
/// `None` 表示尚未推送过任何地址，它和任何已有列表（包括空列表）都不相等，
/// 这样第一次成功查询即使结果为空也会推送一次，让消费者知道解析已经完成。
pub fn addresses_equal(a: Option<&[ResolvedAddress]>, b: Option<&[ResolvedAddress]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y),
        _ => false,
    }
}
