//! 错误代码和错误类别定义

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
///
/// 错误代码按类别分组，每个类别占用1000个代码范围：
/// - 1000-1999: 解析目标相关错误
/// - 2000-2999: 目录服务（Consul）相关错误
/// - 3000-3999: 生命周期相关错误
/// - 4000-4999: 服务注册相关错误
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 解析目标相关错误 (1000-1999)
    // ============================================================
    InvalidTarget = 1000,
    MissingServiceName = 1001,
    UnsupportedScheme = 1002,
    UnsupportedHealthPolicy = 1003,
    UnsupportedParameter = 1004,
    UnknownResolverScheme = 1005,

    // ============================================================
    // 目录服务相关错误 (2000-2999)
    // ============================================================
    DirectoryUnreachable = 2000,
    DirectoryQueryFailed = 2001,
    ClientBuildFailed = 2002,

    // ============================================================
    // 生命周期相关错误 (3000-3999)
    // ============================================================
    Cancelled = 3000,

    // ============================================================
    // 服务注册相关错误 (4000-4999)
    // ============================================================
    RegistrationFailed = 4000,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 从数字值创建错误代码
    pub fn from_u32(code: u32) -> Option<Self> {
        match code {
            1000 => Some(ErrorCode::InvalidTarget),
            1001 => Some(ErrorCode::MissingServiceName),
            1002 => Some(ErrorCode::UnsupportedScheme),
            1003 => Some(ErrorCode::UnsupportedHealthPolicy),
            1004 => Some(ErrorCode::UnsupportedParameter),
            1005 => Some(ErrorCode::UnknownResolverScheme),
            2000 => Some(ErrorCode::DirectoryUnreachable),
            2001 => Some(ErrorCode::DirectoryQueryFailed),
            2002 => Some(ErrorCode::ClientBuildFailed),
            3000 => Some(ErrorCode::Cancelled),
            4000 => Some(ErrorCode::RegistrationFailed),
            _ => None,
        }
    }

    /// 获取错误代码的英文标识符
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidTarget => "INVALID_TARGET",
            ErrorCode::MissingServiceName => "MISSING_SERVICE_NAME",
            ErrorCode::UnsupportedScheme => "UNSUPPORTED_SCHEME",
            ErrorCode::UnsupportedHealthPolicy => "UNSUPPORTED_HEALTH_POLICY",
            ErrorCode::UnsupportedParameter => "UNSUPPORTED_PARAMETER",
            ErrorCode::UnknownResolverScheme => "UNKNOWN_RESOLVER_SCHEME",
            ErrorCode::DirectoryUnreachable => "DIRECTORY_UNREACHABLE",
            ErrorCode::DirectoryQueryFailed => "DIRECTORY_QUERY_FAILED",
            ErrorCode::ClientBuildFailed => "CLIENT_BUILD_FAILED",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::RegistrationFailed => "REGISTRATION_FAILED",
        }
    }

    /// 获取错误代码的类别（用于错误分类）
    pub fn category(&self) -> ErrorCategory {
        match self.as_u32() {
            1000..=1999 => ErrorCategory::Target,
            2000..=2999 => ErrorCategory::Directory,
            3000..=3999 => ErrorCategory::Lifecycle,
            _ => ErrorCategory::Registration,
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 只有运行期的目录服务错误可重试；解析错误在构建时同步返回。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::DirectoryUnreachable | ErrorCode::DirectoryQueryFailed
        )
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Target,
    Directory,
    Lifecycle,
    Registration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Target => write!(f, "TARGET"),
            ErrorCategory::Directory => write!(f, "DIRECTORY"),
            ErrorCategory::Lifecycle => write!(f, "LIFECYCLE"),
            ErrorCategory::Registration => write!(f, "REGISTRATION"),
        }
    }
}
