//! 解析器错误处理模块
//!
//! 解析期错误（目标格式、参数）在构建解析器时同步返回；
//! 运行期错误（目录服务不可达、查询失败）上报给消费者并无限重试；
//! `Cancelled` 只用于终止 watch 循环，不会上报。

pub mod code;

pub use code::{ErrorCategory, ErrorCode};

use thiserror::Error;

/// 解析器统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// 目标字符串不是合法的 URI
    #[error("invalid resolver target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("path is missing in target, service name is required")]
    MissingServiceName,

    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("unsupported health parameter value: '{0}'")]
    UnsupportedHealthPolicy(String),

    #[error("unsupported parameter: '{0}'")]
    UnsupportedParameter(String),

    /// 注册表中没有该 scheme 对应的构建器
    #[error("no resolver registered for scheme '{0}'")]
    UnknownResolverScheme(String),

    #[error("failed to build directory client: {0}")]
    ClientBuild(String),

    /// 连接失败、超时等传输层错误
    #[error("directory service unreachable: {0}")]
    DirectoryUnreachable(String),

    /// 目录服务返回非 2xx 状态或无法解码的响应
    #[error("directory query failed (status {status:?}): {message}")]
    DirectoryQueryFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("watch cancelled")]
    Cancelled,

    #[error("service registration failed: {0}")]
    Registration(String),
}

impl ResolverError {
    pub fn invalid_target(target: impl Into<String>, reason: impl Into<String>) -> Self {
        ResolverError::InvalidTarget {
            target: target.into(),
            reason: reason.into(),
        }
    }

    pub fn query_failed(status: Option<u16>, message: impl Into<String>) -> Self {
        ResolverError::DirectoryQueryFailed {
            status,
            message: message.into(),
        }
    }

    /// 获取错误代码
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolverError::InvalidTarget { .. } => ErrorCode::InvalidTarget,
            ResolverError::MissingServiceName => ErrorCode::MissingServiceName,
            ResolverError::UnsupportedScheme(_) => ErrorCode::UnsupportedScheme,
            ResolverError::UnsupportedHealthPolicy(_) => ErrorCode::UnsupportedHealthPolicy,
            ResolverError::UnsupportedParameter(_) => ErrorCode::UnsupportedParameter,
            ResolverError::UnknownResolverScheme(_) => ErrorCode::UnknownResolverScheme,
            ResolverError::ClientBuild(_) => ErrorCode::ClientBuildFailed,
            ResolverError::DirectoryUnreachable(_) => ErrorCode::DirectoryUnreachable,
            ResolverError::DirectoryQueryFailed { .. } => ErrorCode::DirectoryQueryFailed,
            ResolverError::Cancelled => ErrorCode::Cancelled,
            ResolverError::Registration(_) => ErrorCode::RegistrationFailed,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResolverError::Cancelled)
    }
}

impl From<reqwest::Error> for ResolverError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return ResolverError::query_failed(Some(status.as_u16()), err.to_string());
        }
        if err.is_decode() {
            return ResolverError::query_failed(None, err.to_string());
        }
        // 连接、超时、请求发送失败
        ResolverError::DirectoryUnreachable(err.to_string())
    }
}

/// 解析器结果类型
pub type Result<T> = std::result::Result<T, ResolverError>;

/// 基础设施层默认使用的结果类型
pub type InfraResult<T> = anyhow::Result<T>;
