/// Failure reported by (or while talking to) the hosted auth/database service.
///
/// The portals never surface these to end users directly; they are logged and
/// collapsed into a fail-closed decision by the security layer.
#[derive(Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service could not be reached (network failure, timeout, outage).
    Unavailable(String),
    /// The service answered but refused the request (policy, bad credentials).
    Rejected(String),
    /// The service answered with a payload that could not be interpreted.
    Malformed(String),
}

impl ServiceError {
    /// The detail message carried by every variant.
    pub fn message(&self) -> &str {
        match self {
            ServiceError::Unavailable(msg)
            | ServiceError::Rejected(msg)
            | ServiceError::Malformed(msg) => msg,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Unavailable(msg) => write!(f, "Service unavailable: {msg}"),
            ServiceError::Rejected(msg) => write!(f, "Service rejected request: {msg}"),
            ServiceError::Malformed(msg) => write!(f, "Malformed service response: {msg}"),
        }
    }
}

impl std::fmt::Debug for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ServiceError {}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Unavailable(err.to_string())
    }
}

impl From<serde_yaml::Error> for ServiceError {
    fn from(err: serde_yaml::Error) -> Self {
        ServiceError::Malformed(err.to_string())
    }
}

/// Generate `From<E> for ServiceError` implementations that map client error
/// types to a specific `ServiceError` variant.
///
/// # Example
///
/// ```ignore
/// campus_core::map_service_error! {
///     reqwest::Error => Unavailable,
///     serde_json::Error => Malformed,
/// }
/// ```
#[macro_export]
macro_rules! map_service_error {
    ( $( $err_ty:ty => $variant:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::ServiceError {
                fn from(err: $err_ty) -> Self {
                    $crate::ServiceError::$variant(err.to_string())
                }
            }
        )*
    };
}
