//! Result type alias for Carelink

use super::errors::CarelinkError;

/// Result type alias for Carelink operations
///
/// # Examples
///
/// ```
/// use carelink::domain::result::Result;
/// use carelink::domain::errors::CarelinkError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(CarelinkError::Validation("Invalid input".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, CarelinkError>;
