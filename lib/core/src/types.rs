use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Largest page size any listing endpoint will serve.
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-indexed pagination parameters shared by all list/query operations.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    /// Page number, starting at 1.
    #[serde(default = "default_page")]
    pub page: u32,

    /// Items per page (1..=100).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    10
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageParams {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Reject out-of-range parameters before they reach storage.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.page < 1 {
            return Err(ServiceError::Validation("page must be >= 1".into()));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(ServiceError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Result wrapper for list operations.
///
/// `total` is the size of the unpaginated filtered set, so clients can
/// compute the page count.
#[derive(Debug, Clone, Serialize)]
pub struct ListResult<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string().replace('-', "")
}

/// Get the current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_id() {
        let id = new_id();
        assert_eq!(id.len(), 32);
        assert!(!id.contains('-'));
    }

    #[test]
    fn test_now_rfc3339() {
        let ts = now_rfc3339();
        assert!(ts.contains('T'));
    }

    #[test]
    fn page_params_defaults() {
        let p: PageParams = serde_json::from_str("{}").unwrap();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 10);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn page_params_bounds() {
        assert!(PageParams::new(0, 10).validate().is_err());
        assert!(PageParams::new(1, 0).validate().is_err());
        assert!(PageParams::new(1, 101).validate().is_err());
        assert!(PageParams::new(1, 100).validate().is_ok());
    }
}
