//! Page selection
//!
//! A request names pages either as an explicit ordered list of 1-based page
//! numbers or as an inclusive `{start, end?}` range. Resolution against a
//! document's page count yields 0-based indices.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Inclusive page range; `end` defaults to the last page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub start: i64,
    #[serde(default)]
    pub end: Option<i64>,
}

/// Page-picking part of a pipeline request, as received
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionRequest {
    #[serde(default)]
    pub pages: Option<Vec<i64>>,
    #[serde(default)]
    pub range: Option<RangeRequest>,
}

/// A well-formed selection, not yet checked against a page count
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSelection {
    Pages(Vec<i64>),
    Range { start: i64, end: Option<i64> },
}

impl SelectionRequest {
    pub fn pages(pages: Vec<i64>) -> Self {
        Self {
            pages: Some(pages),
            range: None,
        }
    }

    pub fn range(start: i64, end: Option<i64>) -> Self {
        Self {
            pages: None,
            range: Some(RangeRequest { start, end }),
        }
    }

    /// Check the request shape: exactly one of `pages` or `range`
    pub fn selection(&self) -> Result<PageSelection> {
        match (&self.pages, &self.range) {
            (Some(_), Some(_)) => Err(AppError::Validation(
                "Specify either pages or range, not both".to_string(),
            )),
            (None, None) => Err(AppError::Validation(
                "Either pages or range must be specified".to_string(),
            )),
            (Some(pages), None) if pages.is_empty() => Err(AppError::Validation(
                "Page list must not be empty".to_string(),
            )),
            (Some(pages), None) => Ok(PageSelection::Pages(pages.clone())),
            (None, Some(range)) => Ok(PageSelection::Range {
                start: range.start,
                end: range.end,
            }),
        }
    }
}

impl PageSelection {
    /// Resolve to 0-based page indices for a document with `total` pages.
    ///
    /// Explicit lists keep caller order and duplicates; ranges are ascending.
    pub fn resolve(&self, total: usize) -> Result<Vec<usize>> {
        let total = total as i64;

        match self {
            PageSelection::Pages(pages) => {
                let invalid: Vec<String> = pages
                    .iter()
                    .filter(|&&page| page < 1 || page > total)
                    .map(|page| page.to_string())
                    .collect();

                if !invalid.is_empty() {
                    return Err(AppError::Validation(format!(
                        "Invalid page number(s): {} (document has {} pages)",
                        invalid.join(", "),
                        total
                    )));
                }

                Ok(pages.iter().map(|&page| (page - 1) as usize).collect())
            }
            PageSelection::Range { start, end } => {
                let start = *start;
                let end = end.unwrap_or(total);

                if start < 1 || start > total {
                    return Err(AppError::Validation(format!(
                        "Range start {} is outside 1..={}",
                        start, total
                    )));
                }
                if end > total {
                    return Err(AppError::Validation(format!(
                        "Range end {} exceeds page count {}",
                        end, total
                    )));
                }
                if end < start {
                    return Err(AppError::Validation(format!(
                        "Range end {} is before start {}",
                        end, start
                    )));
                }

                Ok((start..=end).map(|page| (page - 1) as usize).collect())
            }
        }
    }
}
