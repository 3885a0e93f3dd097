//! Preview page types.

use crate::SearchId;
use serde::{Deserialize, Serialize};

/// One result row of a discovery search.
///
/// Contact fields are withheld by the backend until the row is unlocked; use
/// [`PreviewItem::contact`] rather than reading them directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewItem {
    pub place_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub is_unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

/// Contact data of a row as it may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact<'a> {
    /// Row is locked; render placeholders.
    Masked,
    Revealed {
        phone: Option<&'a str>,
        website: Option<&'a str>,
        email: Option<&'a str>,
    },
}

impl PreviewItem {
    pub fn contact(&self) -> Contact<'_> {
        if !self.is_unlocked {
            return Contact::Masked;
        }
        Contact::Revealed {
            phone: self.phone.as_deref(),
            website: self.website.as_deref(),
            email: self.email.as_deref(),
        }
    }

    /// Address parts joined for display, `None` if all are missing.
    pub fn display_address(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.address, &self.city, &self.state]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .filter(|p| !p.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(", "))
    }
}

/// Page metadata shared by the preview and history listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Response of `GET /leads/google-maps/search/{id}/preview`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub search_id: SearchId,
    #[serde(default)]
    pub items: Vec<PreviewItem>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub unlock_batches: Vec<u64>,
    #[serde(default)]
    pub unique_records: u64,
    #[serde(default)]
    pub unlocked_count: u64,
    #[serde(default)]
    pub available_to_unlock: u64,
    #[serde(default)]
    pub credits_balance: u64,
}

/// A cached page of preview rows.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPage {
    pub search_id: SearchId,
    pub items: Vec<PreviewItem>,
    pub pagination: Pagination,
}

impl From<&PreviewResponse> for PreviewPage {
    fn from(response: &PreviewResponse) -> Self {
        Self {
            search_id: response.search_id,
            items: response.items.clone(),
            pagination: response.pagination,
        }
    }
}
