//! End-to-end listing resolution: page URL in, report fields and preview out.

use std::thread;

use log::{debug, info, warn};

use crate::field_normalizer::{normalize_fields, ResolvedFields};
use crate::http_fetcher::ListingFetcher;
use crate::next_data::extract_embedded_state;
use crate::preview_resolver::{resolve_preview, PreviewContext};
use crate::source_ref::{looks_like_http_url, SourceReference};
use crate::trpc_query::find_model_record;
use crate::version_select::select_version;

pub const FAILURE_MESSAGE: &str = "failed to fetch data. please check the url and try again.";

/// Everything one run produces. Both parts degrade independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDetails {
    pub fields: ResolvedFields,
    pub preview_url: Option<String>,
    /// False when the listing page itself could not be fetched.
    pub page_fetched: bool,
}

/// Rejects input that is not an HTTP(S) URL before any request is made.
pub fn validate_listing_url(url: &str) -> Result<&str, String> {
    let trimmed = url.trim();
    if looks_like_http_url(trimmed) {
        Ok(trimmed)
    } else {
        Err(FAILURE_MESSAGE.to_string())
    }
}

/// Field branch: embedded state -> model record -> version -> fields.
pub fn resolve_fields(
    page: &str,
    source: SourceReference,
    fetcher: &dyn ListingFetcher,
) -> ResolvedFields {
    let Some(state) = extract_embedded_state(page) else {
        return ResolvedFields::default();
    };
    let model = find_model_record(&state, source.model_id);
    let version = model.and_then(|model| select_version(model, source.version_id));
    if model.is_some() && version.is_none() {
        debug!("Pipeline: model record has no usable version");
    }
    normalize_fields(model, version, fetcher)
}

/// Resolves a listing page. Never fails: every stage degrades to empty data.
pub fn resolve_listing(url: &str, fetcher: &dyn ListingFetcher) -> ListingDetails {
    let source = SourceReference::parse(url);
    match fetcher.fetch_text(url) {
        Ok(page) => ListingDetails {
            page_fetched: true,
            ..resolve_fetched_listing(&page, source, fetcher)
        },
        Err(reason) => {
            warn!("Pipeline: page fetch failed, continuing without markup: {reason}");
            resolve_fetched_listing("", source, fetcher)
        }
    }
}

/// Runs both branches over page markup, in parallel. `page_fetched` is left
/// for the caller to set.
pub fn resolve_fetched_listing(
    page: &str,
    source: SourceReference,
    fetcher: &dyn ListingFetcher,
) -> ListingDetails {
    let (fields, preview_url) = thread::scope(|scope| {
        let preview_branch = scope.spawn(|| {
            resolve_preview(&PreviewContext {
                source,
                page,
                fetcher,
            })
        });
        let fields = resolve_fields(page, source, fetcher);
        let preview_url = preview_branch.join().unwrap_or_else(|_| {
            warn!("Pipeline: preview branch panicked, continuing without preview");
            None
        });
        (fields, preview_url)
    });

    info!(
        "Pipeline: resolved model={:?} version={:?} file='{}' preview={}",
        source.model_id,
        source.version_id,
        fields.file_name,
        preview_url.as_deref().unwrap_or("<none>")
    );
    ListingDetails {
        fields,
        preview_url,
        page_fetched: false,
    }
}
