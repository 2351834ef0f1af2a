//! Preview image lookup: public API first, page markup as fallback.

use log::{debug, warn};
use scraper::{Html, Selector};
use serde_json::Value;

use crate::http_fetcher::ListingFetcher;
use crate::json_tree::JsonPath;
use crate::source_ref::SourceReference;

const MODELS_API_BASE_URL: &str = "https://civitai.com/api/v1/models";
const IMAGE_HOST: &str = "image.civitai.com";
const EDGE_IMAGE_CLASS_MARKER: &str = "EdgeImage_image__";
const IMAGE_URL_KEYS: [&str; 3] = ["url", "urlSmall", "urlThumbnail"];

/// Preview lookup strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStrategy {
    Api,
    Markup,
}

pub const PREVIEW_STRATEGIES: [PreviewStrategy; 2] = [PreviewStrategy::Api, PreviewStrategy::Markup];

/// Inputs shared by every strategy.
pub struct PreviewContext<'a> {
    pub source: SourceReference,
    pub page: &'a str,
    pub fetcher: &'a dyn ListingFetcher,
}

impl PreviewStrategy {
    pub fn resolve(self, context: &PreviewContext<'_>) -> Option<String> {
        match self {
            Self::Api => preview_from_api(context.fetcher, context.source),
            Self::Markup => preview_from_markup(context.page),
        }
    }
}

/// Tries each strategy in order and keeps the first URL found.
pub fn resolve_preview(context: &PreviewContext<'_>) -> Option<String> {
    PREVIEW_STRATEGIES.into_iter().find_map(|strategy| {
        let found = strategy.resolve(context);
        if found.is_none() {
            debug!("Preview resolver: {strategy:?} strategy found nothing");
        }
        found
    })
}

pub fn models_api_url(model_id: u64) -> String {
    format!("{MODELS_API_BASE_URL}/{model_id}")
}

fn preview_from_api(fetcher: &dyn ListingFetcher, source: SourceReference) -> Option<String> {
    let model_id = source.model_id?;
    let payload = match fetcher.fetch_json(&models_api_url(model_id)) {
        Ok(payload) => payload,
        Err(reason) => {
            warn!("Preview resolver: model API call failed: {reason}");
            return None;
        }
    };
    first_image_url(&payload, source.version_id)
}

/// Picks the requested version (or the first one) and its first image URL.
pub fn first_image_url(payload: &Value, version_id: Option<u64>) -> Option<String> {
    let versions = JsonPath::new(payload).key("modelVersions").array()?;
    let requested = version_id.and_then(|target_id| {
        versions.iter().find(|version| {
            JsonPath::new(version)
                .key("id")
                .int()
                .is_some_and(|id| u64::try_from(id).ok() == Some(target_id))
        })
    });
    let chosen = requested.or_else(|| versions.first())?;
    let first_image = JsonPath::new(chosen).key("images").index(0);
    IMAGE_URL_KEYS
        .into_iter()
        .find_map(|key| first_image.key(key).truthy_text())
        .filter(|url| !url.is_empty())
}

/// Scans `<img>` elements for a platform-hosted preview.
///
/// An image carrying the edge-image class wins; otherwise the first image
/// served from the image host is used.
pub fn preview_from_markup(page: &str) -> Option<String> {
    let selector = Selector::parse("img").ok()?;
    let document = Html::parse_document(page);
    let hosted: Vec<(String, bool)> = document
        .select(&selector)
        .filter_map(|img| {
            let src = img.value().attr("src")?;
            if !src.contains(IMAGE_HOST) {
                return None;
            }
            let classes = img.value().classes().collect::<Vec<_>>().join(" ");
            Some((src.to_string(), classes.contains(EDGE_IMAGE_CLASS_MARKER)))
        })
        .collect();

    hosted
        .iter()
        .find(|(_, has_edge_class)| *has_edge_class)
        .or_else(|| hosted.first())
        .map(|(src, _)| src.clone())
}

#[cfg(test)]
mod tests {
    use super::{
        first_image_url, preview_from_markup, resolve_preview, PreviewContext, PREVIEW_STRATEGIES,
        PreviewStrategy,
    };
    use crate::http_fetcher::ListingFetcher;
    use crate::source_ref::SourceReference;
    use serde_json::{json, Value};

    struct ApiFetcher(Result<Value, String>);

    impl ListingFetcher for ApiFetcher {
        fn fetch_text(&self, _url: &str) -> Result<String, String> {
            Err("unused".to_string())
        }
        fn fetch_json(&self, url: &str) -> Result<Value, String> {
            assert_eq!(url, "https://civitai.com/api/v1/models/5");
            self.0.clone()
        }
        fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, String> {
            Err("unused".to_string())
        }
        fn probe_filename(&self, _url: &str) -> Result<Option<String>, String> {
            Ok(None)
        }
    }

    const MARKUP: &str = r#"<html><body>
        <img src="https://cdn.example.com/logo.png" class="EdgeImage_image__x">
        <img src="https://image.civitai.com/abc/plain.jpeg" class="thumb">
        <img src="https://image.civitai.com/abc/edge.jpeg" class="mantine EdgeImage_image__iH4_q">
    </body></html>"#;

    #[test]
    fn test_strategy_order_is_api_then_markup() {
        assert_eq!(
            PREVIEW_STRATEGIES,
            [PreviewStrategy::Api, PreviewStrategy::Markup]
        );
    }

    #[test]
    fn test_markup_prefers_edge_image_class_on_image_host() {
        assert_eq!(
            preview_from_markup(MARKUP).as_deref(),
            Some("https://image.civitai.com/abc/edge.jpeg")
        );
    }

    #[test]
    fn test_markup_falls_back_to_first_hosted_image() {
        let page = r#"<img src="/local.png"><img src="https://image.civitai.com/1.jpeg"><img src="https://image.civitai.com/2.jpeg">"#;
        assert_eq!(
            preview_from_markup(page).as_deref(),
            Some("https://image.civitai.com/1.jpeg")
        );
        assert_eq!(preview_from_markup("<p>no images</p>"), None);
    }

    #[test]
    fn test_api_payload_selects_requested_version_and_url_fallbacks() {
        let payload = json!({"modelVersions": [
            {"id": 1, "images": [{"url": "https://image.civitai.com/first.jpeg"}]},
            {"id": 2, "images": [{"url": "", "urlSmall": "https://image.civitai.com/small.jpeg"}]}
        ]});
        assert_eq!(
            first_image_url(&payload, Some(2)).as_deref(),
            Some("https://image.civitai.com/small.jpeg")
        );
        assert_eq!(
            first_image_url(&payload, Some(404)).as_deref(),
            Some("https://image.civitai.com/first.jpeg")
        );
        assert_eq!(
            first_image_url(&payload, None).as_deref(),
            Some("https://image.civitai.com/first.jpeg")
        );
    }

    #[test]
    fn test_api_payload_without_images_yields_none() {
        assert_eq!(first_image_url(&json!({"modelVersions": [{"id": 1, "images": []}]}), None), None);
        assert_eq!(first_image_url(&json!({"modelVersions": []}), None), None);
        assert_eq!(first_image_url(&json!([1, 2]), None), None);
    }

    #[test]
    fn test_resolve_preview_uses_api_before_markup() {
        let fetcher = ApiFetcher(Ok(json!({"modelVersions": [
            {"id": 1, "images": [{"urlThumbnail": "https://image.civitai.com/thumb.jpeg"}]}
        ]})));
        let context = PreviewContext {
            source: SourceReference {
                model_id: Some(5),
                version_id: None,
            },
            page: MARKUP,
            fetcher: &fetcher,
        };
        assert_eq!(
            resolve_preview(&context).as_deref(),
            Some("https://image.civitai.com/thumb.jpeg")
        );
    }

    #[test]
    fn test_resolve_preview_falls_back_to_markup_when_api_fails() {
        let fetcher = ApiFetcher(Err("HTTP 503".to_string()));
        let context = PreviewContext {
            source: SourceReference {
                model_id: Some(5),
                version_id: Some(9),
            },
            page: MARKUP,
            fetcher: &fetcher,
        };
        assert_eq!(
            resolve_preview(&context).as_deref(),
            Some("https://image.civitai.com/abc/edge.jpeg")
        );
    }

    #[test]
    fn test_resolve_preview_without_model_id_skips_api() {
        let fetcher = ApiFetcher(Err("should not be called".to_string()));
        let context = PreviewContext {
            source: SourceReference::default(),
            page: "",
            fetcher: &fetcher,
        };
        assert_eq!(resolve_preview(&context), None);
    }
}
