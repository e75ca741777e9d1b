//! Paginated list calls.

use serde::de::DeserializeOwned;

use common::errors::AppResult;
use common::models::{NamedItem, Page};

use crate::http::FabricHttp;

impl FabricHttp {
    /// Fetches every page starting at `url`, following `continuationUri`
    /// until it is absent or empty, and concatenates the values in order.
    pub async fn list_all<T: DeserializeOwned>(&self, url: &str, token: &str) -> AppResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0usize;

        while let Some(current) = next.take() {
            let page: Page<T> = self.get_json(&current, token).await?;
            pages += 1;
            next = page
                .next_uri()
                .filter(|uri| *uri != current)
                .map(str::to_string);
            items.extend(page.value);
        }

        tracing::debug!(url, pages, count = items.len(), "listed all pages");
        Ok(items)
    }

    /// Lists everything at `url` and returns the item matching `id_or_name`.
    pub async fn find<T>(&self, url: &str, token: &str, id_or_name: &str) -> AppResult<Option<T>>
    where
        T: DeserializeOwned + NamedItem,
    {
        Ok(self
            .list_all::<T>(url, token)
            .await?
            .into_iter()
            .find(|item| item.matches(id_or_name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use common::models::FabricItem;

    use crate::testing::ScriptedTransport;
    use crate::transport::PlatformResponse;

    #[tokio::test]
    async fn test_pages_are_concatenated_in_order() {
        let transport = Arc::new(ScriptedTransport::with_responses([
            PlatformResponse::new(
                200,
                r#"{"value":[{"id":"1","displayName":"a"},{"id":"2","displayName":"b"}],
                    "continuationToken":"t1","continuationUri":"https://api/v1/items?continuationToken=t1"}"#,
            ),
            PlatformResponse::new(
                200,
                r#"{"value":[{"id":"3","displayName":"c"}],
                    "continuationUri":"https://api/v1/items?continuationToken=t2"}"#,
            ),
            PlatformResponse::new(200, r#"{"value":[{"id":"4","displayName":"d"}],"continuationUri":null}"#),
        ]));
        let http = FabricHttp::new(transport.clone());

        let items: Vec<FabricItem> = http.list_all("https://api/v1/items", "t").await.unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4"]);
        let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            [
                "https://api/v1/items",
                "https://api/v1/items?continuationToken=t1",
                "https://api/v1/items?continuationToken=t2",
            ]
        );
    }

    #[tokio::test]
    async fn test_find_matches_id_or_display_name() {
        let body = r#"{"value":[{"id":"lh-1","displayName":"WorkloadSettings"}]}"#;
        let transport = Arc::new(ScriptedTransport::with_responses([
            PlatformResponse::new(200, body),
            PlatformResponse::new(200, body),
            PlatformResponse::new(200, body),
        ]));
        let http = FabricHttp::new(transport);

        let by_name: Option<FabricItem> = http.find("u", "t", "WorkloadSettings").await.unwrap();
        let by_id: Option<FabricItem> = http.find("u", "t", "lh-1").await.unwrap();
        let missing: Option<FabricItem> = http.find("u", "t", "nope").await.unwrap();

        assert!(by_name.is_some());
        assert!(by_id.is_some());
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_failure_is_upstream_error() {
        let transport = Arc::new(ScriptedTransport::with_responses([PlatformResponse::new(
            401,
            r#"{"errorCode":"TokenExpired","message":"expired"}"#,
        )]));
        let http = FabricHttp::new(transport);
        let err = http.list_all::<FabricItem>("u", "t").await.unwrap_err();
        assert_eq!(err.to_envelope().error, "TokenExpired");
    }
}
