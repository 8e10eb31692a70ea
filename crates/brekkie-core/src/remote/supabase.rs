//! Supabase REST implementation of [`RemoteGateway`].

use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use url::Url;

use super::{Filter, GatewayError, GatewayResult, Query, RemoteGateway};
use crate::util::api_error_message;

/// Talks to PostgREST (`/rest/v1`) and Storage (`/storage/v1`).
#[derive(Debug, Clone)]
pub struct SupabaseGateway {
    base_url: String,
    anon_key: String,
    client: Client,
}

impl SupabaseGateway {
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> GatewayResult<Self> {
        let base_url = normalize_base_url(url.as_ref())?;
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(GatewayError::InvalidConfiguration(
                "Supabase anon key must not be empty",
            ));
        }

        Ok(Self {
            base_url,
            anon_key,
            client: Client::builder().build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, urlencoding::encode(table))
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_object_path(path)
        )
    }

    fn authorized(&self, request: RequestBuilder, access_token: &str) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
    }
}

impl RemoteGateway for SupabaseGateway {
    async fn select(
        &self,
        access_token: &str,
        table: &str,
        query: &Query,
    ) -> GatewayResult<Vec<Value>> {
        tracing::debug!("select {} from {}", query.columns, table);
        let mut params = vec![("select".to_string(), query.columns.clone())];
        params.extend(filter_params(&query.filters));
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let request = self.authorized(
            self.client.get(self.table_url(table)).query(&params),
            access_token,
        );
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn insert(
        &self,
        access_token: &str,
        table: &str,
        rows: &[Value],
    ) -> GatewayResult<Vec<Value>> {
        tracing::debug!("insert {} row(s) into {}", rows.len(), table);
        let request = self.authorized(
            self.client
                .post(self.table_url(table))
                .header("Prefer", "return=representation")
                .json(rows),
            access_token,
        );
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn update(
        &self,
        access_token: &str,
        table: &str,
        patch: &Value,
        filters: &[Filter],
    ) -> GatewayResult<Vec<Value>> {
        tracing::debug!("update {} where {:?}", table, filters);
        let request = self.authorized(
            self.client
                .patch(self.table_url(table))
                .query(&filter_params(filters))
                .header("Prefer", "return=representation")
                .json(patch),
            access_token,
        );
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<Vec<Value>>().await?)
    }

    async fn delete(
        &self,
        access_token: &str,
        table: &str,
        filters: &[Filter],
    ) -> GatewayResult<()> {
        if filters.is_empty() {
            return Err(GatewayError::InvalidConfiguration(
                "Refusing to delete without filters",
            ));
        }
        tracing::debug!("delete from {} where {:?}", table, filters);
        let request = self.authorized(
            self.client
                .delete(self.table_url(table))
                .query(&filter_params(filters)),
            access_token,
        );
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn upload_object(
        &self,
        access_token: &str,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> GatewayResult<()> {
        tracing::debug!("upload {} bytes to {}/{}", bytes.len(), bucket, path);
        let request = self.authorized(
            self.client
                .post(self.object_url(bucket, path))
                .header("Content-Type", content_type)
                .header("Cache-Control", "max-age=3600")
                .header("x-upsert", if upsert { "true" } else { "false" })
                .body(bytes),
            access_token,
        );
        check_status(request.send().await?).await?;
        Ok(())
    }

    async fn remove_objects(
        &self,
        access_token: &str,
        bucket: &str,
        paths: &[String],
    ) -> GatewayResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        tracing::debug!("remove {} object(s) from {}", paths.len(), bucket);
        let request = self.authorized(
            self.client
                .delete(format!(
                    "{}/storage/v1/object/{}",
                    self.base_url,
                    urlencoding::encode(bucket)
                ))
                .json(&serde_json::json!({ "prefixes": paths })),
            access_token,
        );
        check_status(request.send().await?).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            urlencoding::encode(bucket),
            encode_object_path(path)
        )
    }
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| (filter.column.clone(), format!("eq.{}", filter.value)))
        .collect()
}

fn encode_object_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

async fn check_status(response: Response) -> GatewayResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Api {
        status,
        message: api_error_message(status, &body),
    })
}

fn normalize_base_url(url: &str) -> GatewayResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidConfiguration(
            "Supabase URL must not be empty",
        ));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|_| GatewayError::InvalidConfiguration("Supabase URL is not a valid URL"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(GatewayError::InvalidConfiguration(
            "Supabase URL must include http:// or https://",
        ));
    }
    Ok(trimmed
        .trim_end_matches("/rest/v1")
        .trim_end_matches("/auth/v1")
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_base_url_strips_service_paths() {
        assert_eq!(
            normalize_base_url("https://demo.supabase.co/").unwrap(),
            "https://demo.supabase.co"
        );
        assert_eq!(
            normalize_base_url("https://demo.supabase.co/rest/v1").unwrap(),
            "https://demo.supabase.co"
        );
        assert!(normalize_base_url("demo.supabase.co").is_err());
        assert!(normalize_base_url("ftp://demo.supabase.co").is_err());
    }

    #[test]
    fn public_url_encodes_each_segment() {
        let gateway = SupabaseGateway::new("https://demo.supabase.co", "anon").unwrap();
        assert_eq!(
            gateway.public_url("recipe-images", "user-1/1700-my photo.jpg"),
            "https://demo.supabase.co/storage/v1/object/public/recipe-images/user-1/1700-my%20photo.jpg"
        );
    }

    #[test]
    fn filters_render_as_postgrest_equality() {
        let params = filter_params(&[Filter::eq("user_id", "abc"), Filter::eq("id", 5)]);
        assert_eq!(
            params,
            vec![
                ("user_id".to_string(), "eq.abc".to_string()),
                ("id".to_string(), "eq.5".to_string()),
            ]
        );
    }

    #[test]
    fn empty_anon_key_is_rejected() {
        assert!(matches!(
            SupabaseGateway::new("https://demo.supabase.co", "  "),
            Err(GatewayError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a reachable Supabase project"]
    async fn select_against_live_project() {
        dotenvy::dotenv().ok();
        let url = std::env::var("SUPABASE_URL").unwrap();
        let key = std::env::var("SUPABASE_ANON_KEY").unwrap();
        let gateway = SupabaseGateway::new(url, key.clone()).unwrap();
        let rows = gateway
            .select(&key, "recipes", &Query::select("id").limit(1))
            .await;
        assert!(rows.is_ok() || matches!(rows, Err(GatewayError::Api { .. })));
    }
}
