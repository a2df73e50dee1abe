use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::debug;

use super::error::StoreError;
use super::types::Location;
use super::ArtifactStore;

/// Object store reached over plain HTTP: objects live at `{endpoint}/{bucket}/{key}`.
///
/// Locations handed out use `scheme://bucket/key`; `http(s)://` locations
/// (such as pre-signed result URLs) are fetched as-is.
pub struct HttpArtifactStore {
    client: Client,
    endpoint: String,
    scheme: String,
    token: Option<String>,
}

impl HttpArtifactStore {
    pub fn new(
        endpoint: &str,
        scheme: &str,
        token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            scheme: scheme.to_string(),
            token,
        })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Translates a non-success response into a [`StoreError`].
async fn error_for_status(response: Response, location: &str) -> StoreError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied {
            location: location.to_string(),
            message,
        },
        StatusCode::NOT_FOUND => StoreError::NotFound(location.to_string()),
        s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => StoreError::Unavailable {
            status: s.as_u16(),
            message,
        },
        s => StoreError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<Location, StoreError> {
        let location = Location::object(&self.scheme, bucket, key);
        let size = body.len();
        let request = self
            .client
            .put(self.object_url(bucket, key))
            .header("content-type", content_type)
            .body(body);

        let response = self.authorize(request).send().await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, location.as_str()).await);
        }

        debug!(location = %location, bytes = size, "object stored");
        Ok(location)
    }

    async fn get(&self, location: &Location) -> Result<Bytes, StoreError> {
        let url = if location.is_http() {
            location.as_str().to_string()
        } else {
            let (bucket, key) = location
                .bucket_and_key()
                .ok_or_else(|| StoreError::InvalidLocation(location.to_string()))?;
            self.object_url(bucket, key)
        };

        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(error_for_status(response, location.as_str()).await);
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpArtifactStore {
        HttpArtifactStore::new(
            &server.uri(),
            "s3",
            Some("secret".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn put_returns_scheme_location() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/input/audio-1.mp3"))
            .and(header("authorization", "Bearer secret"))
            .and(header("content-type", "audio/mp3"))
            .and(body_bytes(b"ID3".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server);
        let loc = store
            .put("input", "audio-1.mp3", Bytes::from_static(b"ID3"), "audio/mp3")
            .await
            .unwrap();
        assert_eq!(loc.as_str(), "s3://input/audio-1.mp3");
    }

    #[tokio::test]
    async fn put_forbidden_is_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .put("input", "a.mp3", Bytes::from_static(b"x"), "audio/mp3")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::PermissionDenied { ref message, .. } if message == "AccessDenied"
        ));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn get_maps_scheme_location_onto_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/output/job-abc.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let body = store_for(&server)
            .get(&Location::from_raw("s3://output/job-abc.json"))
            .await
            .unwrap();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn get_follows_http_location_directly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/presigned/result.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("payload"))
            .mount(&server)
            .await;

        let loc = Location::from_raw(format!("{}/presigned/result.json", server.uri()));
        let body = store_for(&server).get(&loc).await.unwrap();
        assert_eq!(&body[..], b"payload");
    }

    #[tokio::test]
    async fn get_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = store_for(&server)
            .get(&Location::from_raw("s3://output/job.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { status: 503, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn get_rejects_malformed_location() {
        let server = MockServer::start().await;
        let err = store_for(&server)
            .get(&Location::from_raw("not-a-location"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidLocation(_)));
    }
}
