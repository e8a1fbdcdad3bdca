use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{StatusCode, Url, header::AUTHORIZATION};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{ObjectStore, StoreError};

type HmacSha256 = Hmac<Sha256>;

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// S3-compatible object store using path-style addressing and AWS Signature V4.
pub struct S3ObjectStore {
    http: reqwest::Client,
    endpoint: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
}

impl S3ObjectStore {
    pub fn new(
        endpoint: Option<&str>,
        region: &str,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Result<Self, StoreError> {
        let endpoint = match endpoint {
            Some(e) if !e.trim().is_empty() => e.trim().trim_end_matches('/').to_string(),
            _ => format!("https://s3.{region}.amazonaws.com"),
        };
        Url::parse(&endpoint)
            .map_err(|e| StoreError::InvalidConfig(format!("endpoint '{endpoint}': {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            region: region.to_string(),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
        })
    }

    /// `/{bucket}/{key}` with every path segment URI-encoded once.
    fn canonical_uri(bucket: &str, key: &str) -> String {
        let key = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("/{}/{}", urlencoding::encode(bucket), key)
    }

    fn host_header(url: &Url) -> String {
        let host = url.host_str().unwrap_or_default();
        match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Builds the `Authorization` header value for a GET request.
    fn authorization(
        &self,
        host: &str,
        canonical_uri: &str,
        amz_date: &str,
        date: &str,
    ) -> String {
        let canonical_request = format!(
            "GET\n{canonical_uri}\n\nhost:{host}\nx-amz-content-sha256:{UNSIGNED_PAYLOAD}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{UNSIGNED_PAYLOAD}"
        );
        let scope = format!("{date}/{}/s3/aws4_request", self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let key = signing_key(&self.secret_access_key, date, &self.region, "s3");
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
            self.access_key_id
        )
    }

    async fn get_at(
        &self,
        bucket: &str,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, StoreError> {
        let canonical_uri = Self::canonical_uri(bucket, key);
        let url = Url::parse(&format!("{}{canonical_uri}", self.endpoint))
            .map_err(|e| StoreError::Transient(format!("invalid object url: {e}")))?;
        let host = Self::host_header(&url);
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let authorization = self.authorization(&host, &canonical_uri, &amz_date, &date);

        let response = self
            .http
            .get(url)
            .header("x-amz-date", &amz_date)
            .header("x-amz-content-sha256", UNSIGNED_PAYLOAD)
            .header(AUTHORIZATION, authorization)
            .send()
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| StoreError::Transient(e.to_string()))?;
                debug!(bucket, size_bytes = body.len(), "Object downloaded");
                Ok(body.to_vec())
            }
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            status => Err(StoreError::Transient(format!(
                "unexpected status {status} for {bucket}/{key}"
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.get_at(bucket, key, Utc::now()).await
    }

    fn name(&self) -> &str {
        "s3"
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}
