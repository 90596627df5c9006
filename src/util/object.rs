use crate::model::error::ProviderError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    AWS,
    GCS,
}

impl Backend {
    pub fn is_aws(&self) -> bool {
        matches!(self, Backend::AWS)
    }

    pub fn is_gcs(&self) -> bool {
        matches!(self, Backend::GCS)
    }
}

pub fn parse_backend_from_uri(bucket_uri: &str) -> Result<Backend, ProviderError> {
    if bucket_uri.starts_with("s3://") {
        Ok(Backend::AWS)
    } else if bucket_uri.starts_with("gs://") {
        Ok(Backend::GCS)
    } else {
        Err(ProviderError::Configuration(format!(
            "failed to parse backend of: {}",
            bucket_uri
        )))
    }
}

pub fn parse_bucket_from_uri(bucket_uri: &str) -> &str {
    bucket_uri
        .split_once("://")
        .map(|(_, rest)| rest.trim_end_matches('/'))
        .unwrap_or("")
}
