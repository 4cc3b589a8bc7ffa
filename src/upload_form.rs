//! Signed [POST policy documents](https://cloud.google.com/storage/docs/xml-api/post-object-forms),
//! which let a browser upload an object through a plain HTML form

use crate::{
    canonical::{self, Resource},
    clock::Clock,
    error::Error,
    signed_url::{scheme, UrlSigner},
    signing,
};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::{borrow::Cow, time::Duration};
use tracing::debug;
use url::Url;

/// The parameters of an upload to sign
#[derive(Clone, Debug)]
pub struct UploadRequest<'a> {
    /// The bucket the object is uploaded to
    pub bucket: Cow<'a, str>,
    /// The name of the object being uploaded
    pub key: Cow<'a, str>,
    /// The predefined ACL applied to the object, eg. `bucket-owner-read`.
    /// Note this value is only part of the policy, the form must still
    /// include an `acl` field with the same value.
    pub acl: Cow<'a, str>,
    /// The lifetime of the policy. Defaults to 1 hour.
    pub duration: Duration,
    /// Whether to produce an `https` (the default) or `http` url
    pub secure: bool,
}

impl<'a> UploadRequest<'a> {
    pub fn new<B, K, A>(bucket: B, key: K, acl: A) -> Self
    where
        B: Into<Cow<'a, str>>,
        K: Into<Cow<'a, str>>,
        A: Into<Cow<'a, str>>,
    {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            acl: acl.into(),
            duration: Duration::from_secs(60 * 60),
            secure: true,
        }
    }
}

/// The policy document describing what an upload is allowed to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyDocument<'a> {
    pub expiration: DateTime<Utc>,
    pub key: &'a str,
    pub acl: &'a str,
    pub bucket: &'a str,
}

impl<'a> PolicyDocument<'a> {
    /// Serializes the policy. The layout, including the whitespace inside
    /// the conditions, is exactly what the storage service expects.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(format!(
            r#"{{"expiration":{expiration},"conditions":[{{"key": {key}}},{{"acl": {acl}}},{{"bucket": {bucket}}}]}}"#,
            expiration = serde_json::to_string(
                &self.expiration.to_rfc3339_opts(SecondsFormat::Secs, true)
            )?,
            key = serde_json::to_string(self.key)?,
            acl = serde_json::to_string(self.acl)?,
            bucket = serde_json::to_string(self.bucket)?,
        ))
    }

    /// The base64 encoded policy, which is the value that gets signed
    pub fn to_base64(&self) -> Result<String, Error> {
        Ok(base64::encode_config(self.to_json()?, base64::STANDARD))
    }
}

/// The form fields that accompany an upload
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadFields {
    pub key: String,
    #[serde(rename = "GoogleAccessId")]
    pub access_id: String,
    /// The base64 encoded policy document
    pub policy: String,
    /// The base64 encoded signature of `policy`
    pub signature: String,
}

impl UploadFields {
    /// The fields as `(name, value)` pairs, in the order they should appear
    /// in a form
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("key", self.key.as_str()),
            ("GoogleAccessId", self.access_id.as_str()),
            ("policy", self.policy.as_str()),
            ("signature", self.signature.as_str()),
        ]
    }

    /// Encodes the fields as an `application/x-www-form-urlencoded` body
    pub fn to_urlencoded(&self) -> Result<String, Error> {
        Ok(serde_urlencoded::to_string(self)?)
    }
}

/// A signed upload, the `url` being the target of the form
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedUploadForm {
    /// Serializes with an empty root path, eg. `https://<bucket>.storage.<host>/`,
    /// which targets the same resource as [`SignedUploadForm::action`]
    pub url: Url,
    /// The moment the policy stops being valid, in seconds since the unix epoch
    pub expires_at: i64,
    pub fields: UploadFields,
}

impl SignedUploadForm {
    /// The form's `action`, exactly `http[s]://<bucket>.storage.<host>`
    pub fn action(&self) -> &str {
        self.url.as_str().trim_end_matches('/')
    }
}

impl<C: Clock> UrlSigner<C> {
    /// Generates a signed policy for uploading a single object via a POST
    /// form to `<bucket>.storage.<host>`
    pub fn generate_upload_form<K>(
        &self,
        key_provider: &K,
        request: &UploadRequest<'_>,
    ) -> Result<SignedUploadForm, Error>
    where
        K: signing::KeyProvider + ?Sized,
    {
        Resource::object(&*request.bucket, &*request.key).validate()?;

        let expires_at = canonical::expiration_timestamp(self.clock.now(), request.duration)?;
        let expiration = Utc
            .timestamp_opt(expires_at, 0)
            .single()
            .ok_or(Error::InvalidExpiration {
                requested: request.duration,
            })?;

        let policy = PolicyDocument {
            expiration,
            key: &request.key,
            acl: &request.acl,
            bucket: &request.bucket,
        };

        let policy = policy.to_base64()?;
        debug!(policy = ?policy, "built upload policy");

        // Note it's the base64 encoded policy that is signed, not the document
        let signature = canonical::sign(policy.as_bytes(), key_provider.key())?;

        let url = format!(
            "{}://{}.storage.{}",
            scheme(request.secure),
            request.bucket,
            self.host
        );

        let url = Url::parse(&url).map_err(Error::UrlParse)?;
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(Error::InvalidResourcePath(format!(
                "/{}/{}",
                request.bucket, request.key
            )));
        }

        Ok(SignedUploadForm {
            url,
            expires_at,
            fields: UploadFields {
                key: request.key.clone().into_owned(),
                access_id: key_provider.authorizer().to_owned(),
                policy,
                signature: base64::encode_config(&signature, base64::STANDARD),
            },
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn policy_shape() {
        let policy = PolicyDocument {
            expiration: Utc.timestamp_opt(1_700_000_600, 0).unwrap(),
            key: "my-file.txt",
            acl: "bucket-owner-read",
            bucket: "my-bucket",
        };

        assert_eq!(
            policy.to_json().unwrap(),
            r#"{"expiration":"2023-11-14T22:23:20Z","conditions":[{"key": "my-file.txt"},{"acl": "bucket-owner-read"},{"bucket": "my-bucket"}]}"#
        );
    }

    #[test]
    fn policy_drops_fractional_seconds() {
        let policy = PolicyDocument {
            expiration: Utc.timestamp_opt(1_700_000_600, 250_000_000).unwrap(),
            key: "k",
            acl: "",
            bucket: "b",
        };

        assert_eq!(
            policy.to_json().unwrap(),
            r#"{"expiration":"2023-11-14T22:23:20Z","conditions":[{"key": "k"},{"acl": ""},{"bucket": "b"}]}"#
        );
    }

    #[test]
    fn policy_values_are_escaped() {
        let policy = PolicyDocument {
            expiration: Utc.timestamp_opt(0, 0).unwrap(),
            key: "dir/\"quoted\"\\name.txt",
            acl: "private",
            bucket: "b",
        };

        let json = policy.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["expiration"], "1970-01-01T00:00:00Z");
        assert_eq!(
            parsed["conditions"][0]["key"],
            "dir/\"quoted\"\\name.txt"
        );
    }

    #[test]
    fn fields_urlencode_in_form_order() {
        let fields = UploadFields {
            key: "my file.txt".to_owned(),
            access_id: "a@b.com".to_owned(),
            policy: "eyJ+/=".to_owned(),
            signature: "c2ln".to_owned(),
        };

        assert_eq!(
            fields.to_urlencoded().unwrap(),
            "key=my+file.txt&GoogleAccessId=a%40b.com&policy=eyJ%2B%2F%3D&signature=c2ln"
        );
        assert_eq!(fields.pairs()[1], ("GoogleAccessId", "a@b.com"));
    }
}
