//! Construction of the canonical string-to-sign, and signing of it.
//!
//! The string-to-sign is the newline joined sequence
//!
//! ```text
//! HTTP_VERB
//! CONTENT_MD5
//! CONTENT_TYPE
//! EXPIRATION
//! CANONICALIZED_EXTENSION_HEADERSCANONICALIZED_RESOURCE
//! ```
//!
//! where missing optional values are empty lines, and the extension headers
//! block, if any, carries its own trailing newline.

use crate::{clock::Clock, error::Error, signing::PrivateKey, util};
use chrono::{DateTime, Utc};
use percent_encoding as perc_enc;
use std::{borrow::Cow, convert::TryFrom, time::Duration};
use tracing::debug;

/// Headers that are sent with a request but must never be part of the
/// signature
const UNSIGNED_EXTENSION_HEADERS: &[&str] =
    &["x-goog-encryption-key", "x-goog-encryption-key-sha256"];

/// The storage resource a signature grants access to, which also determines
/// the shape of the URL it is accessed through
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource<'a> {
    /// An already canonicalized resource path, eg. `/bucket/object`, used
    /// verbatim and accessed via `storage.<host>/<path>`
    Path(Cow<'a, str>),
    /// An object in a bucket, accessed via `<bucket>.storage.<host>/<key>`.
    /// The key is percent encoded as a path.
    Object {
        bucket: Cow<'a, str>,
        key: Cow<'a, str>,
    },
}

impl<'a> Resource<'a> {
    pub fn path<P: Into<Cow<'a, str>>>(path: P) -> Self {
        Resource::Path(path.into())
    }

    pub fn object<B, K>(bucket: B, key: K) -> Self
    where
        B: Into<Cow<'a, str>>,
        K: Into<Cow<'a, str>>,
    {
        Resource::Object {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Rejects resources that would produce a malformed string-to-sign or URL
    pub fn validate(&self) -> Result<(), Error> {
        let valid = match self {
            Resource::Path(path) => {
                path.starts_with('/')
                    && !path.contains(is_url_delimiter)
                    && !has_dot_segment(path)
            }
            Resource::Object { bucket, key } => {
                !bucket.is_empty()
                    && !bucket.contains(is_url_delimiter)
                    && !bucket.contains(&['/', ':', '@'][..])
                    && !key.is_empty()
                    && !has_dot_segment(key)
            }
        };

        if valid {
            Ok(())
        } else {
            Err(Error::InvalidResourcePath(self.canonical_path().into_owned()))
        }
    }

    /// The resource path as it appears in the string-to-sign
    pub fn canonical_path(&self) -> Cow<'_, str> {
        match self {
            Resource::Path(path) => Cow::Borrowed(path.as_ref()),
            Resource::Object { bucket, key } => Cow::Owned(format!(
                "/{}/{}",
                bucket,
                perc_enc::utf8_percent_encode(key, util::PATH_ENCODE_SET)
            )),
        }
    }

    /// The path of the URL through which the resource is accessed
    pub(crate) fn url_path(&self) -> Cow<'_, str> {
        match self {
            Resource::Path(path) => Cow::Borrowed(path.as_ref()),
            Resource::Object { key, .. } => Cow::Owned(format!(
                "/{}",
                perc_enc::utf8_percent_encode(key, util::PATH_ENCODE_SET)
            )),
        }
    }

    /// The URL, without query, through which the resource is accessed
    pub(crate) fn base_url(&self, scheme: &str, host: &str) -> String {
        match self {
            Resource::Path(path) => format!("{}://storage.{}{}", scheme, host, path),
            Resource::Object { bucket, .. } => format!(
                "{}://{}.storage.{}{}",
                scheme,
                bucket,
                host,
                self.url_path()
            ),
        }
    }
}

/// Characters that end the path of a URL, or that a URL parser rewrites
fn is_url_delimiter(c: char) -> bool {
    matches!(c, '?' | '#' | '\\') || c.is_whitespace() || c.is_control()
}

/// `.` and `..` segments, including their `%2e` spellings, are collapsed by
/// URL parsers, so the path that is requested would not be the one that was
/// signed
fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

/// The parameters of a request to sign. Only `method` and `resource` are
/// required, see [`SigningRequest::new`] for the defaults of the rest.
#[derive(Clone, Debug)]
pub struct SigningRequest<'a> {
    /// The HTTP method the signature is valid for. Defaults to `GET`.
    pub method: http::Method,
    /// The resource the signature is valid for
    pub resource: Resource<'a>,
    /// The lifetime of the signature, measured from the moment it is created.
    /// Defaults to 1 hour.
    pub duration: Duration,
    /// The base64 MD5 digest the request body must match
    pub content_md5: Option<Cow<'a, str>>,
    /// The `content-type` the request must be sent with
    pub content_type: Option<Cow<'a, str>>,
    /// Canonicalized extension headers, see [`canonicalize_extension_headers`]
    pub extension_headers: Option<Cow<'a, str>>,
    /// Whether to produce an `https` (the default) or `http` url
    pub secure: bool,
}

impl<'a> SigningRequest<'a> {
    pub fn new(method: http::Method, resource: Resource<'a>) -> Self {
        Self {
            method,
            resource,
            duration: Duration::from_secs(60 * 60),
            content_md5: None,
            content_type: None,
            extension_headers: None,
            secure: true,
        }
    }

    /// Checks that the request can be turned into a well formed signature
    pub fn validate(&self) -> Result<(), Error> {
        const SIGNABLE: &[http::Method] = &[
            http::Method::GET,
            http::Method::HEAD,
            http::Method::PUT,
            http::Method::DELETE,
            http::Method::POST,
        ];

        if !SIGNABLE.contains(&self.method) {
            return Err(Error::UnsupportedMethod(self.method.clone()));
        }

        self.resource.validate()?;

        match self.extension_headers.as_deref() {
            Some(headers) if !headers.is_empty() && !headers.ends_with('\n') => {
                Err(Error::InvalidExtensionHeaders)
            }
            _ => Ok(()),
        }
    }

    /// Builds the exact string that is signed, for a signature that expires
    /// at `expires_at` seconds since the unix epoch
    pub fn string_to_sign(&self, expires_at: i64) -> String {
        format!(
            "{verb}\n{md5}\n{content_type}\n{expires}\n{headers}{resource}",
            verb = self.method,
            md5 = self.content_md5.as_deref().unwrap_or_default(),
            content_type = self.content_type.as_deref().unwrap_or_default(),
            expires = expires_at,
            headers = self.extension_headers.as_deref().unwrap_or_default(),
            resource = self.resource.canonical_path(),
        )
    }
}

/// Calculates the expiration, in seconds since the unix epoch, of a signature
/// created at `now` that is valid for `duration`. Sub-second precision of
/// both is dropped.
pub fn expiration_timestamp(now: DateTime<Utc>, duration: Duration) -> Result<i64, Error> {
    let invalid = || Error::InvalidExpiration {
        requested: duration,
    };

    let secs = duration.as_secs();
    if secs == 0 {
        return Err(invalid());
    }

    let secs = i64::try_from(secs).map_err(|_err| invalid())?;
    now.timestamp().checked_add(secs).ok_or_else(invalid)
}

/// A raw RSA-SHA256 signature, along with the expiration that was signed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub bytes: Vec<u8>,
    /// Seconds since the unix epoch
    pub expires_at: i64,
}

impl Signature {
    pub fn to_base64(&self) -> String {
        base64::encode_config(&self.bytes, base64::STANDARD)
    }
}

/// Signs a string-to-sign with RSA-SHA256
pub fn sign(string_to_sign: &[u8], key: &PrivateKey) -> Result<Vec<u8>, Error> {
    key.sign(string_to_sign)
}

/// Validates the request, samples the clock to determine the expiration,
/// then builds and signs the string-to-sign
pub fn sign_request<C: Clock>(
    clock: &C,
    key: &PrivateKey,
    request: &SigningRequest<'_>,
) -> Result<Signature, Error> {
    request.validate()?;

    let expires_at = expiration_timestamp(clock.now(), request.duration)?;
    let string_to_sign = request.string_to_sign(expires_at);

    debug!(string_to_sign = ?string_to_sign, "built string to sign");

    Ok(Signature {
        bytes: sign(string_to_sign.as_bytes(), key)?,
        expires_at,
    })
}

/// Builds the canonicalized extension headers from the `x-goog-` headers of a
/// request.
///
/// Header names are lowercase and sorted, repeated headers have their values
/// joined with `,`, and every header is terminated with a newline. The
/// customer supplied encryption key headers are never signed.
pub fn canonicalize_extension_headers(headers: &http::HeaderMap) -> Result<String, Error> {
    let mut hdrs = Vec::with_capacity(headers.keys_len());

    for key in headers.keys() {
        let name = key.as_str();
        if !name.starts_with("x-goog-") || UNSIGNED_EXTENSION_HEADERS.contains(&name) {
            continue;
        }

        let mut key_vals = String::new();
        for (i, val) in headers.get_all(key).iter().enumerate() {
            if i > 0 {
                key_vals.push(',');
            }

            key_vals.push_str(
                val.to_str()
                    .map_err(|_err| Error::OpaqueHeaderValue(val.clone()))?
                    .trim(),
            );
        }

        hdrs.push((name, key_vals));
    }

    // Sort all headers by header name using a lexicographical sort by code point value.
    hdrs.sort();

    let canonical_size = hdrs
        .iter()
        .fold(0, |acc, (name, vals)| acc + name.len() + vals.len() + 2);
    let mut canonical = String::with_capacity(canonical_size);

    for (name, vals) in &hdrs {
        canonical.push_str(name);
        canonical.push(':');
        canonical.push_str(vals);
        canonical.push('\n');
    }

    Ok(canonical)
}
