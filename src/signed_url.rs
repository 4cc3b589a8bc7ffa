//! Facilities for [signed URLs](https://cloud.google.com/storage/docs/access-control/signed-urls),

use crate::{
    canonical::{self, SigningRequest},
    clock::{Clock, SystemClock},
    error::Error,
    signing, util,
};
use percent_encoding as perc_enc;
use url::Url;

/// The host storage URLs are built on when none is specified
pub const DEFAULT_HOST: &str = "googleapis.com";

/// A generator for [signed URLs](https://cloud.google.com/storage/docs/access-control/signed-urls),
/// which can be used to grant temporary access to specific storage
/// resources even if the client making the request is not otherwise
/// logged in or normally able to access to the storage resources in question.
///
/// This implements the [V2 signing process](https://cloud.google.com/storage/docs/access-control/signed-urls-v2),
/// and can also sign [POST policy documents](https://cloud.google.com/storage/docs/xml-api/post-object-forms)
/// for browser uploads, see [`UrlSigner::generate_upload_form`].
#[derive(Debug, Clone)]
pub struct UrlSigner<C = SystemClock> {
    pub(crate) clock: C,
    pub(crate) host: String,
}

impl Default for UrlSigner<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlSigner<SystemClock> {
    /// Creates a [`UrlSigner`] using the system clock and the default host
    pub fn new() -> Self {
        Self {
            clock: SystemClock,
            host: DEFAULT_HOST.to_owned(),
        }
    }
}

impl<C> UrlSigner<C> {
    /// Replaces the clock used to determine expirations
    pub fn with_clock<C2: Clock>(self, clock: C2) -> UrlSigner<C2> {
        UrlSigner {
            clock,
            host: self.host,
        }
    }

    /// Sets the host that URLs are created for, the storage service is
    /// reached at `storage.<host>`
    pub fn with_host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = host.into();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl<C: Clock> UrlSigner<C> {
    /// Generates a new signed url for the specified request, using a key
    /// provider. Note that this operation is entirely local, so though this
    /// may succeed in generating a url, the actual operation using it may fail
    /// if the account used to sign the URL does not have sufficient permissions
    /// for the resource.
    ///
    /// The url takes one of two forms depending on the request's resource,
    /// `storage.<host>/<path>` for [`Resource::Path`](crate::canonical::Resource::Path)
    /// and `<bucket>.storage.<host>/<key>` for
    /// [`Resource::Object`](crate::canonical::Resource::Object).
    pub fn generate<K>(
        &self,
        key_provider: &K,
        request: &SigningRequest<'_>,
    ) -> Result<SignedUrl, Error>
    where
        K: signing::KeyProvider + ?Sized,
    {
        let signature = canonical::sign_request(&self.clock, key_provider.key(), request)?;

        let query = format!(
            "GoogleAccessId={access_id}&Expires={expires}&Signature={signature}",
            access_id =
                perc_enc::utf8_percent_encode(key_provider.authorizer(), util::ACCESS_ID_ENCODE_SET),
            expires = signature.expires_at,
            signature =
                perc_enc::utf8_percent_encode(&signature.to_base64(), util::QUERY_ENCODE_SET),
        );

        let url = format!(
            "{}?{}",
            request
                .resource
                .base_url(scheme(request.secure), &self.host),
            query
        );
        let url = Url::parse(&url).map_err(Error::UrlParse)?;

        // The parser normalizes the url, so make sure the resource that will
        // be requested is still the one that was signed
        if url.path() != request.resource.url_path()
            || url.query() != Some(query.as_str())
            || url.fragment().is_some()
        {
            return Err(Error::InvalidResourcePath(
                request.resource.canonical_path().into_owned(),
            ));
        }

        Ok(SignedUrl {
            url,
            expires_at: signature.expires_at,
        })
    }
}

pub(crate) fn scheme(secure: bool) -> &'static str {
    if secure {
        "https"
    } else {
        "http"
    }
}

/// A signed url, ready to be used by any HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: Url,
    /// The moment the url stops being valid, in seconds since the unix epoch
    pub expires_at: i64,
}

impl std::fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.url, f)
    }
}
