//! Bucket listing
//!
//! A single request for the first page of keys. Buckets with more objects
//! than fit in one page are only partially mirrored; a truncated listing is
//! logged, not followed.

use crate::error::{Error, Result};
use crate::path::BucketName;
use crate::traits::{ListResult, ObjectStore};

/// List the keys of `bucket`, in backend order
///
/// Any backend failure becomes [`Error::ListingFailed`] carrying the cause.
pub async fn list_keys<S>(store: &S, bucket: &BucketName) -> Result<ListResult>
where
    S: ObjectStore + ?Sized,
{
    let listing = store
        .list_objects(bucket)
        .await
        .map_err(|e| Error::listing_failed(bucket.as_str(), e))?;

    tracing::debug!(
        bucket = %bucket,
        count = listing.items.len(),
        truncated = listing.truncated,
        "listed objects"
    );

    if listing.truncated {
        tracing::warn!(
            bucket = %bucket,
            count = listing.items.len(),
            "listing is truncated, only the first page will be mirrored"
        );
    }

    Ok(listing)
}
