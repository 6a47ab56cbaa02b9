//! In-band notices posted to a destination thread in place of media.

/// Media for the post could not be fetched or converted.
#[must_use]
pub fn media_error(post_id: &str) -> String {
    format!("#e {post_id}")
}

/// The post exceeded the size limit and was skipped.
#[must_use]
pub fn oversized(post_id: &str) -> String {
    format!("#big {post_id}")
}
