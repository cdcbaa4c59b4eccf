/// Separates the route from the origin address within a bucket key.
pub(crate) const KEY_DELIMITER: char = ':';

/// Derives the bucket key under which a request is counted.
///
/// The key is the route identity as-is, with the caller's origin address
/// appended after a `:` when origin based limiting is enabled. No
/// normalization or hashing is applied; callers are responsible for supplying
/// route paths in a consistent case and format, since `/Orders` and `/orders`
/// count against different buckets.
///
/// This is a pure function: identical `(route, origin)` pairs always produce
/// identical keys, and distinct routes or distinct origins never collide.
pub fn derive_key(route: &str, origin: Option<&str>) -> String {
    match origin {
        Some(address) => format!("{route}{KEY_DELIMITER}{address}"),
        None => route.to_owned(),
    }
}
