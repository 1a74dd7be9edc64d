use http::{header, HeaderMap};

use crate::Error;

/// The location to go to next, if this response is a redirect we should follow.
///
/// Follows any `3xx` with a non-empty `location` header unless following is turned off.
/// The location is used as is, it is not resolved against the current URL.
pub(crate) fn location(status: u16, headers: &HeaderMap, follow: bool) -> Option<&str> {
    if !follow || !(300..400).contains(&status) {
        return None;
    }

    headers
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Counts redirect hops for one call.
#[derive(Debug)]
pub(crate) struct Hops {
    count: u32,
    max: Option<u32>,
}

impl Hops {
    pub fn new(max: Option<u32>) -> Self {
        Hops { count: 0, max }
    }

    /// Register one more hop. Without a max this never fails.
    pub fn next(&mut self) -> Result<(), Error> {
        if let Some(max) = self.max {
            if self.count >= max {
                return Err(Error::TooManyRedirects(max));
            }
        }

        self.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_location(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::LOCATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn follow_3xx_with_location() {
        let headers = with_location("http://x.test/b");

        for status in [300, 301, 302, 303, 307, 308, 399] {
            assert_eq!(location(status, &headers, true), Some("http://x.test/b"));
        }
    }

    #[test]
    fn no_follow() {
        let headers = with_location("http://x.test/b");

        assert_eq!(location(200, &headers, true), None);
        assert_eq!(location(400, &headers, true), None);
        assert_eq!(location(302, &headers, false), None);
        assert_eq!(location(302, &HeaderMap::new(), true), None);
        assert_eq!(location(302, &with_location(""), true), None);
    }

    #[test]
    fn relative_location_kept_as_is() {
        let headers = with_location("/other");
        assert_eq!(location(301, &headers, true), Some("/other"));
    }

    #[test]
    fn hops_unbounded() {
        let mut hops = Hops::new(None);
        for _ in 0..1000 {
            hops.next().unwrap();
        }
        assert_eq!(hops.count, 1000);
    }

    #[test]
    fn hops_bounded() {
        let mut hops = Hops::new(Some(2));
        hops.next().unwrap();
        hops.next().unwrap();

        let err = hops.next().unwrap_err();
        assert!(matches!(err, Error::TooManyRedirects(2)));
    }
}
