//! Pagination primitives shared by the list operations.
//!
//! A [`Page`] is one fetched batch; its `next_page_token` is the empty string
//! on the terminal page, never absent. [`PagedIter`] walks a whole listing
//! lazily, buffering at most one page, and may be abandoned mid-stream
//! without fetching further pages.

use crate::errors::{AuthErrorCode, FirebaseError, Result};

/// One batch of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    values: Vec<T>,
    next_page_token: String,
}

impl<T> Page<T> {
    pub(crate) fn new(values: Vec<T>, next_page_token: Option<String>) -> Self {
        Page {
            values,
            next_page_token: next_page_token.unwrap_or_default(),
        }
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    /// Token for the following page; `""` means this page is terminal.
    pub fn next_page_token(&self) -> &str {
        &self.next_page_token
    }

    pub fn has_next_page(&self) -> bool {
        !self.next_page_token.is_empty()
    }
}

/// A caller-supplied page token must be absent or non-empty; the empty
/// string is the server's terminal marker and never a valid cursor.
pub(crate) fn validate_page_token(token: Option<&str>) -> Result<()> {
    if token == Some("") {
        return Err(
            FirebaseError::invalid_argument("page token must not be the empty string")
                .with_code(AuthErrorCode::InvalidPageToken),
        );
    }
    Ok(())
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lazy iterator over a complete listing. The fetch closure receives the page
/// token to resume from (`None` for the first page).
pub struct PagedIter<T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    fetch: F,
    buffer: std::vec::IntoIter<T>,
    cursor: Cursor,
}

impl<T, F> PagedIter<T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    pub(crate) fn new(fetch: F) -> Self {
        PagedIter {
            fetch,
            buffer: Vec::new().into_iter(),
            cursor: Cursor::Start,
        }
    }
}

impl<T, F> Iterator for PagedIter<T, F>
where
    F: Fn(Option<&str>) -> Result<Page<T>>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }
            let token = match self.cursor {
                Cursor::Done => return None,
                Cursor::Start => None,
                Cursor::Next(ref token) => Some(token.clone()),
            };
            match (self.fetch)(token.as_deref()) {
                Err(e) => {
                    self.cursor = Cursor::Done;
                    return Some(Err(e));
                }
                Ok(page) => {
                    self.cursor = if page.has_next_page() {
                        Cursor::Next(page.next_page_token().to_owned())
                    } else {
                        Cursor::Done
                    };
                    self.buffer = page.into_values().into_iter();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FirebaseError;
    use std::cell::Cell;

    /// Serve `total` numbered items in pages of `size`, counting fetches.
    fn server(total: u32, size: u32, fetches: &Cell<u32>) -> impl Fn(Option<&str>) -> Result<Page<u32>> + '_ {
        move |token| {
            fetches.set(fetches.get() + 1);
            let start: u32 = match token {
                None => 0,
                Some(t) => t.parse().expect("numeric test token"),
            };
            let end = (start + size).min(total);
            let next = if end < total { Some(end.to_string()) } else { Some(String::new()) };
            Ok(Page::new((start..end).collect(), next))
        }
    }

    #[test]
    fn iterates_every_item_in_server_order() {
        let fetches = Cell::new(0);
        let items: Vec<u32> = PagedIter::new(server(2500, 1000, &fetches))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items, (0..2500).collect::<Vec<_>>());
        assert_eq!(fetches.get(), 3);
    }

    #[test]
    fn exact_multiple_of_page_size() {
        let fetches = Cell::new(0);
        let items: Vec<u32> = PagedIter::new(server(2000, 1000, &fetches))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(items.len(), 2000);
        assert_eq!(fetches.get(), 2);
    }

    #[test]
    fn abandoning_mid_stream_stops_fetching() {
        let fetches = Cell::new(0);
        let mut iter = PagedIter::new(server(2500, 1000, &fetches));
        for _ in 0..5 {
            iter.next().unwrap().unwrap();
        }
        drop(iter);
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn empty_listing_yields_nothing() {
        let fetches = Cell::new(0);
        assert!(PagedIter::new(server(0, 1000, &fetches)).next().is_none());
        assert_eq!(fetches.get(), 1);
    }

    #[test]
    fn fetch_error_ends_the_stream() {
        let calls = Cell::new(0);
        let mut iter = PagedIter::new(|token: Option<&str>| {
            calls.set(calls.get() + 1);
            match token {
                None => Ok(Page::new(vec![1u32, 2], Some("next".to_owned()))),
                Some(_) => Err(FirebaseError::internal("boom")),
            }
        });
        assert_eq!(iter.next().unwrap().unwrap(), 1);
        assert_eq!(iter.next().unwrap().unwrap(), 2);
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn terminal_page_token_is_the_empty_string() {
        let fetches = Cell::new(0);
        let page = server(500, 1000, &fetches)(None).unwrap();
        assert!(!page.has_next_page());
        assert_eq!(page.next_page_token(), "");
    }

    #[test]
    fn caller_supplied_empty_token_is_rejected() {
        let err = validate_page_token(Some("")).unwrap_err();
        assert_eq!(err.code(), Some(AuthErrorCode::InvalidPageToken));
        assert!(validate_page_token(None).is_ok());
        assert!(validate_page_token(Some("abc")).is_ok());
    }
}
