//! Generated rows (`"item 1"`, `"item 2"`, ...) with optional latency.

use std::thread;
use std::time::Duration;

use anyhow::Result;

use super::{DataSource, PageRequest, Record, ResponsePayload};

pub struct SyntheticSource {
    total: usize,
    latency: Duration,
}

impl SyntheticSource {
    pub fn new(total: usize, latency: Duration) -> Self {
        Self { total, latency }
    }
}

impl DataSource<Record> for SyntheticSource {
    fn fetch_page(&mut self, request: &PageRequest) -> Result<ResponsePayload<Record>> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let start = request.offset().min(self.total);
        let end = (start + request.modifiers.per_page).min(self.total);
        let items = (start..end)
            .map(|i| Record::String(format!("item {}", i + 1)))
            .collect();
        Ok(ResponsePayload::for_request(request, items, self.total, end >= self.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Modifiers;
    use crate::session::SessionToken;

    fn request(page: usize) -> PageRequest {
        PageRequest {
            page,
            modifiers: Modifiers {
                per_page: 10,
                ..Modifiers::default()
            },
            session: SessionToken::from("synthetic"),
        }
    }

    #[test]
    fn pages_through_total() {
        let mut src = SyntheticSource::new(25, Duration::ZERO);
        let p1 = src.fetch_page(&request(1)).unwrap();
        assert_eq!(p1.count, 10);
        assert_eq!(p1.items[0], Record::String("item 1".into()));
        assert!(!p1.last_page);

        let p3 = src.fetch_page(&request(3)).unwrap();
        assert_eq!(p3.count, 5);
        assert_eq!(p3.items[4], Record::String("item 25".into()));
        assert!(p3.last_page);
    }

    #[test]
    fn empty_source() {
        let mut src = SyntheticSource::new(0, Duration::ZERO);
        let p = src.fetch_page(&request(1)).unwrap();
        assert_eq!(p.count, 0);
        assert!(p.last_page);
    }
}
