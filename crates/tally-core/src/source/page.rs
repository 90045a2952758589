use crate::{
    error::EngineError,
    obs::sink::{self, MetricsEvent},
};
use std::collections::VecDeque;

/// Default number of records requested per provider round trip.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

///
/// PageConfig
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PageConfig {
    pub page_size: usize,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

///
/// PagedRecords
///
/// Lazily pages over a provider result set in bounded chunks to cap peak
/// memory while scanning. A page shorter than `page_size` terminates the
/// scan; a result count that is an exact multiple of `page_size` therefore
/// issues one extra empty round trip to confirm termination. That trailing
/// request is a deliberate compatibility trade-off, not an oversight.
///

pub struct PagedRecords<R, F>
where
    F: FnMut(usize, usize) -> Result<Vec<R>, EngineError>,
{
    fetch: F,
    buffer: VecDeque<R>,
    offset: usize,
    page_size: usize,
    done: bool,
}

impl<R, F> PagedRecords<R, F>
where
    F: FnMut(usize, usize) -> Result<Vec<R>, EngineError>,
{
    /// Page over `fetch(offset, limit)` with the configured page size.
    pub fn new(config: PageConfig, fetch: F) -> Self {
        Self {
            fetch,
            buffer: VecDeque::new(),
            offset: 0,
            page_size: config.page_size.max(1),
            done: false,
        }
    }

    fn fetch_next_page(&mut self) -> Result<(), EngineError> {
        let page = (self.fetch)(self.offset, self.page_size)?;
        sink::record(MetricsEvent::PageFetch {
            rows: page.len() as u64,
        });

        if page.len() < self.page_size {
            self.done = true;
        }
        self.offset += self.page_size;
        self.buffer.extend(page);
        Ok(())
    }
}

impl<R, F> Iterator for PagedRecords<R, F>
where
    F: FnMut(usize, usize) -> Result<Vec<R>, EngineError>,
{
    type Item = Result<R, EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.buffer.is_empty() {
            if self.done {
                return None;
            }
            if let Err(err) = self.fetch_next_page() {
                self.done = true;
                return Some(Err(err));
            }
        }

        self.buffer.pop_front().map(Ok)
    }
}

///
/// TESTS
///
