use crate::device::DeviceApi;
use crate::error::Result;
use crate::models::User;
use crate::parser;
use crate::transport::Transport;
use std::collections::VecDeque;
use tracing::debug;

/// Cursor over the paginated users grid. Pages are fetched on demand and the
/// cursor cannot be rewound; after the last page or the first error it only
/// returns `None`.
pub struct UserCursor<'a, T: Transport> {
    api: &'a DeviceApi<T>,
    buffer: VecDeque<User>,
    next_page: usize,
    last_page: Option<usize>,
    finished: bool,
}

impl<'a, T: Transport> UserCursor<'a, T> {
    fn new(api: &'a DeviceApi<T>) -> Self {
        Self {
            api,
            buffer: VecDeque::new(),
            next_page: 1,
            last_page: None,
            finished: false,
        }
    }

    fn fetch_page(&mut self, page: usize) -> Result<()> {
        self.api.require_login()?;
        let url = self.api.config().users_page_url(self.api.device_id(), page);
        debug!(page, url = %url, "fetching users page");

        let response = self.api.fetch(&url, &self.api.ajax_options())?;
        if self.last_page.is_none() {
            let last = parser::last_page(&response.body);
            debug!(pages = last, "users grid page count");
            self.last_page = Some(last);
        }
        self.buffer.extend(parser::user_rows(&response.body)?);
        self.next_page = page + 1;
        Ok(())
    }
}

impl<T: Transport> Iterator for UserCursor<'_, T> {
    type Item = Result<User>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(user) = self.buffer.pop_front() {
                return Some(Ok(user));
            }
            if let Some(last) = self.last_page {
                if self.next_page > last {
                    self.finished = true;
                    return None;
                }
            }
            if let Err(e) = self.fetch_page(self.next_page) {
                self.finished = true;
                return Some(Err(e));
            }
        }
    }
}

impl<T: Transport> DeviceApi<T> {
    /// All users registered on the device, fetched lazily page by page.
    pub fn users(&self) -> UserCursor<'_, T> {
        UserCursor::new(self)
    }
}
