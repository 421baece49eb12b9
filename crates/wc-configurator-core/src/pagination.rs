//! Page maths for the wheel model grid.

use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: usize = 8;

/// How the wheel grid arranges the items of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GridLayout {
    /// One or two items, two columns at most.
    Compact,
    TwoByTwo,
    FourByTwo,
}

impl GridLayout {
    pub fn for_items(count: usize) -> Self {
        match count {
            0..=2 => Self::Compact,
            3..=4 => Self::TwoByTwo,
            _ => Self::FourByTwo,
        }
    }
}

/// One page of a list. `page` is 1-based and already clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
}

impl<T> Page<'_, T> {
    /// Controls are hidden when everything fits on one page.
    pub fn show_controls(&self) -> bool {
        self.total_pages > 1
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Inert slots that keep a partial page the same height as a full one.
    /// Pages of two items or fewer use the compact layout and are never padded.
    pub fn placeholders(&self) -> usize {
        let count = self.items.len();
        if self.total_pages > 1 && count > 2 && count < self.page_size {
            self.page_size - count
        } else {
            0
        }
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::for_items(self.items.len())
    }
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    if len <= page_size {
        1
    } else {
        len.div_ceil(page_size)
    }
}

/// 1-based page holding the item at `index`.
pub fn page_of(index: usize, page_size: usize) -> usize {
    index / page_size.max(1) + 1
}

pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let page = page.clamp(1, total_pages);

    let start = ((page - 1) * page_size).min(items.len());
    let end = (start + page_size).min(items.len());

    Page {
        items: &items[start..end],
        page,
        total_pages,
        page_size,
    }
}
