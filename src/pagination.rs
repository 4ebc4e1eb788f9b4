//! Offset pagination shared by both panels.

use std::ops::Range;

/// Page sizes offered by the pager, in cycling order.
pub const PAGE_SIZES: &[usize] = &[50, 100, 250];
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// `max(1, ceil(total / page_size))`. A zero page size is treated as one.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    page: usize,
    page_size: usize,
    total: usize,
}

impl Default for Pager {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pager {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.total, self.page_size)
    }

    /// Record a new item count and pull the current page back into range.
    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.clamp();
    }

    pub fn clamp(&mut self) {
        self.page = self.page.clamp(1, self.total_pages());
    }

    /// Changing the page size always returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Advance to the next entry of `PAGE_SIZES`, wrapping around.
    pub fn cycle_page_size(&mut self) -> usize {
        let next = PAGE_SIZES
            .iter()
            .position(|size| *size == self.page_size)
            .map(|idx| PAGE_SIZES[(idx + 1) % PAGE_SIZES.len()])
            .unwrap_or(DEFAULT_PAGE_SIZE);
        self.set_page_size(next);
        next
    }

    pub fn reset(&mut self) {
        self.page = 1;
    }

    /// Jump to a typed page number. Non-numeric or out-of-range input is
    /// ignored and reported as `false`.
    pub fn go_to(&mut self, input: &str) -> bool {
        match input.trim().parse::<usize>() {
            Ok(page) if (1..=self.total_pages()).contains(&page) => {
                self.page = page;
                true
            }
            _ => false,
        }
    }

    pub fn next(&mut self) -> bool {
        if self.page < self.total_pages() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1) * self.page_size
    }

    /// Index range of the current page within a list of `len` items.
    pub fn window(&self, len: usize) -> Range<usize> {
        let start = self.offset().min(len);
        let end = (self.page * self.page_size).min(len);
        start..end
    }

    pub fn label(&self) -> String {
        format!(
            "Page {} of {} | Total: {}",
            self.page,
            self.total_pages(),
            self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_matches_ceiling_with_floor_of_one() {
        assert_eq!(total_pages(0, 100), 1);
        assert_eq!(total_pages(1, 100), 1);
        assert_eq!(total_pages(100, 100), 1);
        assert_eq!(total_pages(101, 100), 2);
        assert_eq!(total_pages(250, 50), 5);
        for total in 0..40 {
            for size in 1..7 {
                let expected = std::cmp::max(1, (total + size - 1) / size);
                assert_eq!(total_pages(total, size), expected);
            }
        }
    }

    #[test]
    fn shrinking_total_clamps_page() {
        let mut pager = Pager::new(10);
        pager.set_total(35);
        assert!(pager.go_to("4"));
        pager.set_total(30);
        assert_eq!(pager.page(), 3);
        pager.set_total(0);
        assert_eq!(pager.page(), 1);
        assert_eq!(pager.total_pages(), 1);
    }

    #[test]
    fn go_to_ignores_bad_input() {
        let mut pager = Pager::new(10);
        pager.set_total(25);
        assert!(!pager.go_to("abc"));
        assert!(!pager.go_to("0"));
        assert!(!pager.go_to("4"));
        assert_eq!(pager.page(), 1);
        assert!(pager.go_to(" 3 "));
        assert_eq!(pager.page(), 3);
    }

    #[test]
    fn page_size_change_resets_to_first_page() {
        let mut pager = Pager::new(50);
        pager.set_total(500);
        pager.next();
        pager.next();
        assert_eq!(pager.cycle_page_size(), 100);
        assert_eq!(pager.page(), 1);
        assert_eq!(pager.cycle_page_size(), 250);
        assert_eq!(pager.cycle_page_size(), 50);
    }

    #[test]
    fn next_and_previous_stop_at_bounds() {
        let mut pager = Pager::new(10);
        pager.set_total(15);
        assert!(!pager.previous());
        assert!(pager.next());
        assert!(!pager.next());
        assert_eq!(pager.page(), 2);
    }

    #[test]
    fn window_is_clipped_to_length() {
        let mut pager = Pager::new(10);
        pager.set_total(25);
        pager.go_to("3");
        assert_eq!(pager.window(25), 20..25);
        assert_eq!(pager.window(5), 5..5);
    }

    #[test]
    fn label_reads_page_of_total() {
        let mut pager = Pager::new(100);
        pager.set_total(250);
        assert_eq!(pager.label(), "Page 1 of 3 | Total: 250");
    }
}
