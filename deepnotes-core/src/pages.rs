//! # Page sets
//!
//! The fixed number of pages making up a note, and which one is on screen.

use std::{num::NonZeroUsize, sync::Arc};

use crate::{
    raster::AllocationError,
    surface::{DrawSurface, SurfaceListener},
    viewport::Viewport,
};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("page {index} out of range for a note of {capacity} pages")]
pub struct PageIndexError {
    pub index: usize,
    pub capacity: usize,
}

#[derive(Debug)]
pub struct PageSet {
    /// Invariant: non-empty, length never changes.
    pages: Vec<DrawSurface>,
    /// Invariant: `current < pages.len()`
    current: usize,
    viewport: Viewport,
}
impl PageSet {
    /// Pages per note, unless configured otherwise.
    pub const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(3) {
        Some(capacity) => capacity,
        None => unreachable!(),
    };
    /// Create `capacity` blank pages, showing the first. Every page reports to `listener`.
    /// # Errors
    /// If any page's raster cannot be allocated.
    pub fn new(
        capacity: NonZeroUsize,
        viewport: Viewport,
        listener: Arc<dyn SurfaceListener>,
    ) -> Result<Self, AllocationError> {
        let pages = (0..capacity.get())
            .map(|index| DrawSurface::new(index, viewport, listener.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            pages,
            current: 0,
            viewport,
        })
    }
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.pages.len()
    }
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }
    /// # Errors
    /// If `index` is not less than [`Self::capacity`].
    pub fn page_at(&self, index: usize) -> Result<&DrawSurface, PageIndexError> {
        let capacity = self.capacity();
        self.pages
            .get(index)
            .ok_or(PageIndexError { index, capacity })
    }
    /// # Errors
    /// If `index` is not less than [`Self::capacity`].
    pub fn page_at_mut(&mut self, index: usize) -> Result<&mut DrawSurface, PageIndexError> {
        let capacity = self.capacity();
        self.pages
            .get_mut(index)
            .ok_or(PageIndexError { index, capacity })
    }
    #[must_use]
    pub fn current_page(&self) -> &DrawSurface {
        &self.pages[self.current]
    }
    pub fn current_page_mut(&mut self) -> &mut DrawSurface {
        &mut self.pages[self.current]
    }
    /// Turn the page, wrapping around at both ends. Returns the new 1-based page number, for display.
    pub fn advance(&mut self, direction: Direction) -> usize {
        let capacity = self.capacity();
        self.current = match direction {
            Direction::Forward => (self.current + 1) % capacity,
            Direction::Backward => (self.current + capacity - 1) % capacity,
        };
        log::debug!("showing page {} of {capacity}", self.current + 1);
        self.current + 1
    }
    /// Call `f` on every page, in order.
    pub fn for_each_page<F: FnMut(&DrawSurface)>(&self, f: F) {
        self.pages.iter().for_each(f);
    }
    /// Call `f` on every page mutably, in order.
    pub fn for_each_page_mut<F: FnMut(&mut DrawSurface)>(&mut self, f: F) {
        self.pages.iter_mut().for_each(f);
    }
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &DrawSurface> + '_ {
        self.pages.iter()
    }
    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = &mut DrawSurface> + '_ {
        self.pages.iter_mut()
    }
    /// Any page has changes that are not yet persisted.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.pages.iter().any(DrawSurface::is_dirty)
    }
    /// Free every page's rasters.
    pub fn release(self) {
        self.pages.into_iter().for_each(DrawSurface::release);
    }
}
impl std::ops::Index<usize> for PageSet {
    type Output = DrawSurface;
    /// # Panics
    /// If `index` is out of range.
    fn index(&self, index: usize) -> &Self::Output {
        match self.page_at(index) {
            Ok(page) => page,
            Err(e) => panic!("{e}"),
        }
    }
}
impl std::ops::IndexMut<usize> for PageSet {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        match self.page_at_mut(index) {
            Ok(page) => page,
            Err(e) => panic!("{e}"),
        }
    }
}
