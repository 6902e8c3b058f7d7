//! Ordered collections whose positions are contiguous indices
//!
//! The element at sequence position `p` always carries index
//! `start_idx + p`. Every structural change and every change of `start_idx`
//! runs a reindex pass that pushes the new index into each element; elements
//! use it to recompute whatever they derive from their index (names, topics,
//! addresses).
//!
//! The last index, `start_idx + len - 1`, must fit in a `usize`. Operations
//! that would push it past that fail with [`CollectionError::WindowOverflow`]
//! and leave the list unchanged.

use serde_json::Value;
use tracing::{debug, warn};

use crate::keyed::CollectionError;
use crate::node::Export;

/// An element that knows its position in an [`IndexedList`]
pub trait Indexed {
    fn index(&self) -> usize;

    /// Assign a new index, recomputing any index-derived state
    fn set_index(&mut self, index: usize);
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedList<T> {
    start_idx: usize,
    elements: Vec<T>,
}

impl<T: Indexed> IndexedList<T> {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Empty list whose first element will receive index `start_idx`
    pub fn with_offset(start_idx: usize) -> Self {
        Self {
            start_idx,
            elements: Vec::new(),
        }
    }

    pub fn start_idx(&self) -> usize {
        self.start_idx
    }

    /// Push `start_idx + position` into every element
    pub fn update(&mut self) {
        for (position, element) in self.elements.iter_mut().enumerate() {
            element.set_index(self.start_idx + position);
        }
    }

    /// `index` if it lies in `[start_idx, start_idx + len)`
    ///
    /// This is a window test, not a search: it relies on the reindex pass
    /// keeping positions and indices aligned.
    pub fn find(&self, index: usize) -> Option<usize> {
        self.position(index).map(|_| index)
    }

    /// Window test on `element`'s own index
    pub fn find_element(&self, element: &T) -> Option<usize> {
        self.find(element.index())
    }

    fn position(&self, index: usize) -> Option<usize> {
        index
            .checked_sub(self.start_idx)
            .filter(|position| *position < self.elements.len())
    }

    /// Append `element`, returning the index it was assigned
    pub fn add(&mut self, element: T) -> Result<usize, CollectionError> {
        let len = self.elements.len() + 1;
        check_window(self.start_idx, len)?;
        self.elements.push(element);
        self.update();
        let index = self.start_idx + len - 1;
        debug!(index, "Added indexed element");
        Ok(index)
    }

    /// Overwrite the element at `element`'s index
    pub fn replace(&mut self, element: T) -> Result<(), CollectionError> {
        let index = element.index();
        let position = self
            .position(index)
            .ok_or(CollectionError::IndexOutOfRange {
                index,
                start: self.start_idx,
                len: self.elements.len(),
            })?;
        self.elements[position] = element;
        self.update();
        debug!(index, "Replaced indexed element");
        Ok(())
    }

    /// Remove the element at `index`; out-of-window indices are ignored
    ///
    /// The reindex pass runs either way.
    pub fn remove(&mut self, index: usize) -> Option<T> {
        let removed = self
            .position(index)
            .map(|position| self.elements.remove(position));
        self.update();
        if removed.is_some() {
            debug!(index, remaining = self.elements.len(), "Removed indexed element");
        }
        removed
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.position(index).map(|position| &self.elements[position])
    }

    /// Replace the element at `element`'s index, or append it
    pub fn set(&mut self, element: T) -> Result<(), CollectionError> {
        match self.position(element.index()) {
            Some(position) => {
                self.elements[position] = element;
                self.update();
                Ok(())
            }
            None => self.add(element).map(drop),
        }
    }

    /// Replace the whole contents with `elements` and reindex
    ///
    /// An empty input empties the list without a reindex pass.
    pub fn set_all<I>(&mut self, elements: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = T>,
    {
        self.try_set_all(elements.into_iter().map(Ok))
    }

    /// Like [`set_all`](Self::set_all), for elements that are still being
    /// parsed: the first `Err` aborts the batch and leaves the list untouched
    pub fn try_set_all<I, E>(&mut self, elements: I) -> Result<(), E>
    where
        I: IntoIterator<Item = Result<T, E>>,
        E: From<CollectionError>,
    {
        let staged = elements
            .into_iter()
            .collect::<Result<Vec<T>, E>>()
            .and_then(|staged| {
                check_window(self.start_idx, staged.len())?;
                Ok(staged)
            })
            .inspect_err(|_| {
                warn!(
                    kept = self.elements.len(),
                    "Bulk replace aborted, keeping previous elements"
                )
            })?;
        if staged.is_empty() {
            self.elements.clear();
            return Ok(());
        }
        self.elements = staged;
        self.update();
        debug!(count = self.elements.len(), start = self.start_idx, "Replaced all indexed elements");
        Ok(())
    }

    /// Move the window to start at `offset` and reindex in place
    pub fn set_index_offset(&mut self, offset: usize) -> Result<(), CollectionError> {
        check_window(offset, self.elements.len())?;
        self.start_idx = offset;
        self.update();
        Ok(())
    }

    pub fn get_all(&self) -> &[T] {
        &self.elements
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.elements
    }
}

/// The last index of a window of `len` elements starting at `start` must fit
fn check_window(start: usize, len: usize) -> Result<(), CollectionError> {
    match len.checked_sub(1) {
        Some(last) if start.checked_add(last).is_none() => {
            Err(CollectionError::WindowOverflow { start, len })
        }
        _ => Ok(()),
    }
}

impl<T: Indexed> Default for IndexedList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, T> IntoIterator for &'a IndexedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Export> Export for IndexedList<T> {
    fn to_value(&self) -> Value {
        Value::Array(self.elements.iter().map(Export::to_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mimics a sensor whose name and port follow its index
    #[derive(Debug, Clone, PartialEq)]
    struct Camera {
        idx: usize,
        label: &'static str,
        name: String,
        port: u16,
    }

    impl Camera {
        fn new(label: &'static str) -> Self {
            Self {
                idx: 0,
                label,
                name: String::new(),
                port: 0,
            }
        }
    }

    impl Indexed for Camera {
        fn index(&self) -> usize {
            self.idx
        }

        fn set_index(&mut self, index: usize) {
            self.idx = index;
            self.name = format!("camera_{index}");
            self.port = 5000 + (index % 1000) as u16;
        }
    }

    fn cameras(labels: &[&'static str]) -> IndexedList<Camera> {
        let mut list = IndexedList::new();
        for label in labels {
            list.add(Camera::new(label)).unwrap();
        }
        list
    }

    fn assert_contiguous(list: &IndexedList<Camera>) {
        for (position, camera) in list.iter().enumerate() {
            assert_eq!(camera.index(), list.start_idx() + position);
            assert_eq!(camera.name, format!("camera_{}", camera.index()));
        }
    }

    fn labels(list: &IndexedList<Camera>) -> Vec<&'static str> {
        list.iter().map(|c| c.label).collect()
    }

    #[test]
    fn test_add_assigns_next_index() {
        let mut list = cameras(&["front", "rear"]);
        assert_eq!(list.add(Camera::new("left")).unwrap(), 2);
        assert_eq!(list.get(2).unwrap().label, "left");
        assert_eq!(list.get(2).unwrap().port, 5002);
        assert_contiguous(&list);
    }

    #[test]
    fn test_remove_middle_reindexes() {
        let mut list = cameras(&["front", "middle", "rear"]);
        let removed = list.remove(1).unwrap();
        assert_eq!(removed.label, "middle");

        let indices: Vec<usize> = list.iter().map(Indexed::index).collect();
        assert_eq!(indices, [0, 1]);
        assert_eq!(labels(&list), ["front", "rear"]);
        assert_eq!(list.get(1).unwrap().name, "camera_1");
    }

    #[test]
    fn test_remove_out_of_window_is_noop() {
        let mut list = cameras(&["front", "rear"]);
        assert!(list.remove(7).is_none());
        assert_eq!(labels(&list), ["front", "rear"]);
        assert_contiguous(&list);
    }

    #[test]
    fn test_find_is_a_window_test() {
        let list = cameras(&["front", "rear"]);
        assert_eq!(list.find(0), Some(0));
        assert_eq!(list.find(1), Some(1));
        assert_eq!(list.find(2), None);

        let mut stray = Camera::new("stray");
        stray.set_index(1);
        assert_eq!(list.find_element(&stray), Some(1));
    }

    #[test]
    fn test_replace() {
        let mut list = cameras(&["front", "rear"]);
        let mut replacement = Camera::new("rear-hd");
        replacement.set_index(1);
        list.replace(replacement).unwrap();
        assert_eq!(labels(&list), ["front", "rear-hd"]);
        assert_contiguous(&list);

        let mut outside = Camera::new("outside");
        outside.set_index(5);
        let err = list.replace(outside).unwrap_err();
        assert_eq!(err, CollectionError::IndexOutOfRange { index: 5, start: 0, len: 2 });
    }

    #[test]
    fn test_set_upserts() {
        let mut list = cameras(&["front"]);
        let mut replacement = Camera::new("front-hd");
        replacement.set_index(0);
        list.set(replacement).unwrap();

        let mut appended = Camera::new("rear");
        appended.set_index(9);
        list.set(appended).unwrap();

        assert_eq!(labels(&list), ["front-hd", "rear"]);
        assert_contiguous(&list);
    }

    #[test]
    fn test_offset_reindexes_in_place() {
        let mut list = cameras(&["a", "b", "c"]);
        list.set_index_offset(4).unwrap();
        assert_eq!(list.start_idx(), 4);
        assert_eq!(labels(&list), ["a", "b", "c"]);
        let indices: Vec<usize> = list.iter().map(Indexed::index).collect();
        assert_eq!(indices, [4, 5, 6]);
        assert_eq!(list.get(5).unwrap().port, 5005);
        assert!(list.get(0).is_none());
        assert_contiguous(&list);
    }

    #[test]
    fn test_contiguity_after_mixed_mutations() {
        let mut list = IndexedList::with_offset(2);
        for label in ["a", "b", "c", "d", "e"] {
            list.add(Camera::new(label)).unwrap();
        }
        list.remove(3);
        list.remove(2);
        list.add(Camera::new("f")).unwrap();
        let mut replacement = Camera::new("x");
        replacement.set_index(4);
        list.replace(replacement).unwrap();
        list.remove(100);

        assert_eq!(labels(&list), ["c", "d", "x", "f"]);
        assert_contiguous(&list);
    }

    #[test]
    fn test_set_all() {
        let mut list = cameras(&["a", "b"]);
        list.set_all(vec![Camera::new("x"), Camera::new("y"), Camera::new("z")])
            .unwrap();
        assert_eq!(labels(&list), ["x", "y", "z"]);
        assert_contiguous(&list);

        list.set_all(Vec::new()).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_try_set_all_keeps_previous_on_error() {
        let mut list = cameras(&["a", "b"]);
        let before = list.clone();
        let missing = CollectionError::NotFound { uid: "ir_camera".to_string() };
        let batch = vec![Ok(Camera::new("x")), Err(missing.clone())];
        let err = list.try_set_all(batch).unwrap_err();
        assert_eq!(err, missing);
        assert_eq!(list, before);
    }

    #[test]
    fn test_window_end_never_overflows() {
        let mut list = IndexedList::with_offset(usize::MAX);
        assert_eq!(list.find(usize::MAX), None);
        assert_eq!(list.add(Camera::new("last")).unwrap(), usize::MAX);
        assert_eq!(list.find(usize::MAX), Some(usize::MAX));

        let err = list.add(Camera::new("overflow")).unwrap_err();
        assert_eq!(err, CollectionError::WindowOverflow { start: usize::MAX, len: 2 });
        assert_eq!(labels(&list), ["last"]);

        let err = list
            .set_all(vec![Camera::new("a"), Camera::new("b")])
            .unwrap_err();
        assert_eq!(err, CollectionError::WindowOverflow { start: usize::MAX, len: 2 });
        assert_eq!(labels(&list), ["last"]);
    }

    #[test]
    fn test_offset_past_end_is_rejected() {
        let mut list = cameras(&["a", "b", "c"]);
        let err = list.set_index_offset(usize::MAX - 1).unwrap_err();
        assert_eq!(err, CollectionError::WindowOverflow { start: usize::MAX - 1, len: 3 });
        assert_eq!(list.start_idx(), 0);
        assert_contiguous(&list);

        list.set_index_offset(usize::MAX - 2).unwrap();
        assert_eq!(list.get(usize::MAX).unwrap().label, "c");
        assert_eq!(list.find(1), None);
    }
}
