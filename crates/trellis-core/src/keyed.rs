//! Collections whose elements are identified by a unique key

use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::node::Export;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    #[error("Element with uid {uid} already exists")]
    DuplicateUid { uid: String },
    #[error("No element with uid {uid}")]
    NotFound { uid: String },
    #[error("Index {index} outside of [{start}, {start} + {len})")]
    IndexOutOfRange {
        index: usize,
        start: usize,
        len: usize,
    },
    #[error("An index window starting at {start} cannot hold {len} elements")]
    WindowOverflow { start: usize, len: usize },
}

/// Insertion-ordered list in which no two elements share a uid
///
/// The uid of an element is computed by the extraction function supplied at
/// construction; lookups scan in order and compare extracted uids.
pub struct KeyedList<T, K> {
    uid: fn(&T) -> K,
    elements: Vec<T>,
}

impl<T, K> KeyedList<T, K>
where
    K: PartialEq + fmt::Debug,
{
    pub fn new(uid: fn(&T) -> K) -> Self {
        Self {
            uid,
            elements: Vec::new(),
        }
    }

    /// Extract the uid of `element`
    pub fn uid_of(&self, element: &T) -> K {
        (self.uid)(element)
    }

    /// Position of the element with the given uid
    pub fn find<Q>(&self, uid: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.elements
            .iter()
            .position(|element| Borrow::<Q>::borrow(&(self.uid)(element)) == uid)
    }

    /// Position of the element sharing `element`'s uid
    pub fn find_element(&self, element: &T) -> Option<usize> {
        self.find(&self.uid_of(element))
    }

    /// Append `element`, failing if its uid is already present
    pub fn add(&mut self, element: T) -> Result<(), CollectionError> {
        let uid = self.uid_of(&element);
        if self.find(&uid).is_some() {
            return Err(CollectionError::DuplicateUid {
                uid: format!("{uid:?}"),
            });
        }
        debug!(uid = ?uid, "Adding element");
        self.elements.push(element);
        Ok(())
    }

    /// Overwrite the element sharing `element`'s uid, keeping its position
    pub fn replace(&mut self, element: T) -> Result<(), CollectionError> {
        let uid = self.uid_of(&element);
        let position = self.find(&uid).ok_or_else(|| CollectionError::NotFound {
            uid: format!("{uid:?}"),
        })?;
        debug!(uid = ?uid, position, "Replacing element");
        self.elements[position] = element;
        Ok(())
    }

    /// Remove the element with the given uid; absent uids are ignored
    pub fn remove<Q>(&mut self, uid: &Q) -> Option<T>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        let position = self.find(uid)?;
        let removed = self.elements.remove(position);
        debug!(uid = ?self.uid_of(&removed), position, "Removed element");
        Some(removed)
    }

    /// Remove the element sharing `element`'s uid, if any
    pub fn remove_element(&mut self, element: &T) -> Option<T> {
        let uid = self.uid_of(element);
        self.remove(&uid)
    }

    pub fn get<Q>(&self, uid: &Q) -> Option<&T>
    where
        K: Borrow<Q>,
        Q: PartialEq + ?Sized,
    {
        self.find(uid).map(|position| &self.elements[position])
    }

    /// Add `element`, or replace the one sharing its uid
    pub fn set(&mut self, element: T) {
        match self.find_element(&element) {
            Some(position) => self.elements[position] = element,
            None => self.elements.push(element),
        }
    }

    /// Replace the whole contents with `elements`
    ///
    /// Either every element is accepted or the collection is left exactly as
    /// it was. An empty input empties the collection.
    pub fn set_all<I>(&mut self, elements: I) -> Result<(), CollectionError>
    where
        I: IntoIterator<Item = T>,
    {
        self.try_set_all(elements.into_iter().map(Ok))
    }

    /// Like [`set_all`](Self::set_all), for elements that are still being
    /// parsed: the first `Err` aborts the batch and is returned unchanged
    pub fn try_set_all<I, E>(&mut self, elements: I) -> Result<(), E>
    where
        I: IntoIterator<Item = Result<T, E>>,
        E: From<CollectionError>,
    {
        let mut staged = Self::new(self.uid);
        for element in elements {
            let added = element.and_then(|element| staged.add(element).map_err(E::from));
            if let Err(err) = added {
                warn!(
                    kept = self.elements.len(),
                    "Bulk replace aborted, keeping previous elements"
                );
                return Err(err);
            }
        }
        debug!(count = staged.elements.len(), "Replaced all elements");
        self.elements = staged.elements;
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

impl<T: Clone, K> Clone for KeyedList<T, K> {
    fn clone(&self) -> Self {
        Self {
            uid: self.uid,
            elements: self.elements.clone(),
        }
    }
}

impl<T: fmt::Debug, K> fmt::Debug for KeyedList<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.elements).finish()
    }
}

impl<T: PartialEq, K> PartialEq for KeyedList<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl<'a, T, K> IntoIterator for &'a KeyedList<T, K> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl<T: Export, K> Export for KeyedList<T, K> {
    fn to_value(&self) -> Value {
        Value::Array(self.elements.iter().map(Export::to_value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Host {
        hostname: String,
        ip: String,
    }

    impl Export for Host {
        fn to_value(&self) -> Value {
            json!({"hostname": self.hostname, "ip": self.ip})
        }
    }

    fn host(hostname: &str, ip: &str) -> Host {
        Host {
            hostname: hostname.to_string(),
            ip: ip.to_string(),
        }
    }

    fn hosts(names: &[&str]) -> KeyedList<Host, String> {
        let mut list = KeyedList::new(|h: &Host| h.hostname.clone());
        for (i, name) in names.iter().enumerate() {
            list.add(host(name, &format!("192.168.131.{}", i + 1))).unwrap();
        }
        list
    }

    fn names(list: &KeyedList<Host, String>) -> Vec<&str> {
        list.iter().map(|h| h.hostname.as_str()).collect()
    }

    #[test]
    fn test_add_preserves_insertion_order() {
        let list = hosts(&["b", "a", "c"]);
        assert_eq!(names(&list), ["b", "a", "c"]);
        assert_eq!(list.find("a"), Some(1));
        assert_eq!(list.find_element(&host("c", "")), Some(2));
        assert_eq!(list.find("z"), None);
    }

    #[test]
    fn test_add_duplicate_uid_fails() {
        let mut list = hosts(&["a", "b"]);
        let err = list.add(host("a", "10.0.0.1")).unwrap_err();
        assert!(matches!(err, CollectionError::DuplicateUid { .. }));
        assert_eq!(list.len(), 2);
        assert_eq!(names(&list), ["a", "b"]);
        assert_eq!(list.get("a").unwrap().ip, "192.168.131.1");
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut list = hosts(&["a", "b"]);
        assert!(list.remove("c").is_none());
        assert_eq!(names(&list), ["a", "b"]);

        let removed = list.remove("a").unwrap();
        assert_eq!(removed.hostname, "a");
        assert_eq!(names(&list), ["b"]);

        assert!(list.remove_element(&host("b", "")).is_some());
        assert!(list.is_empty());
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut list = hosts(&["a", "b", "c"]);
        list.replace(host("b", "10.0.0.2")).unwrap();
        assert_eq!(names(&list), ["a", "b", "c"]);
        assert_eq!(list.get("b").unwrap().ip, "10.0.0.2");

        let err = list.replace(host("d", "10.0.0.4")).unwrap_err();
        assert_eq!(err, CollectionError::NotFound { uid: "\"d\"".to_string() });
    }

    #[test]
    fn test_set_upserts() {
        let mut list = hosts(&["a"]);
        list.set(host("a", "10.0.0.1"));
        list.set(host("b", "10.0.0.2"));
        assert_eq!(names(&list), ["a", "b"]);
        assert_eq!(list.get("a").unwrap().ip, "10.0.0.1");
    }

    #[test]
    fn test_set_all_replaces_contents() {
        let mut list = hosts(&["a", "b"]);
        list.set_all(vec![host("x", "1"), host("y", "2"), host("z", "3")]).unwrap();
        assert_eq!(names(&list), ["x", "y", "z"]);

        list.set_all(Vec::new()).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn test_set_all_is_atomic() {
        let mut list = hosts(&["x", "y"]);
        let before = list.clone();

        let err = list
            .set_all(vec![host("z", "1"), host("z", "2")])
            .unwrap_err();
        assert!(matches!(err, CollectionError::DuplicateUid { .. }));
        assert_eq!(list, before);
        assert_eq!(names(&list), ["x", "y"]);
    }

    #[test]
    fn test_try_set_all_aborts_on_parse_error() {
        #[derive(Debug, PartialEq)]
        enum LoadError {
            Parse(String),
            Collection(CollectionError),
        }

        impl From<CollectionError> for LoadError {
            fn from(err: CollectionError) -> Self {
                Self::Collection(err)
            }
        }

        let mut list = hosts(&["a", "b"]);
        let batch = vec![Ok(host("c", "1")), Err(LoadError::Parse("bad host".to_string()))];
        let err = list.try_set_all(batch).unwrap_err();
        assert_eq!(err, LoadError::Parse("bad host".to_string()));
        assert_eq!(names(&list), ["a", "b"]);

        let batch = vec![Ok(host("c", "1")), Ok(host("c", "2"))];
        let err = list.try_set_all::<_, LoadError>(batch).unwrap_err();
        assert!(matches!(err, LoadError::Collection(CollectionError::DuplicateUid { .. })));
        assert_eq!(names(&list), ["a", "b"]);
    }

    #[test]
    fn test_export() {
        let list = hosts(&["a", "b"]);
        assert_eq!(
            list.to_value(),
            json!([
                {"hostname": "a", "ip": "192.168.131.1"},
                {"hostname": "b", "ip": "192.168.131.2"}
            ])
        );
    }
}
