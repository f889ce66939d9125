//! Bookkeeping for the arrays and objects a script keeps alive.
//!
//! Every container the interpreter creates, and every container the host
//! hands in, is registered here by weak reference. The registry measures the
//! script's live heap against [`Limits::max_heap_bytes`](crate::Limits), and
//! when the script goes away it empties every container still alive, which
//! frees reference cycles such as `a.push(a)`.

use std::cell::RefCell;
use std::collections::HashSet;
use std::mem;
use std::rc::{Rc, Weak};

use crate::value::{release, Fields, Items, Value};

/// Charged per container on top of its elements.
pub(crate) const CONTAINER_BYTES: usize = 48;

/// Charged per array element or object property.
pub(crate) const SLOT_BYTES: usize = mem::size_of::<Value>();

/// The live heap is larger than the budget allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HeapExhausted;

#[derive(Default)]
pub(crate) struct Heap {
    arrays: Vec<Weak<RefCell<Items>>>,
    objects: Vec<Weak<RefCell<Fields>>>,
    /// Upper bound on live bytes. Exact right after a measurement.
    estimate: usize,
    limit: usize,
}

impl Heap {
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            arrays: Vec::new(),
            objects: Vec::new(),
            estimate: 0,
            limit,
        }
    }

    /// Registers a container the interpreter just built. Anything else is
    /// ignored.
    ///
    /// Returns the number of registry entries scanned, see [`Heap::grow`].
    pub(crate) fn track(&mut self, value: &Value) -> Result<usize, HeapExhausted> {
        let bytes = match value {
            Value::Array(items) => {
                self.arrays.push(Rc::downgrade(items));
                size_of_items(&items.borrow())
            }
            Value::Object(fields) => {
                self.objects.push(Rc::downgrade(fields));
                size_of_fields(&fields.borrow())
            }
            _ => return Ok(0),
        };
        self.grow(bytes)
    }

    /// Registers every container reachable from a host value.
    pub(crate) fn adopt(&mut self, value: &Value) -> Result<usize, HeapExhausted> {
        let mut seen = HashSet::new();
        let mut pending = vec![value.clone()];
        let mut bytes = 0;
        while let Some(value) = pending.pop() {
            match &value {
                Value::Array(items) => {
                    if !seen.insert(Rc::as_ptr(items).cast::<()>()) {
                        continue;
                    }
                    self.arrays.push(Rc::downgrade(items));
                    let items = items.borrow();
                    bytes += size_of_items(&items);
                    pending.extend(items.iter().filter(|v| is_container(v)).cloned());
                }
                Value::Object(fields) => {
                    if !seen.insert(Rc::as_ptr(fields).cast::<()>()) {
                        continue;
                    }
                    self.objects.push(Rc::downgrade(fields));
                    let fields = fields.borrow();
                    bytes += size_of_fields(&fields);
                    pending.extend(fields.values().filter(|v| is_container(v)).cloned());
                }
                _ => {}
            }
        }
        self.grow(bytes)
    }

    /// Accounts for `bytes` of new allocation.
    ///
    /// When the running estimate passes the limit the registry is pruned and
    /// the live heap measured exactly. Returns how many registry entries that
    /// scanned, so the caller can charge for the work.
    ///
    /// # Errors
    ///
    /// [`HeapExhausted`] if the measured live heap is over the limit.
    pub(crate) fn grow(&mut self, bytes: usize) -> Result<usize, HeapExhausted> {
        self.estimate = self.estimate.saturating_add(bytes);
        if self.estimate <= self.limit {
            return Ok(0);
        }
        let scanned = self.arrays.len() + self.objects.len();
        self.estimate = self.measure();
        if self.estimate > self.limit {
            return Err(HeapExhausted);
        }
        Ok(scanned)
    }

    /// Drops dead registry entries and returns the live size in bytes.
    pub(crate) fn measure(&mut self) -> usize {
        let mut live = 0;
        self.arrays.retain(|weak| match weak.upgrade() {
            Some(items) => {
                live += items.try_borrow().map_or(CONTAINER_BYTES, |i| size_of_items(&i));
                true
            }
            None => false,
        });
        self.objects.retain(|weak| match weak.upgrade() {
            Some(fields) => {
                live += fields.try_borrow().map_or(CONTAINER_BYTES, |f| size_of_fields(&f));
                true
            }
            None => false,
        });
        live
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        for weak in mem::take(&mut self.arrays) {
            let Some(items) = weak.upgrade() else { continue };
            let taken = match items.try_borrow_mut() {
                Ok(mut items) => mem::take(&mut items.0),
                Err(_) => continue,
            };
            release(taken);
        }
        for weak in mem::take(&mut self.objects) {
            let Some(fields) = weak.upgrade() else { continue };
            let taken = match fields.try_borrow_mut() {
                Ok(mut fields) => mem::take(&mut fields.0),
                Err(_) => continue,
            };
            release(taken.into_values().collect());
        }
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn size_of_items(items: &Items) -> usize {
    CONTAINER_BYTES
        + items
            .iter()
            .map(|v| SLOT_BYTES + inline_bytes(v))
            .sum::<usize>()
}

fn size_of_fields(fields: &Fields) -> usize {
    CONTAINER_BYTES
        + fields
            .iter()
            .map(|(k, v)| SLOT_BYTES + k.len() + inline_bytes(v))
            .sum::<usize>()
}

/// Bytes charged for appending `values` to a container.
pub(crate) fn slots_size(values: &[Value]) -> usize {
    values.iter().map(|v| SLOT_BYTES + inline_bytes(v)).sum()
}

/// Bytes a value carries beyond its slot.
pub(crate) fn inline_bytes(value: &Value) -> usize {
    match value {
        Value::Str(s) => s.len(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_containers_are_pruned() {
        let mut heap = Heap::new(1 << 20);
        {
            let temp = Value::array(vec![Value::Number(1.0); 8]);
            heap.track(&temp).unwrap();
        }
        let kept = Value::object();
        heap.track(&kept).unwrap();
        assert_eq!(heap.measure(), CONTAINER_BYTES);
        assert_eq!(heap.arrays.len(), 0);
        assert_eq!(heap.objects.len(), 1);
    }

    #[test]
    fn growth_past_the_limit_is_refused() {
        let mut heap = Heap::new(1_000);
        let big = Value::array(vec![Value::Null; 100]);
        assert_eq!(heap.track(&big), Err(HeapExhausted));
    }

    #[test]
    fn adopt_visits_shared_containers_once() {
        let mut heap = Heap::new(1 << 20);
        let shared = Value::object();
        let root = Value::array(vec![shared.clone(), shared.clone(), shared]);
        heap.adopt(&root).unwrap();
        assert_eq!(heap.arrays.len(), 1);
        assert_eq!(heap.objects.len(), 1);
    }

    #[test]
    fn dropping_the_heap_frees_cycles() {
        let cycle = Value::array(vec![]);
        let watch = match &cycle {
            Value::Array(items) => {
                items.borrow_mut().push(cycle.clone());
                Rc::downgrade(items)
            }
            _ => unreachable!(),
        };
        let mut heap = Heap::new(1 << 20);
        heap.track(&cycle).unwrap();
        drop(cycle);
        assert!(watch.upgrade().is_some(), "a cycle outlives its last handle");
        drop(heap);
        assert!(watch.upgrade().is_none());
    }
}
