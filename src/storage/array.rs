use crate::Component;
use std::any::Any;
use std::marker::PhantomData;
use std::ptr::NonNull;

/// Type-erased interface of a dense component array.
///
/// All structural changes go through this trait so the arrays of a group stay index-aligned.
pub(crate) trait ErasedArray: Send + Sync {
    fn len(&self) -> usize;

    /// Grows the backing storage to hold at least `capacity` elements without changing the length.
    fn reserve_total(&mut self, capacity: usize);

    fn truncate(&mut self, len: usize);

    /// Moves the last element into `index` and shrinks the array by one.
    fn swap_remove(&mut self, index: usize);

    /// Like [swap_remove](Self::swap_remove), but appends the removed element to `dst`.
    /// `dst` must store the same component type.
    fn swap_remove_into(&mut self, index: usize, dst: &mut dyn ErasedArray);

    fn get_any(&self, index: usize) -> Option<&dyn Any>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A contiguous, gap-free array of one component type within one group.
pub(crate) struct DenseArray<T> {
    data: Vec<T>,
}

impl<T: Component> DenseArray<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn new_erased(capacity: usize) -> Box<dyn ErasedArray> {
        Box::new(Self::with_capacity(capacity))
    }

    /// Appends a value and returns its index.
    #[inline]
    pub fn push(&mut self, value: T) -> usize {
        self.data.push(value);
        self.data.len() - 1
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn raw(&mut self) -> RawArray<T> {
        RawArray {
            ptr: NonNull::new(self.data.as_mut_ptr()).unwrap_or(NonNull::dangling()),
            len: self.data.len(),
            _ty: PhantomData,
        }
    }
}

impl<T: Component> ErasedArray for DenseArray<T> {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn reserve_total(&mut self, capacity: usize) {
        self.data.reserve(capacity.saturating_sub(self.data.len()));
    }

    fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    fn swap_remove(&mut self, index: usize) {
        self.data.swap_remove(index);
    }

    fn swap_remove_into(&mut self, index: usize, dst: &mut dyn ErasedArray) {
        let Some(dst) = dst.as_any_mut().downcast_mut::<DenseArray<T>>() else {
            unreachable!("arrays sharing a component id store the same type");
        };
        dst.data.push(self.data.swap_remove(index));
    }

    fn get_any(&self, index: usize) -> Option<&dyn Any> {
        self.data.get(index).map(|v| v as &dyn Any)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An unchecked view of a dense array for performance-critical paths.
///
/// The view is not tied to the borrow of the database. It is invalidated by the next
/// structural change of its group (build, remove or group swap), and the compiler cannot
/// detect the violation; every dereference is therefore `unsafe`.
#[derive(Debug)]
pub struct RawArray<T> {
    ptr: NonNull<T>,
    len: usize,
    _ty: PhantomData<*mut T>,
}

impl<T> Clone for RawArray<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for RawArray<T> {}

impl<T> RawArray<T> {
    /// Returns the number of elements at the time the view was taken.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns a reference to the element at `index`.
    ///
    /// # Safety
    /// * `index` must be less than [len](Self::len).
    /// * The group must not have been structurally changed since the view was taken.
    /// * No mutable reference to the element may be alive.
    pub unsafe fn get_unchecked<'a>(&self, index: usize) -> &'a T {
        &*self.ptr.as_ptr().add(index)
    }

    /// Returns a mutable reference to the element at `index`.
    ///
    /// # Safety
    /// Same as [get_unchecked](Self::get_unchecked), and the returned reference must be unique.
    pub unsafe fn get_unchecked_mut<'a>(&self, index: usize) -> &'a mut T {
        &mut *self.ptr.as_ptr().add(index)
    }

    /// Reinterprets the view as a mutable slice.
    ///
    /// # Safety
    /// The group must not have been structurally changed since the view was taken,
    /// and no other reference into the array may be alive while the slice is used.
    pub unsafe fn as_mut_slice<'a>(self) -> &'a mut [T] {
        std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len)
    }
}
