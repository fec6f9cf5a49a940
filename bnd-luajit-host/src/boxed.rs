/// One-element storage whose address is passed to a native pointer
/// parameter. Native writes are visible through [`ValueBox::get`] as soon
/// as the call returns; nothing is copied back.
#[repr(transparent)]
#[derive(Debug, Default)]
pub struct ValueBox<T: Copy> {
    slot: [T; 1],
}

pub type IntPtr = ValueBox<i32>;
pub type UintPtr = ValueBox<u32>;
pub type FloatPtr = ValueBox<f32>;
pub type DoublePtr = ValueBox<f64>;
pub type BoolPtr = ValueBox<bool>;

impl<T: Copy> ValueBox<T> {
    pub fn new(value: T) -> Self {
        Self { slot: [value] }
    }

    pub fn get(&self) -> T {
        self.slot[0]
    }

    pub fn set(&mut self, value: T) {
        self.slot[0] = value;
    }

    /// Pointer for an `inout`/`out` parameter.
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.slot.as_mut_ptr()
    }

    pub fn as_ptr(&self) -> *const T {
        self.slot.as_ptr()
    }
}
