//! Host-side counterparts of the helper types in generated Lua wrappers.
//!
//! A native library bound through bnd-luajit sees exactly these layouts:
//!
//! * [`ValueBox`]: one-element scalar storage handed out as `T*`
//!   (`M.FloatPtr(v)` in Lua)
//! * [`Vec2`], [`Vec3`], [`Vec4`]: `#[repr(C)]` float vectors with value
//!   semantics (`M.Vec2(x, y)`)
//! * [`CStringBuffer`]: fixed-capacity, NUL-terminated text buffer passed
//!   as `char*` plus its capacity (`M.CString(n, text)`)

mod boxed;
mod cstring;
mod error;
mod vector;

pub use boxed::{BoolPtr, DoublePtr, FloatPtr, IntPtr, UintPtr, ValueBox};
pub use cstring::CStringBuffer;
pub use error::{HostError, Result};
pub use vector::{Vec2, Vec3, Vec4};
