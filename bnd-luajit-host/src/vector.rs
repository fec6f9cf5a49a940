use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

macro_rules! float_vector {
    ($name:ident, $n:literal, $($field:ident),+) => {
        /// Float vector with value semantics, laid out like the C struct of
        /// the same name.
        #[repr(C)]
        #[derive(Debug, Clone, Copy, PartialEq, Default)]
        pub struct $name {
            $(pub $field: f32,)+
        }

        impl $name {
            pub const fn new($($field: f32),+) -> Self {
                Self { $($field),+ }
            }

            /// Contiguous view of the components.
            pub fn as_ptr(&self) -> *const f32 {
                (self as *const Self).cast()
            }

            pub fn as_mut_ptr(&mut self) -> *mut f32 {
                (self as *mut Self).cast()
            }

            pub fn as_slice(&self) -> &[f32; $n] {
                // SAFETY: repr(C) struct of $n f32 fields, no padding.
                unsafe { &*(self as *const Self).cast::<[f32; $n]>() }
            }

            /// Component-wise comparison within `eps`.
            pub fn approx_eq(&self, other: &Self, eps: f32) -> bool {
                $((self.$field - other.$field).abs() <= eps)&&+
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self { $($field: self.$field + rhs.$field),+ }
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self { $($field: self.$field - rhs.$field),+ }
            }
        }

        impl Mul<f32> for $name {
            type Output = Self;
            fn mul(self, rhs: f32) -> Self {
                Self { $($field: self.$field * rhs),+ }
            }
        }

        impl Mul<$name> for f32 {
            type Output = $name;
            fn mul(self, rhs: $name) -> $name {
                rhs * self
            }
        }

        impl Neg for $name {
            type Output = Self;
            fn neg(self) -> Self {
                Self { $($field: -self.$field),+ }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let parts = [$(self.$field.to_string()),+];
                write!(f, "{}({})", stringify!($name), parts.join(", "))
            }
        }
    };
}

float_vector!(Vec2, 2, x, y);
float_vector!(Vec3, 3, x, y, z);
float_vector!(Vec4, 4, x, y, z, w);
