//! Arithmetic boilerplate for integer newtypes.
//!
//! `op!(binary Money, Add, add, saturating_add)` implements `Add` by calling `saturating_add` on the wrapped value, and
//! similarly for the `inplace` (e.g. `AddAssign`) and `unary` (e.g. `Neg`) forms.

#[macro_export]
macro_rules! op {
    (binary $ty:ty, $trait:ident, $fn:ident, $inner:ident) => {
        impl std::ops::$trait for $ty {
            type Output = Self;

            fn $fn(self, rhs: Self) -> Self::Output {
                Self(self.0.$inner(rhs.0))
            }
        }
    };
    (inplace $ty:ty, $trait:ident, $fn:ident, $inner:ident) => {
        impl std::ops::$trait for $ty {
            fn $fn(&mut self, rhs: Self) {
                self.0 = self.0.$inner(rhs.0);
            }
        }
    };
    (unary $ty:ty, $trait:ident, $fn:ident, $inner:ident) => {
        impl std::ops::$trait for $ty {
            type Output = Self;

            fn $fn(self) -> Self::Output {
                Self(self.0.$inner())
            }
        }
    };
}
