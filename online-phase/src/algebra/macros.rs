//! Defines macros useful for creating arithmetic implementations

/// Given an implementation of an arithmetic trait on two borrowed references,
/// this macro implements the same arithmetic on the owned and partially-owned
/// variants
///
/// Generic parameters are given as const generics, e.g. `const LIMBS: usize`
macro_rules! impl_borrow_variants {
    // Single type trait
    ($target:ty, $trait:ident, $fn_name:ident, $op:tt, $(const $gen:ident: $gen_ty:ty),*) => {
        // Single implementation, owned target type
        impl<$(const $gen: $gen_ty),*> $trait for $target {
            type Output = $target;

            fn $fn_name(self) -> Self::Output {
                $op &self
            }
        }
    };

    // Output type same as left hand side
    ($lhs:ty, $trait:ident, $fn_name:ident, $op:tt, $rhs:ty, $(const $gen:ident: $gen_ty:ty),*) => {
        /// lhs borrowed, rhs owned
        impl<'a, $(const $gen: $gen_ty),*> $trait<$rhs> for &'a $lhs {
            type Output = $lhs;

            fn $fn_name(self, rhs: $rhs) -> Self::Output {
                self $op &rhs
            }
        }

        /// lhs owned, rhs borrowed
        impl<'a, $(const $gen: $gen_ty),*> $trait<&'a $rhs> for $lhs {
            type Output = $lhs;

            fn $fn_name(self, rhs: &'a $rhs) -> Self::Output {
                &self $op rhs
            }
        }

        /// lhs owned, rhs owned
        impl<$(const $gen: $gen_ty),*> $trait<$rhs> for $lhs {
            type Output = $lhs;

            fn $fn_name(self, rhs: $rhs) -> Self::Output {
                &self $op &rhs
            }
        }
    };
}

pub(crate) use impl_borrow_variants;
