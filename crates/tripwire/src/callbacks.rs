// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{OnClosedArgs, OnOpenedArgs, OnProbingArgs};

/// Generates a cloneable wrapper around a user-provided `Fn`.
///
/// ```rust,ignore
/// define_fn_wrapper!(OnOpened(Fn(args: OnOpenedArgs<'_>)));
/// ```
///
/// The generated type stores the function in an `Arc<dyn Fn(..) + Send + Sync>` and provides
/// `new`, `call`, `Clone`, and an opaque `Debug` implementation.
macro_rules! define_fn_wrapper {
    ($name:ident(Fn($($param_name:ident: $param_ty:ty),*) -> $return_ty:ty)) => {
        pub(crate) struct $name(std::sync::Arc<dyn Fn($($param_ty),*) -> $return_ty + Send + Sync>);

        impl $name {
            pub(crate) fn new<F>(callback: F) -> Self
            where
                F: Fn($($param_ty),*) -> $return_ty + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(callback))
            }

            pub(crate) fn call(&self, $($param_name: $param_ty),*) -> $return_ty {
                (self.0)($($param_name),*)
            }
        }

        impl Clone for $name {
            fn clone(&self) -> Self {
                Self(std::sync::Arc::clone(&self.0))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish()
            }
        }
    };

    // Without a return type (defaults to unit)
    ($name:ident(Fn($($param_name:ident: $param_ty:ty),*))) => {
        define_fn_wrapper!($name(Fn($($param_name: $param_ty),*) -> ()));
    };
}

define_fn_wrapper!(OnOpened(Fn(args: OnOpenedArgs<'_>)));
define_fn_wrapper!(OnClosed(Fn(args: OnClosedArgs<'_>)));
define_fn_wrapper!(OnProbing(Fn(args: OnProbingArgs<'_>)));
