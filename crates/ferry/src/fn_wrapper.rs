// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Generates a public, cloneable wrapper around `Arc<dyn Fn(..) -> ..>`.
///
/// ```rust,ignore
/// define_fn_wrapper!(
///     /// Docs for the wrapper.
///     pub Factory(Fn() -> BoxTransport)
/// );
/// ```
///
/// The generated type has a public `new` constructor, a crate-private `call` method and a
/// `Debug` impl that prints only the type name.
macro_rules! define_fn_wrapper {
    ($(#[$meta:meta])* $vis:vis $name:ident(Fn($($arg:ident: $arg_ty:ty),*) -> $ret:ty)) => {
        $(#[$meta])*
        #[derive(Clone)]
        $vis struct $name(std::sync::Arc<dyn Fn($($arg_ty),*) -> $ret + Send + Sync>);

        impl $name {
            /// Wraps the given function.
            pub fn new<F>(f: F) -> Self
            where
                F: Fn($($arg_ty),*) -> $ret + Send + Sync + 'static,
            {
                Self(std::sync::Arc::new(f))
            }

            pub(crate) fn call(&self, $($arg: $arg_ty),*) -> $ret {
                (self.0)($($arg),*)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}

pub(crate) use define_fn_wrapper;
