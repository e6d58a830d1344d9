//! `into_par_iter()` with or without rayon.
//!
//! With the `parallel` feature this is `rayon::prelude`. Without it, a
//! blanket trait maps `into_par_iter()` onto `into_iter()`, so call sites
//! (`map`, `flat_map`, `collect::<Result<_>>`) compile against `Iterator`.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
