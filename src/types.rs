//! Vertex id and score widths
//!
//! Algorithms are generic over the id width (`u32`, `u64`) and the score
//! precision (`f32`, `f64`). Every combination is monomorphized; there is no
//! runtime type dispatch.

use bytemuck::Pod;
use num_traits::{Float, FromPrimitive, ToPrimitive};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::iter::Sum;

/// Global vertex identifier width
///
/// `Self::INVALID` (the type's maximum) doubles as the "unreached" distance and
/// the "none" predecessor sentinel, so a graph may use at most `INVALID - 1`
/// vertex ids.
pub trait VertexId:
    Pod + Ord + Hash + Debug + Display + Send + Sync + Default + 'static
{
    /// Sentinel: unreached distance / missing predecessor
    const INVALID: Self;

    /// Widen to `usize` (indexing)
    fn index(self) -> usize;

    /// Widen to `u64` (wire headers, error payloads)
    fn as_u64(self) -> u64;

    /// Narrow from `u64`, `None` if the value does not fit or hits the sentinel
    fn from_u64(value: u64) -> Option<Self>;

    /// Narrow from `usize`, `None` if the value does not fit or hits the sentinel
    fn from_index(value: usize) -> Option<Self> {
        Self::from_u64(value as u64)
    }

    /// `self + 1`, saturating at the sentinel
    #[must_use]
    fn successor(self) -> Self;
}

macro_rules! impl_vertex_id {
    ($($t:ty),*) => {$(
        impl VertexId for $t {
            const INVALID: Self = <$t>::MAX;

            #[inline]
            #[allow(clippy::cast_possible_truncation)] // 64-bit targets only
            fn index(self) -> usize {
                self as usize
            }

            #[inline]
            fn as_u64(self) -> u64 {
                u64::from(self)
            }

            #[inline]
            fn from_u64(value: u64) -> Option<Self> {
                <$t>::try_from(value).ok().filter(|v| *v != Self::INVALID)
            }

            #[inline]
            fn successor(self) -> Self {
                self.saturating_add(1)
            }
        }
    )*};
}

impl_vertex_id!(u32, u64);

/// Floating-point score precision
pub trait Score:
    Float
    + FromPrimitive
    + ToPrimitive
    + Pod
    + Sum
    + Debug
    + Display
    + Send
    + Sync
    + Default
    + 'static
{
    /// Lossy conversion used for tolerances and logging
    fn to_f64_lossy(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// Lossy conversion from `f64` configuration values
    fn from_f64_lossy(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl Score for f32 {}
impl Score for f64 {}
