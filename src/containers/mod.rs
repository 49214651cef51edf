//! Associative containers the core depends on semantically (spec.md C2):
//! a dense, tombstoned id table and an interval tree keyed by `[begin, end)`
//! with max-endpoint augmentation.

pub mod dense_table;
pub mod interval_tree;

pub use dense_table::DenseTable;
pub use interval_tree::IntervalTree;

/// A dense, per-container, stable identifier with a reserved `NONE` sentinel
/// (all-ones), as described in spec.md §3 "Data Model" and §9 "Cyclic and
/// pointer-graph structures".
///
/// Implementors are thin newtypes over `u32`; see [`define_id`].
pub trait Id: Copy + Clone + Eq + std::hash::Hash + Ord + std::fmt::Debug {
    const NONE: Self;

    fn from_index(index: u32) -> Self;
    fn index(self) -> u32;

    fn is_none(self) -> bool {
        self == Self::NONE
    }
}

/// Defines a dense id newtype over `u32` with a `NONE` sentinel, mirroring
/// the shape of `cranelift_entity::entity_impl!`-generated ids (see
/// `cranelift-codegen/src/ir/entities.rs`) but exposing the literal `NONE`
/// constant the spec's linked-list siblings rely on instead of hiding it
/// behind `PackedOption`.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(u32);

        impl $name {
            /// Reserved sentinel value: "no such reference".
            pub const NONE: $name = $name(u32::MAX);

            #[inline]
            pub fn from_index(index: u32) -> Self {
                debug_assert!(index != u32::MAX, "index collides with the NONE sentinel");
                $name(index)
            }

            #[inline]
            pub fn index(self) -> u32 {
                self.0
            }

            #[inline]
            pub fn is_none(self) -> bool {
                self.0 == u32::MAX
            }
        }

        impl $crate::containers::Id for $name {
            const NONE: Self = $name::NONE;

            #[inline]
            fn from_index(index: u32) -> Self {
                $name::from_index(index)
            }

            #[inline]
            fn index(self) -> u32 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::NONE
            }
        }

        // Also usable as a key in `cranelift_entity::PrimaryMap`/`SecondaryMap`
        // for the module-level append-only tables (spec.md §3's type/data/
        // string-literal/declaration/function sets), which never remove
        // entries and so don't need `DenseTable`'s tombstoning.
        impl cranelift_entity::EntityRef for $name {
            #[inline]
            fn new(index: usize) -> Self {
                $name::from_index(index as u32)
            }

            #[inline]
            fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                if self.is_none() {
                    write!(f, concat!(stringify!($name), "(NONE)"))
                } else {
                    write!(f, concat!(stringify!($name), "({})"), self.0)
                }
            }
        }
    };
}
