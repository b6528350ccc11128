//! Capability tags used to look up components and systems.
//!
//! A [`Capability`] names something a component or system *provides*. Every
//! concrete type provides the capability derived from its own type name;
//! components and systems may advertise additional, abstract capabilities
//! (e.g. `"Renderable"`) by returning them from `capabilities()`.
//!
//! ## Identity
//!
//! [`Capability`] is derived from a **string name** with the FNV-1a 64-bit
//! hash, so tags can be declared as `const` items:
//!
//! ```rust
//! use engine_ecs::Capability;
//!
//! const RENDERABLE: Capability = Capability::from_name("Renderable");
//! assert_eq!(RENDERABLE, Capability::from_name("Renderable"));
//! ```

use std::any::Any;

/// A type tag for capability-based lookup, derived from a name using the
/// FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capability(pub u64);

impl Capability {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`Capability`] for a name.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// The capability every value of the concrete type `T` provides.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_name(std::any::type_name::<T>())
    }
}

/// Upcasting support for trait objects stored by the engine.
///
/// Implemented for every `'static` type; component and system traits use it
/// as a supertrait so stored trait objects can be downcast to their concrete
/// type.
pub trait AsAny: Any {
    /// Borrow as [`Any`].
    fn as_any(&self) -> &dyn Any;

    /// Mutably borrow as [`Any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The concrete type's name, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// The capability of the concrete type, see [`Capability::of`].
    fn own_capability(&self) -> Capability;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn own_capability(&self) -> Capability {
        Capability::of::<T>()
    }
}
