use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
};

pub(crate) type ToolValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn short_name(&self) -> &'static str {
        self.name.rsplit_once("::").map_or(self.name, |(_, name)| name)
    }
}

/// The dual of a primitive scalar type is its boxed form and vice versa.
/// A tool registered under one side of a pair is discoverable under the other.
#[must_use]
pub(crate) fn dual_of(id: &TypeId) -> Option<TypeInfo> {
    macro_rules! duals {
        ($($ty:ty),* $(,)?) => {
            $(
                if *id == TypeId::of::<$ty>() {
                    return Some(TypeInfo::of::<Box<$ty>>());
                }
                if *id == TypeId::of::<Box<$ty>>() {
                    return Some(TypeInfo::of::<$ty>());
                }
            )*
        };
    }

    duals!(bool, char, i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, isize, usize, f32, f64);

    None
}

/// Precomputed set of types a single tool can satisfy: its declared type,
/// every caller-declared supertype or trait marker and the boxed/unboxed dual
/// of each of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSet {
    types: Vec<TypeInfo>,
}

impl TypeSet {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        let mut set = Self { types: Vec::new() };
        set.insert(TypeInfo::of::<T>());
        set
    }

    #[inline]
    #[must_use]
    pub fn with<U>(mut self) -> Self
    where
        U: ?Sized + 'static,
    {
        self.insert(TypeInfo::of::<U>());
        self
    }

    fn insert(&mut self, type_info: TypeInfo) {
        if !self.types.contains(&type_info) {
            if let Some(dual) = dual_of(&type_info.id) {
                if !self.types.contains(&dual) {
                    self.types.push(dual);
                }
            }
            self.types.push(type_info);
        }
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_info: &TypeInfo) -> bool {
        self.types.contains(type_info)
    }

    #[inline]
    pub(crate) fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{dual_of, TypeInfo, TypeSet};
    use alloc::{boxed::Box, string::String};
    use core::any::TypeId;

    trait Marker {}

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<String>().short_name(), "String");
        assert_eq!(TypeInfo::of::<u8>().short_name(), "u8");
    }

    #[test]
    fn test_dual_both_directions() {
        let boxed = dual_of(&TypeId::of::<i32>()).unwrap();
        assert_eq!(boxed, TypeInfo::of::<Box<i32>>());

        let unboxed = dual_of(&TypeId::of::<Box<i32>>()).unwrap();
        assert_eq!(unboxed, TypeInfo::of::<i32>());

        assert!(dual_of(&TypeId::of::<String>()).is_none());
    }

    #[test]
    fn test_type_set_includes_duals() {
        let set = TypeSet::of::<i64>();
        assert!(set.contains(&TypeInfo::of::<i64>()));
        assert!(set.contains(&TypeInfo::of::<Box<i64>>()));
    }

    #[test]
    fn test_type_set_with_marker() {
        let set = TypeSet::of::<String>().with::<dyn Marker>();
        assert!(set.contains(&TypeInfo::of::<String>()));
        assert!(set.contains(&TypeInfo::of::<dyn Marker>()));
        assert!(!set.contains(&TypeInfo::of::<u8>()));
    }

    #[test]
    fn test_type_set_deduplicates() {
        let set = TypeSet::of::<u16>().with::<u16>().with::<Box<u16>>();
        assert_eq!(set.iter().count(), 2);
    }
}
