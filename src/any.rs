use core::{
    any::{type_name, TypeId},
    cmp::Ordering,
    fmt::{self, Display, Formatter},
};

/// A type identity paired with its name, so diagnostics can show something
/// more helpful than a bare [`TypeId`].
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

impl Display for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::TypeInfo;

    struct Marker;

    #[test]
    fn test_short_name() {
        assert_eq!(TypeInfo::of::<Marker>().short_name(), "Marker");
        assert_eq!(TypeInfo::of::<i64>().short_name(), "i64");
    }

    #[test]
    fn test_eq_by_id() {
        assert_eq!(TypeInfo::of::<Marker>(), TypeInfo::of::<Marker>());
        assert_ne!(TypeInfo::of::<Marker>(), TypeInfo::of::<i64>());
    }
}
