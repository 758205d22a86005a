//! Notes and note types.
//!
//! The engine needs three things from a note: its runtime [`NoteType`], the
//! parent of that type (held by the [`TypeGraph`](crate::TypeGraph)), and a
//! human-readable rendering. Field storage and validation belong to the
//! note's own struct; the [`note!`](crate::note!) macro covers the common case.

use std::any::Any;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Identifies a message kind by its static name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NoteType(&'static str);

impl NoteType {
    /// The root of every hierarchy. Subscribing here catches every note.
    pub const ROOT: NoteType = NoteType("Note");

    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }

    pub fn is_root(&self) -> bool {
        *self == Self::ROOT
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NoteType({})", self.0)
    }
}

/// Upcast helper so `&dyn Note` can be downcast to its concrete struct.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A concrete message that can be dispatched.
pub trait Note: AsAny + Send + Sync {
    /// The runtime type used for subscription resolution.
    fn note_type(&self) -> NoteType;

    /// Declared parent type. Consulted when the runtime type was never
    /// registered with the dispatcher.
    fn parent_type(&self) -> NoteType {
        NoteType::ROOT
    }

    /// Field values in declaration order. Used only for rendering.
    fn fields(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }

    /// Canonical representation: `TypeName(field=value, ...)`, values as JSON.
    fn render(&self) -> String {
        let fields = self
            .fields()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.note_type(), fields)
    }
}

impl<'n> dyn Note + 'n {
    pub fn downcast_ref<T: Note>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Note>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Looks up a single field value by name.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }
}

impl<'n> fmt::Debug for dyn Note + 'n {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Static declaration of a note struct's place in the hierarchy.
///
/// Implemented by [`note!`](crate::note!); register with
/// [`TypeGraph::declare`](crate::TypeGraph::declare).
pub trait NoteKind: Note + Sized {
    const TYPE: NoteType;
    const PARENT: NoteType;
    const FIELDS: &'static [&'static str];
}

/// Declares a note struct and implements [`Note`] and [`NoteKind`] for it.
///
/// ```
/// notewire::note! {
///     #[derive(Debug, Clone)]
///     pub struct Alert { pub level: u8 }
/// }
///
/// notewire::note! {
///     #[derive(Debug, Clone)]
///     pub struct DiskAlert: Alert { pub level: u8, pub mount: String }
/// }
///
/// use notewire::{Note, NoteKind};
/// assert_eq!(DiskAlert::PARENT, Alert::TYPE);
/// let alert = DiskAlert { level: 2, mount: "/var".into() };
/// assert_eq!(alert.render(), r#"DiskAlert(level=2, mount="/var")"#);
/// ```
#[macro_export]
macro_rules! note {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(: $parent:ty)? {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $fty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $fty),*
        }

        impl $crate::NoteKind for $name {
            const TYPE: $crate::NoteType = $crate::NoteType::new(stringify!($name));
            const PARENT: $crate::NoteType = $crate::note!(@parent $($parent)?);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];
        }

        impl $crate::Note for $name {
            fn note_type(&self) -> $crate::NoteType {
                <Self as $crate::NoteKind>::TYPE
            }

            fn parent_type(&self) -> $crate::NoteType {
                <Self as $crate::NoteKind>::PARENT
            }

            fn fields(&self) -> ::std::vec::Vec<(&'static str, $crate::serde_json::Value)> {
                ::std::vec![$((
                    stringify!($field),
                    $crate::serde_json::to_value(&self.$field)
                        .unwrap_or($crate::serde_json::Value::Null),
                )),*]
            }
        }
    };
    (@parent) => { $crate::NoteType::ROOT };
    (@parent $parent:ty) => { <$parent as $crate::NoteKind>::TYPE };
}
