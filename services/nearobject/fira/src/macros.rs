/// Declare a `#[repr(u8)]` protocol enum with its wire conversions.
///
/// `TryFrom<u8>` returns the unrecognized byte as the error.
macro_rules! fira_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident = $value:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant = $value
            ),+
        }

        impl $name {
            /// Every variant, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl TryFrom<u8> for $name {
            type Error = u8;

            fn try_from(value: u8) -> Result<Self, u8> {
                match value {
                    $(v if v == $name::$variant as u8 => Ok($name::$variant),)+
                    other => Err(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                value as u8
            }
        }
    };
}

/// Use an enum's wire value as its bit index in capability bitmaps.
macro_rules! bit_indexed_by_value {
    ($($name:ident),+ $(,)?) => {
        $(
            impl $crate::codec::BitIndexed for $name {
                fn bit_index(self) -> u32 {
                    self as u8 as u32
                }

                fn from_bit_index(index: u32) -> Option<Self> {
                    u8::try_from(index).ok().and_then(|v| $name::try_from(v).ok())
                }
            }
        )+
    };
}
