/// Generates a non-exhaustive enum mapping Rust variants to AMI wire names.
///
/// Produces: enum definition + `ALL` + `as_str()` + `parse_wire()` + `Display` +
/// `AsRef<str>` + `FromStr`. Parsing is case-insensitive because Asterisk is
/// not consistent about key and event-name casing across versions.
///
/// The error type must be a tuple struct over `String`, defined separately.
///
/// # Example
///
/// ```ignore
/// define_wire_enum! {
///     error_type: ParseMyKeyError,
///     /// Doc comment for the enum.
///     pub enum MyKey {
///         ActionId => "ActionID",
///         EventList => "EventList",
///     }
/// }
/// ```
macro_rules! define_wire_enum {
    (
        error_type: $Err:ident,
        $(#[$enum_meta:meta])*
        $vis:vis enum $Name:ident {
            $(
                $(#[$var_meta:meta])*
                $variant:ident => $wire:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[non_exhaustive]
        #[allow(missing_docs)]
        $vis enum $Name {
            $(
                $(#[$var_meta])*
                $variant,
            )+
        }

        impl $Name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$Name] = &[ $( $Name::$variant, )+ ];

            /// Canonical wire spelling.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $Name::$variant => $wire, )+
                }
            }

            /// Case-insensitive lookup of a wire name.
            pub fn parse_wire(s: &str) -> Option<Self> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case($wire) {
                        return Some($Name::$variant);
                    }
                )+
                None
            }
        }

        impl std::fmt::Display for $Name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl AsRef<str> for $Name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::str::FromStr for $Name {
            type Err = $Err;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse_wire(s).ok_or_else(|| $Err(s.to_string()))
            }
        }
    };
}
